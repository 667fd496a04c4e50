//! forage-core - Diversity-aware tree search for program synthesis
//!
//! Searches over sequences of program IDs with Monte Carlo tree search,
//! rewarding rollouts both for their environment value and for behaving
//! unlike what the search has already seen. Behavior is compared by
//! rendering each rollout as text ([`extraction`]), encoding that text as a
//! feature vector ([`encoding`]) and clustering the vectors ([`cluster`]).

pub mod cluster;
pub mod config;
pub mod encoding;
pub mod error;
pub mod extraction;
pub mod search;
pub mod trace;
pub mod types;

pub use cluster::{Assignment, Cluster, ClusterSnapshot, ClusteringConfig, DiversityClusterer};
pub use config::ForageConfig;
pub use encoding::{EncoderConfig, EncoderError, TraceEncoder, build_encoder};
pub use error::{ClusterStateError, ExecutionError, ForageError, Result};
pub use extraction::{
    ExtractorConfig, ProgramCatalog, StaticCatalog, TraceExtractor, build_extractor,
};
pub use search::{
    ActionSpace, Executor, FixedActionSpace, SearchConfig, SearchController, SearchOutcome,
    SearchStats, SearchTree, StepReport, StopReason,
};
pub use trace::{Rollout, Trace};
pub use types::*;
