//! Error types for forage-core

use std::time::Duration;

use thiserror::Error;

use crate::types::{ClusterId, ProgramId};

/// Error type for search operations
#[derive(Debug, Error)]
pub enum ForageError {
    /// Extractor was given an empty or malformed program sequence
    #[error("Invalid trace: {0}")]
    InvalidTrace(String),

    /// Environment executor failed for one rollout
    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    /// Encoder could not produce a feature vector
    #[error("Encoding error: {0}")]
    Encoding(#[from] crate::encoding::EncoderError),

    /// Clusterer invariant violated
    #[error("Cluster state error: {0}")]
    ClusterState(#[from] ClusterStateError),

    /// Configuration rejected by validation
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl ForageError {
    /// Whether this error must abort a search run.
    ///
    /// Branch-level failures (execution, encoding, trace rendering) are
    /// recovered by penalizing the branch. Everything else indicates a
    /// configuration bug.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            ForageError::Execution(_) | ForageError::Encoding(_) | ForageError::InvalidTrace(_)
        )
    }
}

/// Result type alias for forage operations
pub type Result<T> = std::result::Result<T, ForageError>;

/// Failure reported by (or on behalf of) the environment executor
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ExecutionError {
    #[error("environment crashed: {0}")]
    Crashed(String),

    #[error("execution timed out after {0:?}")]
    Timeout(Duration),

    #[error("program {0} is not applicable here")]
    InvalidAction(ProgramId),

    #[error("executor returned programs {received:?}, expected {expected:?}")]
    ProgramMismatch {
        expected: Vec<ProgramId>,
        received: Vec<ProgramId>,
    },

    #[error("executor returned non-finite value {0}")]
    NonFiniteValue(f64),
}

/// Clusterer invariant violations. Always fatal for a run.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ClusterStateError {
    #[error("vector dimensionality mismatch: expected {expected}, received {received}")]
    DimensionMismatch { expected: usize, received: usize },

    #[error("unknown cluster {id} (clusterer holds {count})")]
    UnknownCluster { id: ClusterId, count: usize },

    #[error("vector contains a non-finite component at index {0}")]
    NonFiniteComponent(usize),

    #[error("snapshot version {found} is not supported (expected {expected})")]
    UnsupportedSnapshot { found: u32, expected: u32 },
}
