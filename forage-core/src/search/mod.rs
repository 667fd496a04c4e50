//! Diversity-aware tree search over program sequences
//!
//! Each iteration:
//! 1. Select the first node with an untried program (UCB plus diversity bonus)
//! 2. Expand it by up to `expansion_width` children
//! 3. Execute each child's program sequence through the [`Executor`]
//! 4. Extract, encode and cluster the resulting trace
//! 5. Backpropagate `reward + diversity_weight * diversity` to the root
//!
//! Failed branches receive `failure_penalty` instead and are never expanded
//! again.

mod controller;
mod executor;
mod space;
mod tree;
mod types;

pub use controller::{
    DEFAULT_FAILURE_PENALTY, DEFAULT_MAX_ITERATIONS, SearchConfig, SearchController,
};
pub use executor::Executor;
pub use space::{ActionSpace, FixedActionSpace};
pub use tree::{BestPath, Node, NodeId, NodeState, SearchTree, Selection, SelectionPolicy};
pub use types::{RolloutReport, SearchOutcome, SearchStats, StepReport, StopReason};
