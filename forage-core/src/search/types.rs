//! Reports produced by a search run

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ForageError;
use crate::types::{ClusterId, ProgramId, RunId};

use super::tree::NodeId;

/// Why a run stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    IterationBudget,
    TimeBudget,
    Cancelled,
    /// Every branch of the tree is terminal or failed
    Exhausted,
}

/// Counters accumulated over a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchStats {
    /// Executor calls made
    pub executions: u64,
    /// Branches penalized for an execution error
    pub failures: u64,
    /// Branches penalized because their trace could not be rendered or encoded
    pub encoding_failures: u64,
    /// Behavioral clusters discovered so far
    pub clusters: usize,
    /// Nodes in the search tree, root included
    pub nodes: usize,
}

/// Read-only summary returned when a run stops
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchOutcome {
    pub run_id: RunId,
    /// Best program sequence by greedy mean-value descent
    pub best_programs: Vec<ProgramId>,
    /// Mean combined value of the best node (`None` if nothing was visited)
    pub best_mean_value: Option<f64>,
    /// Iterations consumed, counting every backpropagation
    pub iterations: u64,
    pub stop_reason: StopReason,
    pub stats: SearchStats,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Result of evaluating one newly expanded node
#[derive(Debug)]
pub enum RolloutReport {
    /// The rollout was executed, encoded and clustered
    Scored {
        node: NodeId,
        programs: Vec<ProgramId>,
        reward: f64,
        diversity: f64,
        combined: f64,
        cluster: ClusterId,
    },
    /// The branch failed and was penalized
    Failed {
        node: NodeId,
        programs: Vec<ProgramId>,
        error: ForageError,
    },
}

impl RolloutReport {
    pub fn node(&self) -> NodeId {
        match self {
            RolloutReport::Scored { node, .. } | RolloutReport::Failed { node, .. } => *node,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, RolloutReport::Failed { .. })
    }
}

/// Result of one controller step
#[derive(Debug)]
pub enum StepReport {
    /// Children of `at` were evaluated. Fewer than were created if the run
    /// was cancelled or ran out of time partway.
    Expanded {
        at: NodeId,
        rollouts: Vec<RolloutReport>,
    },
    /// Nothing left to expand
    Exhausted,
}
