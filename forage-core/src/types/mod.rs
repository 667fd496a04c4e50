//! Identifier types shared across the search pipeline

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of one atomic program (action) in the search space
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProgramId(pub u32);

impl fmt::Display for ProgramId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for ProgramId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// Identifier of a behavioral cluster
///
/// Clusters are numbered in creation order starting at 0 and are never
/// renumbered within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClusterId(pub u32);

impl ClusterId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a search run
pub type RunId = Uuid;

/// Fixed-length feature vector produced by a trace encoder
pub type FeatureVector = Vec<f32>;

/// Convenience for building program sequences in tests and hosts
pub fn programs(ids: &[u32]) -> Vec<ProgramId> {
    ids.iter().copied().map(ProgramId).collect()
}
