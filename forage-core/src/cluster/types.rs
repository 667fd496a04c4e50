//! Core types for behavioral clustering

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{ClusterId, FeatureVector};

/// A cluster of behaviorally similar traces
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    /// Creation-order identifier
    pub id: ClusterId,

    /// Running mean of member vectors
    pub centroid: FeatureVector,

    /// Number of vectors folded into the centroid
    pub members: u64,

    /// When this cluster was first created
    pub created_at: DateTime<Utc>,

    /// When this cluster last received a member
    pub last_seen: DateTime<Utc>,
}

impl Cluster {
    /// Create a cluster seeded with its first member
    pub fn new(id: ClusterId, first: FeatureVector) -> Self {
        let now = Utc::now();
        Self {
            id,
            centroid: first,
            members: 1,
            created_at: now,
            last_seen: now,
        }
    }
}

/// Outcome of assigning a vector to the cluster space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    /// Target cluster. For a new cluster this is the next unused ID.
    pub cluster_id: ClusterId,

    /// Distance to the nearest existing centroid (0 when none exist)
    pub distance: f32,

    /// Bounded novelty/under-exploration score
    pub diversity: f64,

    /// Whether `update` will create `cluster_id`
    pub is_new: bool,
}

/// Closed interval that diversity scores are mapped into
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreRange {
    pub min: f64,
    pub max: f64,
}

impl Default for ScoreRange {
    fn default() -> Self {
        Self { min: 0.0, max: 1.0 }
    }
}

impl ScoreRange {
    /// Map a raw score in [0, 1] into this range
    pub fn scale(&self, raw: f64) -> f64 {
        self.min + raw.clamp(0.0, 1.0) * (self.max - self.min)
    }

    pub fn contains(&self, score: f64) -> bool {
        score >= self.min && score <= self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_cluster_has_one_member() {
        let cluster = Cluster::new(ClusterId(3), vec![0.5, 0.5]);
        assert_eq!(cluster.members, 1);
        assert_eq!(cluster.id, ClusterId(3));
        assert_eq!(cluster.created_at, cluster.last_seen);
    }

    #[test]
    fn test_score_range_scale_clamps() {
        let range = ScoreRange { min: -1.0, max: 1.0 };
        assert_eq!(range.scale(0.0), -1.0);
        assert_eq!(range.scale(0.5), 0.0);
        assert_eq!(range.scale(1.0), 1.0);
        assert_eq!(range.scale(7.0), 1.0);
        assert!(range.contains(range.scale(-3.0)));
    }
}
