//! Export/import of clusterer state
//!
//! Lets a finished run's clusters be inspected offline or used to warm-start
//! a later run over the same encoder.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ClusterStateError, ForageError, Result};
use crate::types::ClusterId;

use super::clusterer::{ClusteringConfig, DiversityClusterer};
use super::types::Cluster;

/// Current version of the snapshot format
pub const SNAPSHOT_VERSION: u32 = 1;

/// Serializable copy of a clusterer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterSnapshot {
    pub version: u32,
    pub exported_at: DateTime<Utc>,
    pub config: ClusteringConfig,
    pub dimensions: Option<usize>,
    pub clusters: Vec<Cluster>,
}

impl ClusterSnapshot {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| ForageError::Serialization(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| ForageError::Serialization(e.to_string()))
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    /// Check the invariants a live clusterer relies on
    fn validate(&self) -> std::result::Result<(), ClusterStateError> {
        if self.version != SNAPSHOT_VERSION {
            return Err(ClusterStateError::UnsupportedSnapshot {
                found: self.version,
                expected: SNAPSHOT_VERSION,
            });
        }

        let expected = self
            .dimensions
            .or_else(|| self.clusters.first().map(|c| c.centroid.len()));
        for (index, cluster) in self.clusters.iter().enumerate() {
            if cluster.id != ClusterId(index as u32) || cluster.members == 0 {
                return Err(ClusterStateError::UnknownCluster {
                    id: cluster.id,
                    count: self.clusters.len(),
                });
            }
            if let Some(expected) = expected
                && cluster.centroid.len() != expected
            {
                return Err(ClusterStateError::DimensionMismatch {
                    expected,
                    received: cluster.centroid.len(),
                });
            }
            if let Some(i) = cluster.centroid.iter().position(|x| !x.is_finite()) {
                return Err(ClusterStateError::NonFiniteComponent(i));
            }
        }
        Ok(())
    }
}

impl DiversityClusterer {
    /// Export current state
    pub fn snapshot(&self) -> ClusterSnapshot {
        ClusterSnapshot {
            version: SNAPSHOT_VERSION,
            exported_at: Utc::now(),
            config: self.config().clone(),
            dimensions: self.dimensions(),
            clusters: self.clusters().to_vec(),
        }
    }

    /// Rebuild a clusterer from an exported snapshot
    pub fn from_snapshot(snapshot: ClusterSnapshot) -> Result<Self> {
        snapshot.validate()?;
        snapshot.config.validate()?;
        let dimensions = snapshot
            .dimensions
            .or_else(|| snapshot.clusters.first().map(|c| c.centroid.len()));
        Ok(Self::from_parts(snapshot.config, dimensions, snapshot.clusters))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn populated() -> DiversityClusterer {
        let mut c = DiversityClusterer::new(ClusteringConfig::default());
        c.observe(&[1.0, 0.0]).unwrap();
        c.observe(&[1.0, 0.1]).unwrap();
        c.observe(&[-1.0, 0.0]).unwrap();
        c
    }

    #[test]
    fn test_snapshot_restores_scoring_state() {
        let original = populated();
        let restored = DiversityClusterer::from_snapshot(original.snapshot()).unwrap();

        assert_eq!(restored.cluster_count(), original.cluster_count());
        assert_eq!(restored.total_members(), original.total_members());
        assert_eq!(
            restored.assign(&[0.0, 1.0]).unwrap(),
            original.assign(&[0.0, 1.0]).unwrap()
        );
    }

    #[test]
    fn test_snapshot_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clusters.json");

        let snapshot = populated().snapshot();
        snapshot.save(&path).unwrap();
        let loaded = ClusterSnapshot::load(&path).unwrap();
        assert_eq!(loaded, snapshot);
    }

    #[test]
    fn test_rejects_future_version() {
        let mut snapshot = populated().snapshot();
        snapshot.version = SNAPSHOT_VERSION + 1;
        let err = DiversityClusterer::from_snapshot(snapshot).unwrap_err();
        assert!(matches!(
            err,
            ForageError::ClusterState(ClusterStateError::UnsupportedSnapshot { .. })
        ));
    }

    #[test]
    fn test_rejects_ragged_centroids() {
        let mut snapshot = populated().snapshot();
        snapshot.clusters[1].centroid.push(0.0);
        let err = DiversityClusterer::from_snapshot(snapshot).unwrap_err();
        assert!(matches!(
            err,
            ForageError::ClusterState(ClusterStateError::DimensionMismatch {
                expected: 2,
                received: 3
            })
        ));
    }

    #[test]
    fn test_rejects_ragged_centroids_without_recorded_width() {
        let mut snapshot = populated().snapshot();
        snapshot.dimensions = None;
        snapshot.clusters[1].centroid.push(0.0);
        let err = DiversityClusterer::from_snapshot(snapshot).unwrap_err();
        assert!(matches!(
            err,
            ForageError::ClusterState(ClusterStateError::DimensionMismatch {
                expected: 2,
                received: 3
            })
        ));
    }

    #[test]
    fn test_rejects_out_of_order_ids() {
        let mut snapshot = populated().snapshot();
        snapshot.clusters.swap(0, 1);
        assert!(DiversityClusterer::from_snapshot(snapshot).is_err());
    }

    #[test]
    fn test_malformed_json_is_serialization_error() {
        assert!(matches!(
            ClusterSnapshot::from_json("{not json"),
            Err(ForageError::Serialization(_))
        ));
    }
}
