//! Diversity scoring by incremental centroid clustering
//!
//! Each incoming vector is matched against existing centroids:
//! 1. Nearest centroid within `threshold` is joined
//! 2. Otherwise a new cluster is opened
//!
//! The diversity score blends distance to the nearest centroid (novelty) with
//! how small the target cluster is relative to all observations (balance).

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ClusterStateError, ForageError, Result};
use crate::types::ClusterId;

use super::distance::{DistanceMetric, distance, fold_into_mean};
use super::types::{Assignment, Cluster, ScoreRange};

/// Distances within this tolerance count as equidistant
const TIE_EPSILON: f32 = 1e-6;

/// Configuration for the diversity clusterer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusteringConfig {
    /// Maximum distance at which a vector joins an existing cluster
    pub threshold: f32,
    /// Distance metric to use
    pub metric: DistanceMetric,
    /// Weight of the distance-to-nearest-centroid term
    pub novelty_weight: f64,
    /// Weight of the cluster-sparsity term
    pub balance_weight: f64,
    /// Distance at which novelty saturates at 1
    pub novelty_scale: f32,
    /// Bounds of the emitted score
    pub score_range: ScoreRange,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            metric: DistanceMetric::Euclidean,
            novelty_weight: 0.5,
            balance_weight: 0.5,
            novelty_scale: 1.0,
            score_range: ScoreRange::default(),
        }
    }
}

impl ClusteringConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.threshold.is_finite() && self.threshold > 0.0) {
            return Err(ForageError::Config(format!(
                "clustering.threshold must be positive, got {}",
                self.threshold
            )));
        }
        if !(self.novelty_scale.is_finite() && self.novelty_scale > 0.0) {
            return Err(ForageError::Config(format!(
                "clustering.novelty_scale must be positive, got {}",
                self.novelty_scale
            )));
        }
        let weights = [self.novelty_weight, self.balance_weight];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) || weights.iter().sum::<f64>() <= 0.0
        {
            return Err(ForageError::Config(
                "clustering weights must be non-negative and not both zero".to_string(),
            ));
        }
        let range = self.score_range;
        if !(range.min.is_finite() && range.max.is_finite() && range.min < range.max) {
            return Err(ForageError::Config(format!(
                "clustering.score_range must satisfy min < max, got [{}, {}]",
                range.min, range.max
            )));
        }
        Ok(())
    }
}

/// Incremental clusterer exposing a bounded diversity score
#[derive(Debug, Clone)]
pub struct DiversityClusterer {
    config: ClusteringConfig,
    dimensions: Option<usize>,
    clusters: Vec<Cluster>,
    total_members: u64,
}

impl DiversityClusterer {
    pub fn new(config: ClusteringConfig) -> Self {
        Self {
            config,
            dimensions: None,
            clusters: Vec::new(),
            total_members: 0,
        }
    }

    /// Rebuild from previously exported state
    pub(crate) fn from_parts(
        config: ClusteringConfig,
        dimensions: Option<usize>,
        clusters: Vec<Cluster>,
    ) -> Self {
        let total_members = clusters.iter().map(|c| c.members).sum();
        Self {
            config,
            dimensions,
            clusters,
            total_members,
        }
    }

    /// Score `vector` against current clusters without changing state.
    ///
    /// Deterministic for identical state and input. The very first vector
    /// targets cluster 0 with the maximum score.
    pub fn assign(&self, vector: &[f32]) -> std::result::Result<Assignment, ClusterStateError> {
        self.check_vector(vector)?;

        let range = self.config.score_range;
        let Some((nearest, nearest_distance)) = self.nearest(vector) else {
            return Ok(Assignment {
                cluster_id: ClusterId(0),
                distance: 0.0,
                diversity: range.max,
                is_new: true,
            });
        };

        let (cluster_id, target_members, is_new) = if nearest_distance <= self.config.threshold {
            (nearest.id, nearest.members, false)
        } else {
            (self.next_id(), 0, true)
        };

        let novelty = (nearest_distance / self.config.novelty_scale).min(1.0) as f64;
        let balance = if self.total_members == 0 {
            1.0
        } else {
            1.0 - target_members as f64 / self.total_members as f64
        };
        let weight_sum = self.config.novelty_weight + self.config.balance_weight;
        let raw = (self.config.novelty_weight * novelty + self.config.balance_weight * balance)
            / weight_sum;
        let diversity = range.scale(raw);

        debug!(
            cluster = %cluster_id,
            is_new,
            distance = nearest_distance,
            novelty,
            balance,
            diversity,
            "Assigned vector"
        );

        Ok(Assignment {
            cluster_id,
            distance: nearest_distance,
            diversity,
            is_new,
        })
    }

    /// Fold `vector` into `cluster_id`, creating it when it is the next ID
    pub fn update(
        &mut self,
        cluster_id: ClusterId,
        vector: &[f32],
    ) -> std::result::Result<(), ClusterStateError> {
        self.check_vector(vector)?;

        let index = cluster_id.index();
        if index == self.clusters.len() {
            self.dimensions.get_or_insert(vector.len());
            self.clusters.push(Cluster::new(cluster_id, vector.to_vec()));
            debug!(cluster = %cluster_id, "Opened cluster");
        } else if let Some(cluster) = self.clusters.get_mut(index) {
            cluster.members += 1;
            fold_into_mean(&mut cluster.centroid, vector, cluster.members);
            cluster.last_seen = chrono::Utc::now();
        } else {
            return Err(ClusterStateError::UnknownCluster {
                id: cluster_id,
                count: self.clusters.len(),
            });
        }

        self.total_members += 1;
        Ok(())
    }

    /// Assign then update in one call
    pub fn observe(&mut self, vector: &[f32]) -> std::result::Result<Assignment, ClusterStateError> {
        let assignment = self.assign(vector)?;
        self.update(assignment.cluster_id, vector)?;
        Ok(assignment)
    }

    pub fn cluster_count(&self) -> usize {
        self.clusters.len()
    }

    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    pub fn cluster(&self, id: ClusterId) -> Option<&Cluster> {
        self.clusters.get(id.index())
    }

    pub fn total_members(&self) -> u64 {
        self.total_members
    }

    /// Dimensionality fixed by the first vector, if any
    pub fn dimensions(&self) -> Option<usize> {
        self.dimensions
    }

    pub fn config(&self) -> &ClusteringConfig {
        &self.config
    }

    fn next_id(&self) -> ClusterId {
        ClusterId(self.clusters.len() as u32)
    }

    fn check_vector(&self, vector: &[f32]) -> std::result::Result<(), ClusterStateError> {
        if let Some(expected) = self.dimensions
            && expected != vector.len()
        {
            return Err(ClusterStateError::DimensionMismatch {
                expected,
                received: vector.len(),
            });
        }
        if let Some(i) = vector.iter().position(|x| !x.is_finite()) {
            return Err(ClusterStateError::NonFiniteComponent(i));
        }
        Ok(())
    }

    /// Nearest centroid; equidistant clusters prefer fewer members, then lower ID
    fn nearest(&self, vector: &[f32]) -> Option<(&Cluster, f32)> {
        let mut best: Option<(&Cluster, f32)> = None;
        for cluster in &self.clusters {
            let dist = distance(vector, &cluster.centroid, self.config.metric);
            best = match best {
                None => Some((cluster, dist)),
                Some((current, best_dist)) => {
                    let closer = dist < best_dist - TIE_EPSILON;
                    let tied_but_smaller =
                        (dist - best_dist).abs() <= TIE_EPSILON && cluster.members < current.members;
                    if closer || tied_but_smaller {
                        Some((cluster, dist))
                    } else {
                        Some((current, best_dist))
                    }
                }
            };
        }
        best
    }
}
