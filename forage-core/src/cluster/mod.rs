//! Behavioral clustering of encoded traces
//!
//! Partitions feature space into clusters and scores each new vector by how
//! novel and how under-explored its behavior is.
//!
//! # Scoring
//!
//! For a vector at distance `d` from the nearest centroid, joining a cluster
//! with `m` of `N` total members (`m = 0` for a new cluster):
//!
//! ```text
//! novelty = min(d / novelty_scale, 1)
//! balance = 1 - m / N
//! score   = min + (wn·novelty + wb·balance) / (wn + wb) · (max - min)
//! ```
//!
//! The first vector ever seen opens cluster 0 with the maximum score.
//!
//! # Configuration
//!
//! ```toml
//! [clustering]
//! threshold = 0.5        # join radius
//! metric = "euclidean"   # or "cosine"
//! novelty_weight = 0.5
//! balance_weight = 0.5
//! novelty_scale = 1.0
//! score_range = { min = 0.0, max = 1.0 }
//! ```

mod clusterer;
mod distance;
mod snapshot;
mod types;

pub use clusterer::{ClusteringConfig, DiversityClusterer};
pub use distance::{
    DistanceMetric, cosine_distance, distance, euclidean_distance, fold_into_mean,
};
pub use snapshot::{ClusterSnapshot, SNAPSHOT_VERSION};
pub use types::{Assignment, Cluster, ScoreRange};
