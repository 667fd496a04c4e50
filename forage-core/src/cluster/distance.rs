//! Distance metrics for behavioral clustering
//!
//! Feature vectors are compared either by Euclidean distance or by cosine
//! distance. Both are symmetric and zero for identical vectors.


// =============================================================================
// Implementation
// =============================================================================

use serde::{Deserialize, Serialize};

use crate::encoding::cosine_similarity;

/// How two feature vectors are compared
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    #[default]
    Euclidean,
    /// `1 - cosine similarity`, in [0, 2]
    Cosine,
}

pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum::<f32>()
        .sqrt()
}

pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    1.0 - cosine_similarity(a, b)
}

pub fn distance(a: &[f32], b: &[f32], metric: DistanceMetric) -> f32 {
    match metric {
        DistanceMetric::Euclidean => euclidean_distance(a, b),
        DistanceMetric::Cosine => cosine_distance(a, b),
    }
}

/// Component-wise mean; empty for no points
#[cfg(test)]
fn compute_centroid(points: &[Vec<f32>]) -> Vec<f32> {
    let Some(first) = points.first() else {
        return Vec::new();
    };
    let mut sum = vec![0.0f32; first.len()];
    for point in points {
        for (acc, x) in sum.iter_mut().zip(point) {
            *acc += x;
        }
    }
    let n = points.len() as f32;
    sum.into_iter().map(|s| s / n).collect()
}

/// Fold `point` into a running mean that now covers `count` points
pub fn fold_into_mean(mean: &mut [f32], point: &[f32], count: u64) {
    let count = count.max(1) as f32;
    for (m, &p) in mean.iter_mut().zip(point) {
        *m += (p - *m) / count;
    }
}
