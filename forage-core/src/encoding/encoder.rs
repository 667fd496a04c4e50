//! Feature encoding for trace texts
//!
//! Provides the `TraceEncoder` trait for turning trace text into fixed-length
//! vectors, plus the vector helpers shared by the built-in strategies.

use std::hash::{DefaultHasher, Hash, Hasher};

use async_trait::async_trait;
use thiserror::Error;

use crate::trace::Trace;
use crate::types::FeatureVector;

/// Errors that can occur during encoding
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EncoderError {
    #[error("trace text has no tokens to encode")]
    EmptyText,

    #[error("encoder dimensionality must be positive, got {0}")]
    InvalidDimensions(usize),

    #[error("encoder produced {received} vectors for a batch of {expected}")]
    BatchSize { expected: usize, received: usize },

    /// Failure inside the encoding backend (model, sampler, remote service)
    #[error("encoder backend failed: {0}")]
    Backend(String),
}

/// Result type for encoder operations
pub type EncoderResult<T> = Result<T, EncoderError>;

/// Trait for encoding traces as feature vectors
///
/// One output per input, in input order. Every vector produced by one
/// instance has length [`dimensions`](TraceEncoder::dimensions). Built-in
/// encoders hold no mutable state, so the same text always encodes to the
/// same vector.
#[async_trait]
pub trait TraceEncoder: Send + Sync {
    /// Encode a single trace text
    async fn encode_text(&self, text: &str) -> EncoderResult<FeatureVector>;

    /// Encode a batch of traces
    ///
    /// Default implementation calls `encode_text` sequentially; strategies
    /// that benefit from joint context should override it.
    async fn encode(&self, traces: &[Trace]) -> EncoderResult<Vec<FeatureVector>> {
        let mut results = Vec::with_capacity(traces.len());
        for trace in traces {
            results.push(self.encode_text(trace.text()).await?);
        }
        Ok(results)
    }

    /// Returns the dimensionality of produced vectors
    fn dimensions(&self) -> usize;
}

fn norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Cosine of the angle between `a` and `b`, in [-1, 1].
///
/// Zero when either vector is all zeros.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    let denominator = norm(a) * norm(b);
    if denominator == 0.0 {
        return 0.0;
    }
    a.iter().zip(b).map(|(x, y)| x * y).sum::<f32>() / denominator
}

/// Scale `v` to unit length in place. Zero vectors are left unchanged.
pub fn l2_normalize(v: &mut [f32]) {
    let n = norm(v);
    if n > 0.0 {
        v.iter_mut().for_each(|x| *x /= n);
    }
}

/// Whitespace tokens of a trace text
pub(crate) fn tokenize(text: &str) -> EncoderResult<Vec<&str>> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    if tokens.is_empty() {
        return Err(EncoderError::EmptyText);
    }
    Ok(tokens)
}

/// Stable bucket index for a token
pub(crate) fn bucket(token: &str, dimensions: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    token.hash(&mut hasher);
    (hasher.finish() % dimensions as u64) as usize
}

pub(crate) fn ensure_dimensions(dimensions: usize) -> EncoderResult<()> {
    if dimensions == 0 {
        return Err(EncoderError::InvalidDimensions(dimensions));
    }
    Ok(())
}
