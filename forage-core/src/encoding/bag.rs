//! Bag-of-programs encoder

use async_trait::async_trait;

use crate::types::FeatureVector;

use super::encoder::{
    EncoderResult, TraceEncoder, bucket, ensure_dimensions, l2_normalize, tokenize,
};

/// Counts program tokens into hashed buckets
///
/// Order-insensitive: two traces running the same programs the same number
/// of times encode identically.
#[derive(Debug, Clone)]
pub struct BagOfProgramsEncoder {
    dimensions: usize,
}

impl BagOfProgramsEncoder {
    pub fn new(dimensions: usize) -> EncoderResult<Self> {
        ensure_dimensions(dimensions)?;
        Ok(Self { dimensions })
    }

    /// Unnormalized token counts. Shared with the projection encoder.
    pub(crate) fn counts(&self, text: &str) -> EncoderResult<FeatureVector> {
        let mut counts = vec![0.0f32; self.dimensions];
        for token in tokenize(text)? {
            counts[bucket(token, self.dimensions)] += 1.0;
        }
        Ok(counts)
    }
}

#[async_trait]
impl TraceEncoder for BagOfProgramsEncoder {
    async fn encode_text(&self, text: &str) -> EncoderResult<FeatureVector> {
        let mut vector = self.counts(text)?;
        l2_normalize(&mut vector);
        Ok(vector)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
