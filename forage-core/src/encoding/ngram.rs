//! Hashed n-gram encoder

use async_trait::async_trait;

use crate::types::FeatureVector;

use super::encoder::{
    EncoderResult, TraceEncoder, bucket, ensure_dimensions, l2_normalize, tokenize,
};

const NGRAM_JOINER: &str = "\u{1f}";

/// Hashes token unigrams and contiguous n-grams into buckets
///
/// Captures local ordering of programs, unlike [`BagOfProgramsEncoder`](super::BagOfProgramsEncoder).
#[derive(Debug, Clone)]
pub struct HashedNgramEncoder {
    dimensions: usize,
    max_n: usize,
}

impl HashedNgramEncoder {
    /// `max_n` is clamped to at least 1 (unigrams only).
    pub fn new(dimensions: usize, max_n: usize) -> EncoderResult<Self> {
        ensure_dimensions(dimensions)?;
        Ok(Self {
            dimensions,
            max_n: max_n.max(1),
        })
    }
}

#[async_trait]
impl TraceEncoder for HashedNgramEncoder {
    async fn encode_text(&self, text: &str) -> EncoderResult<FeatureVector> {
        let tokens = tokenize(text)?;
        let mut vector = vec![0.0f32; self.dimensions];

        for n in 1..=self.max_n.min(tokens.len()) {
            for window in tokens.windows(n) {
                let gram = window.join(NGRAM_JOINER);
                vector[bucket(&gram, self.dimensions)] += 1.0;
            }
        }

        l2_normalize(&mut vector);
        Ok(vector)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
