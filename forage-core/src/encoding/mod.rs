//! Trace encoding
//!
//! Turns trace text into fixed-length feature vectors for clustering.
//! Strategies are selected through [`EncoderConfig`] and built with
//! [`build_encoder`].

mod bag;
mod encoder;
mod ngram;
mod projection;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub use bag::BagOfProgramsEncoder;
pub use encoder::{
    EncoderError, EncoderResult, TraceEncoder, cosine_similarity, l2_normalize,
};
pub use ngram::HashedNgramEncoder;
pub use projection::RandomProjectionEncoder;

/// Which encoder strategy to build
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncoderKind {
    BagOfPrograms,
    #[default]
    HashedNgram,
    RandomProjection,
}

/// Configuration for trace encoding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    pub kind: EncoderKind,
    /// Output vector length
    pub dimensions: usize,
    /// Longest n-gram hashed by the n-gram encoder
    pub max_ngram: usize,
    /// Width of the count vector fed to the projection encoder
    pub input_dimensions: usize,
    /// Seed for the projection matrix
    pub seed: u64,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            kind: EncoderKind::default(),
            dimensions: 64,
            max_ngram: 2,
            input_dimensions: 512,
            seed: 0,
        }
    }
}

/// Build the configured encoder
pub fn build_encoder(config: &EncoderConfig) -> EncoderResult<Arc<dyn TraceEncoder>> {
    Ok(match config.kind {
        EncoderKind::BagOfPrograms => Arc::new(BagOfProgramsEncoder::new(config.dimensions)?),
        EncoderKind::HashedNgram => {
            Arc::new(HashedNgramEncoder::new(config.dimensions, config.max_ngram)?)
        }
        EncoderKind::RandomProjection => Arc::new(RandomProjectionEncoder::new(
            config.input_dimensions,
            config.dimensions,
            config.seed,
        )?),
    })
}
