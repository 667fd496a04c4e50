//! Seeded random-projection encoder

use async_trait::async_trait;
use ndarray::{Array1, Array2};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};

use crate::types::FeatureVector;

use super::bag::BagOfProgramsEncoder;
use super::encoder::{EncoderError, EncoderResult, TraceEncoder, ensure_dimensions, l2_normalize};

/// Projects wide bag-of-programs counts into a dense low-dimensional space
///
/// The Gaussian projection matrix is drawn once from `seed` at construction,
/// so two encoders built with the same seed and sizes produce identical
/// vectors.
#[derive(Debug, Clone)]
pub struct RandomProjectionEncoder {
    bag: BagOfProgramsEncoder,
    projection: Array2<f32>,
    seed: u64,
}

impl RandomProjectionEncoder {
    pub fn new(input_dimensions: usize, output_dimensions: usize, seed: u64) -> EncoderResult<Self> {
        ensure_dimensions(output_dimensions)?;
        let bag = BagOfProgramsEncoder::new(input_dimensions)?;

        let std_dev = 1.0 / (output_dimensions as f32).sqrt();
        let normal =
            Normal::new(0.0f32, std_dev).map_err(|e| EncoderError::Backend(e.to_string()))?;
        let mut rng = StdRng::seed_from_u64(seed);
        let projection =
            Array2::from_shape_fn((output_dimensions, input_dimensions), |_| {
                normal.sample(&mut rng)
            });

        Ok(Self {
            bag,
            projection,
            seed,
        })
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }
}

#[async_trait]
impl TraceEncoder for RandomProjectionEncoder {
    async fn encode_text(&self, text: &str) -> EncoderResult<FeatureVector> {
        let counts = Array1::from(self.bag.counts(text)?);
        let mut vector = self.projection.dot(&counts).to_vec();
        l2_normalize(&mut vector);
        Ok(vector)
    }

    fn dimensions(&self) -> usize {
        self.projection.nrows()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_same_seed_same_vectors() {
        let a = RandomProjectionEncoder::new(128, 16, 7).unwrap();
        let b = RandomProjectionEncoder::new(128, 16, 7).unwrap();
        let text = "open door walk east";
        assert_eq!(
            a.encode_text(text).await.unwrap(),
            b.encode_text(text).await.unwrap()
        );
    }

    #[tokio::test]
    async fn test_different_seed_different_vectors() {
        let a = RandomProjectionEncoder::new(128, 16, 1).unwrap();
        let b = RandomProjectionEncoder::new(128, 16, 2).unwrap();
        let text = "open door walk east";
        assert_ne!(
            a.encode_text(text).await.unwrap(),
            b.encode_text(text).await.unwrap()
        );
    }

    #[tokio::test]
    async fn test_output_dimensions() {
        let encoder = RandomProjectionEncoder::new(64, 12, 0).unwrap();
        assert_eq!(encoder.dimensions(), 12);
        assert_eq!(encoder.encode_text("a b").await.unwrap().len(), 12);
    }

    #[test]
    fn test_zero_output_rejected() {
        assert!(matches!(
            RandomProjectionEncoder::new(64, 0, 0),
            Err(EncoderError::InvalidDimensions(0))
        ));
    }
}
