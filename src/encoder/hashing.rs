//! Deterministic offline token model.
//!
//! Each token id owns a fixed pseudo-random hidden state seeded from the id,
//! so identical words always contribute identical vectors. Paired with the
//! hashing tokenizer and masked mean pooling this gives a bag-of-words
//! embedding that needs no model download. Good enough for tests, smoke
//! runs and air-gapped machines; not a substitute for a trained model.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::TokenModel;
use super::tokenizer::TokenBatch;
use crate::vector::{VectorDimension, VectorError};

/// Default seed mixed into every token state.
pub const DEFAULT_HASHING_SEED: u64 = 0x5EED_CAFE_F00D_D00D;

/// Token model that maps every id to a seeded random vector in `[-1, 1)`.
#[derive(Debug, Clone)]
pub struct HashingTokenModel {
    dimension: VectorDimension,
    seed: u64,
}

impl HashingTokenModel {
    #[must_use]
    pub fn new(dimension: VectorDimension) -> Self {
        Self::with_seed(dimension, DEFAULT_HASHING_SEED)
    }

    #[must_use]
    pub fn with_seed(dimension: VectorDimension, seed: u64) -> Self {
        Self { dimension, seed }
    }

    /// Hidden state for a single token id.
    #[must_use]
    pub fn token_state(&self, token_id: u32) -> Vec<f32> {
        let mixed = self.seed ^ u64::from(token_id).wrapping_mul(0x9E37_79B9_7F4A_7C15);
        let mut rng = StdRng::seed_from_u64(mixed);
        (0..self.dimension.get())
            .map(|_| rng.random_range(-1.0f32..1.0))
            .collect()
    }
}

impl TokenModel for HashingTokenModel {
    fn hidden_size(&self) -> VectorDimension {
        self.dimension
    }

    fn forward(&self, batch: &TokenBatch) -> Result<Vec<Vec<Vec<f32>>>, VectorError> {
        Ok(batch
            .input_ids
            .iter()
            .map(|row| row.iter().map(|&id| self.token_state(id)).collect())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::tokenizer::{DEFAULT_VOCAB_SIZE, HashingTokenizer};

    #[test]
    fn test_token_state_is_deterministic() {
        let model = HashingTokenModel::new(VectorDimension::new(16).unwrap());
        assert_eq!(model.token_state(42), model.token_state(42));
        assert_ne!(model.token_state(42), model.token_state(43));
        assert!(model.token_state(7).iter().all(|v| (-1.0..1.0).contains(v)));
    }

    #[test]
    fn test_forward_shape() {
        let model = HashingTokenModel::new(VectorDimension::new(8).unwrap());
        let tokenizer = HashingTokenizer::new(DEFAULT_VOCAB_SIZE, 512).unwrap();
        let batch = tokenizer.encode_batch(&["alpha beta", "gamma"]);

        let hidden = model.forward(&batch).unwrap();
        assert_eq!(hidden.len(), 2);
        assert_eq!(hidden[0].len(), batch.seq_len);
        assert_eq!(hidden[1].len(), batch.seq_len);
        assert!(hidden[0].iter().all(|state| state.len() == 8));
    }
}
