//! Batch encoders turning text into unit-length vectors.
//!
//! Every backend honors the same contract: up to `B` strings in, one
//! L2-normalized vector of dimension `D` out per string, in input order.

pub mod fastembed;
pub mod hashing;
pub mod pooled;
pub mod pooling;
pub mod tokenizer;

pub use fastembed::{FastEmbedEncoder, model_to_string, parse_embedding_model};
pub use hashing::HashingTokenModel;
pub use pooled::PooledEncoder;
pub use pooling::{POOLING_EPSILON, l2_normalize, masked_mean_pool};
pub use tokenizer::{DEFAULT_VOCAB_SIZE, HashingTokenizer, TokenBatch};

use crate::config::{EncoderBackend, EncoderConfig};
use crate::vector::{VectorDimension, VectorError};

/// Default maximum sequence length, special tokens included.
pub const DEFAULT_MAX_TOKENS: usize = 512;

/// Maps a batch of texts to normalized vectors.
///
/// Implementations keep no per-call state beyond their loaded weights, so a
/// single instance is shared by reference across shards and workers.
pub trait BatchEncoder: Send + Sync {
    /// Encodes `texts` into one vector per input, in order.
    ///
    /// An empty slice yields an empty result.
    fn encode_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, VectorError>;

    /// Dimension of every produced vector.
    fn dimension(&self) -> VectorDimension;

    /// Name recorded in index metadata.
    fn model_name(&self) -> &str;

    /// Encodes a single text as a batch of one.
    fn encode_one(&self, text: &str) -> Result<Vec<f32>, VectorError> {
        self.encode_batch(&[text])?
            .into_iter()
            .next()
            .ok_or(VectorError::OutputCount {
                expected: 1,
                actual: 0,
            })
    }
}

/// Produces one hidden state per token position.
///
/// This is the black-box model seam: output shape is
/// `[batch][seq_len][hidden_size]`, padding positions included.
pub trait TokenModel: Send + Sync {
    fn hidden_size(&self) -> VectorDimension;

    fn forward(&self, batch: &TokenBatch) -> Result<Vec<Vec<Vec<f32>>>, VectorError>;
}

/// Offline bag-of-words encoder.
pub type HashingEncoder = PooledEncoder<HashingTokenModel>;

/// Name recorded for the hashing backend at a given dimension.
#[must_use]
pub fn hashing_model_name(dimension: VectorDimension) -> String {
    format!("hashing-{dimension}")
}

/// Builds the hashing encoder with the default vocabulary and seed.
pub fn hashing_encoder(
    dimension: VectorDimension,
    max_tokens: usize,
) -> Result<HashingEncoder, VectorError> {
    let tokenizer = HashingTokenizer::new(DEFAULT_VOCAB_SIZE, max_tokens)?;
    Ok(PooledEncoder::new(
        tokenizer,
        HashingTokenModel::new(dimension),
        hashing_model_name(dimension),
    ))
}

/// Name the configured encoder reports, without loading any weights.
pub fn configured_model_name(config: &EncoderConfig) -> Result<String, VectorError> {
    match config.backend {
        EncoderBackend::Hashing => Ok(hashing_model_name(VectorDimension::new(
            config.dimension,
        )?)),
        EncoderBackend::Fastembed => Ok(model_to_string(&parse_embedding_model(&config.model)?)),
    }
}

/// Constructs the configured encoder.
///
/// # Errors
/// Returns an error for an unknown model, an invalid dimension, or a model
/// that fails to load.
pub fn create_encoder(config: &EncoderConfig) -> Result<Box<dyn BatchEncoder>, VectorError> {
    match config.backend {
        EncoderBackend::Hashing => {
            let dimension = VectorDimension::new(config.dimension)?;
            Ok(Box::new(hashing_encoder(dimension, config.max_tokens)?))
        }
        EncoderBackend::Fastembed => {
            let model = parse_embedding_model(&config.model)?;
            tracing::info!(model = %config.model, "loading embedding model");
            let encoder = FastEmbedEncoder::new(
                model,
                config.max_tokens,
                config.cache_dir.clone(),
                config.show_download_progress,
            )?;
            Ok(Box::new(encoder))
        }
    }
}
