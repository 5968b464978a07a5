//! Batch encoder built from a tokenizer, a token model and mean pooling.

use super::pooling::{l2_normalize, masked_mean_pool};
use super::tokenizer::HashingTokenizer;
use super::{BatchEncoder, TokenModel};
use crate::vector::{VectorDimension, VectorError};

/// Tokenize, run the token model, pool over the attention mask, normalize.
///
/// Padding never contributes to a row, so a text's vector does not depend
/// on which other texts share its batch.
#[derive(Debug)]
pub struct PooledEncoder<M> {
    tokenizer: HashingTokenizer,
    model: M,
    name: String,
}

impl<M: TokenModel> PooledEncoder<M> {
    pub fn new(tokenizer: HashingTokenizer, model: M, name: impl Into<String>) -> Self {
        Self {
            tokenizer,
            model,
            name: name.into(),
        }
    }
}

impl<M: TokenModel> BatchEncoder for PooledEncoder<M> {
    fn encode_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, VectorError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let batch = self.tokenizer.encode_batch(texts);
        let hidden = self.model.forward(&batch)?;

        if hidden.len() != texts.len() {
            return Err(VectorError::OutputCount {
                expected: texts.len(),
                actual: hidden.len(),
            });
        }

        let dimension = self.model.hidden_size();
        hidden
            .iter()
            .zip(&batch.attention_mask)
            .map(|(tokens, mask)| {
                let mut pooled = masked_mean_pool(tokens, mask, dimension)?;
                l2_normalize(&mut pooled);
                Ok(pooled)
            })
            .collect()
    }

    fn dimension(&self) -> VectorDimension {
        self.model.hidden_size()
    }

    fn model_name(&self) -> &str {
        &self.name
    }
}
