//! Pretrained sentence-transformer backend powered by fastembed.
//!
//! fastembed runs the ONNX model, applies attention-masked mean pooling and
//! normalizes. The encoder re-normalizes every output so the unit-norm
//! guarantee holds no matter what the upstream pipeline does.

use std::path::PathBuf;
use std::sync::Mutex;

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

use super::BatchEncoder;
use super::pooling::l2_normalize;
use crate::vector::{VectorDimension, VectorError};

/// FastEmbed implementation of [`BatchEncoder`].
///
/// The model is wrapped in a mutex because fastembed sessions need
/// exclusive access per call; parallel shard workers serialize here.
pub struct FastEmbedEncoder {
    model: Mutex<TextEmbedding>,
    dimension: VectorDimension,
    model_name: String,
}

impl std::fmt::Debug for FastEmbedEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastEmbedEncoder")
            .field("model", &"<TextEmbedding>")
            .field("dimension", &self.dimension)
            .field("model_name", &self.model_name)
            .finish()
    }
}

impl FastEmbedEncoder {
    /// Loads `model`, downloading it into `cache_dir` on first use.
    ///
    /// # Errors
    /// Returns an error if the model fails to initialize or download.
    pub fn new(
        model: EmbeddingModel,
        max_tokens: usize,
        cache_dir: Option<PathBuf>,
        show_download_progress: bool,
    ) -> Result<Self, VectorError> {
        let model_name = model_to_string(&model);

        let mut options = InitOptions::new(model)
            .with_max_length(max_tokens)
            .with_show_download_progress(show_download_progress);
        if let Some(dir) = cache_dir {
            options = options.with_cache_dir(dir);
        }

        let mut text_model =
            TextEmbedding::try_new(options).map_err(|e| VectorError::ModelInit(e.to_string()))?;

        // Get dimensions by generating a probe embedding
        let probe = text_model
            .embed(vec!["dimension probe"], None)
            .map_err(|e| VectorError::EmbeddingFailed(e.to_string()))?;
        let dim = probe.first().map(Vec::len).unwrap_or(0);
        let dimension = VectorDimension::new(dim)?;

        Ok(Self {
            model: Mutex::new(text_model),
            dimension,
            model_name,
        })
    }
}

impl BatchEncoder for FastEmbedEncoder {
    fn encode_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, VectorError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        // fastembed expects owned strings
        let text_strings: Vec<String> = texts.iter().map(|&s| s.to_string()).collect();

        // One upstream batch per call keeps the batch atomic
        let mut embeddings = self
            .model
            .lock()
            .map_err(|_| {
                VectorError::EmbeddingFailed(
                    "Failed to acquire embedding model lock - model may be poisoned".to_string(),
                )
            })?
            .embed(text_strings, Some(texts.len()))
            .map_err(|e| VectorError::EmbeddingFailed(e.to_string()))?;

        if embeddings.len() != texts.len() {
            return Err(VectorError::OutputCount {
                expected: texts.len(),
                actual: embeddings.len(),
            });
        }

        for embedding in &mut embeddings {
            self.dimension.validate_vector(embedding)?;
            l2_normalize(embedding);
        }

        Ok(embeddings)
    }

    fn dimension(&self) -> VectorDimension {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

/// Parses a configured model name into a fastembed model.
pub fn parse_embedding_model(name: &str) -> Result<EmbeddingModel, VectorError> {
    match name {
        "AllMiniLML6V2" => Ok(EmbeddingModel::AllMiniLML6V2),
        "AllMiniLML12V2" => Ok(EmbeddingModel::AllMiniLML12V2),
        "BGESmallENV15" => Ok(EmbeddingModel::BGESmallENV15),
        "BGEBaseENV15" => Ok(EmbeddingModel::BGEBaseENV15),
        "MultilingualE5Small" => Ok(EmbeddingModel::MultilingualE5Small),
        other => Err(VectorError::UnknownModel(other.to_string())),
    }
}

/// Canonical configuration name of a fastembed model.
#[must_use]
pub fn model_to_string(model: &EmbeddingModel) -> String {
    match model {
        EmbeddingModel::AllMiniLML6V2 => "AllMiniLML6V2".to_string(),
        EmbeddingModel::AllMiniLML12V2 => "AllMiniLML12V2".to_string(),
        EmbeddingModel::BGESmallENV15 => "BGESmallENV15".to_string(),
        EmbeddingModel::BGEBaseENV15 => "BGEBaseENV15".to_string(),
        EmbeddingModel::MultilingualE5Small => "MultilingualE5Small".to_string(),
        other => format!("{other:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::l2_norm;

    #[test]
    fn test_parse_model_names() {
        for name in [
            "AllMiniLML6V2",
            "AllMiniLML12V2",
            "BGESmallENV15",
            "BGEBaseENV15",
            "MultilingualE5Small",
        ] {
            let model = parse_embedding_model(name).unwrap();
            assert_eq!(model_to_string(&model), name);
        }

        assert!(matches!(
            parse_embedding_model("gpt-embeddings"),
            Err(VectorError::UnknownModel(_))
        ));
    }

    #[test]
    #[ignore = "Downloads 86MB model - run with --ignored for model tests"]
    fn test_fastembed_outputs_are_normalized() {
        let encoder =
            FastEmbedEncoder::new(EmbeddingModel::AllMiniLML6V2, 512, None, false).unwrap();
        assert_eq!(encoder.dimension().get(), 384);

        let vectors = encoder
            .encode_batch(&["Parse JSON data from a string", "cats"])
            .unwrap();
        assert_eq!(vectors.len(), 2);
        for v in &vectors {
            assert!((l2_norm(v) - 1.0).abs() < 1e-4);
        }
    }
}
