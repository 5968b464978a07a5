//! Metadata sidecar for the merged corpus index.
//!
//! Records which encoder produced the vectors so that queries can detect a
//! mismatched configuration. It lives in its own file so the ids and vector
//! files stay byte-identical across merges of the same checkpoints.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ErrorContext, PipelineError, PipelineResult};
use crate::fsops::write_atomic;

/// Unix timestamp in seconds.
pub fn get_utc_timestamp() -> u64 {
    Utc::now().timestamp() as u64
}

/// Metadata for a merged index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexMetadata {
    /// Name of the encoder that produced the vectors
    pub model_name: String,

    /// Dimension of embeddings
    pub dimension: usize,

    /// Number of documents in the index
    pub document_count: usize,

    /// Number of shard checkpoints merged
    pub shard_count: usize,

    /// Unix timestamp when created
    pub created_at: u64,

    /// Version of the metadata format
    pub version: u32,
}

impl IndexMetadata {
    /// Current metadata version
    pub const CURRENT_VERSION: u32 = 1;

    /// Create new metadata with current timestamp
    pub fn new(
        model_name: impl Into<String>,
        dimension: usize,
        document_count: usize,
        shard_count: usize,
    ) -> Self {
        Self {
            model_name: model_name.into(),
            dimension,
            document_count,
            shard_count,
            created_at: get_utc_timestamp(),
            version: Self::CURRENT_VERSION,
        }
    }

    /// Creation time for display.
    #[must_use]
    pub fn created_at_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(i64::try_from(self.created_at).ok()?, 0)
    }

    /// Save metadata to a JSON file
    pub fn save(&self, path: &Path) -> PipelineResult<()> {
        let json = serde_json::to_vec_pretty(self)
            .map_err(|e| PipelineError::General(format!("Failed to serialize metadata: {e}")))?;
        write_atomic(path, &json).write_context(path)
    }

    /// Load metadata from a JSON file
    pub fn load(path: &Path) -> PipelineResult<Self> {
        let json = std::fs::read_to_string(path).read_context(path)?;

        let metadata: Self =
            serde_json::from_str(&json).map_err(|e| PipelineError::InvalidCheckpoint {
                path: path.to_path_buf(),
                reason: format!("Failed to parse metadata: {e}"),
            })?;

        // Check version compatibility
        if metadata.version > Self::CURRENT_VERSION {
            return Err(PipelineError::InvalidCheckpoint {
                path: path.to_path_buf(),
                reason: format!(
                    "Metadata version {} is newer than supported version {}",
                    metadata.version,
                    Self::CURRENT_VERSION
                ),
            });
        }

        Ok(metadata)
    }
}
