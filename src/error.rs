//! Error types for the embedding pipeline
//!
//! This module provides structured error types using thiserror. Every fatal
//! build error names the shard it happened in, and every variant carries a
//! stable status code plus recovery suggestions for the CLI.

use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::vector::{VectorError, VectorStorageError};

/// Main error type for build, merge and query operations
#[derive(Error, Debug)]
pub enum PipelineError {
    /// File system errors
    #[error("Failed to read '{path}': {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write '{path}': {source}")]
    FileWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Encoder errors
    #[error("Encoder failed: {0}")]
    Encoder(#[from] VectorError),

    /// Binary matrix errors
    #[error("Vector file '{path}' is unusable: {source}")]
    Storage {
        path: PathBuf,
        source: VectorStorageError,
    },

    /// A shard failed during the build. Earlier checkpoints are untouched.
    #[error(
        "Shard '{shard}' failed: {source}\nCompleted checkpoints remain valid; rerun 'shardvec build' to resume from this shard"
    )]
    ShardFailed {
        shard: String,
        source: Box<PipelineError>,
    },

    /// Merge integrity errors. Nothing is written when these occur.
    #[error(
        "Checkpoint for shard '{shard}' failed integrity check: {reason}\nOther completed checkpoints remain valid and are reused by the next build"
    )]
    Integrity { shard: String, reason: String },

    #[error(
        "Duplicate document id '{id}' found in shard '{first_shard}' and shard '{second_shard}'\nCompleted checkpoints remain valid and are reused by the next build"
    )]
    DuplicateId {
        id: String,
        first_shard: String,
        second_shard: String,
    },

    /// Checkpoint naming errors
    #[error("Cannot derive a shard key from '{path}': {reason}")]
    InvalidShardPath { path: PathBuf, reason: String },

    #[error("Invalid checkpoint file '{path}': {reason}")]
    InvalidCheckpoint { path: PathBuf, reason: String },

    /// Query errors
    #[error("Dimension mismatch in {context}: expected {expected}, got {actual}")]
    DimensionMismatch {
        expected: usize,
        actual: usize,
        context: String,
    },

    #[error("No merged index found at '{path}'")]
    IndexNotFound { path: PathBuf },

    /// Configuration errors
    #[error("Invalid configuration: {reason}")]
    ConfigError { reason: String },

    /// The build was stopped by a signal between shards.
    #[error("Build interrupted after {completed} shard(s); {remaining} shard(s) still pending")]
    Interrupted { completed: usize, remaining: usize },

    /// General errors for cases where we need to preserve existing behavior
    #[error("{0}")]
    General(String),
}

impl PipelineError {
    /// Get a stable status code for this error type.
    ///
    /// Returns a string identifier that can be used in JSON output
    /// for programmatic error handling.
    pub fn status_code(&self) -> String {
        match self {
            Self::FileRead { .. } => "FILE_READ_ERROR",
            Self::FileWrite { .. } => "FILE_WRITE_ERROR",
            Self::Encoder(_) => "ENCODER_ERROR",
            Self::Storage { .. } => "STORAGE_ERROR",
            Self::ShardFailed { .. } => "SHARD_FAILED",
            Self::Integrity { .. } => "INTEGRITY_ERROR",
            Self::DuplicateId { .. } => "DUPLICATE_ID",
            Self::InvalidShardPath { .. } => "INVALID_SHARD_PATH",
            Self::InvalidCheckpoint { .. } => "INVALID_CHECKPOINT",
            Self::DimensionMismatch { .. } => "DIMENSION_MISMATCH",
            Self::IndexNotFound { .. } => "INDEX_NOT_FOUND",
            Self::ConfigError { .. } => "CONFIG_ERROR",
            Self::Interrupted { .. } => "INTERRUPTED",
            Self::General(_) => "GENERAL_ERROR",
        }
        .to_string()
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            Self::ShardFailed { source, .. } => {
                let mut suggestions = vec![
                    "Completed shard checkpoints are kept; rerun 'shardvec build' to resume",
                ];
                suggestions.extend(source.recovery_suggestions());
                suggestions
            }
            Self::Encoder(_) => vec![
                "Check that the embedding model downloaded completely",
                "Use encoder.backend = \"hashing\" to run without a model",
            ],
            Self::Integrity { .. } | Self::InvalidCheckpoint { .. } | Self::Storage { .. } => {
                vec![
                    "Delete the named shard's .done marker and rerun 'shardvec build' to rebuild it",
                    "Check for disk errors or filesystem corruption",
                ]
            }
            Self::DuplicateId { .. } => vec![
                "Document ids must be unique across the whole corpus",
                "Remove or rename the duplicate record, delete that shard's .done marker and rebuild",
            ],
            Self::DimensionMismatch { .. } => vec![
                "Build and query with the same encoder configuration",
                "Delete the checkpoint directory and rebuild if the encoder changed",
            ],
            Self::IndexNotFound { .. } => {
                vec!["Run 'shardvec build' and then 'shardvec merge' to create the index"]
            }
            Self::ConfigError { .. } => vec![
                "Run 'shardvec config' to inspect the effective settings",
                "Run 'shardvec init --force' to regenerate the settings file",
            ],
            Self::Interrupted { .. } => {
                vec!["Rerun 'shardvec build' to process the remaining shards"]
            }
            Self::FileRead { .. } => vec![
                "Check that the file exists and you have read permissions",
                "Ensure the file is not locked by another process",
            ],
            Self::FileWrite { .. } => vec![
                "Check disk space and permissions in the output directory",
            ],
            _ => vec![],
        }
    }

    /// Wraps an error raised while processing `shard`.
    pub fn in_shard(self, shard: impl Into<String>) -> Self {
        match self {
            already @ Self::ShardFailed { .. } => already,
            other => Self::ShardFailed {
                shard: shard.into(),
                source: Box::new(other),
            },
        }
    }

    /// Name of the shard this error is attributed to, if any.
    #[must_use]
    pub fn shard(&self) -> Option<&str> {
        match self {
            Self::ShardFailed { shard, .. } | Self::Integrity { shard, .. } => Some(shard.as_str()),
            _ => None,
        }
    }
}

/// Result type alias for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Helper trait for attaching paths to I/O errors
pub trait ErrorContext<T> {
    /// Attribute a failed read to `path`
    fn read_context(self, path: &Path) -> PipelineResult<T>;

    /// Attribute a failed write to `path`
    fn write_context(self, path: &Path) -> PipelineResult<T>;
}

impl<T> ErrorContext<T> for std::io::Result<T> {
    fn read_context(self, path: &Path) -> PipelineResult<T> {
        self.map_err(|source| PipelineError::FileRead {
            path: path.to_path_buf(),
            source,
        })
    }

    fn write_context(self, path: &Path) -> PipelineResult<T> {
        self.map_err(|source| PipelineError::FileWrite {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shard_failure_message_mentions_resume() {
        let error = PipelineError::Encoder(VectorError::EmbeddingFailed("boom".to_string()))
            .in_shard("part-00.jsonl");

        let message = error.to_string();
        assert!(message.contains("part-00.jsonl"));
        assert!(message.contains("Completed checkpoints remain valid"));
        assert_eq!(error.status_code(), "SHARD_FAILED");
        assert_eq!(error.shard(), Some("part-00.jsonl"));
    }

    #[test]
    fn test_in_shard_does_not_double_wrap() {
        let error = PipelineError::General("x".to_string())
            .in_shard("a")
            .in_shard("b");
        assert_eq!(error.shard(), Some("a"));
    }

    #[test]
    fn test_recovery_suggestions_include_inner_error() {
        let error = PipelineError::Encoder(VectorError::ModelInit("offline".to_string()))
            .in_shard("s");
        let suggestions = error.recovery_suggestions();
        assert!(suggestions.len() >= 2);
        assert!(suggestions.iter().any(|s| s.contains("hashing")));
    }

    #[test]
    fn test_merge_errors_say_checkpoints_survive() {
        let integrity = PipelineError::Integrity {
            shard: "a.jsonl".to_string(),
            reason: "2 ids but 1 vector rows".to_string(),
        };
        let duplicate = PipelineError::DuplicateId {
            id: "d1".to_string(),
            first_shard: "a.jsonl".to_string(),
            second_shard: "b.jsonl".to_string(),
        };

        for error in [integrity, duplicate] {
            let message = error.to_string();
            assert!(message.contains("a.jsonl"));
            assert!(message.contains("checkpoints remain valid"));
        }
    }

    #[test]
    fn test_io_context() {
        let result: std::io::Result<()> = Err(std::io::Error::other("disk gone"));
        match result.write_context(Path::new("/tmp/out.vec")) {
            Err(PipelineError::FileWrite { path, .. }) => {
                assert_eq!(path, PathBuf::from("/tmp/out.vec"));
            }
            other => panic!("Expected FileWrite, got {other:?}"),
        }
    }
}
