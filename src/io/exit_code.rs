//! Exit codes for CLI operations following Unix conventions.
//!
//! # Exit Code Semantics
//!
//! - `0`: Success
//! - `1`: General error - unspecified failure
//! - `2`: Blocking error - the artifacts on disk disagree and a rerun alone will not fix it
//! - `3-125`: Specific recoverable errors
//! - `130`: Interrupted by SIGINT, checkpoints written so far are valid

use crate::error::PipelineError;

/// Standard exit codes for CLI operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    /// Operation succeeded (code 0)
    Success = 0,

    /// Unspecified error occurred (code 1)
    GeneralError = 1,

    /// Duplicate ids or a checkpoint that fails integrity checks (code 2)
    BlockingError = 2,

    /// Merged index or input file not found (code 3)
    NotFound = 3,

    /// Encoder failed to load or embed (code 4)
    EncoderError = 4,

    /// File I/O error (code 5)
    IoError = 5,

    /// Configuration error (code 6)
    ConfigError = 6,

    /// Merged index unreadable or inconsistent with the encoder (code 7)
    IndexCorrupted = 7,

    /// Build stopped by Ctrl-C (code 130)
    Interrupted = 130,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> i32 {
        code as i32
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        std::process::ExitCode::from(code as u8)
    }
}

impl ExitCode {
    /// Convert a `PipelineError` to the appropriate exit code.
    ///
    /// A failed shard reports the code of the error that failed it.
    pub fn from_error(error: &PipelineError) -> Self {
        match error {
            PipelineError::ShardFailed { source, .. } => Self::from_error(source),

            PipelineError::Integrity { .. }
            | PipelineError::DuplicateId { .. }
            | PipelineError::InvalidCheckpoint { .. } => ExitCode::BlockingError,

            PipelineError::IndexNotFound { .. } => ExitCode::NotFound,
            PipelineError::FileRead { source, .. }
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                ExitCode::NotFound
            }

            PipelineError::Encoder(_) => ExitCode::EncoderError,
            PipelineError::FileRead { .. } | PipelineError::FileWrite { .. } => ExitCode::IoError,
            PipelineError::ConfigError { .. } | PipelineError::InvalidShardPath { .. } => {
                ExitCode::ConfigError
            }
            PipelineError::Storage { .. } | PipelineError::DimensionMismatch { .. } => {
                ExitCode::IndexCorrupted
            }
            PipelineError::Interrupted { .. } => ExitCode::Interrupted,

            PipelineError::General(_) => ExitCode::GeneralError,
        }
    }

    /// Check if this exit code indicates a blocking error.
    #[must_use]
    pub fn is_blocking(&self) -> bool {
        matches!(self, ExitCode::BlockingError)
    }

    /// Check if this exit code indicates success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, ExitCode::Success)
    }

    /// Get a human-readable description of the exit code.
    pub fn description(&self) -> &str {
        match self {
            ExitCode::Success => "Success",
            ExitCode::GeneralError => "General error",
            ExitCode::BlockingError => "Blocking error - fix the named shard before rerunning",
            ExitCode::NotFound => "Not found",
            ExitCode::EncoderError => "Encoder error",
            ExitCode::IoError => "I/O error",
            ExitCode::ConfigError => "Configuration error",
            ExitCode::IndexCorrupted => "Index corrupted",
            ExitCode::Interrupted => "Interrupted",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_exit_code_values() {
        assert_eq!(ExitCode::Success as u8, 0);
        assert_eq!(ExitCode::GeneralError as u8, 1);
        assert_eq!(ExitCode::BlockingError as u8, 2);
        assert_eq!(ExitCode::NotFound as u8, 3);
        assert_eq!(ExitCode::Interrupted as u8, 130);
    }

    #[test]
    fn test_from_error() {
        let duplicate = PipelineError::DuplicateId {
            id: "d1".to_string(),
            first_shard: "a.jsonl".to_string(),
            second_shard: "b.jsonl".to_string(),
        };
        assert_eq!(ExitCode::from_error(&duplicate), ExitCode::BlockingError);

        let missing = PipelineError::IndexNotFound {
            path: PathBuf::from("index"),
        };
        assert_eq!(ExitCode::from_error(&missing), ExitCode::NotFound);

        let interrupted = PipelineError::Interrupted {
            completed: 2,
            remaining: 3,
        };
        assert_eq!(ExitCode::from_error(&interrupted), ExitCode::Interrupted);
    }

    #[test]
    fn test_shard_failure_uses_inner_code() {
        let inner = PipelineError::FileWrite {
            path: PathBuf::from("ckpt/a.jsonl.vec"),
            source: std::io::Error::other("disk full"),
        };
        let failed = inner.in_shard("a.jsonl");
        assert_eq!(ExitCode::from_error(&failed), ExitCode::IoError);
    }

    #[test]
    fn test_is_success() {
        assert!(ExitCode::Success.is_success());
        assert!(!ExitCode::NotFound.is_success());
        assert!(!ExitCode::GeneralError.is_success());
    }

    #[test]
    fn test_is_blocking() {
        assert!(ExitCode::BlockingError.is_blocking());
        assert!(!ExitCode::Success.is_blocking());
        assert!(!ExitCode::Interrupted.is_blocking());
    }
}
