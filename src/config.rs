//! Configuration module for the embedding pipeline.
//!
//! This module provides a layered configuration system that supports:
//! - Default values
//! - TOML configuration file
//! - Environment variable overrides
//! - CLI argument overrides
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `SV_` and use double underscores
//! to separate nested levels:
//! - `SV_BUILD__BATCH_SIZE=64` sets `build.batch_size`
//! - `SV_ENCODER__BACKEND=hashing` sets `encoder.backend`
//! - `SV_LOGGING__FORMAT=json` sets `logging.format`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::encoder::{DEFAULT_MAX_TOKENS, parse_embedding_model};
use crate::error::{PipelineError, PipelineResult};
use crate::vector::VECTOR_DIMENSION_384;

/// Directory holding the settings file, searched for in ancestors.
pub const CONFIG_DIR: &str = ".shardvec";

/// Settings file name inside [`CONFIG_DIR`].
pub const CONFIG_FILE: &str = "settings.toml";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Workspace root directory (where .shardvec is located)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_root: Option<PathBuf>,

    /// Corpus discovery settings
    #[serde(default)]
    pub corpus: CorpusConfig,

    /// Encoder backend settings
    #[serde(default)]
    pub encoder: EncoderConfig,

    /// Build pipeline settings
    #[serde(default)]
    pub build: BuildConfig,

    /// Merged index location
    #[serde(default)]
    pub index: IndexConfig,

    /// Query settings
    #[serde(default)]
    pub search: SearchConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CorpusConfig {
    /// Root directory scanned recursively for shards
    #[serde(default = "default_corpus_root")]
    pub root: PathBuf,

    /// File name suffixes treated as shards
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

/// Which encoder implementation to construct.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EncoderBackend {
    /// Pretrained sentence-transformer through fastembed
    Fastembed,
    /// Deterministic offline feature hashing
    Hashing,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EncoderConfig {
    #[serde(default = "default_backend")]
    pub backend: EncoderBackend,

    /// Model to use for embeddings (fastembed backend)
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Maximum tokens per input, special tokens included
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    /// Vector dimension (hashing backend)
    #[serde(default = "default_dimension")]
    pub dimension: usize,

    /// Where downloaded models are cached
    #[serde(
        default = "default_model_cache_dir",
        skip_serializing_if = "Option::is_none"
    )]
    pub cache_dir: Option<PathBuf>,

    /// Show a progress bar while the model downloads
    #[serde(default = "default_true")]
    pub show_download_progress: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BuildConfig {
    /// Directory of per-shard checkpoints
    #[serde(default = "default_checkpoint_dir")]
    pub checkpoint_dir: PathBuf,

    /// Documents per encoder call
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Shards processed concurrently; 0 means one per CPU
    #[serde(default = "default_workers")]
    pub workers: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct IndexConfig {
    /// Directory of the merged corpus index
    #[serde(default = "default_index_dir")]
    pub dir: PathBuf,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SearchConfig {
    /// Results returned per query
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Run tag written in the last column of run files
    #[serde(default = "default_run_name")]
    pub run_name: String,
}

/// Log line encoding.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: LogFormat,
}

// Default value functions
fn default_version() -> u32 {
    1
}
fn default_corpus_root() -> PathBuf {
    PathBuf::from("corpus")
}
fn default_extensions() -> Vec<String> {
    ["jsonl", "json", "jsonl.gz", "json.gz"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_backend() -> EncoderBackend {
    EncoderBackend::Fastembed
}
fn default_embedding_model() -> String {
    "AllMiniLML6V2".to_string()
}
fn default_max_tokens() -> usize {
    DEFAULT_MAX_TOKENS
}
fn default_dimension() -> usize {
    VECTOR_DIMENSION_384
}
fn default_model_cache_dir() -> Option<PathBuf> {
    dirs::cache_dir().map(|dir| dir.join("shardvec").join("models"))
}
fn default_true() -> bool {
    true
}
fn default_checkpoint_dir() -> PathBuf {
    PathBuf::from(".shardvec/checkpoints")
}
fn default_batch_size() -> usize {
    32
}
fn default_workers() -> usize {
    1
}
fn default_index_dir() -> PathBuf {
    PathBuf::from(".shardvec/index")
}
fn default_top_k() -> usize {
    1000
}
fn default_run_name() -> String {
    "shardvec".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> LogFormat {
    LogFormat::Text
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            workspace_root: None,
            corpus: CorpusConfig::default(),
            encoder: EncoderConfig::default(),
            build: BuildConfig::default(),
            index: IndexConfig::default(),
            search: SearchConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            root: default_corpus_root(),
            extensions: default_extensions(),
        }
    }
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            model: default_embedding_model(),
            max_tokens: default_max_tokens(),
            dimension: default_dimension(),
            cache_dir: default_model_cache_dir(),
            show_download_progress: true,
        }
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            checkpoint_dir: default_checkpoint_dir(),
            batch_size: default_batch_size(),
            workers: default_workers(),
        }
    }
}

impl BuildConfig {
    /// Worker count with `0` resolved to the number of CPUs.
    #[must_use]
    pub fn effective_workers(&self) -> usize {
        if self.workers == 0 {
            num_cpus::get()
        } else {
            self.workers
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            dir: default_index_dir(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            run_name: default_run_name(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Settings {
    /// Load configuration from all sources
    pub fn load() -> Result<Self, Box<figment::Error>> {
        // Try to find the workspace root by looking for .shardvec directory
        let config_path =
            Self::find_workspace_config().unwrap_or_else(|| Path::new(CONFIG_DIR).join(CONFIG_FILE));

        Self::load_from(config_path).map(|mut settings| {
            // If workspace_root is not set in config, detect it
            if settings.workspace_root.is_none() {
                settings.workspace_root = Self::workspace_root();
            }
            settings
        })
    }

    /// Load configuration from a specific file, then environment overrides
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, Box<figment::Error>> {
        Figment::new()
            // Start with defaults
            .merge(Serialized::defaults(Settings::default()))
            // Layer in config file if it exists
            .merge(Toml::file(path.as_ref()))
            // Double underscore (__) separates nested levels,
            // single underscore (_) remains as is within field names
            .merge(Env::prefixed("SV_").map(|key| {
                key.as_str()
                    .to_lowercase()
                    .replace("__", ".")
                    .into()
            }))
            .extract()
            .map_err(Box::new)
    }

    /// Find the settings file by looking for a .shardvec directory
    /// Searches from current directory up to root
    pub fn find_workspace_config() -> Option<PathBuf> {
        Self::workspace_root().map(|root| root.join(CONFIG_DIR).join(CONFIG_FILE))
    }

    /// Get the workspace root directory (where .shardvec is located)
    pub fn workspace_root() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;

        for ancestor in current.ancestors() {
            let config_dir = ancestor.join(CONFIG_DIR);
            if config_dir.is_dir() {
                return Some(ancestor.to_path_buf());
            }
        }

        None
    }

    /// Resolves a configured path against the workspace root.
    ///
    /// Absolute paths and settings without a workspace root are returned
    /// unchanged.
    #[must_use]
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        match &self.workspace_root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }

    /// Rejects values the pipeline cannot run with.
    pub fn validate(&self) -> PipelineResult<()> {
        let invalid = |reason: String| Err(PipelineError::ConfigError { reason });

        if self.build.batch_size == 0 {
            return invalid("build.batch_size must be at least 1".to_string());
        }
        if self.encoder.max_tokens < 2 {
            return invalid(format!(
                "encoder.max_tokens must be at least 2, got {}",
                self.encoder.max_tokens
            ));
        }
        if self.corpus.extensions.is_empty() {
            return invalid("corpus.extensions must list at least one suffix".to_string());
        }
        if self.search.run_name.is_empty()
            || self.search.run_name.chars().any(char::is_whitespace)
        {
            return invalid(format!(
                "search.run_name must be a non-empty token without whitespace, got '{}'",
                self.search.run_name
            ));
        }
        match self.encoder.backend {
            EncoderBackend::Hashing if self.encoder.dimension == 0 => {
                invalid("encoder.dimension must be at least 1".to_string())
            }
            EncoderBackend::Fastembed => parse_embedding_model(&self.encoder.model)
                .map(|_| ())
                .map_err(|e| PipelineError::ConfigError {
                    reason: e.to_string(),
                }),
            EncoderBackend::Hashing => Ok(()),
        }
    }

    /// Save current configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Box<dyn std::error::Error>> {
        let parent = path.as_ref().parent().ok_or("Invalid path")?;
        std::fs::create_dir_all(parent)?;

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;

        Ok(())
    }

    /// Create a default settings file with helpful comments under `root`
    pub fn init_config_file(
        root: &Path,
        force: bool,
    ) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let config_path = root.join(CONFIG_DIR).join(CONFIG_FILE);

        if !force && config_path.exists() {
            return Err("Configuration file already exists. Use --force to overwrite".into());
        }

        // Create parent directory if needed
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let template = format!(
            r#"# shardvec configuration file

# Version of the configuration schema
version = 1

[corpus]
# Directory scanned recursively for shard files
root = "corpus"

# File name suffixes treated as shards; .gz shards are decompressed on the fly
extensions = ["jsonl", "json", "jsonl.gz", "json.gz"]

[encoder]
# "fastembed" (pretrained model) or "hashing" (offline, deterministic)
backend = "fastembed"

# Model to use for embeddings (fastembed backend)
model = "AllMiniLML6V2"

# Maximum tokens per document, special tokens included
max_tokens = {max_tokens}

# Vector dimension (hashing backend only)
dimension = {dimension}

# Show model download progress
show_download_progress = true

# Where downloaded models are cached
# cache_dir = "/path/to/models"

[build]
# Per-shard checkpoints; delete a shard's .done marker to rebuild it
checkpoint_dir = ".shardvec/checkpoints"

# Documents per encoder call
batch_size = 32

# Shards processed concurrently (0 = one per CPU, {cpus} on this machine)
workers = 1

[index]
# Merged corpus index
dir = ".shardvec/index"

[search]
# Results returned per query
top_k = 1000

# Run tag written in run files
run_name = "shardvec"

[logging]
# Default level; RUST_LOG overrides it
level = "info"

# "text" or "json"
format = "text"
"#,
            max_tokens = DEFAULT_MAX_TOKENS,
            dimension = VECTOR_DIMENSION_384,
            cpus = num_cpus::get()
        );

        std::fs::write(&config_path, template)?;

        Ok(config_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.version, 1);
        assert_eq!(settings.build.batch_size, 32);
        assert_eq!(settings.build.workers, 1);
        assert_eq!(settings.encoder.max_tokens, 512);
        assert_eq!(settings.encoder.backend, EncoderBackend::Fastembed);
        assert_eq!(settings.search.top_k, 1000);
        assert_eq!(settings.index.dir, PathBuf::from(".shardvec/index"));
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_load_from_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("settings.toml");

        let toml_content = r#"
version = 2

[corpus]
root = "/data/msmarco"
extensions = ["jsonl"]

[encoder]
backend = "hashing"
dimension = 64

[build]
batch_size = 128
workers = 4
"#;

        fs::write(&config_path, toml_content).unwrap();

        let settings = Settings::load_from(&config_path).unwrap();
        assert_eq!(settings.version, 2);
        assert_eq!(settings.corpus.root, PathBuf::from("/data/msmarco"));
        assert_eq!(settings.corpus.extensions, vec!["jsonl"]);
        assert_eq!(settings.encoder.backend, EncoderBackend::Hashing);
        assert_eq!(settings.encoder.dimension, 64);
        assert_eq!(settings.build.batch_size, 128);
        assert_eq!(settings.build.effective_workers(), 4);
    }

    #[test]
    fn test_save_settings() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("settings.toml");

        let mut settings = Settings::default();
        settings.build.batch_size = 7;
        settings.logging.format = LogFormat::Json;

        settings.save(&config_path).unwrap();

        let loaded = Settings::load_from(&config_path).unwrap();
        assert_eq!(loaded.build.batch_size, 7);
        assert_eq!(loaded.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_partial_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("settings.toml");

        // Only specify a few settings
        let toml_content = r#"
[search]
top_k = 10
"#;

        fs::write(&config_path, toml_content).unwrap();

        let settings = Settings::load_from(&config_path).unwrap();

        // Modified values
        assert_eq!(settings.search.top_k, 10);

        // Default values should still be present
        assert_eq!(settings.version, 1);
        assert_eq!(settings.encoder.model, "AllMiniLML6V2");
        assert_eq!(settings.corpus.extensions.len(), 4);
    }

    #[test]
    fn test_env_overrides_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("settings.toml");

        fs::write(
            &config_path,
            r#"
[search]
run_name = "from-file"
top_k = 50
"#,
        )
        .unwrap();

        unsafe {
            std::env::set_var("SV_SEARCH__RUN_NAME", "from-env");
        }

        let settings = Settings::load_from(&config_path).unwrap();

        unsafe {
            std::env::remove_var("SV_SEARCH__RUN_NAME");
        }

        // Environment variable should override config file
        assert_eq!(settings.search.run_name, "from-env");
        // Config file value should be used when no env var
        assert_eq!(settings.search.top_k, 50);
    }

    #[test]
    fn test_init_config_file_round_trips() {
        let temp_dir = TempDir::new().unwrap();

        let path = Settings::init_config_file(temp_dir.path(), false).unwrap();
        assert!(path.ends_with(".shardvec/settings.toml"));

        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.build.batch_size, 32);
        assert_eq!(settings.logging.format, LogFormat::Text);

        // Refuses to overwrite without force
        assert!(Settings::init_config_file(temp_dir.path(), false).is_err());
        assert!(Settings::init_config_file(temp_dir.path(), true).is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut settings = Settings::default();
        settings.build.batch_size = 0;
        assert!(matches!(
            settings.validate(),
            Err(PipelineError::ConfigError { .. })
        ));

        let mut settings = Settings::default();
        settings.encoder.backend = EncoderBackend::Hashing;
        settings.encoder.dimension = 0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.encoder.model = "NoSuchModel".to_string();
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.search.run_name = "two words".to_string();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_resolve_path() {
        let mut settings = Settings::default();
        assert_eq!(
            settings.resolve_path(Path::new("corpus")),
            PathBuf::from("corpus")
        );

        settings.workspace_root = Some(PathBuf::from("/work"));
        assert_eq!(
            settings.resolve_path(Path::new("corpus")),
            PathBuf::from("/work/corpus")
        );
        assert_eq!(
            settings.resolve_path(Path::new("/abs/corpus")),
            PathBuf::from("/abs/corpus")
        );
    }
}
