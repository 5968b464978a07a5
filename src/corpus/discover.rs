//! Recursive shard discovery under the corpus root.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::checkpoint::ShardKey;
use crate::error::{PipelineError, PipelineResult};

/// A shard file found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardSource {
    pub key: ShardKey,
    pub path: PathBuf,
}

/// Walks the corpus root and collects shard files by suffix.
#[derive(Debug, Clone)]
pub struct CorpusScanner {
    root: PathBuf,
    extensions: Vec<String>,
    excluded: Vec<PathBuf>,
}

impl CorpusScanner {
    /// `extensions` are suffixes without the leading dot, e.g. `jsonl.gz`.
    pub fn new(root: impl Into<PathBuf>, extensions: &[String]) -> Self {
        Self {
            root: root.into(),
            extensions: extensions
                .iter()
                .map(|ext| format!(".{}", ext.trim_start_matches('.')))
                .collect(),
            excluded: Vec::new(),
        }
    }

    /// Directories never descended into, such as the checkpoint and index
    /// directories when they live under the corpus root.
    #[must_use]
    pub fn with_excluded<I, P>(mut self, dirs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.excluded.extend(dirs.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Excluded directories that exist under the root, expressed as the
    /// paths the walk will produce for them.
    fn excluded_under_root(&self) -> Vec<PathBuf> {
        let Ok(root) = self.root.canonicalize() else {
            return Vec::new();
        };

        self.excluded
            .iter()
            .filter_map(|dir| dir.canonicalize().ok())
            .filter_map(|dir| {
                dir.strip_prefix(&root)
                    .ok()
                    .map(|relative| self.root.join(relative))
            })
            .collect()
    }

    fn is_shard(&self, file_name: &str) -> bool {
        self.extensions
            .iter()
            .any(|ext| file_name.len() > ext.len() && file_name.ends_with(ext.as_str()))
    }

    /// Every shard under the root, sorted by shard key.
    ///
    /// Non-UTF-8 shard paths are an error naming the path, since they cannot
    /// be given a stable key.
    pub fn discover(&self) -> PipelineResult<Vec<ShardSource>> {
        if !self.root.is_dir() {
            return Err(PipelineError::FileRead {
                path: self.root.clone(),
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "corpus root is not a directory",
                ),
            });
        }

        let excluded = self.excluded_under_root();
        let mut shards = Vec::new();

        let walker = WalkDir::new(&self.root)
            .into_iter()
            .filter_entry(|entry| !excluded.iter().any(|dir| entry.path() == dir));

        for entry in walker {
            let entry = entry.map_err(|e| PipelineError::FileRead {
                path: e
                    .path()
                    .map_or_else(|| self.root.clone(), Path::to_path_buf),
                source: std::io::Error::other(e),
            })?;

            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let file_name = entry.file_name().to_string_lossy();
            if !self.is_shard(&file_name) {
                continue;
            }

            let key = ShardKey::from_path(&self.root, path).map_err(|e| match e {
                PipelineError::InvalidShardPath { path, reason } => PipelineError::FileRead {
                    source: std::io::Error::new(std::io::ErrorKind::InvalidData, reason),
                    path,
                },
                other => other,
            })?;

            shards.push(ShardSource {
                key,
                path: path.to_path_buf(),
            });
        }

        shards.sort_by(|a, b| a.key.cmp(&b.key));
        tracing::debug!(root = %self.root.display(), shards = shards.len(), "discovered shards");
        Ok(shards)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn default_extensions() -> Vec<String> {
        ["jsonl", "json", "jsonl.gz", "json.gz"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    #[test]
    fn test_discover_recursive_and_sorted() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("en/wiki")).unwrap();
        fs::write(root.join("b.jsonl"), "").unwrap();
        fs::write(root.join("a.json"), "").unwrap();
        fs::write(root.join("en/wiki/part-00.jsonl.gz"), "").unwrap();
        fs::write(root.join("README.md"), "").unwrap();
        fs::write(root.join("notes.txt"), "").unwrap();

        let scanner = CorpusScanner::new(root, &default_extensions());
        let shards = scanner.discover().unwrap();
        let keys: Vec<String> = shards.iter().map(|s| s.key.relative_path()).collect();

        assert_eq!(keys, vec!["a.json", "b.jsonl", "en/wiki/part-00.jsonl.gz"]);
        assert_eq!(shards[2].path, root.join("en/wiki/part-00.jsonl.gz"));
    }

    #[test]
    fn test_extension_filter() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.jsonl"), "").unwrap();
        fs::write(temp.path().join("b.json"), "").unwrap();

        let scanner = CorpusScanner::new(temp.path(), &[".jsonl".to_string()]);
        let shards = scanner.discover().unwrap();
        assert_eq!(shards.len(), 1);
        assert_eq!(shards[0].key.relative_path(), "a.jsonl");
    }

    #[test]
    fn test_excluded_dirs_are_not_walked() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join(".shardvec/checkpoints")).unwrap();
        fs::create_dir_all(root.join(".shardvec/index")).unwrap();
        fs::write(root.join("a.jsonl"), "").unwrap();
        fs::write(root.join(".shardvec/checkpoints/a.jsonl.ids.json"), "[]").unwrap();
        fs::write(root.join(".shardvec/index/ids.json"), "[]").unwrap();
        fs::write(root.join(".shardvec/index/metadata.json"), "{}").unwrap();

        let scanner = CorpusScanner::new(root, &default_extensions()).with_excluded([
            root.join(".shardvec/checkpoints"),
            root.join(".shardvec/index"),
            root.join("does-not-exist"),
        ]);
        let keys: Vec<String> = scanner
            .discover()
            .unwrap()
            .iter()
            .map(|s| s.key.relative_path())
            .collect();

        assert_eq!(keys, vec!["a.jsonl"]);
    }

    #[test]
    fn test_excluded_dir_given_relative_to_elsewhere() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("corpus");
        fs::create_dir_all(root.join("ckpt")).unwrap();
        fs::write(root.join("a.jsonl"), "").unwrap();
        fs::write(root.join("ckpt/a.jsonl.ids.json"), "[]").unwrap();

        // Same directory reached through a non-normalized path
        let scanner = CorpusScanner::new(&root, &default_extensions())
            .with_excluded([temp.path().join("corpus/../corpus/ckpt")]);
        assert_eq!(scanner.discover().unwrap().len(), 1);
    }

    #[test]
    fn test_missing_root_is_an_error() {
        let temp = TempDir::new().unwrap();
        let scanner = CorpusScanner::new(temp.path().join("nope"), &default_extensions());
        assert!(matches!(
            scanner.discover(),
            Err(PipelineError::FileRead { .. })
        ));
    }
}
