//! On-disk checkpoint directory.
//!
//! For every shard key `K` the store holds `K.ids.json`, `K.vec`,
//! `K.model` (name of the encoder that produced the vectors) and `K.done`.
//! The marker is written last, after the data files are durable, so a shard
//! is either done with complete data or treated as not started.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use super::key::ShardKey;
use crate::error::{ErrorContext, PipelineError, PipelineResult};
use crate::fsops::write_atomic;
use crate::vector::VectorMatrix;

pub const IDS_SUFFIX: &str = ".ids.json";
pub const VECTORS_SUFFIX: &str = ".vec";
pub const MODEL_SUFFIX: &str = ".model";
pub const DONE_SUFFIX: &str = ".done";

/// Sentinel content of a completion marker.
const DONE_CONTENT: &[u8] = b"done";

/// Data of one completed shard.
#[derive(Debug, Clone)]
pub struct ShardCheckpoint {
    pub ids: Vec<String>,
    pub vectors: VectorMatrix,
    pub model_name: String,
}

/// Directory of per-shard checkpoints.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    dir: PathBuf,
}

impl CheckpointStore {
    /// Opens the store, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> PipelineResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).write_context(&dir)?;
        Ok(Self { dir })
    }

    /// Opens an existing store without creating it.
    pub fn open_existing(dir: impl Into<PathBuf>) -> PipelineResult<Self> {
        let dir = dir.into();
        if !dir.is_dir() {
            return Err(PipelineError::FileRead {
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "checkpoint directory does not exist",
                ),
                path: dir,
            });
        }
        Ok(Self { dir })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub fn ids_path(&self, key: &ShardKey) -> PathBuf {
        self.file_path(key, IDS_SUFFIX)
    }

    #[must_use]
    pub fn vectors_path(&self, key: &ShardKey) -> PathBuf {
        self.file_path(key, VECTORS_SUFFIX)
    }

    #[must_use]
    pub fn model_path(&self, key: &ShardKey) -> PathBuf {
        self.file_path(key, MODEL_SUFFIX)
    }

    #[must_use]
    pub fn marker_path(&self, key: &ShardKey) -> PathBuf {
        self.file_path(key, DONE_SUFFIX)
    }

    fn file_path(&self, key: &ShardKey, suffix: &str) -> PathBuf {
        self.dir.join(format!("{}{suffix}", key.as_str()))
    }

    /// A shard is complete exactly when its marker exists.
    #[must_use]
    pub fn is_done(&self, key: &ShardKey) -> bool {
        self.marker_path(key).is_file()
    }

    /// Keys of every completed shard.
    ///
    /// Marker files whose name is not a valid encoding are skipped with a
    /// warning.
    pub fn completed(&self) -> PipelineResult<BTreeSet<ShardKey>> {
        let mut done = BTreeSet::new();

        for entry in fs::read_dir(&self.dir).read_context(&self.dir)? {
            let entry = entry.read_context(&self.dir)?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            let Some(stem) = name.strip_suffix(DONE_SUFFIX) else {
                continue;
            };
            match ShardKey::from_encoded(stem) {
                Some(key) => {
                    done.insert(key);
                }
                None => {
                    tracing::warn!(
                        marker = %entry.path().display(),
                        "ignoring marker with invalid shard key"
                    );
                }
            }
        }

        Ok(done)
    }

    /// Persists a completed shard: ids, vectors and encoder name, then the
    /// marker.
    pub fn write(
        &self,
        key: &ShardKey,
        ids: &[String],
        vectors: &VectorMatrix,
        model_name: &str,
    ) -> PipelineResult<()> {
        if ids.len() != vectors.rows() {
            return Err(PipelineError::Integrity {
                shard: key.to_string(),
                reason: format!(
                    "refusing to checkpoint {} ids with {} vectors",
                    ids.len(),
                    vectors.rows()
                ),
            });
        }

        let ids_path = self.ids_path(key);
        let ids_json = serde_json::to_vec(ids).map_err(|e| {
            PipelineError::General(format!("Failed to serialize ids for shard '{key}': {e}"))
        })?;
        write_atomic(&ids_path, &ids_json).write_context(&ids_path)?;

        let vectors_path = self.vectors_path(key);
        vectors
            .write_to(&vectors_path)
            .map_err(|source| PipelineError::Storage {
                path: vectors_path.clone(),
                source,
            })?;

        let model_path = self.model_path(key);
        write_atomic(&model_path, model_name.as_bytes()).write_context(&model_path)?;

        let marker_path = self.marker_path(key);
        write_atomic(&marker_path, DONE_CONTENT).write_context(&marker_path)?;

        Ok(())
    }

    /// Loads a completed shard.
    pub fn load(&self, key: &ShardKey) -> PipelineResult<ShardCheckpoint> {
        let ids_path = self.ids_path(key);
        let raw = fs::read(&ids_path).read_context(&ids_path)?;
        let ids: Vec<String> =
            serde_json::from_slice(&raw).map_err(|e| PipelineError::InvalidCheckpoint {
                path: ids_path.clone(),
                reason: e.to_string(),
            })?;

        let vectors_path = self.vectors_path(key);
        let vectors =
            VectorMatrix::read_from(&vectors_path).map_err(|source| PipelineError::Storage {
                path: vectors_path.clone(),
                source,
            })?;

        let model_path = self.model_path(key);
        let model_name = fs::read_to_string(&model_path)
            .map_err(|e| PipelineError::InvalidCheckpoint {
                path: model_path.clone(),
                reason: format!("encoder record unreadable: {e}"),
            })?
            .trim()
            .to_string();
        if model_name.is_empty() {
            return Err(PipelineError::InvalidCheckpoint {
                path: model_path,
                reason: "encoder record is empty".to_string(),
            });
        }

        Ok(ShardCheckpoint {
            ids,
            vectors,
            model_name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::VectorDimension;
    use tempfile::TempDir;

    fn matrix(rows: &[[f32; 2]]) -> VectorMatrix {
        VectorMatrix::from_rows(
            VectorDimension::new(2).unwrap(),
            rows.iter().map(|r| r.to_vec()),
        )
        .unwrap()
    }

    #[test]
    fn test_write_then_load() {
        let temp = TempDir::new().unwrap();
        let store = CheckpointStore::open(temp.path().join("ckpt")).unwrap();
        let key = ShardKey::from_relative_path("en/part-00.jsonl").unwrap();

        assert!(!store.is_done(&key));
        let ids = vec!["d1".to_string(), "d2".to_string()];
        store
            .write(&key, &ids, &matrix(&[[1.0, 0.0], [0.0, 1.0]]), "hashing-2")
            .unwrap();

        assert!(store.is_done(&key));
        assert_eq!(fs::read(store.marker_path(&key)).unwrap(), b"done");
        assert!(store.ids_path(&key).ends_with("en%2Fpart-00.jsonl.ids.json"));

        let checkpoint = store.load(&key).unwrap();
        assert_eq!(checkpoint.ids, ids);
        assert_eq!(checkpoint.vectors.row(1), &[0.0f32, 1.0][..]);
        assert_eq!(checkpoint.model_name, "hashing-2");
    }

    #[test]
    fn test_completed_lists_only_marked_shards() {
        let temp = TempDir::new().unwrap();
        let store = CheckpointStore::open(temp.path()).unwrap();

        let done = ShardKey::from_relative_path("a.jsonl").unwrap();
        store.write(&done, &[], &matrix(&[]), "m").unwrap();

        // Data without a marker is an in-progress shard
        let partial = ShardKey::from_relative_path("b.jsonl").unwrap();
        fs::write(store.ids_path(&partial), b"[]").unwrap();

        // Marker with an undecodable name
        fs::write(temp.path().join("bad%zz.done"), b"done").unwrap();

        let completed = store.completed().unwrap();
        assert_eq!(completed.into_iter().collect::<Vec<_>>(), vec![done]);
    }

    #[test]
    fn test_write_rejects_length_mismatch() {
        let temp = TempDir::new().unwrap();
        let store = CheckpointStore::open(temp.path()).unwrap();
        let key = ShardKey::from_relative_path("x.jsonl").unwrap();

        let result = store.write(&key, &["only-one".to_string()], &matrix(&[]), "m");
        assert!(matches!(result, Err(PipelineError::Integrity { .. })));
        assert!(!store.is_done(&key));
    }

    #[test]
    fn test_load_rejects_corrupt_ids() {
        let temp = TempDir::new().unwrap();
        let store = CheckpointStore::open(temp.path()).unwrap();
        let key = ShardKey::from_relative_path("x.jsonl").unwrap();

        store.write(&key, &[], &matrix(&[]), "m").unwrap();
        fs::write(store.ids_path(&key), b"{not json").unwrap();

        assert!(matches!(
            store.load(&key),
            Err(PipelineError::InvalidCheckpoint { .. })
        ));
    }

    #[test]
    fn test_load_requires_encoder_record() {
        let temp = TempDir::new().unwrap();
        let store = CheckpointStore::open(temp.path()).unwrap();
        let key = ShardKey::from_relative_path("x.jsonl").unwrap();

        store.write(&key, &[], &matrix(&[]), "m").unwrap();
        fs::remove_file(store.model_path(&key)).unwrap();
        assert!(matches!(
            store.load(&key),
            Err(PipelineError::InvalidCheckpoint { .. })
        ));

        fs::write(store.model_path(&key), b"  \n").unwrap();
        assert!(matches!(
            store.load(&key),
            Err(PipelineError::InvalidCheckpoint { .. })
        ));
    }

    #[test]
    fn test_open_existing_requires_directory() {
        let temp = TempDir::new().unwrap();
        assert!(CheckpointStore::open_existing(temp.path().join("missing")).is_err());
        assert!(CheckpointStore::open_existing(temp.path()).is_ok());
    }
}
