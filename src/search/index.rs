//! Merged corpus index: parallel id list and vector matrix.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{ErrorContext, PipelineError, PipelineResult};
use crate::fsops::write_atomic;
use crate::vector::VectorMatrix;

/// File names of a merged index inside its directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexPaths {
    pub ids: PathBuf,
    pub vectors: PathBuf,
    pub metadata: PathBuf,
}

impl IndexPaths {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            ids: dir.join("corpus.ids.json"),
            vectors: dir.join("corpus.vec"),
            metadata: dir.join("metadata.json"),
        }
    }

    /// True when both data files are present.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.ids.is_file() && self.vectors.is_file()
    }
}

/// Row `i` of `vectors` is the embedding of `ids[i]`.
#[derive(Debug, Clone)]
pub struct CorpusIndex {
    ids: Vec<String>,
    vectors: VectorMatrix,
    positions: HashMap<String, usize>,
}

impl CorpusIndex {
    /// Pairs ids with vector rows.
    ///
    /// Fails if the counts differ or an id repeats.
    pub fn new(ids: Vec<String>, vectors: VectorMatrix) -> PipelineResult<Self> {
        if ids.len() != vectors.rows() {
            return Err(PipelineError::Integrity {
                shard: "corpus".to_string(),
                reason: format!("{} ids but {} vector rows", ids.len(), vectors.rows()),
            });
        }

        let mut positions = HashMap::with_capacity(ids.len());
        for (row, id) in ids.iter().enumerate() {
            if positions.insert(id.clone(), row).is_some() {
                return Err(PipelineError::DuplicateId {
                    id: id.clone(),
                    first_shard: "corpus".to_string(),
                    second_shard: "corpus".to_string(),
                });
            }
        }

        Ok(Self {
            ids,
            vectors,
            positions,
        })
    }

    #[must_use]
    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    #[must_use]
    pub fn vectors(&self) -> &VectorMatrix {
        &self.vectors
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Row of `id`, if indexed.
    #[must_use]
    pub fn position(&self, id: &str) -> Option<usize> {
        self.positions.get(id).copied()
    }

    /// Writes ids then vectors, each atomically.
    pub fn save(&self, paths: &IndexPaths) -> PipelineResult<()> {
        if let Some(parent) = paths.ids.parent() {
            std::fs::create_dir_all(parent).write_context(parent)?;
        }

        let ids_json = serde_json::to_vec(&self.ids)
            .map_err(|e| PipelineError::General(format!("Failed to serialize ids: {e}")))?;
        write_atomic(&paths.ids, &ids_json).write_context(&paths.ids)?;

        self.vectors
            .write_to(&paths.vectors)
            .map_err(|source| PipelineError::Storage {
                path: paths.vectors.clone(),
                source,
            })
    }

    /// Loads an index written by [`CorpusIndex::save`].
    pub fn load(paths: &IndexPaths) -> PipelineResult<Self> {
        if !paths.exists() {
            return Err(PipelineError::IndexNotFound {
                path: paths.ids.parent().unwrap_or(&paths.ids).to_path_buf(),
            });
        }

        let raw = std::fs::read(&paths.ids).read_context(&paths.ids)?;
        let ids: Vec<String> =
            serde_json::from_slice(&raw).map_err(|e| PipelineError::InvalidCheckpoint {
                path: paths.ids.clone(),
                reason: e.to_string(),
            })?;

        let vectors =
            VectorMatrix::read_from(&paths.vectors).map_err(|source| PipelineError::Storage {
                path: paths.vectors.clone(),
                source,
            })?;

        Self::new(ids, vectors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::VectorDimension;
    use tempfile::TempDir;

    fn matrix(rows: Vec<Vec<f32>>) -> VectorMatrix {
        VectorMatrix::from_rows(VectorDimension::new(2).unwrap(), rows).unwrap()
    }

    #[test]
    fn test_position_lookup() {
        let index = CorpusIndex::new(
            vec!["x".to_string(), "y".to_string()],
            matrix(vec![vec![1.0, 0.0], vec![0.0, 1.0]]),
        )
        .unwrap();

        assert_eq!(index.position("y"), Some(1));
        assert_eq!(index.position("z"), None);
        assert_eq!(index.vectors().row(index.position("x").unwrap())[0], 1.0);
    }

    #[test]
    fn test_new_rejects_mismatch_and_duplicates() {
        assert!(matches!(
            CorpusIndex::new(vec!["x".to_string()], matrix(vec![])),
            Err(PipelineError::Integrity { .. })
        ));
        assert!(matches!(
            CorpusIndex::new(
                vec!["x".to_string(), "x".to_string()],
                matrix(vec![vec![1.0, 0.0], vec![0.0, 1.0]])
            ),
            Err(PipelineError::DuplicateId { .. })
        ));
    }

    #[test]
    fn test_save_and_load() {
        let temp = TempDir::new().unwrap();
        let paths = IndexPaths::in_dir(&temp.path().join("index"));

        assert!(matches!(
            CorpusIndex::load(&paths),
            Err(PipelineError::IndexNotFound { .. })
        ));

        let index = CorpusIndex::new(vec!["a".to_string()], matrix(vec![vec![0.6, 0.8]])).unwrap();
        index.save(&paths).unwrap();

        let loaded = CorpusIndex::load(&paths).unwrap();
        assert_eq!(loaded.ids(), index.ids());
        assert_eq!(loaded.vectors(), index.vectors());
    }
}
