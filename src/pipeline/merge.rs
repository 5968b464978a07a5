//! Combines completed shard checkpoints into one corpus index.
//!
//! Rows are concatenated in sorted shard-key order and, within a shard, in
//! arrival order. Every integrity check runs before anything is written, so
//! a failed merge leaves any previous index untouched. All checkpoints must
//! come from the same encoder, whose name is recorded in the index metadata.

use std::collections::HashMap;

use indicatif::ProgressBar;

use crate::checkpoint::{CheckpointStore, ShardCheckpoint, ShardKey};
use crate::error::{PipelineError, PipelineResult};
use crate::search::{CorpusIndex, IndexMetadata, IndexPaths};
use crate::vector::VectorMatrix;

/// Result of a merge run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    NothingToMerge,
    Merged {
        shards: usize,
        documents: usize,
        dimension: usize,
        model_name: String,
    },
}

/// A merged index and the encoder every row came from.
#[derive(Debug)]
pub struct MergedIndex {
    pub index: CorpusIndex,
    pub model_name: String,
}

/// Concatenates checkpoints given in merge order.
///
/// Returns `None` for an empty input.
///
/// # Errors
/// An ids/rows mismatch, a dimension or encoder disagreement, or a repeated
/// id, each naming the offending shard.
pub fn merge_checkpoints<I>(checkpoints: I) -> PipelineResult<Option<MergedIndex>>
where
    I: IntoIterator<Item = PipelineResult<(ShardKey, ShardCheckpoint)>>,
{
    let mut ids: Vec<String> = Vec::new();
    let mut vectors: Option<VectorMatrix> = None;
    let mut encoder: Option<(String, ShardKey)> = None;
    let mut owners: HashMap<String, ShardKey> = HashMap::new();

    for item in checkpoints {
        let (key, checkpoint) = item?;

        if checkpoint.ids.len() != checkpoint.vectors.rows() {
            return Err(PipelineError::Integrity {
                shard: key.to_string(),
                reason: format!(
                    "{} ids but {} vector rows",
                    checkpoint.ids.len(),
                    checkpoint.vectors.rows()
                ),
            });
        }

        let merged =
            vectors.get_or_insert_with(|| VectorMatrix::new(checkpoint.vectors.dimension()));
        if merged.dimension() != checkpoint.vectors.dimension() {
            return Err(PipelineError::Integrity {
                shard: key.to_string(),
                reason: format!(
                    "vector dimension {} differs from {} in earlier shards",
                    checkpoint.vectors.dimension(),
                    merged.dimension()
                ),
            });
        }

        let (model_name, first_shard) =
            encoder.get_or_insert_with(|| (checkpoint.model_name.clone(), key.clone()));
        if *model_name != checkpoint.model_name {
            return Err(PipelineError::Integrity {
                shard: key.to_string(),
                reason: format!(
                    "encoded with '{}' but shard '{first_shard}' was encoded with '{model_name}'",
                    checkpoint.model_name
                ),
            });
        }

        for id in &checkpoint.ids {
            if let Some(first) = owners.get(id) {
                return Err(PipelineError::DuplicateId {
                    id: id.clone(),
                    first_shard: first.to_string(),
                    second_shard: key.to_string(),
                });
            }
            owners.insert(id.clone(), key.clone());
        }

        merged.append(&checkpoint.vectors)?;
        ids.extend(checkpoint.ids);
    }

    match (vectors, encoder) {
        (Some(vectors), Some((model_name, _))) => Ok(Some(MergedIndex {
            index: CorpusIndex::new(ids, vectors)?,
            model_name,
        })),
        _ => Ok(None),
    }
}

/// Reads every completed checkpoint from a store and writes the index.
pub struct MergeEngine<'a> {
    store: &'a CheckpointStore,
    progress: ProgressBar,
}

impl<'a> MergeEngine<'a> {
    pub fn new(store: &'a CheckpointStore) -> Self {
        Self {
            store,
            progress: ProgressBar::hidden(),
        }
    }

    #[must_use]
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// Merges all completed shards into `paths`.
    pub fn merge_into(&self, paths: &IndexPaths) -> PipelineResult<MergeOutcome> {
        let completed = self.store.completed()?;
        if completed.is_empty() {
            tracing::info!(
                dir = %self.store.dir().display(),
                "no completed checkpoints, nothing to merge"
            );
            return Ok(MergeOutcome::NothingToMerge);
        }

        let shards = completed.len();
        self.progress.set_length(shards as u64);

        let loaded = completed.into_iter().map(|key| -> PipelineResult<_> {
            self.progress.set_message(key.to_string());
            let checkpoint = self.store.load(&key).map_err(|e| match e {
                PipelineError::Storage { .. } | PipelineError::InvalidCheckpoint { .. } => {
                    PipelineError::Integrity {
                        shard: key.to_string(),
                        reason: e.to_string(),
                    }
                }
                other => other,
            })?;
            self.progress.inc(1);
            Ok((key, checkpoint))
        });

        let MergedIndex { index, model_name } = match merge_checkpoints(loaded) {
            Ok(Some(merged)) => merged,
            Ok(None) => return Ok(MergeOutcome::NothingToMerge),
            Err(error) => {
                self.progress.abandon();
                return Err(error);
            }
        };

        index.save(paths)?;

        let dimension = index.vectors().dimension().get();
        IndexMetadata::new(&model_name, dimension, index.len(), shards).save(&paths.metadata)?;

        self.progress.finish_with_message("merge complete");
        tracing::info!(
            shards,
            documents = index.len(),
            dimension,
            model = %model_name,
            "merged corpus index"
        );

        Ok(MergeOutcome::Merged {
            shards,
            documents: index.len(),
            dimension,
            model_name,
        })
    }
}
