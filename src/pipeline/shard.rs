//! Streams one shard through the encoder into a checkpoint.

use crate::checkpoint::{CheckpointStore, ShardKey};
use crate::corpus::{Document, ShardSource, open_shard};
use crate::encoder::BatchEncoder;
use crate::error::{PipelineError, PipelineResult};
use crate::vector::{VectorError, VectorMatrix};

/// Summary of one processed shard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardOutcome {
    pub key: ShardKey,
    pub documents: usize,
    pub skipped_records: usize,
    pub batches: usize,
}

/// Encodes shards in fixed-size batches and checkpoints each one whole.
///
/// Nothing is written until the shard has been fully encoded. On error the
/// in-memory accumulation is dropped and the shard stays pending.
pub struct ShardProcessor<'a> {
    encoder: &'a dyn BatchEncoder,
    store: &'a CheckpointStore,
    batch_size: usize,
}

struct Accumulator<'a> {
    encoder: &'a dyn BatchEncoder,
    batch_size: usize,
    pending_ids: Vec<String>,
    pending_texts: Vec<String>,
    ids: Vec<String>,
    vectors: VectorMatrix,
    batches: usize,
}

impl Accumulator<'_> {
    fn push(&mut self, document: Document) -> PipelineResult<()> {
        self.pending_ids.push(document.id);
        self.pending_texts.push(document.contents);
        if self.pending_texts.len() >= self.batch_size {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> PipelineResult<()> {
        if self.pending_texts.is_empty() {
            return Ok(());
        }

        let texts: Vec<&str> = self.pending_texts.iter().map(String::as_str).collect();
        let encoded = self.encoder.encode_batch(&texts)?;
        if encoded.len() != texts.len() {
            return Err(VectorError::OutputCount {
                expected: texts.len(),
                actual: encoded.len(),
            }
            .into());
        }

        for vector in &encoded {
            self.vectors.push_row(vector)?;
        }
        self.ids.append(&mut self.pending_ids);
        self.pending_texts.clear();
        self.batches += 1;
        Ok(())
    }
}

impl<'a> ShardProcessor<'a> {
    pub fn new(
        encoder: &'a dyn BatchEncoder,
        store: &'a CheckpointStore,
        batch_size: usize,
    ) -> PipelineResult<Self> {
        if batch_size == 0 {
            return Err(PipelineError::ConfigError {
                reason: "batch size must be at least 1".to_string(),
            });
        }
        Ok(Self {
            encoder,
            store,
            batch_size,
        })
    }

    /// Produces the checkpoint for `source`.
    ///
    /// Returns `None` when the shard is already done.
    pub fn process(&self, source: &ShardSource) -> PipelineResult<Option<ShardOutcome>> {
        if self.store.is_done(&source.key) {
            tracing::debug!(shard = %source.key, "shard already complete");
            return Ok(None);
        }

        let mut reader = open_shard(&source.path)?;
        let mut outcome = self.process_documents(&source.key, reader.by_ref())?;
        outcome.skipped_records = reader.skipped();

        tracing::info!(
            shard = %source.key,
            documents = outcome.documents,
            skipped = outcome.skipped_records,
            batches = outcome.batches,
            "shard complete"
        );
        Ok(Some(outcome))
    }

    /// Encodes a document stream and writes the checkpoint for `key`.
    pub fn process_documents<I>(
        &self,
        key: &ShardKey,
        documents: I,
    ) -> PipelineResult<ShardOutcome>
    where
        I: IntoIterator<Item = PipelineResult<Document>>,
    {
        let mut acc = Accumulator {
            encoder: self.encoder,
            batch_size: self.batch_size,
            pending_ids: Vec::with_capacity(self.batch_size),
            pending_texts: Vec::with_capacity(self.batch_size),
            ids: Vec::new(),
            vectors: VectorMatrix::new(self.encoder.dimension()),
            batches: 0,
        };

        for document in documents {
            acc.push(document?)?;
        }
        acc.flush()?;

        self.store
            .write(key, &acc.ids, &acc.vectors, self.encoder.model_name())?;

        Ok(ShardOutcome {
            key: key.clone(),
            documents: acc.ids.len(),
            skipped_records: 0,
            batches: acc.batches,
        })
    }
}
