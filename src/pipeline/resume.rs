//! Resumable orchestration of shard processing.
//!
//! Work remaining is the set difference of discovered shards and completed
//! checkpoints. Pending shards run in sorted key order; the first failure
//! stops the build and every checkpoint completed before it stays valid, so
//! a rerun resumes at the failing shard.
//!
//! With several workers a failure only stops shards sorted after it from
//! starting. Every earlier shard still runs, so the reported failure is the
//! lowest failing key, as in a sequential build.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use indicatif::ProgressBar;
use parking_lot::Mutex;
use rayon::prelude::*;

use super::shard::{ShardOutcome, ShardProcessor};
use crate::checkpoint::{CheckpointStore, ShardKey};
use crate::corpus::{CorpusScanner, ShardSource};
use crate::encoder::BatchEncoder;
use crate::error::{PipelineError, PipelineResult};

/// Keys discovered but not yet completed, in sorted order.
#[must_use]
pub fn pending_shards(
    discovered: &BTreeSet<ShardKey>,
    completed: &BTreeSet<ShardKey>,
) -> Vec<ShardKey> {
    discovered.difference(completed).cloned().collect()
}

/// What a build run would do.
#[derive(Debug, Clone)]
pub struct BuildPlan {
    pub discovered: usize,
    pub already_complete: usize,
    pub pending: Vec<ShardSource>,
}

impl BuildPlan {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Matches discovered shards against `completed` keys.
///
/// Completed keys with no shard on disk are only reported.
pub fn plan_build(
    scanner: &CorpusScanner,
    completed: &BTreeSet<ShardKey>,
) -> PipelineResult<BuildPlan> {
    let mut sources: BTreeMap<ShardKey, ShardSource> = scanner
        .discover()?
        .into_iter()
        .map(|source| (source.key.clone(), source))
        .collect();

    let discovered: BTreeSet<ShardKey> = sources.keys().cloned().collect();
    let pending_keys = pending_shards(&discovered, completed);

    let stale = completed.difference(&discovered).count();
    if stale > 0 {
        tracing::warn!(
            checkpoints = stale,
            "completed checkpoints without a matching corpus shard"
        );
    }

    let pending = pending_keys
        .iter()
        .filter_map(|key| sources.remove(key))
        .collect::<Vec<_>>();

    Ok(BuildPlan {
        discovered: discovered.len(),
        already_complete: discovered.len() - pending.len(),
        pending,
    })
}

/// What a build run did.
#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    pub discovered: usize,
    pub already_complete: usize,
    pub processed: Vec<ShardOutcome>,
}

impl BuildReport {
    /// True when there was nothing pending.
    #[must_use]
    pub fn nothing_to_do(&self) -> bool {
        self.processed.is_empty()
    }

    #[must_use]
    pub fn documents(&self) -> usize {
        self.processed.iter().map(|o| o.documents).sum()
    }

    #[must_use]
    pub fn skipped_records(&self) -> usize {
        self.processed.iter().map(|o| o.skipped_records).sum()
    }
}

/// Drives the shard processor over every pending shard.
pub struct ResumeController<'a> {
    scanner: CorpusScanner,
    store: &'a CheckpointStore,
    encoder: &'a dyn BatchEncoder,
    batch_size: usize,
    workers: usize,
    stop: Arc<AtomicBool>,
    progress: ProgressBar,
}

impl<'a> ResumeController<'a> {
    /// The store's own directory is excluded from discovery.
    pub fn new(
        scanner: CorpusScanner,
        store: &'a CheckpointStore,
        encoder: &'a dyn BatchEncoder,
        batch_size: usize,
    ) -> Self {
        Self {
            scanner: scanner.with_excluded([store.dir().to_path_buf()]),
            store,
            encoder,
            batch_size,
            workers: 1,
            stop: Arc::new(AtomicBool::new(false)),
            progress: ProgressBar::hidden(),
        }
    }

    /// Number of shards processed concurrently.
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Flag checked between shards; once set no new shard starts.
    #[must_use]
    pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = stop;
        self
    }

    #[must_use]
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// Computes pending work without touching any checkpoint.
    pub fn plan(&self) -> PipelineResult<BuildPlan> {
        plan_build(&self.scanner, &self.store.completed()?)
    }

    /// Processes every pending shard.
    ///
    /// # Errors
    /// The first failing shard, wrapped in [`PipelineError::ShardFailed`], or
    /// [`PipelineError::Interrupted`] if the stop flag was raised.
    pub fn run(&self) -> PipelineResult<BuildReport> {
        let plan = self.plan()?;
        let mut report = BuildReport {
            discovered: plan.discovered,
            already_complete: plan.already_complete,
            processed: Vec::new(),
        };

        if plan.is_empty() {
            tracing::info!(
                shards = plan.discovered,
                "all shards already complete, nothing to do"
            );
            return Ok(report);
        }

        tracing::info!(
            discovered = plan.discovered,
            complete = plan.already_complete,
            pending = plan.pending.len(),
            workers = self.workers,
            "starting build"
        );

        let processor = ShardProcessor::new(self.encoder, self.store, self.batch_size)?;
        self.progress.set_length(plan.pending.len() as u64);

        let result = if self.workers > 1 {
            self.run_parallel(&processor, &plan.pending)
        } else {
            self.run_sequential(&processor, &plan.pending)
        };

        match result {
            Ok(processed) => {
                self.progress.finish_with_message("build complete");
                report.processed = processed;
                Ok(report)
            }
            Err(error) => {
                self.progress.abandon();
                Err(error)
            }
        }
    }

    fn run_sequential(
        &self,
        processor: &ShardProcessor<'_>,
        pending: &[ShardSource],
    ) -> PipelineResult<Vec<ShardOutcome>> {
        let mut processed = Vec::with_capacity(pending.len());

        for (index, source) in pending.iter().enumerate() {
            if self.stop.load(Ordering::SeqCst) {
                tracing::warn!(remaining = pending.len() - index, "build interrupted");
                return Err(PipelineError::Interrupted {
                    completed: processed.len(),
                    remaining: pending.len() - index,
                });
            }

            self.progress.set_message(source.key.to_string());
            match processor.process(source) {
                Ok(Some(outcome)) => processed.push(outcome),
                Ok(None) => {}
                Err(error) => {
                    tracing::error!(shard = %source.key, error = %error, "shard failed");
                    return Err(error.in_shard(source.key.to_string()));
                }
            }
            self.progress.inc(1);
        }

        Ok(processed)
    }

    fn run_parallel(
        &self,
        processor: &ShardProcessor<'_>,
        pending: &[ShardSource],
    ) -> PipelineResult<Vec<ShardOutcome>> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .build()
            .map_err(|e| PipelineError::General(format!("Failed to start worker pool: {e}")))?;

        // Lowest index that failed so far; later shards are not started
        let first_failure = AtomicUsize::new(usize::MAX);
        let outcomes: Mutex<Vec<(usize, ShardOutcome)>> = Mutex::new(Vec::new());
        let failures: Mutex<Vec<(usize, ShardKey, PipelineError)>> = Mutex::new(Vec::new());
        let not_started = Mutex::new(0usize);

        pool.install(|| {
            pending.par_iter().enumerate().for_each(|(index, source)| {
                if index > first_failure.load(Ordering::SeqCst) || self.stop.load(Ordering::SeqCst)
                {
                    *not_started.lock() += 1;
                    return;
                }

                match processor.process(source) {
                    Ok(Some(outcome)) => outcomes.lock().push((index, outcome)),
                    Ok(None) => {}
                    Err(error) => {
                        tracing::error!(shard = %source.key, error = %error, "shard failed");
                        first_failure.fetch_min(index, Ordering::SeqCst);
                        failures.lock().push((index, source.key.clone(), error));
                    }
                }
                self.progress.inc(1);
            });
        });

        let mut failures = failures.into_inner();
        failures.sort_by_key(|(index, _, _)| *index);
        let mut failures = failures.into_iter();
        if let Some((_, key, error)) = failures.next() {
            for (_, other, _) in failures {
                tracing::warn!(shard = %other, "additional shard failed in the same run");
            }
            return Err(error.in_shard(key.to_string()));
        }

        let mut outcomes = outcomes.into_inner();
        outcomes.sort_by_key(|(index, _)| *index);
        let processed: Vec<ShardOutcome> = outcomes.into_iter().map(|(_, o)| o).collect();

        let remaining = not_started.into_inner();
        if remaining > 0 {
            tracing::warn!(remaining, "build interrupted");
            return Err(PipelineError::Interrupted {
                completed: processed.len(),
                remaining,
            });
        }

        Ok(processed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(paths: &[&str]) -> BTreeSet<ShardKey> {
        paths
            .iter()
            .map(|p| ShardKey::from_relative_path(p).unwrap())
            .collect()
    }

    #[test]
    fn test_pending_is_set_difference() {
        let discovered = keys(&["c.jsonl", "a.jsonl", "b/x.jsonl"]);
        let completed = keys(&["a.jsonl", "stale.jsonl"]);

        let pending = pending_shards(&discovered, &completed);
        let names: Vec<String> = pending.iter().map(ShardKey::relative_path).collect();
        assert_eq!(names, vec!["b/x.jsonl", "c.jsonl"]);
    }

    #[test]
    fn test_nothing_pending() {
        let all = keys(&["a.jsonl"]);
        assert!(pending_shards(&all, &all).is_empty());
        assert!(pending_shards(&BTreeSet::new(), &all).is_empty());
    }
}
