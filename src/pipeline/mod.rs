//! The build side: per-shard embedding, resumable orchestration and merge.

mod merge;
mod resume;
mod shard;

pub use merge::{MergeEngine, MergeOutcome, MergedIndex, merge_checkpoints};
pub use resume::{BuildPlan, BuildReport, ResumeController, pending_shards, plan_build};
pub use shard::{ShardOutcome, ShardProcessor};
