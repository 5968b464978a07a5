//! Per-shard checkpoints and their naming scheme.

mod key;
mod store;

pub use key::{ShardKey, decode_shard_path, encode_shard_path};
pub use store::{
    CheckpointStore, DONE_SUFFIX, IDS_SUFFIX, MODEL_SUFFIX, ShardCheckpoint, VECTORS_SUFFIX,
};
