//! Corpus discovery and streaming document decoding.

mod discover;
mod reader;

pub use discover::{CorpusScanner, ShardSource};
pub use reader::{DocumentReader, open_shard};

/// A single corpus record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub id: String,
    pub contents: String,
}
