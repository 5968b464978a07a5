/// The main library module for shardvec
pub mod checkpoint;
pub mod config;
pub mod corpus;
pub mod display;
pub mod encoder;
pub mod error;
pub mod fsops;
pub mod io;
pub mod pipeline;
pub mod search;
pub mod vector;

// Explicit exports for better API clarity
pub use checkpoint::{CheckpointStore, ShardCheckpoint, ShardKey};
pub use config::Settings;
pub use corpus::{CorpusScanner, Document, DocumentReader, ShardSource};
pub use encoder::{BatchEncoder, create_encoder};
pub use error::{PipelineError, PipelineResult};
pub use pipeline::{
    BuildPlan, BuildReport, MergeEngine, MergeOutcome, ResumeController, ShardProcessor,
    pending_shards,
};
pub use search::{CorpusIndex, IndexMetadata, IndexPaths, QueryEngine, QueryHit};
pub use vector::{VectorDimension, VectorError, VectorMatrix};
