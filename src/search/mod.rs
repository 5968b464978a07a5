//! Merged index, similarity search and run-file output.

mod engine;
mod index;
mod metadata;
mod topk;
mod trec;

pub use engine::{QueryEngine, QueryHit};
pub use index::{CorpusIndex, IndexPaths};
pub use metadata::{IndexMetadata, get_utc_timestamp};
pub use topk::select_top_k;
pub use trec::{Topic, format_run_line, load_topics, read_topics, write_run, write_topic_run};
