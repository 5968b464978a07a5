#![allow(dead_code)]

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::write::GzEncoder;
use serde_json::json;
use tempfile::TempDir;

use shardvec::checkpoint::CheckpointStore;
use shardvec::config::{EncoderBackend, Settings};
use shardvec::corpus::CorpusScanner;
use shardvec::encoder::{HashingEncoder, hashing_encoder};
use shardvec::search::IndexPaths;
use shardvec::vector::VectorDimension;

pub const TEST_DIMENSION: usize = 32;

/// A corpus, checkpoint directory and index directory under one temp dir.
pub struct TestCorpus {
    pub dir: TempDir,
}

impl TestCorpus {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        fs::create_dir_all(dir.path().join("corpus")).expect("Failed to create corpus dir");
        Self { dir }
    }

    pub fn root(&self) -> PathBuf {
        self.dir.path().join("corpus")
    }

    pub fn checkpoint_dir(&self) -> PathBuf {
        self.dir.path().join("checkpoints")
    }

    pub fn index_paths(&self) -> IndexPaths {
        IndexPaths::in_dir(&self.dir.path().join("index"))
    }

    /// Writes `docs` as JSONL to `relative` under the corpus root.
    pub fn add_shard(&self, relative: &str, docs: &[(&str, &str)]) -> PathBuf {
        let body: String = docs
            .iter()
            .map(|(id, contents)| format!("{}\n", json!({ "id": id, "contents": contents })))
            .collect();
        self.add_raw(relative, &body)
    }

    pub fn add_raw(&self, relative: &str, body: &str) -> PathBuf {
        let path = self.root().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent dirs");
        }
        fs::write(&path, body).expect("Failed to write shard");
        path
    }

    /// Writes a gzip-compressed JSONL shard.
    pub fn add_gz_shard(&self, relative: &str, docs: &[(&str, &str)]) -> PathBuf {
        let path = self.root().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent dirs");
        }
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        for (id, contents) in docs {
            writeln!(encoder, "{}", json!({ "id": id, "contents": contents })).unwrap();
        }
        fs::write(&path, encoder.finish().unwrap()).expect("Failed to write shard");
        path
    }

    pub fn scanner(&self) -> CorpusScanner {
        CorpusScanner::new(self.root(), &Settings::default().corpus.extensions)
    }

    pub fn store(&self) -> CheckpointStore {
        CheckpointStore::open(self.checkpoint_dir()).expect("Failed to open checkpoint store")
    }

    /// Settings pointing at this corpus with the offline encoder.
    pub fn settings(&self) -> Settings {
        let mut settings = Settings::default();
        settings.workspace_root = Some(self.dir.path().to_path_buf());
        settings.corpus.root = PathBuf::from("corpus");
        settings.build.checkpoint_dir = PathBuf::from("checkpoints");
        settings.index.dir = PathBuf::from("index");
        settings.encoder.backend = EncoderBackend::Hashing;
        settings.encoder.dimension = TEST_DIMENSION;
        settings
    }
}

pub fn test_encoder() -> HashingEncoder {
    hashing_encoder(VectorDimension::new(TEST_DIMENSION).unwrap(), 64)
        .expect("Failed to build hashing encoder")
}

pub fn read_bytes(path: &Path) -> Vec<u8> {
    fs::read(path).unwrap_or_else(|e| panic!("Failed to read {}: {e}", path.display()))
}
