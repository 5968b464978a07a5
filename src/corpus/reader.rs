//! Streaming decoder for newline-delimited JSON shards.
//!
//! Each line is an object with at least `id` and `contents` strings; extra
//! fields are ignored. Records that cannot be used are skipped and counted.
//! Only I/O failures end the stream with an error.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use flate2::read::MultiGzDecoder;
use serde::Deserialize;

use super::Document;
use crate::error::{ErrorContext, PipelineError, PipelineResult};

#[derive(Deserialize)]
struct RawRecord {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    contents: Option<String>,
}

/// Opens a shard for streaming, decompressing `.gz` files.
pub fn open_shard(path: &Path) -> PipelineResult<DocumentReader> {
    let file = File::open(path).read_context(path)?;
    let is_gzip = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("gz"));

    let reader: Box<dyn BufRead + Send> = if is_gzip {
        Box::new(BufReader::new(MultiGzDecoder::new(file)))
    } else {
        Box::new(BufReader::new(file))
    };

    Ok(DocumentReader::new(path, reader))
}

/// Iterator over the valid documents of one shard.
pub struct DocumentReader {
    path: PathBuf,
    reader: Box<dyn BufRead + Send>,
    buffer: Vec<u8>,
    line: usize,
    skipped: usize,
    finished: bool,
}

impl DocumentReader {
    pub fn new(path: impl Into<PathBuf>, reader: Box<dyn BufRead + Send>) -> Self {
        Self {
            path: path.into(),
            reader,
            buffer: Vec::new(),
            line: 0,
            skipped: 0,
            finished: false,
        }
    }

    /// Records skipped so far.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    fn skip(&mut self, reason: &str) {
        self.skipped += 1;
        tracing::debug!(
            shard = %self.path.display(),
            line = self.line,
            reason,
            "skipping malformed record"
        );
    }

    fn parse_line(&mut self) -> Option<Document> {
        let Ok(text) = std::str::from_utf8(&self.buffer) else {
            self.skip("invalid UTF-8");
            return None;
        };
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        let record = match serde_json::from_str::<RawRecord>(text) {
            Ok(record) => record,
            Err(_) => {
                self.skip("unparseable JSON");
                return None;
            }
        };

        match (record.id, record.contents) {
            (Some(id), Some(contents)) if !contents.is_empty() => Some(Document { id, contents }),
            (None, _) => {
                self.skip("missing id");
                None
            }
            _ => {
                self.skip("missing or empty contents");
                None
            }
        }
    }
}

impl Iterator for DocumentReader {
    type Item = PipelineResult<Document>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.finished {
            self.buffer.clear();
            match self.reader.read_until(b'\n', &mut self.buffer) {
                Ok(0) => self.finished = true,
                Ok(_) => {
                    self.line += 1;
                    if let Some(document) = self.parse_line() {
                        return Some(Ok(document));
                    }
                }
                Err(source) => {
                    self.finished = true;
                    return Some(Err(PipelineError::FileRead {
                        path: self.path.clone(),
                        source,
                    }));
                }
            }
        }
        None
    }
}
