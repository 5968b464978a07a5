//! Topic files in, TREC run files out.
//!
//! Topics are `query_id<TAB>query_text` lines. Run lines are
//! `query_id Q0 document_id rank score run_name` with four decimals.

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use indicatif::ProgressBar;

use super::engine::{QueryEngine, QueryHit};
use crate::error::{ErrorContext, PipelineResult};

/// One query from a topic file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topic {
    pub query_id: String,
    pub text: String,
}

/// Parses topics, splitting each line on its first tab.
///
/// Blank lines are skipped silently, lines without a tab with a warning.
pub fn read_topics<R: BufRead>(reader: R, source: &Path) -> PipelineResult<Vec<Topic>> {
    let mut topics = Vec::new();

    for (number, line) in reader.lines().enumerate() {
        let line = line.read_context(source)?;
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            continue;
        }

        match line.split_once('\t') {
            Some((query_id, text)) => topics.push(Topic {
                query_id: query_id.trim().to_string(),
                text: text.to_string(),
            }),
            None => {
                tracing::warn!(
                    file = %source.display(),
                    line = number + 1,
                    "skipping topic line without a tab separator"
                );
            }
        }
    }

    Ok(topics)
}

/// Reads a topic file from disk.
pub fn load_topics(path: &Path) -> PipelineResult<Vec<Topic>> {
    let file = File::open(path).read_context(path)?;
    read_topics(BufReader::new(file), path)
}

/// Formats one run line.
#[must_use]
pub fn format_run_line(query_id: &str, hit: &QueryHit, run_name: &str) -> String {
    format!(
        "{query_id} Q0 {} {} {:.4} {run_name}",
        hit.document_id, hit.rank, hit.score
    )
}

/// Writes the run lines of one query.
pub fn write_run<W: Write>(
    writer: &mut W,
    query_id: &str,
    hits: &[QueryHit],
    run_name: &str,
) -> std::io::Result<()> {
    for hit in hits {
        writeln!(writer, "{}", format_run_line(query_id, hit, run_name))?;
    }
    Ok(())
}

/// Ranks every topic and writes its run lines, in topic order.
///
/// Each query is encoded on its own, exactly as a single search would be,
/// so run scores match `search` output. `sink` names the destination in
/// write errors. Returns the number of lines written.
pub fn write_topic_run<W: Write>(
    engine: &QueryEngine<'_>,
    topics: &[Topic],
    top_k: usize,
    run_name: &str,
    writer: &mut W,
    sink: &Path,
    progress: &ProgressBar,
) -> PipelineResult<usize> {
    let mut lines = 0usize;

    for topic in topics {
        let hits = engine.search(&topic.text, top_k)?;
        write_run(writer, &topic.query_id, &hits, run_name).write_context(sink)?;
        lines += hits.len();
        progress.inc(1);
    }

    writer.flush().write_context(sink)?;
    Ok(lines)
}
