//! Table formatting utilities for structured output.

use comfy_table::{
    Attribute, Cell, CellAlignment, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL,
};

use crate::pipeline::{BuildPlan, BuildReport};
use crate::search::{IndexMetadata, QueryHit};

/// Builder for creating formatted tables.
pub struct TableBuilder {
    table: Table,
}

impl Default for TableBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TableBuilder {
    /// Create a new table builder.
    pub fn new() -> Self {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        // Apply rounded corners
        table.apply_modifier(UTF8_ROUND_CORNERS);
        Self { table }
    }

    /// Set the table headers.
    pub fn set_headers(mut self, headers: Vec<&str>) -> Self {
        let header_cells: Vec<Cell> = headers
            .into_iter()
            .map(|h| Cell::new(h).add_attribute(Attribute::Bold))
            .collect();
        self.table.set_header(header_cells);
        self
    }

    /// Add a row to the table.
    pub fn add_row(mut self, row: Vec<String>) -> Self {
        self.table.add_row(row);
        self
    }

    /// Build and return the formatted table.
    pub fn build(self) -> String {
        self.table.to_string()
    }
}

/// Ranked search results.
pub fn create_hits_table(hits: &[QueryHit]) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.apply_modifier(UTF8_ROUND_CORNERS);

    table.set_header(vec![
        Cell::new("Rank").add_attribute(Attribute::Bold),
        Cell::new("Document").add_attribute(Attribute::Bold),
        Cell::new("Score").add_attribute(Attribute::Bold),
    ]);

    for hit in hits {
        table.add_row(vec![
            Cell::new(hit.rank).set_alignment(CellAlignment::Right),
            Cell::new(&hit.document_id),
            Cell::new(format!("{:.4}", hit.score)).set_alignment(CellAlignment::Right),
        ]);
    }

    table.to_string()
}

/// Build progress and merged index overview.
pub fn create_status_table(plan: &BuildPlan, index: Option<&IndexMetadata>) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.apply_modifier(UTF8_ROUND_CORNERS);

    table.set_header(vec![
        Cell::new("Metric").add_attribute(Attribute::Bold),
        Cell::new("Value").add_attribute(Attribute::Bold),
    ]);

    let mut rows: Vec<(&str, String)> = vec![
        ("Shards discovered", plan.discovered.to_string()),
        ("Shards complete", plan.already_complete.to_string()),
        ("Shards pending", plan.pending.len().to_string()),
    ];

    match index {
        Some(metadata) => {
            rows.push(("Indexed documents", metadata.document_count.to_string()));
            rows.push(("Merged shards", metadata.shard_count.to_string()));
            rows.push(("Dimension", metadata.dimension.to_string()));
            rows.push(("Encoder", metadata.model_name.clone()));
            if let Some(created) = metadata.created_at_utc() {
                rows.push((
                    "Merged at",
                    created.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
                ));
            }
        }
        None => rows.push(("Merged index", "not built".to_string())),
    }

    for (metric, value) in rows {
        table.add_row(vec![metric.to_string(), value]);
    }

    table.to_string()
}

/// Summary of a finished build run.
pub fn create_build_summary_table(report: &BuildReport, elapsed: std::time::Duration) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.apply_modifier(UTF8_ROUND_CORNERS);

    table.set_header(vec![
        Cell::new("Shard").add_attribute(Attribute::Bold),
        Cell::new("Documents").add_attribute(Attribute::Bold),
        Cell::new("Skipped").add_attribute(Attribute::Bold),
        Cell::new("Batches").add_attribute(Attribute::Bold),
    ]);

    for outcome in &report.processed {
        table.add_row(vec![
            outcome.key.to_string(),
            outcome.documents.to_string(),
            outcome.skipped_records.to_string(),
            outcome.batches.to_string(),
        ]);
    }

    let documents = report.documents();
    let rate = if elapsed.as_secs_f64() > 0.0 {
        documents as f64 / elapsed.as_secs_f64()
    } else {
        0.0
    };

    table.add_row(vec![
        Cell::new("TOTAL").add_attribute(Attribute::Bold),
        Cell::new(documents).add_attribute(Attribute::Bold),
        Cell::new(report.skipped_records()).add_attribute(Attribute::Bold),
        Cell::new(format!("{elapsed:.1?} ({rate:.0} docs/s)")).add_attribute(Attribute::Bold),
    ]);

    table.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_builder() {
        let table = TableBuilder::new()
            .set_headers(vec!["Column 1", "Column 2"])
            .add_row(vec!["Value 1".to_string(), "Value 2".to_string()])
            .build();

        assert!(table.contains("Column 1"));
        assert!(table.contains("Value 1"));
    }

    #[test]
    fn test_hits_table() {
        let hits = vec![QueryHit {
            rank: 1,
            document_id: "doc-1".to_string(),
            score: 0.987_71,
        }];
        let table = create_hits_table(&hits);
        assert!(table.contains("doc-1"));
        assert!(table.contains("0.9877"));
    }

    #[test]
    fn test_status_table_without_index() {
        let plan = BuildPlan {
            discovered: 3,
            already_complete: 1,
            pending: Vec::new(),
        };
        let table = create_status_table(&plan, None);
        assert!(table.contains("Shards discovered"));
        assert!(table.contains("not built"));
    }
}
