//! Output formatting for command results.
//!
//! Supports multiple output formats: table (human-readable), JSON, and toon.

use clap::ValueEnum;
use serde::Serialize;
use serde_json::Value;

use crate::client::Row;
use crate::types::{SessionReport, StatementReport};

/// Output format for command results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format
    Json,
    /// Token-efficient toon format
    Toon,
}

/// Trait for types that can be formatted for output
pub trait Outputable: Serialize {
    /// Format as a human-readable table
    fn to_table(&self) -> String;

    /// Format according to the specified output format
    fn format(&self, format: OutputFormat) -> String {
        match format {
            OutputFormat::Table => self.to_table(),
            OutputFormat::Json => serde_json::to_string_pretty(self).unwrap_or_default(),
            OutputFormat::Toon => {
                let json_value = serde_json::to_value(self).unwrap_or_default();
                toon::encode(&json_value, None)
            }
        }
    }
}

/// Render a cell the way the shell's own table mode would.
fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Render rows as a column-aligned table.
///
/// Columns come from the first row; later rows missing a column print blank.
pub fn render_rows(rows: &[Row]) -> String {
    let Some(first) = rows.first() else {
        return String::new();
    };
    let headers: Vec<&String> = first.keys().collect();

    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            headers
                .iter()
                .map(|h| row.get(h.as_str()).map(cell_text).unwrap_or_default())
                .collect()
        })
        .collect();

    let widths: Vec<usize> = headers
        .iter()
        .enumerate()
        .map(|(idx, h)| {
            cells
                .iter()
                .map(|row| row[idx].chars().count())
                .chain(std::iter::once(h.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let format_line = |values: Vec<&str>| -> String {
        values
            .iter()
            .zip(&widths)
            .map(|(value, width)| format!("{:<width$}", value, width = width))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut lines = Vec::with_capacity(rows.len() + 2);
    lines.push(format_line(headers.iter().map(|h| h.as_str()).collect()));
    let dashes: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    lines.push(format_line(dashes.iter().map(String::as_str).collect()));
    for row in &cells {
        lines.push(format_line(row.iter().map(String::as_str).collect()));
    }
    lines.join("\n")
}

impl Outputable for StatementReport {
    fn to_table(&self) -> String {
        let mut lines = vec![format!("> {}", self.statement)];

        if let Some(error) = &self.error {
            lines.push(format!("Error: {}", error));
        } else if self.rows.is_empty() {
            lines.push("OK".to_string());
        } else {
            lines.push(render_rows(&self.rows));
            let noun = if self.rows.len() == 1 { "row" } else { "rows" };
            lines.push(format!("({} {})", self.rows.len(), noun));
        }

        lines.join("\n")
    }
}

impl Outputable for SessionReport {
    fn to_table(&self) -> String {
        let mut blocks: Vec<String> = self.statements.iter().map(|s| s.to_table()).collect();

        if self.statements.is_empty() {
            blocks.push("No statements executed.".to_string());
        }
        if let Some(code) = self.exit_code {
            blocks.push(format!("Exit code: {}", code));
        }

        blocks.join("\n\n")
    }
}
