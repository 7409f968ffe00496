//! High-level pipeline API: read → aggregate → export.
//!
//! # Example
//!
//! ```rust,ignore
//! use demandsum::pipeline::aggregate_file;
//!
//! let result = aggregate_file("plan.xlsb")?;
//! println!("{} part/vendor rows", result.table.row_count());
//! std::fs::write(&result.output_name, result.to_xlsx()?)?;
//! ```

use serde::Serialize;
use std::path::Path;

use super::aggregate::aggregate;
use crate::api::logs::{log_error, log_info, log_success, log_warning};
use crate::error::{PipelineResult, WriteResult};
use crate::models::columns::{IQC_QTY, SITE, STORE_QTY};
use crate::models::{Cell, SourceFormat, Table};
use crate::parser::{detect_format, parse_bytes, parse_file, ParseResult};
use crate::writer::{output_file_name, write_xlsx};

/// Source workbook information
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceInfo {
    pub file_name: String,
    pub format: SourceFormat,
    pub sheet_name: String,
    pub columns: Vec<String>,
    pub row_count: usize,
}

/// Result of a complete aggregation run
#[derive(Debug, Clone)]
pub struct AggregateOutcome {
    /// Aggregated table, final column order
    pub table: Table,

    /// Suggested download name
    pub output_name: String,

    /// What was read
    pub source: SourceInfo,
}

impl AggregateOutcome {
    /// First `n` result rows.
    pub fn preview(&self, n: usize) -> &[Vec<Cell>] {
        self.table.head(n)
    }

    /// Serialize the result as an `.xlsx` workbook.
    pub fn to_xlsx(&self) -> WriteResult<Vec<u8>> {
        write_xlsx(&self.table)
    }
}

/// Aggregate a workbook on disk.
pub fn aggregate_file<P: AsRef<Path>>(path: P) -> PipelineResult<AggregateOutcome> {
    let path = path.as_ref();
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());

    log_info(format!("📖 Reading {}", path.display()));
    let parsed = parse_file(path).map_err(logged)?;
    run(parsed, &file_name)
}

/// Aggregate uploaded workbook bytes. `file_name` decides the decoder.
pub fn aggregate_bytes(bytes: &[u8], file_name: &str) -> PipelineResult<AggregateOutcome> {
    log_info(format!("📖 Reading {} ({} bytes)", file_name, bytes.len()));
    let parsed = detect_format(file_name)
        .and_then(|format| parse_bytes(bytes, format))
        .map_err(logged)?;
    run(parsed, file_name)
}

/// Report an error on the log stream before it propagates.
fn logged<E: std::fmt::Display>(e: E) -> E {
    log_error(e.to_string());
    e
}

fn run(parsed: ParseResult, file_name: &str) -> PipelineResult<AggregateOutcome> {
    log_success(format!(
        "Read sheet '{}' ({}): {} rows, {} columns",
        parsed.sheet_name,
        parsed.format,
        parsed.table.row_count(),
        parsed.table.column_count()
    ));

    let source = SourceInfo {
        file_name: file_name.to_string(),
        format: parsed.format,
        sheet_name: parsed.sheet_name,
        columns: parsed.table.columns().to_vec(),
        row_count: parsed.table.row_count(),
    };

    for optional in [SITE, STORE_QTY, IQC_QTY] {
        if !source.columns.iter().any(|c| c.trim() == optional) {
            log_warning(format!("No '{}' column: stock quantities will be empty or 0", optional));
        }
    }

    log_info("⚙️  Aggregating Firm+Forecast demand...");
    let table = aggregate(parsed.table).map_err(logged)?;
    log_success(format!(
        "{} part/vendor rows, {} columns",
        table.row_count(),
        table.column_count()
    ));

    Ok(AggregateOutcome {
        table,
        output_name: output_file_name(file_name),
        source,
    })
}
