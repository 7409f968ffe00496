//! Domain models for the demand aggregation pipeline.
//!
//! This module contains the core data structures used throughout the pipeline:
//!
//! - [`Cell`] - One spreadsheet value
//! - [`Table`] - Named columns plus rows of cells
//! - [`SourceFormat`] - Which decoder an uploaded workbook needs
//! - [`columns`] - Well-known column names of the planning sheet

use chrono::{NaiveDateTime, Timelike};
use serde::Serialize;
use std::fmt;
use std::path::Path;

// =============================================================================
// Column Names
// =============================================================================

/// Column names the aggregator looks up.
pub mod columns {
    pub const PART_NO: &str = "Part_No";
    pub const VENDOR_CODE: &str = "Vendor_Code";
    pub const TYPE: &str = "Type";
    pub const SITE: &str = "Site";
    pub const STORE_QTY: &str = "Store_Qty";
    pub const IQC_QTY: &str = "IQC_QTY";
    pub const PAST_DUE: &str = "Past due";
    pub const TOTAL_DEMAND: &str = "Total_Demand";

    pub const BUYER: &str = "Buyer";
    pub const PLANNER: &str = "Planner";
    pub const VENDOR: &str = "Vendor";
    pub const ORG: &str = "Org";

    /// Optional per-key descriptive columns, copied from the first matching row.
    pub const METADATA: [&str; 5] = [BUYER, PLANNER, VENDOR, ORG, SITE];

    /// Columns removed from the final table.
    pub const DROPPED: [&str; 2] = [TOTAL_DEMAND, SITE];
}

// =============================================================================
// Cell
// =============================================================================

/// A single spreadsheet value.
///
/// Serializes as a bare JSON scalar (`null` for [`Cell::Empty`]).
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(untagged)]
pub enum Cell {
    #[default]
    Empty,
    Number(f64),
    Bool(bool),
    Text(String),
    DateTime(NaiveDateTime),
}

impl Cell {
    /// Text content, if this is a text cell.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric value for summation.
    ///
    /// Blank counts as 0 and booleans as 1/0. Text is accepted when it
    /// parses as a number once trimmed. Returns `None` for anything else.
    pub fn to_number(&self) -> Option<f64> {
        match self {
            Cell::Empty => Some(0.0),
            Cell::Number(n) => Some(*n),
            Cell::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Cell::Text(s) => {
                let s = s.trim();
                if s.is_empty() {
                    Some(0.0)
                } else {
                    s.parse::<f64>().ok().filter(|n| n.is_finite())
                }
            }
            Cell::DateTime(_) => None,
        }
    }
}

impl From<f64> for Cell {
    fn from(n: f64) -> Self {
        Cell::Number(n)
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        Cell::Text(s)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Number(n) => write!(f, "{}", format_number(*n)),
            Cell::Bool(b) => write!(f, "{}", b),
            Cell::Text(s) => write!(f, "{}", s),
            Cell::DateTime(dt) => write!(f, "{}", format_datetime(dt)),
        }
    }
}

/// Whole numbers print without a fractional part.
fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{:.0}", n)
    } else {
        n.to_string()
    }
}

/// `YYYY-MM-DD`, with the time appended only when it is not midnight.
pub fn format_datetime(dt: &NaiveDateTime) -> String {
    if dt.num_seconds_from_midnight() == 0 {
        dt.format("%Y-%m-%d").to_string()
    } else {
        dt.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

// =============================================================================
// Table
// =============================================================================

/// Ordered columns and rows. Every row has exactly one cell per column.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    /// Create an empty table with the given header.
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Create a table from a header and rows. Rows are padded with
    /// [`Cell::Empty`] or truncated to the header width.
    pub fn with_rows(columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        let mut table = Self::new(columns);
        for row in rows {
            table.push_row(row);
        }
        table
    }

    /// Append a row, fitting it to the header width.
    pub fn push_row(&mut self, mut row: Vec<Cell>) {
        row.resize(self.columns.len(), Cell::Empty);
        self.rows.push(row);
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of the first column with this exact name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Cell at `row` in column `name`.
    pub fn cell(&self, row: usize, name: &str) -> Option<&Cell> {
        let col = self.column_index(name)?;
        self.rows.get(row).and_then(|r| r.get(col))
    }

    /// Strip leading and trailing whitespace from every column name.
    pub fn trim_columns(&mut self) {
        for name in &mut self.columns {
            let trimmed = name.trim();
            if trimmed.len() != name.len() {
                *name = trimmed.to_string();
            }
        }
    }

    /// Remove every column whose name is in `names`. Unknown names are ignored.
    pub fn drop_columns(&mut self, names: &[&str]) {
        let keep: Vec<bool> = self
            .columns
            .iter()
            .map(|c| !names.contains(&c.as_str()))
            .collect();
        if keep.iter().all(|k| *k) {
            return;
        }

        self.columns = retain_by_mask(std::mem::take(&mut self.columns), &keep);
        for row in &mut self.rows {
            *row = retain_by_mask(std::mem::take(row), &keep);
        }
    }

    /// First `n` rows.
    pub fn head(&self, n: usize) -> &[Vec<Cell>] {
        &self.rows[..n.min(self.rows.len())]
    }

    /// Plain-text grid of the header and the first `limit` rows.
    pub fn render(&self, limit: usize) -> String {
        let body: Vec<Vec<String>> = self
            .head(limit)
            .iter()
            .map(|row| row.iter().map(|c| c.to_string()).collect())
            .collect();

        let mut widths: Vec<usize> = self.columns.iter().map(|c| c.chars().count()).collect();
        for row in &body {
            for (w, value) in widths.iter_mut().zip(row) {
                *w = (*w).max(value.chars().count());
            }
        }

        let line = |cells: &[String]| -> String {
            cells
                .iter()
                .zip(&widths)
                .map(|(value, w)| format!("{:<width$}", value, width = *w))
                .collect::<Vec<_>>()
                .join(" | ")
                .trim_end()
                .to_string()
        };

        let mut out = String::new();
        out.push_str(&line(self.columns.as_slice()));
        out.push('\n');
        out.push_str(
            &widths
                .iter()
                .map(|w| "-".repeat(*w))
                .collect::<Vec<_>>()
                .join("-+-"),
        );
        out.push('\n');
        for row in &body {
            out.push_str(&line(row.as_slice()));
            out.push('\n');
        }
        out
    }
}

fn retain_by_mask<T>(items: Vec<T>, keep: &[bool]) -> Vec<T> {
    items
        .into_iter()
        .zip(keep)
        .filter_map(|(item, k)| k.then_some(item))
        .collect()
}

// =============================================================================
// Source Format
// =============================================================================

/// Workbook flavour, decided by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    /// Office Open XML workbook.
    Xlsx,
    /// Legacy BIFF workbook.
    Xls,
    /// Binary Office Open XML workbook.
    Xlsb,
}

impl SourceFormat {
    /// Parse an extension, with or without the leading dot, any case.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim().trim_start_matches('.').to_lowercase().as_str() {
            "xlsx" => Some(Self::Xlsx),
            "xls" => Some(Self::Xls),
            "xlsb" => Some(Self::Xlsb),
            _ => None,
        }
    }

    /// Detect the format from a file name or path.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<Self> {
        path.as_ref()
            .extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    /// Lowercase extension without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Xlsx => "xlsx",
            Self::Xls => "xls",
            Self::Xlsb => "xlsb",
        }
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ".{}", self.extension())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn names(cols: &[&str]) -> Vec<String> {
        cols.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_to_number_rules() {
        assert_eq!(Cell::Empty.to_number(), Some(0.0));
        assert_eq!(Cell::Number(2.5).to_number(), Some(2.5));
        assert_eq!(Cell::Bool(true).to_number(), Some(1.0));
        assert_eq!(Cell::from("  12 ").to_number(), Some(12.0));
        assert_eq!(Cell::from("   ").to_number(), Some(0.0));
        assert_eq!(Cell::from("n/a").to_number(), None);
        assert_eq!(Cell::from("NaN").to_number(), None);
    }

    #[test]
    fn test_cell_display() {
        assert_eq!(Cell::Number(10.0).to_string(), "10");
        assert_eq!(Cell::Number(1.25).to_string(), "1.25");
        assert_eq!(Cell::Empty.to_string(), "");

        let midnight = NaiveDate::from_ymd_opt(2024, 10, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(Cell::DateTime(midnight).to_string(), "2024-10-01");
    }

    #[test]
    fn test_cell_serializes_as_scalar() {
        let row = vec![Cell::Empty, Cell::Number(3.0), Cell::from("A")];
        let json = serde_json::to_string(&row).unwrap();
        assert_eq!(json, r#"[null,3.0,"A"]"#);
    }

    #[test]
    fn test_push_row_fits_width() {
        let mut table = Table::new(names(&["a", "b"]));
        table.push_row(vec![Cell::from("x")]);
        table.push_row(vec![Cell::from("1"), Cell::from("2"), Cell::from("3")]);

        assert_eq!(table.rows()[0], vec![Cell::from("x"), Cell::Empty]);
        assert_eq!(table.rows()[1].len(), 2);
    }

    #[test]
    fn test_trim_columns() {
        let mut table = Table::new(names(&[" Part_No ", "Past due\t", "Type"]));
        table.trim_columns();
        assert_eq!(table.columns(), &names(&["Part_No", "Past due", "Type"])[..]);
        assert!(table.has_column("Past due"));
    }

    #[test]
    fn test_drop_columns() {
        let mut table = Table::with_rows(
            names(&["a", "Site", "b", "Total_Demand"]),
            vec![vec![
                Cell::from("1"),
                Cell::from("TH3"),
                Cell::from("2"),
                Cell::Number(9.0),
            ]],
        );
        table.drop_columns(&columns::DROPPED);

        assert_eq!(table.columns(), &names(&["a", "b"])[..]);
        assert_eq!(table.rows()[0], vec![Cell::from("1"), Cell::from("2")]);
    }

    #[test]
    fn test_render_preview() {
        let table = Table::with_rows(
            names(&["Part_No", "Qty"]),
            vec![
                vec![Cell::from("A"), Cell::Number(5.0)],
                vec![Cell::from("B"), Cell::Number(7.0)],
            ],
        );
        let text = table.render(1);
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "Part_No | Qty");
        assert_eq!(lines[2], "A       | 5");
    }

    #[test]
    fn test_source_format_detection() {
        assert_eq!(SourceFormat::from_extension(".XLSB"), Some(SourceFormat::Xlsb));
        assert_eq!(SourceFormat::from_extension("xls"), Some(SourceFormat::Xls));
        assert_eq!(SourceFormat::from_path("plan.v2.xlsx"), Some(SourceFormat::Xlsx));
        assert_eq!(SourceFormat::from_path("plan.csv"), None);
        assert_eq!(SourceFormat::from_path("plan"), None);
    }
}
