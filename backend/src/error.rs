//! Error types for the demand aggregation pipeline.
//!
//! One enum per layer:
//!
//! - [`ReadError`] - Spreadsheet decoding errors (the "format" errors)
//! - [`AggregateError`] - Schema and content errors raised by the aggregator
//! - [`WriteError`] - Output workbook serialization errors
//! - [`PipelineError`] - Top-level orchestration errors
//! - [`ServerError`] - HTTP boundary errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use thiserror::Error;

// =============================================================================
// Reader Errors
// =============================================================================

/// Errors while turning an uploaded file into a [`crate::models::Table`].
#[derive(Debug, Error)]
pub enum ReadError {
    /// Failed to read file.
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    /// Extension is not one of `.xlsx`, `.xls`, `.xlsb`.
    #[error("Unsupported file type '{0}' (expected .xlsx, .xls or .xlsb)")]
    UnsupportedExtension(String),

    /// The workbook could not be decoded for its declared format.
    #[error("Cannot decode spreadsheet: {0}")]
    Format(#[from] calamine::Error),

    /// The workbook has no worksheet.
    #[error("Workbook contains no worksheet")]
    NoSheet,

    /// The first worksheet has no header row.
    #[error("First worksheet is empty")]
    EmptySheet,
}

// =============================================================================
// Aggregation Errors
// =============================================================================

/// Errors raised by [`crate::transform::aggregate`].
#[derive(Debug, Error, PartialEq)]
pub enum AggregateError {
    /// A required column is absent after trimming.
    #[error("Missing required column: '{0}'")]
    MissingColumn(String),

    /// The demand range is inverted.
    #[error("Column '{start}' must come before '{end}'")]
    InvertedRange { start: String, end: String },

    /// No row survived the Firm/Forecast filter.
    #[error("No Firm or Forecast rows to aggregate")]
    EmptyInput,

    /// A summed column holds something that is not a number.
    #[error("Row {row}, column '{column}': '{value}' is not a number")]
    InvalidNumber {
        row: usize,
        column: String,
        value: String,
    },
}

// =============================================================================
// Writer Errors
// =============================================================================

/// Errors while serializing the result workbook.
#[derive(Debug, Error)]
pub enum WriteError {
    /// rust_xlsxwriter failure.
    #[error("Cannot write workbook: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    /// Table is wider or taller than a worksheet allows.
    #[error("Table does not fit in a worksheet ({rows} rows, {columns} columns)")]
    TooLarge { rows: usize, columns: usize },

    /// Failed to write the output file.
    #[error("Failed to write file: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level pipeline orchestration errors.
///
/// This is the main error type returned by
/// [`crate::transform::pipeline::aggregate_file`]. It wraps all lower-level
/// errors so the boundary layers can render one message.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Reader error.
    #[error("{0}")]
    Read(#[from] ReadError),

    /// Aggregation error.
    #[error("{0}")]
    Aggregate(#[from] AggregateError),

    /// Writer error.
    #[error("{0}")]
    Write(#[from] WriteError),
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Pipeline error.
    #[error("{0}")]
    Pipeline(#[from] PipelineError),

    /// Invalid request.
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Server internal error.
    #[error("Internal server error: {0}")]
    Internal(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for reader operations.
pub type ReadResult<T> = Result<T, ReadError>;

/// Result type for aggregation.
pub type AggregateResult<T> = Result<T, AggregateError>;

/// Result type for writer operations.
pub type WriteResult<T> = Result<T, WriteError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        // ReadError -> PipelineError
        let read_err = ReadError::EmptySheet;
        let pipeline_err: PipelineError = read_err.into();
        assert!(pipeline_err.to_string().contains("empty"));

        // AggregateError -> PipelineError -> ServerError
        let agg_err = AggregateError::MissingColumn("Past due".into());
        let pipeline_err: PipelineError = agg_err.into();
        let server_err: ServerError = pipeline_err.into();
        assert!(server_err.to_string().contains("Past due"));
    }

    #[test]
    fn test_invalid_number_format() {
        let err = AggregateError::InvalidNumber {
            row: 7,
            column: "Store_Qty".into(),
            value: "n/a".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("Row 7"));
        assert!(msg.contains("Store_Qty"));
        assert!(msg.contains("n/a"));
    }

    #[test]
    fn test_schema_messages() {
        let err = AggregateError::InvertedRange {
            start: "Past due".into(),
            end: "Total_Demand".into(),
        };
        assert_eq!(err.to_string(), "Column 'Past due' must come before 'Total_Demand'");
    }
}
