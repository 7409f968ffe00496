//! # Demandsum - Firm+Forecast demand summaries
//!
//! Demandsum reads a demand-planning workbook and condenses it to one row per
//! part and vendor: Firm and Forecast demand summed, Firm stock of the
//! `TH3-SHTP` and `TD3-DDK` sites combined, buyer/planner metadata attached.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  Workbook   │────▶│   Parser    │────▶│  Aggregate  │────▶│   Writer    │
//! │ xlsx/xls/b  │     │ (calamine)  │     │ (group/join)│     │   (xlsx)    │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use demandsum::aggregate_file;
//!
//! let result = aggregate_file("plan.xlsb").unwrap();
//! println!("{}", result.table.render(20));
//! std::fs::write(&result.output_name, result.to_xlsx().unwrap()).unwrap();
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Error types per layer
//! - [`models`] - Cells, tables, source formats
//! - [`parser`] - Workbook decoding
//! - [`transform`] - Grouping, aggregation and pipeline
//! - [`writer`] - Workbook encoding
//! - [`api`] - HTTP API server and log stream
//! - [`config`] - Constants

// Core modules
pub mod config;
pub mod error;
pub mod models;

// Reading / writing
pub mod parser;
pub mod writer;

// Transformation
pub mod transform;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{AggregateError, PipelineError, ReadError, ServerError, WriteError};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{Cell, SourceFormat, Table};

// =============================================================================
// Re-exports - Parsing and writing
// =============================================================================

pub use parser::{detect_format, parse_bytes, parse_file, ParseResult};
pub use writer::{output_file_name, write_xlsx, write_xlsx_file};

// =============================================================================
// Re-exports - Aggregation
// =============================================================================

pub use transform::aggregate::aggregate;
pub use transform::pipeline::{aggregate_bytes, aggregate_file, AggregateOutcome, SourceInfo};

/// Pipeline entry points.
pub mod pipeline {
    pub use crate::transform::pipeline::*;
}

// Server
pub mod server {
    pub use crate::api::server::{router, start_server};
}
