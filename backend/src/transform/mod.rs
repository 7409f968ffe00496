//! Transformation module.
//!
//! This module handles the Firm+Forecast summary:
//! - Grouper: composite-key grouping, sums and joins
//! - Aggregate: the fixed reshaping of a planning sheet
//! - Pipeline: read, aggregate and export in one call

pub mod aggregate;
pub mod grouper;
pub mod pipeline;

pub use aggregate::{aggregate, ColumnLayout, SiteStock};
pub use grouper::{GroupKey, KeyColumns, KeyPart};
pub use pipeline::*;
