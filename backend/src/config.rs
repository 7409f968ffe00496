//! Application configuration.
//!
//! Centralized constants for the CLI and the HTTP server. Runtime
//! overrides come from command-line arguments only.

/// Default HTTP port for `demandsum serve`.
pub const DEFAULT_PORT: u16 = 3000;

/// Maximum upload size accepted by the HTTP API (in bytes).
///
/// 50 MB limit.
pub const MAX_FILE_SIZE: usize = 50 * 1024 * 1024;

/// Number of result rows shown in a preview.
pub const PREVIEW_ROWS: usize = 20;

/// Replaces the input extension in the suggested output file name.
pub const OUTPUT_SUFFIX: &str = "_FirmForecast_Sum.xlsx";

/// MIME type of the produced workbook.
pub const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// File extensions the reader accepts.
pub const ACCEPTED_EXTENSIONS: [&str; 3] = ["xlsx", "xls", "xlsb"];

/// Name of the single worksheet in the output workbook.
pub const OUTPUT_SHEET_NAME: &str = "Sheet1";

/// Capacity of the log broadcast channel.
pub const LOG_CHANNEL_CAPACITY: usize = 100;
