//! REST API types.
//!
//! The preview endpoint returns the first rows of the summary as JSON; the
//! workbook itself is served by the download endpoint.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::config::PREVIEW_ROWS;
use crate::models::Cell;
use crate::transform::pipeline::{AggregateOutcome, SourceInfo};

/// Response sent after an upload is aggregated.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewResponse {
    /// Unique job identifier
    pub job_id: String,

    /// Always "ready"; failures use [`error_response`]
    pub status: String,

    /// Suggested name of the downloadable workbook
    pub output_name: String,

    /// Result columns, final order
    pub columns: Vec<String>,

    /// First rows of the result, one array of cells per row
    pub preview: Vec<Vec<Cell>>,

    /// Metadata about the run
    pub metadata: ResponseMetadata,
}

/// Metadata about the run
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMetadata {
    /// Number of aggregated rows
    pub total_rows: usize,

    /// Rows included in `preview`
    pub preview_rows: usize,

    /// Uploaded workbook info
    pub source: SourceInfo,
}

impl From<AggregateOutcome> for PreviewResponse {
    fn from(result: AggregateOutcome) -> Self {
        let preview = result.preview(PREVIEW_ROWS).to_vec();

        PreviewResponse {
            job_id: Uuid::new_v4().to_string(),
            status: "ready".to_string(),
            output_name: result.output_name,
            columns: result.table.columns().to_vec(),
            metadata: ResponseMetadata {
                total_rows: result.table.row_count(),
                preview_rows: preview.len(),
                source: result.source,
            },
            preview,
        }
    }
}

/// Error body shared by every endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub job_id: String,
    pub status: String,
    pub error: String,
}

/// Create an error response
pub fn error_response(error: &str) -> Value {
    json!(ErrorBody {
        job_id: Uuid::new_v4().to_string(),
        status: "error".to_string(),
        error: error.to_string(),
    })
}
