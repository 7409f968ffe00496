//! HTTP Server for the demand summary API.
//!
//! Upload a planning workbook, get a preview or the summarized workbook back.
//! Nothing is stored between requests.
//!
//! # API Endpoints
//!
//! | Method | Path              | Description                              |
//! |--------|-------------------|------------------------------------------|
//! | GET    | `/health`         | Health check                             |
//! | POST   | `/api/preview`    | Upload a workbook, get the first rows    |
//! | POST   | `/api/aggregate`  | Upload a workbook, download the summary  |
//! | GET    | `/api/logs`       | SSE stream for real-time logs            |

use axum::{
    extract::{DefaultBodyLimit, Multipart},
    http::{header, HeaderValue, Method, StatusCode},
    response::{sse::Event, IntoResponse, Json, Response, Sse},
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::{convert::Infallible, net::SocketAddr, time::Duration};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;

use super::logs::LOG_BROADCASTER;
use super::types::{error_response, PreviewResponse};
use crate::config::{ACCEPTED_EXTENSIONS, MAX_FILE_SIZE, XLSX_MIME};
use crate::error::{PipelineError, ServerError, ServerResult};
use crate::transform::pipeline::{aggregate_bytes, AggregateOutcome};

type ApiError = (StatusCode, Json<Value>);

/// Build the application router.
pub fn router() -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE, header::CONTENT_DISPOSITION]);

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/preview", post(preview))
        .route("/api/aggregate", post(download))
        .route("/api/logs", get(sse_logs))
        .layer(DefaultBodyLimit::max(MAX_FILE_SIZE))
        .layer(cors)
}

/// Start the HTTP server
pub async fn start_server(port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    println!("🚀 Demandsum server running on http://localhost:{}", port);
    println!("   POST /api/preview   - Upload workbook, preview summary");
    println!("   POST /api/aggregate - Upload workbook, download summary");
    println!("   GET  /api/logs      - SSE log stream");
    println!("   GET  /health        - Health check");
    println!();

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router()).await?;

    Ok(())
}

/// Health check endpoint
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "demandsum",
        "version": env!("CARGO_PKG_VERSION"),
        "accepts": ACCEPTED_EXTENSIONS,
        "endpoints": {
            "preview": "POST /api/preview",
            "aggregate": "POST /api/aggregate",
            "logs": "GET /api/logs (SSE)"
        }
    }))
}

/// SSE endpoint for real-time log streaming
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(entry) => {
            let json = serde_json::to_string(&entry).ok()?;
            Some(Ok(Event::default().data(json)))
        }
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// Preview endpoint: JSON with the first rows of the summary
async fn preview(multipart: Multipart) -> Result<Json<PreviewResponse>, ApiError> {
    let result = process_upload(multipart).await.map_err(api_error)?;
    Ok(Json(PreviewResponse::from(result)))
}

/// Download endpoint: the summary workbook as an attachment
async fn download(multipart: Multipart) -> Result<Response, ApiError> {
    let result = process_upload(multipart).await.map_err(api_error)?;
    let bytes = result
        .to_xlsx()
        .map_err(|e| api_error(PipelineError::from(e).into()))?;

    let disposition = format!(
        "attachment; filename=\"{}\"",
        header_safe(&result.output_name)
    );
    let disposition = HeaderValue::from_str(&disposition)
        .map_err(|e| api_error(ServerError::Internal(e.to_string())))?;

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(XLSX_MIME)),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

/// Read the `file` field and run the pipeline off the async runtime.
async fn process_upload(multipart: Multipart) -> ServerResult<AggregateOutcome> {
    let (file_name, bytes) = read_file_field(multipart).await?;

    println!("\n{}", "=".repeat(70));
    println!("📄 NEW UPLOAD: {} ({} bytes)", file_name, bytes.len());
    println!("{}\n", "=".repeat(70));

    tokio::task::spawn_blocking(move || aggregate_bytes(&bytes, &file_name))
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))?
        .map_err(ServerError::from)
}

async fn read_file_field(mut multipart: Multipart) -> ServerResult<(String, Vec<u8>)> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Multipart error: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| ServerError::BadRequest("File has no name".to_string()))?;
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ServerError::BadRequest(format!("Read error: {}", e)))?;
        return Ok((file_name, bytes.to_vec()));
    }

    Err(ServerError::BadRequest("No file provided".to_string()))
}

/// Map a server error to a status code and the shared error body.
fn api_error(err: ServerError) -> ApiError {
    eprintln!("❌ {}", err);
    (status_for(&err), Json(error_response(&err.to_string())))
}

fn status_for(err: &ServerError) -> StatusCode {
    use crate::error::ReadError;

    match err {
        ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
        ServerError::Pipeline(PipelineError::Read(ReadError::UnsupportedExtension(_))) => {
            StatusCode::BAD_REQUEST
        }
        ServerError::Pipeline(PipelineError::Read(_) | PipelineError::Aggregate(_)) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        ServerError::Pipeline(PipelineError::Write(_)) | ServerError::Internal(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Replace anything a quoted header parameter cannot carry.
fn header_safe(name: &str) -> String {
    name.chars()
        .map(|c| {
            if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
