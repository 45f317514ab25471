//! HTTP surface.
//!
//! | Method | Path                     | Body                                     |
//! |--------|--------------------------|------------------------------------------|
//! | POST   | `/api/generate-mdc-docs` | `{ firecrawlRequest, mdcOptions? }`      |
//! | POST   | `/api/docs`              | `{ data: [document], mdcOptions? }`      |
//! | GET    | `/health`                |                                          |
//!
//! Requests larger than [`PipelineConfig::max_payload_bytes`] are refused
//! with 413 before any processing.

use crate::config::PipelineConfig;
use crate::document::{JobRequestInput, OperationKind};
use crate::error::Crawl2MdcError;
use crate::output::PipelineOutput;
use crate::pipeline::transform::TransformOptions;
use crate::run::{parse_documents, run, run_direct};
use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Shared handler state.
pub struct AppState {
    pub config: PipelineConfig,
}

/// Build the application router.
pub fn router(config: PipelineConfig) -> Router {
    let body_limit = config.max_payload_bytes;
    let state = Arc::new(AppState { config });

    Router::new()
        .route("/health", get(health_handler))
        .route("/api/generate-mdc-docs", post(generate_handler))
        .route("/api/docs", post(docs_handler))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `addr` and serve until Ctrl-C.
pub async fn serve(addr: SocketAddr, config: PipelineConfig) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(config))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

// === Wire types ===

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    #[serde(default)]
    pub firecrawl_request: Option<JobRequestInput>,
    #[serde(default)]
    pub mdc_options: Option<TransformOptions>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocsRequest {
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub mdc_options: Option<TransformOptions>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedDocument {
    pub title: String,
    pub file_path: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FailedDocument {
    pub index: usize,
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    pub processed_documents: Vec<ProcessedDocument>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_documents: Vec<FailedDocument>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_type: Option<OperationKind>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub original_response: Value,
}

impl From<PipelineOutput> for GenerateResponse {
    fn from(output: PipelineOutput) -> Self {
        let processed_documents = output
            .artifacts()
            .map(|a| ProcessedDocument {
                title: a.title.clone(),
                file_path: a.path.to_string_lossy().replace('\\', "/"),
            })
            .collect();
        let failed_documents = output
            .failures()
            .map(|e| FailedDocument {
                index: e.index(),
                error: e.to_string(),
            })
            .collect();
        Self {
            success: true,
            job_id: output.job_id,
            processed_documents,
            failed_documents,
            operation_type: output.operation,
            original_response: output.original_response,
        }
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

// === Handlers ===

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn generate_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<Json<GenerateResponse>, ApiError> {
    let Json(request) = payload?;
    let job = request
        .firecrawl_request
        .ok_or(Crawl2MdcError::MissingJobRequest)?
        .validate()?;
    let operation = job.operation();
    let options = request.mdc_options.unwrap_or_default();

    let output = run(job, &options, &state.config)
        .await
        .map_err(|e| ApiError::pipeline(e, Some(operation)))?;
    Ok(Json(output.into()))
}

async fn docs_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<DocsRequest>, JsonRejection>,
) -> Result<Json<GenerateResponse>, ApiError> {
    let Json(request) = payload?;
    let docs = parse_documents(request.data)?;
    let options = request.mdc_options.unwrap_or_default();

    let output = run_direct(docs, &options, &state.config).await?;
    Ok(Json(output.into()))
}

// === Errors ===

/// Error body shared by every failing endpoint.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_type: Option<OperationKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// Everything a handler can fail with.
#[derive(Debug)]
pub enum ApiError {
    Pipeline {
        error: Crawl2MdcError,
        operation: Option<OperationKind>,
    },
    /// The body could not be read or parsed.
    Body { status: StatusCode, message: String },
}

impl ApiError {
    pub fn pipeline(error: Crawl2MdcError, operation: Option<OperationKind>) -> Self {
        ApiError::Pipeline { error, operation }
    }

    pub fn status_code(&self) -> StatusCode {
        let error = match self {
            ApiError::Body { status, .. } => return *status,
            ApiError::Pipeline { error, .. } => error,
        };
        if error.is_validation() {
            return StatusCode::BAD_REQUEST;
        }
        match error {
            Crawl2MdcError::UpstreamRejection { status, .. } => status
                .and_then(|s| StatusCode::from_u16(s).ok())
                .filter(|s| s.is_client_error() || s.is_server_error())
                .unwrap_or(StatusCode::BAD_REQUEST),
            Crawl2MdcError::NoContent { .. } | Crawl2MdcError::InvalidDocuments { .. } => {
                StatusCode::BAD_REQUEST
            }
            Crawl2MdcError::Http { .. } => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        let error = match self {
            ApiError::Body { status, .. } if *status == StatusCode::PAYLOAD_TOO_LARGE => {
                return "payload_too_large"
            }
            ApiError::Body { .. } => return "invalid_body",
            ApiError::Pipeline { error, .. } => error,
        };
        match error {
            e if e.is_validation() => "invalid_request",
            Crawl2MdcError::UpstreamRejection { .. } => "upstream_rejected",
            Crawl2MdcError::Http { .. } => "upstream_unreachable",
            Crawl2MdcError::NoContent { .. } => "no_content",
            Crawl2MdcError::InvalidDocuments { .. } => "invalid_documents",
            Crawl2MdcError::JobFailed { .. } => "job_failed",
            Crawl2MdcError::JobTimedOut { .. } => "job_timed_out",
            Crawl2MdcError::DocsDirUnavailable { .. } => "docs_dir_unavailable",
            Crawl2MdcError::AllDocumentsFailed { .. } => "all_documents_failed",
            Crawl2MdcError::InvalidConfig(_) => "config_error",
            _ => "internal_error",
        }
    }
}

impl From<Crawl2MdcError> for ApiError {
    fn from(error: Crawl2MdcError) -> Self {
        ApiError::pipeline(error, None)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        let status = rejection.status();
        let message = if status == StatusCode::PAYLOAD_TOO_LARGE {
            "Request payload too large".to_string()
        } else {
            rejection.body_text()
        };
        ApiError::Body { status, message }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code().to_string();

        let response = match self {
            ApiError::Body { message, .. } => ErrorResponse {
                success: false,
                error: message,
                code,
                operation_type: None,
                details: None,
            },
            ApiError::Pipeline { error, operation } => ErrorResponse {
                success: false,
                error: error.to_string(),
                code,
                operation_type: operation,
                details: error.upstream_payload().cloned(),
            },
        };

        if status.is_server_error() {
            error!(status = status.as_u16(), "{}", response.error);
        } else {
            warn!(status = status.as_u16(), "{}", response.error);
        }
        (status, Json(response)).into_response()
    }
}
