//! Error types for the crawl2mdc library.
//!
//! Three error types reflect three failure modes:
//!
//! * [`Crawl2MdcError`]: **Fatal**: the run cannot produce any artifacts
//!   (invalid request, upstream rejected the job, polling failed or timed
//!   out). Returned as `Err(Crawl2MdcError)` from [`crate::run`].
//!
//! * [`DocumentError`]: **Non-fatal**: a single document could not be
//!   written while its siblings were fine. Stored inside
//!   [`crate::output::DocumentResult`] so one bad document never costs the
//!   rest of the batch.
//!
//! * [`FormatError`]: **Swallowed**: the markdown formatter gave up. The
//!   caller falls back to the unformatted body and only logs the failure.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the crawl2mdc library.
#[derive(Debug, Error)]
pub enum Crawl2MdcError {
    // ── Validation errors ─────────────────────────────────────────────────
    /// The inbound request did not carry a job description at all.
    #[error("firecrawlRequest object is required")]
    MissingJobRequest,

    /// `firecrawlRequest.url` was absent or blank.
    #[error("firecrawlRequest.url is required")]
    MissingTargetUrl,

    /// `firecrawlRequest.apiKey` was absent or blank.
    #[error("firecrawlRequest.apiKey is required")]
    MissingCredential,

    /// `firecrawlRequest.body` was absent or null.
    #[error("firecrawlRequest.body is required")]
    MissingPayload,

    /// `firecrawlRequest.body` was present but not a JSON object.
    #[error("firecrawlRequest.body must be a JSON object, got {found}")]
    PayloadNotAnObject { found: &'static str },

    /// A direct-submission request did not carry a document array.
    #[error("Documents must be an array")]
    DocumentsNotAnArray,

    // ── Upstream errors ───────────────────────────────────────────────────
    /// The submission reached the upstream API but was refused.
    #[error("Firecrawl API {operation} request failed")]
    UpstreamRejection {
        operation: String,
        status: Option<u16>,
        payload: serde_json::Value,
    },

    /// The submit call never produced a response (connect error, timeout).
    #[error("Failed to reach Firecrawl API at '{url}': {reason}")]
    Http { url: String, reason: String },

    /// Upstream accepted the submission synchronously but returned nothing usable.
    #[error("No job ID or direct markdown content found in API response")]
    NoContent { payload: serde_json::Value },

    /// The completed job's result was not a sequence of documents.
    #[error("Retrieved data is not an array of documents: {reason}")]
    InvalidDocuments {
        reason: String,
        payload: serde_json::Value,
    },

    // ── Polling errors ────────────────────────────────────────────────────
    /// Upstream explicitly reported the job as failed.
    #[error("Job failed: {message}")]
    JobFailed { job_id: String, message: String },

    /// The job never reached a terminal state within the attempt budget.
    #[error("Job {job_id} did not complete after {attempts} polling attempts")]
    JobTimedOut { job_id: String, attempts: u32 },

    // ── Output errors ─────────────────────────────────────────────────────
    /// The docs directory could not be created.
    #[error("Failed to create docs directory '{path}': {source}")]
    DocsDirUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Every document in the batch failed to transform.
    #[error("All {total} documents failed to transform.\nFirst error: {first_error}")]
    AllDocumentsFailed { total: usize, first_error: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Crawl2MdcError {
    /// True for the failures caused by a malformed inbound request.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Crawl2MdcError::MissingJobRequest
                | Crawl2MdcError::MissingTargetUrl
                | Crawl2MdcError::MissingCredential
                | Crawl2MdcError::MissingPayload
                | Crawl2MdcError::PayloadNotAnObject { .. }
                | Crawl2MdcError::DocumentsNotAnArray
        )
    }

    /// True when the job itself failed or ran out of polling attempts.
    pub fn is_polling_failure(&self) -> bool {
        matches!(
            self,
            Crawl2MdcError::JobFailed { .. } | Crawl2MdcError::JobTimedOut { .. }
        )
    }

    /// The raw upstream payload attached to this error, if any.
    pub fn upstream_payload(&self) -> Option<&serde_json::Value> {
        match self {
            Crawl2MdcError::UpstreamRejection { payload, .. }
            | Crawl2MdcError::NoContent { payload }
            | Crawl2MdcError::InvalidDocuments { payload, .. } => Some(payload),
            _ => None,
        }
    }
}

/// A non-fatal error for a single document.
///
/// Stored alongside [`crate::output::DocumentResult`] when a document fails.
/// The batch continues unless every document fails.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum DocumentError {
    /// Writing the artifact to disk failed.
    #[error("Document {index}: failed to write '{path}': {detail}")]
    WriteFailed {
        index: usize,
        path: PathBuf,
        detail: String,
    },

    /// The transformation task itself died (panic inside the formatter etc.).
    #[error("Document {index}: transformation aborted: {detail}")]
    Aborted { index: usize, detail: String },
}

impl DocumentError {
    /// Zero-based position of the failing document in its batch.
    pub fn index(&self) -> usize {
        match self {
            DocumentError::WriteFailed { index, .. } | DocumentError::Aborted { index, .. } => {
                *index
            }
        }
    }
}

/// The markdown formatter could not produce a faithful rendering.
#[derive(Debug, Clone, Error)]
pub enum FormatError {
    /// The reformatted text no longer carries the same content.
    #[error("formatted output diverged from the source near {near:?}")]
    ContentChanged { near: String },

    /// The formatter refused the input.
    #[error("formatter rejected input: {0}")]
    Rejected(String),
}
