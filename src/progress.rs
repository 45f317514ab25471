//! Progress-callback trait for pipeline events.
//!
//! Inject an [`Arc<dyn PipelineProgressCallback>`] via
//! [`crate::config::PipelineConfigBuilder::progress_callback`] to observe a
//! run as it moves from submission through polling to written artifacts.
//! The one-shot CLI drives its spinner from these events.
//!
//! # Example
//!
//! ```rust
//! use crawl2mdc::{PipelineConfig, PipelineProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicU32, Ordering}};
//!
//! struct PollCounter {
//!     polls: AtomicU32,
//! }
//!
//! impl PipelineProgressCallback for PollCounter {
//!     fn on_poll_attempt(&self, _job_id: &str, attempt: u32, max_attempts: u32) {
//!         self.polls.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("poll {attempt}/{max_attempts}");
//!     }
//! }
//!
//! let counter = Arc::new(PollCounter { polls: AtomicU32::new(0) });
//! let config = PipelineConfig::builder()
//!     .progress_callback(counter as Arc<dyn PipelineProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the pipeline at each stage boundary.
///
/// Implementations must be `Send + Sync`: documents are written
/// concurrently, so `on_document_written` and `on_document_error` may fire
/// from different tasks at once. All methods default to no-ops.
pub trait PipelineProgressCallback: Send + Sync {
    /// The upstream accepted an asynchronous job.
    fn on_job_submitted(&self, job_id: &str, operation: &str) {
        let _ = (job_id, operation);
    }

    /// A status request is about to be sent.
    ///
    /// `attempt` is 1-based.
    fn on_poll_attempt(&self, job_id: &str, attempt: u32, max_attempts: u32) {
        let _ = (job_id, attempt, max_attempts);
    }

    /// Documents are in hand and about to be transformed.
    fn on_documents_ready(&self, total: usize) {
        let _ = total;
    }

    /// An artifact was written.
    fn on_document_written(&self, index: usize, total: usize, file_path: &str) {
        let _ = (index, total, file_path);
    }

    /// A single document failed; its siblings carry on.
    fn on_document_error(&self, index: usize, total: usize, error: &str) {
        let _ = (index, total, error);
    }

    /// Every document has settled.
    fn on_run_complete(&self, total: usize, success_count: usize) {
        let _ = (total, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl PipelineProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::PipelineConfig`].
pub type ProgressCallback = Arc<dyn PipelineProgressCallback>;
