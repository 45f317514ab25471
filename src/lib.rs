//! # crawl2mdc
//!
//! Turn Firecrawl extraction jobs into `.mdc` documentation files for
//! AI-assisted editors.
//!
//! A job description (target URL, credential, payload) is submitted to the
//! extraction API. The answer is either the finished page inline or a job
//! id, which is polled until the job completes, fails, or runs out of
//! attempts. Every resulting markdown document is then titled, formatted,
//! given YAML front matter and written to the docs directory.
//!
//! ## Pipeline Overview
//!
//! ```text
//! JobRequest
//!  │
//!  ├─ 1. Submit     augment payload, POST once, classify the answer
//!  ├─ 2. Poll       fixed-interval status loop (async jobs only)
//!  ├─ 3. Title      metadata → headings → first line → doc-{ts}-{token}
//!  ├─ 4. Format     best-effort prose re-wrap, falls back to the raw body
//!  └─ 5. Write      front matter + body → <docs_dir>/<stem>.mdc
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use crawl2mdc::{run, JobRequest, PipelineConfig, TransformOptions};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let request = JobRequest::new(
//!         "https://api.firecrawl.dev/v1/crawl",
//!         std::env::var("FIRECRAWL_API_KEY")?,
//!         json!({ "url": "https://docs.example.org", "limit": 10 }),
//!     )?;
//!     let config = PipelineConfig::default();
//!     let output = run(request, &TransformOptions::default(), &config).await?;
//!     for artifact in output.artifacts() {
//!         println!("{}", artifact.path.display());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `server` | on      | axum router for the HTTP endpoints |
//! | `cli`    | on      | The `crawl2mdc` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable both when using only the library:
//! ```toml
//! crawl2mdc = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod client;
pub mod config;
pub mod document;
pub mod error;
pub mod naming;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod run;
#[cfg(feature = "server")]
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use client::{FirecrawlClient, ScrapeApi, UpstreamResponse};
pub use config::{PipelineConfig, PipelineConfigBuilder, ScrapeOptions, DEFAULT_API_BASE};
pub use document::{
    JobHandle, JobRequest, JobRequestInput, JobStatus, Metadata, OperationKind, RawDocument,
    Submission,
};
pub use error::{Crawl2MdcError, DocumentError, FormatError};
pub use naming::{NameSource, SequenceNameSource, SystemNameSource};
pub use output::{Artifact, DocumentResult, PipelineOutput, RunStats};
pub use pipeline::format::{MarkdownFormatter, ProseFormatter};
pub use pipeline::transform::{TransformMode, TransformOptions};
pub use progress::{NoopProgressCallback, PipelineProgressCallback, ProgressCallback};
pub use run::{parse_documents, run, run_direct};
