//! Output types: written artifacts and per-run summaries.

use crate::document::OperationKind;
use crate::error::DocumentError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A persisted, front-matter-annotated document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    /// Filesystem-safe stem, also the reported `title`.
    pub title: String,
    /// Human-readable title written into the front matter.
    pub display_title: String,
    /// Ordered front-matter fields.
    pub front_matter: Vec<(String, String)>,
    /// `from:` annotation between front matter and body (crawl path only).
    pub source_url: Option<String>,
    /// Formatted markdown body.
    pub body: String,
    /// File name relative to the docs directory, e.g. `getting-started.mdc`.
    pub relative_path: String,
    /// Where the artifact was written.
    pub path: PathBuf,
}

impl Artifact {
    /// Serialise to the on-disk MDC text.
    pub fn render(&self) -> String {
        let mut out = String::from("---\n");
        for (key, value) in &self.front_matter {
            out.push_str(key);
            out.push_str(": ");
            out.push_str(value);
            out.push('\n');
        }
        out.push_str("---\n\n");
        if let Some(ref url) = self.source_url {
            out.push_str("from: ");
            out.push_str(url);
            out.push_str("\n\n");
        }
        out.push_str(&self.body);
        out
    }

    /// Value of a front-matter field.
    pub fn front_matter_value(&self, key: &str) -> Option<&str> {
        self.front_matter
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Outcome of transforming one document of a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentResult {
    /// Zero-based position in the batch.
    pub index: usize,
    /// The written artifact; `None` when `error` is set.
    pub artifact: Option<Artifact>,
    pub duration_ms: u64,
    pub error: Option<DocumentError>,
}

/// Timing and counts for one pipeline run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunStats {
    pub total_documents: usize,
    pub written_documents: usize,
    pub failed_documents: usize,
    /// Status requests issued; 0 on the direct path.
    pub poll_attempts: u32,
    pub poll_duration_ms: u64,
    pub transform_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Everything a successful run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineOutput {
    /// Upstream job id; `None` when content came back synchronously.
    pub job_id: Option<String>,
    /// Upstream operation; `None` for documents handed over directly.
    pub operation: Option<OperationKind>,
    /// Per-document results in batch order.
    pub documents: Vec<DocumentResult>,
    /// Upstream payload echoed back to the caller for diagnosis.
    pub original_response: serde_json::Value,
    pub stats: RunStats,
}

impl PipelineOutput {
    /// Artifacts that were written, in batch order.
    pub fn artifacts(&self) -> impl Iterator<Item = &Artifact> {
        self.documents.iter().filter_map(|d| d.artifact.as_ref())
    }

    /// Per-document failures, in batch order.
    pub fn failures(&self) -> impl Iterator<Item = &DocumentError> {
        self.documents.iter().filter_map(|d| d.error.as_ref())
    }
}
