//! Core data model: what goes up to the extraction API and what comes back.
//!
//! ```text
//! JobRequestInput ──validate──▶ JobRequest ──submit──▶ Submission
//!                                                     ├─ Direct(RawDocument)
//!                                                     └─ Async(JobHandle) ──poll──▶ JobStatus
//! ```

use crate::error::Crawl2MdcError;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ── Metadata ─────────────────────────────────────────────────────────────

/// Page metadata reported by the extraction API.
///
/// Upstream metadata is loosely typed: most values are strings, some meta
/// tags come back as string arrays when a page declares them twice, and the
/// rest (status codes, numbers, nested objects) are irrelevant here. Only
/// string values survive; for string arrays the first element is kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Metadata(BTreeMap<String, String>);

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, mostly for tests and the direct path.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Value for `key`, treating blank strings as absent.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    /// First non-blank value among `keys`, in order.
    pub fn first_of(&self, keys: &[&str]) -> Option<&str> {
        keys.iter().find_map(|k| self.get(k))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Build from an arbitrary JSON value; anything but an object is empty.
    pub fn from_json(value: &serde_json::Value) -> Self {
        let mut meta = Metadata::new();
        if let Some(obj) = value.as_object() {
            for (key, v) in obj {
                if let Some(s) = json_string(v) {
                    meta.insert(key.clone(), s);
                }
            }
        }
        meta
    }
}

fn json_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Array(items) => items.iter().find_map(|i| i.as_str().map(String::from)),
        _ => None,
    }
}

impl<'de> Deserialize<'de> for Metadata {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Option::<serde_json::Value>::deserialize(deserializer)?;
        Ok(value.map(|v| Metadata::from_json(&v)).unwrap_or_default())
    }
}

// ── Documents ────────────────────────────────────────────────────────────

/// A document as returned by the extraction API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawDocument {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub markdown: String,
    #[serde(default)]
    pub metadata: Metadata,
}

impl RawDocument {
    pub fn new(markdown: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            markdown: markdown.into(),
            metadata,
        }
    }
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

// ── Operation kind ───────────────────────────────────────────────────────

/// Which upstream operation a submit URL targets.
///
/// Decides both how scrape options are injected into the payload and which
/// status endpoint is polled afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    #[serde(rename = "scrape")]
    Scrape,
    #[serde(rename = "batch/scrape")]
    BatchScrape,
    #[serde(rename = "crawl")]
    Crawl,
    #[serde(rename = "unknown")]
    Unknown,
}

impl OperationKind {
    /// Classify a submit URL by its path. `/batch/scrape` is checked before
    /// `/scrape` since the former contains the latter.
    pub fn classify(target_url: &str) -> Self {
        let path = reqwest::Url::parse(target_url)
            .map(|u| u.path().to_string())
            .unwrap_or_else(|_| target_url.to_string());

        if path.contains("/batch/scrape") {
            OperationKind::BatchScrape
        } else if path.contains("/crawl") {
            OperationKind::Crawl
        } else if path.contains("/scrape") {
            OperationKind::Scrape
        } else {
            OperationKind::Unknown
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Scrape => "scrape",
            OperationKind::BatchScrape => "batch/scrape",
            OperationKind::Crawl => "crawl",
            OperationKind::Unknown => "unknown",
        }
    }

    /// Path segment of the status endpoint. Unknown operations are polled
    /// as plain scrapes.
    pub fn status_segment(&self) -> &'static str {
        match self {
            OperationKind::BatchScrape => "batch/scrape",
            OperationKind::Crawl => "crawl",
            OperationKind::Scrape | OperationKind::Unknown => "scrape",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Job request ──────────────────────────────────────────────────────────

/// The loosely-typed job description as received over the wire.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRequestInput {
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub body: Option<serde_json::Value>,
}

impl JobRequestInput {
    /// Check every required field, in wire order, before anything touches
    /// the network.
    pub fn validate(self) -> Result<JobRequest, Crawl2MdcError> {
        let target_url = self
            .url
            .filter(|u| !u.trim().is_empty())
            .ok_or(Crawl2MdcError::MissingTargetUrl)?;
        let credential = self
            .api_key
            .filter(|k| !k.trim().is_empty())
            .ok_or(Crawl2MdcError::MissingCredential)?;
        let payload = match self.body {
            None | Some(serde_json::Value::Null) => return Err(Crawl2MdcError::MissingPayload),
            Some(serde_json::Value::Object(map)) => map,
            Some(other) => {
                return Err(Crawl2MdcError::PayloadNotAnObject {
                    found: json_type_name(&other),
                })
            }
        };
        Ok(JobRequest {
            target_url,
            credential,
            payload,
        })
    }
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

/// A validated job description. Immutable once submitted.
#[derive(Clone)]
pub struct JobRequest {
    pub target_url: String,
    pub credential: String,
    pub payload: serde_json::Map<String, serde_json::Value>,
}

impl JobRequest {
    pub fn new(
        target_url: impl Into<String>,
        credential: impl Into<String>,
        payload: serde_json::Value,
    ) -> Result<Self, Crawl2MdcError> {
        JobRequestInput {
            url: Some(target_url.into()),
            api_key: Some(credential.into()),
            body: Some(payload),
        }
        .validate()
    }

    pub fn operation(&self) -> OperationKind {
        OperationKind::classify(&self.target_url)
    }
}

impl fmt::Debug for JobRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobRequest")
            .field("target_url", &self.target_url)
            .field("credential", &"<redacted>")
            .field("payload", &self.payload)
            .finish()
    }
}

// ── Submission outcome ───────────────────────────────────────────────────

/// An accepted asynchronous job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle {
    pub id: String,
    pub kind: OperationKind,
}

/// How the upstream answered a successful submission.
///
/// Resolved exactly once, right after submitting, so the rest of the
/// pipeline never has to re-inspect the raw response shape.
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    /// Content came back inline; there is no job to poll.
    Direct(RawDocument),
    /// The upstream queued a job.
    Async(JobHandle),
}

/// One observation of an asynchronous job.
#[derive(Debug, Clone, PartialEq)]
pub enum JobStatus {
    Pending { status: String },
    Completed { payload: serde_json::Value },
    Failed { message: String },
}

impl JobStatus {
    /// Interpret a status-endpoint response body.
    pub fn from_payload(payload: serde_json::Value) -> Self {
        match payload.get("status").and_then(|s| s.as_str()) {
            Some("completed") => JobStatus::Completed { payload },
            Some("failed") => JobStatus::Failed {
                message: payload
                    .get("error")
                    .and_then(|e| e.as_str())
                    .filter(|e| !e.is_empty())
                    .unwrap_or("Unknown error")
                    .to_string(),
            },
            other => JobStatus::Pending {
                status: other.unwrap_or("unknown").to_string(),
            },
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Pending { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn classify_operation_kinds() {
        let base = "https://api.firecrawl.dev/v1";
        assert_eq!(
            OperationKind::classify(&format!("{base}/batch/scrape")),
            OperationKind::BatchScrape
        );
        assert_eq!(
            OperationKind::classify(&format!("{base}/crawl")),
            OperationKind::Crawl
        );
        assert_eq!(
            OperationKind::classify(&format!("{base}/scrape")),
            OperationKind::Scrape
        );
        assert_eq!(
            OperationKind::classify(&format!("{base}/map")),
            OperationKind::Unknown
        );
    }

    #[test]
    fn classify_ignores_query_string() {
        assert_eq!(
            OperationKind::classify("https://api.example.com/v1/map?next=/crawl"),
            OperationKind::Unknown
        );
    }

    #[test]
    fn status_segments() {
        assert_eq!(OperationKind::Crawl.status_segment(), "crawl");
        assert_eq!(OperationKind::BatchScrape.status_segment(), "batch/scrape");
        assert_eq!(OperationKind::Scrape.status_segment(), "scrape");
        assert_eq!(OperationKind::Unknown.status_segment(), "scrape");
    }

    #[test]
    fn operation_kind_serialises_as_wire_name() {
        assert_eq!(
            serde_json::to_value(OperationKind::BatchScrape).unwrap(),
            json!("batch/scrape")
        );
    }

    #[test]
    fn metadata_keeps_strings_and_first_array_element() {
        let meta = Metadata::from_json(&json!({
            "title": "Docs",
            "ogTitle": ["First", "Second"],
            "statusCode": 200,
            "description": "   "
        }));
        assert_eq!(meta.get("title"), Some("Docs"));
        assert_eq!(meta.get("ogTitle"), Some("First"));
        assert_eq!(meta.get("statusCode"), None);
        assert_eq!(meta.get("description"), None, "blank counts as absent");
    }

    #[test]
    fn raw_document_tolerates_nulls() {
        let doc: RawDocument =
            serde_json::from_value(json!({"markdown": null, "metadata": null})).unwrap();
        assert_eq!(doc.markdown, "");
        assert!(doc.metadata.is_empty());
    }

    #[test]
    fn validate_reports_fields_in_order() {
        let err = JobRequestInput::default().validate().unwrap_err();
        assert!(matches!(err, Crawl2MdcError::MissingTargetUrl));

        let err = JobRequestInput {
            url: Some("https://api.firecrawl.dev/v1/crawl".into()),
            ..Default::default()
        }
        .validate()
        .unwrap_err();
        assert!(matches!(err, Crawl2MdcError::MissingCredential));

        let err = JobRequestInput {
            url: Some("https://api.firecrawl.dev/v1/crawl".into()),
            api_key: Some("fc-key".into()),
            body: Some(serde_json::Value::Null),
        }
        .validate()
        .unwrap_err();
        assert!(matches!(err, Crawl2MdcError::MissingPayload));

        let err = JobRequest::new("https://x/v1/scrape", "k", json!(["a"])).unwrap_err();
        assert!(matches!(
            err,
            Crawl2MdcError::PayloadNotAnObject { found: "an array" }
        ));
    }

    #[test]
    fn job_request_debug_redacts_credential() {
        let req = JobRequest::new("https://x/v1/scrape", "fc-secret", json!({})).unwrap();
        assert!(!format!("{req:?}").contains("fc-secret"));
    }

    #[test]
    fn job_status_from_payload() {
        assert!(matches!(
            JobStatus::from_payload(json!({"status": "scraping"})),
            JobStatus::Pending { .. }
        ));
        assert!(matches!(
            JobStatus::from_payload(json!({"status": "completed", "data": []})),
            JobStatus::Completed { .. }
        ));
        assert_eq!(
            JobStatus::from_payload(json!({"status": "failed"})),
            JobStatus::Failed {
                message: "Unknown error".into()
            }
        );
        assert_eq!(
            JobStatus::from_payload(json!({"status": "failed", "error": "blocked"})),
            JobStatus::Failed {
                message: "blocked".into()
            }
        );
    }
}
