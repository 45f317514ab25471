//! Upstream extraction API client.
//!
//! [`ScrapeApi`] is the seam between the pipeline and the network: the
//! built-in [`FirecrawlClient`] speaks HTTP via reqwest, tests plug in
//! in-memory fakes through [`crate::config::PipelineConfigBuilder::api`].

use crate::document::JobHandle;
use crate::error::Crawl2MdcError;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Raw answer of a submit call.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamResponse {
    /// HTTP status code.
    pub status: u16,
    /// Parsed JSON body; non-JSON bodies are wrapped as a JSON string.
    pub body: Value,
}

impl UpstreamResponse {
    pub fn is_http_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Transport to the extraction API.
#[async_trait]
pub trait ScrapeApi: Send + Sync {
    /// `POST target_url` with the payload. Any HTTP status is returned as
    /// `Ok`; only transport failures are `Err`.
    async fn submit(
        &self,
        target_url: &str,
        credential: &str,
        payload: &Value,
    ) -> Result<UpstreamResponse, Crawl2MdcError>;

    /// `GET status_url`. Non-2xx statuses are `Err`, as are transport failures.
    async fn job_status(&self, status_url: &str, credential: &str) -> Result<Value, Crawl2MdcError>;
}

/// Status endpoint for a job: `{base}/{crawl|scrape|batch/scrape}/{id}`.
pub fn status_url(api_base: &str, handle: &JobHandle) -> String {
    format!(
        "{}/{}/{}",
        api_base.trim_end_matches('/'),
        handle.kind.status_segment(),
        handle.id
    )
}

/// reqwest-backed [`ScrapeApi`] with bearer authentication.
pub struct FirecrawlClient {
    client: reqwest::Client,
}

impl FirecrawlClient {
    /// Build a client whose every call is bounded by `timeout_secs`.
    pub fn new(timeout_secs: u64) -> Result<Self, Crawl2MdcError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(concat!("crawl2mdc/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Crawl2MdcError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ScrapeApi for FirecrawlClient {
    async fn submit(
        &self,
        target_url: &str,
        credential: &str,
        payload: &Value,
    ) -> Result<UpstreamResponse, Crawl2MdcError> {
        let resp = self
            .client
            .post(target_url)
            .bearer_auth(credential)
            .json(payload)
            .send()
            .await
            .map_err(|e| transport_error(target_url, e))?;

        let status = resp.status().as_u16();
        let text = resp
            .text()
            .await
            .map_err(|e| transport_error(target_url, e))?;
        debug!(status, bytes = text.len(), "Submit response received");

        Ok(UpstreamResponse {
            status,
            body: parse_body(text),
        })
    }

    async fn job_status(&self, status_url: &str, credential: &str) -> Result<Value, Crawl2MdcError> {
        let resp = self
            .client
            .get(status_url)
            .bearer_auth(credential)
            .send()
            .await
            .map_err(|e| transport_error(status_url, e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Crawl2MdcError::Http {
                url: status_url.to_string(),
                reason: format!("HTTP {}: {}", status.as_u16(), body),
            });
        }

        resp.json::<Value>()
            .await
            .map_err(|e| transport_error(status_url, e))
    }
}

fn transport_error(url: &str, e: reqwest::Error) -> Crawl2MdcError {
    let reason = if e.is_timeout() {
        format!("timed out: {e}")
    } else {
        e.to_string()
    };
    Crawl2MdcError::Http {
        url: url.to_string(),
        reason,
    }
}

fn parse_body(text: String) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(&text).unwrap_or(Value::String(text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::OperationKind;

    #[test]
    fn status_urls_per_kind() {
        let base = "https://api.firecrawl.dev/v1/";
        let h = |kind| JobHandle {
            id: "123".into(),
            kind,
        };
        assert_eq!(
            status_url(base, &h(OperationKind::Crawl)),
            "https://api.firecrawl.dev/v1/crawl/123"
        );
        assert_eq!(
            status_url(base, &h(OperationKind::BatchScrape)),
            "https://api.firecrawl.dev/v1/batch/scrape/123"
        );
        assert_eq!(
            status_url(base, &h(OperationKind::Unknown)),
            "https://api.firecrawl.dev/v1/scrape/123"
        );
    }

    #[test]
    fn parse_body_variants() {
        assert_eq!(parse_body(String::new()), Value::Null);
        assert_eq!(
            parse_body(r#"{"success":true}"#.into()),
            serde_json::json!({"success": true})
        );
        assert_eq!(
            parse_body("Bad Gateway".into()),
            Value::String("Bad Gateway".into())
        );
    }

    #[test]
    fn http_success_range() {
        let ok = UpstreamResponse {
            status: 200,
            body: Value::Null,
        };
        let rejected = UpstreamResponse {
            status: 401,
            body: Value::Null,
        };
        assert!(ok.is_http_success());
        assert!(!rejected.is_http_success());
    }
}
