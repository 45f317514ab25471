//! Submission: shape the outgoing payload and classify the answer.
//!
//! The upstream answers a submit either with a job id to poll or with the
//! finished document inline. [`interpret_response`] decides which, once, so
//! the rest of the pipeline only ever sees a [`Submission`].

use crate::client::UpstreamResponse;
use crate::config::ScrapeOptions;
use crate::document::{JobHandle, Metadata, OperationKind, RawDocument, Submission};
use crate::error::Crawl2MdcError;
use serde_json::{Map, Value};

/// Metadata keys that feed the artifact `description`, in priority order.
pub const DESCRIPTION_KEYS: &[&str] = &["description", "ogDescription", "twitter:description"];

/// Metadata keys that feed the source URL, in priority order.
pub const URL_KEYS: &[&str] = &["url", "ogUrl", "og:url"];

/// Merge the scrape options into the caller's payload.
///
/// Scrapes take them at the top level, overriding caller keys. Crawls take
/// them nested under `scrapeOptions`, replacing any caller value. Unknown
/// operations are sent as-is.
pub fn augment_payload(
    kind: OperationKind,
    payload: &Map<String, Value>,
    options: &ScrapeOptions,
) -> Value {
    let mut merged = payload.clone();
    match kind {
        OperationKind::Scrape | OperationKind::BatchScrape => {
            merged.extend(options.to_json_map());
        }
        OperationKind::Crawl => {
            merged.insert(
                "scrapeOptions".to_string(),
                Value::Object(options.to_json_map()),
            );
        }
        OperationKind::Unknown => {}
    }
    Value::Object(merged)
}

/// Classify a submit response.
///
/// `request_payload` is the payload that was sent; its `url` field is the
/// last-resort source URL of an inline document.
pub fn interpret_response(
    response: &UpstreamResponse,
    kind: OperationKind,
    request_payload: &Map<String, Value>,
) -> Result<Submission, Crawl2MdcError> {
    let body = &response.body;
    let accepted = body.get("success").and_then(Value::as_bool) == Some(true);

    if !response.is_http_success() || !accepted {
        return Err(Crawl2MdcError::UpstreamRejection {
            operation: kind.as_str().to_string(),
            status: (!response.is_http_success()).then_some(response.status),
            payload: body.clone(),
        });
    }

    match job_id(body) {
        Some(id) => Ok(Submission::Async(JobHandle { id, kind })),
        None => inline_document(body, request_payload).map(Submission::Direct),
    }
}

fn job_id(body: &Value) -> Option<String> {
    match body.get("id")? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Build the single document of a synchronous answer.
///
/// Upstream metadata is kept whole for the title cascade; `description`
/// and `url` are normalised from their aliases.
fn inline_document(
    body: &Value,
    request_payload: &Map<String, Value>,
) -> Result<RawDocument, Crawl2MdcError> {
    let data = body.get("data");
    let markdown = data
        .and_then(|d| d.get("markdown"))
        .and_then(Value::as_str)
        .filter(|m| !m.is_empty())
        .ok_or_else(|| Crawl2MdcError::NoContent {
            payload: body.clone(),
        })?;

    let mut metadata = data
        .and_then(|d| d.get("metadata"))
        .map(Metadata::from_json)
        .unwrap_or_default();

    let description = metadata.first_of(DESCRIPTION_KEYS).unwrap_or("").to_string();
    let url = metadata
        .first_of(URL_KEYS)
        .map(String::from)
        .or_else(|| {
            request_payload
                .get("url")
                .and_then(Value::as_str)
                .map(String::from)
        })
        .unwrap_or_default();
    metadata.insert("description", description);
    metadata.insert("url", url);

    Ok(RawDocument::new(markdown, metadata))
}

/// Extract the document batch from a completed job's status payload.
pub fn completed_documents(payload: &Value) -> Result<Vec<RawDocument>, Crawl2MdcError> {
    let invalid = |reason: String| Crawl2MdcError::InvalidDocuments {
        reason,
        payload: payload.clone(),
    };
    let items = payload
        .get("data")
        .and_then(Value::as_array)
        .ok_or_else(|| invalid("`data` is missing or not an array".to_string()))?;

    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            if !item.is_object() {
                return Err(invalid(format!("item {i} is not an object")));
            }
            serde_json::from_value(item.clone()).map_err(|e| invalid(format!("item {i}: {e}")))
        })
        .collect()
}

/// The status-payload subset echoed back to callers of an async run.
pub fn status_summary(payload: &Value) -> Value {
    const KEYS: &[&str] = &[
        "success",
        "status",
        "completed",
        "total",
        "creditsUsed",
        "expiresAt",
    ];
    let summary: Map<String, Value> = KEYS
        .iter()
        .filter_map(|k| payload.get(*k).map(|v| (k.to_string(), v.clone())))
        .collect();
    Value::Object(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            _ => panic!("not an object"),
        }
    }

    fn ok(body: Value) -> UpstreamResponse {
        UpstreamResponse { status: 200, body }
    }

    #[test]
    fn scrape_options_merged_at_top_level() {
        let payload = map(json!({"url": "https://example.org", "waitFor": 10}));
        let out = augment_payload(OperationKind::Scrape, &payload, &ScrapeOptions::default());
        assert_eq!(out["url"], "https://example.org");
        assert_eq!(out["waitFor"], 2000, "options override caller keys");
        assert_eq!(out["excludeTags"], json!(["img", "a", "button"]));
        assert!(out.get("scrapeOptions").is_none());
    }

    #[test]
    fn crawl_options_nested() {
        let payload = map(json!({"url": "https://example.org", "scrapeOptions": {"x": 1}}));
        let out = augment_payload(OperationKind::Crawl, &payload, &ScrapeOptions::default());
        assert_eq!(out["scrapeOptions"]["formats"], json!(["markdown"]));
        assert!(out["scrapeOptions"].get("x").is_none());
        assert!(out.get("formats").is_none());
    }

    #[test]
    fn unknown_payload_untouched() {
        let payload = map(json!({"a": 1}));
        let out = augment_payload(OperationKind::Unknown, &payload, &ScrapeOptions::default());
        assert_eq!(out, json!({"a": 1}));
    }

    #[test]
    fn async_submission() {
        let s = interpret_response(
            &ok(json!({"success": true, "id": "job-42"})),
            OperationKind::Crawl,
            &Map::new(),
        )
        .unwrap();
        assert_eq!(
            s,
            Submission::Async(JobHandle {
                id: "job-42".into(),
                kind: OperationKind::Crawl
            })
        );
    }

    #[test]
    fn success_false_is_rejection_without_status() {
        let err = interpret_response(
            &ok(json!({"success": false, "error": "Unauthorized"})),
            OperationKind::Scrape,
            &Map::new(),
        )
        .unwrap_err();
        match err {
            Crawl2MdcError::UpstreamRejection {
                operation,
                status,
                payload,
            } => {
                assert_eq!(operation, "scrape");
                assert_eq!(status, None);
                assert_eq!(payload["error"], "Unauthorized");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn http_error_keeps_status() {
        let err = interpret_response(
            &UpstreamResponse {
                status: 402,
                body: json!({"error": "Payment required"}),
            },
            OperationKind::Crawl,
            &Map::new(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            Crawl2MdcError::UpstreamRejection {
                status: Some(402),
                ..
            }
        ));
    }

    #[test]
    fn inline_document_with_aliases() {
        let body = json!({
            "success": true,
            "data": {
                "markdown": "# Hello\n\nWorld",
                "metadata": {"ogDescription": "Greeting", "og:url": "https://example.org/hello"}
            }
        });
        let s = interpret_response(&ok(body), OperationKind::Scrape, &Map::new()).unwrap();
        let Submission::Direct(doc) = s else {
            panic!("expected direct submission");
        };
        assert_eq!(doc.markdown, "# Hello\n\nWorld");
        assert_eq!(doc.metadata.get("description"), Some("Greeting"));
        assert_eq!(doc.metadata.get("url"), Some("https://example.org/hello"));
    }

    #[test]
    fn inline_document_url_falls_back_to_request() {
        let body = json!({"success": true, "data": {"markdown": "text"}});
        let payload = map(json!({"url": "https://example.org/page"}));
        let Submission::Direct(doc) =
            interpret_response(&ok(body), OperationKind::Scrape, &payload).unwrap()
        else {
            panic!("expected direct submission");
        };
        assert_eq!(doc.metadata.get("url"), Some("https://example.org/page"));
    }

    #[test]
    fn no_id_and_no_markdown_is_no_content() {
        let err = interpret_response(
            &ok(json!({"success": true, "data": {"markdown": ""}})),
            OperationKind::Scrape,
            &Map::new(),
        )
        .unwrap_err();
        assert!(matches!(err, Crawl2MdcError::NoContent { .. }));
        assert_eq!(
            err.to_string(),
            "No job ID or direct markdown content found in API response"
        );
    }

    #[test]
    fn completed_documents_parsed() {
        let docs = completed_documents(&json!({
            "status": "completed",
            "data": [
                {"markdown": "a", "metadata": {"title": "A"}},
                {"markdown": null}
            ]
        }))
        .unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].metadata.get("title"), Some("A"));
        assert_eq!(docs[1].markdown, "");
    }

    #[test]
    fn completed_documents_rejects_non_array() {
        for payload in [
            json!({"status": "completed"}),
            json!({"status": "completed", "data": {"markdown": "x"}}),
            json!({"status": "completed", "data": ["text"]}),
        ] {
            assert!(matches!(
                completed_documents(&payload),
                Err(Crawl2MdcError::InvalidDocuments { .. })
            ));
        }
    }

    #[test]
    fn status_summary_subset() {
        let s = status_summary(&json!({
            "success": true,
            "status": "completed",
            "completed": 3,
            "total": 3,
            "creditsUsed": 3,
            "expiresAt": "2026-01-01T00:00:00Z",
            "data": [1, 2, 3],
            "next": null
        }));
        assert_eq!(s.as_object().unwrap().len(), 6);
        assert!(s.get("data").is_none());
    }
}
