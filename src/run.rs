//! Pipeline entry points.
//!
//! [`run`] drives a full job: submit, poll if the upstream went async, then
//! transform every document. [`run_direct`] skips the upstream and
//! transforms documents the caller already has.

use crate::client::{status_url, FirecrawlClient, ScrapeApi};
use crate::config::PipelineConfig;
use crate::document::{JobRequest, RawDocument, Submission};
use crate::error::Crawl2MdcError;
use crate::output::{DocumentResult, PipelineOutput, RunStats};
use crate::pipeline::poll::JobPoller;
use crate::pipeline::submit::{augment_payload, completed_documents, interpret_response, status_summary};
use crate::pipeline::transform::{DocumentTransformer, TransformMode, TransformOptions};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Run one extraction job end to end.
///
/// # Returns
/// `Ok(PipelineOutput)` as long as at least one document was written, or
/// the job produced no documents at all. Per-document failures are in
/// `output.documents`.
///
/// # Errors
/// Returns `Err(Crawl2MdcError)` for fatal errors:
/// - The upstream rejected the submission or was unreachable
/// - The job failed or never completed
/// - The result was not a document batch
/// - Every document failed to write
pub async fn run(
    request: JobRequest,
    options: &TransformOptions,
    config: &PipelineConfig,
) -> Result<PipelineOutput, Crawl2MdcError> {
    let total_start = Instant::now();
    let kind = request.operation();
    info!(operation = %kind, url = %request.target_url, "Submitting job");

    // ── Step 1: Submit ───────────────────────────────────────────────────
    let api = resolve_api(config)?;
    let payload = augment_payload(kind, &request.payload, &config.scrape_options);
    let timeout = Duration::from_secs(config.request_timeout_secs);
    let response = tokio::time::timeout(
        timeout,
        api.submit(&request.target_url, &request.credential, &payload),
    )
    .await
    .map_err(|_| Crawl2MdcError::Http {
        url: request.target_url.clone(),
        reason: format!("timed out after {}s", timeout.as_secs()),
    })??;
    debug!(status = response.status, "Submit answered");

    // ── Step 2: Resolve documents ────────────────────────────────────────
    let poll_start = Instant::now();
    let submission = interpret_response(&response, kind, &request.payload)?;
    let (job_id, docs, original_response, poll_attempts) =
        match submission {
            Submission::Direct(doc) => {
                info!("No job id returned, processing inline content");
                (None, vec![doc], response.body, 0)
            }
            Submission::Async(handle) => {
                info!(job_id = %handle.id, "Job accepted");
                if let Some(ref cb) = config.progress_callback {
                    cb.on_job_submitted(&handle.id, kind.as_str());
                }
                let base = config.api_base_for(&request.target_url, kind);
                let url = status_url(&base, &handle);
                let (payload, attempts) = JobPoller::new(api.clone(), request.credential.clone())
                    .interval(Duration::from_millis(config.poll_interval_ms))
                    .request_timeout(timeout)
                    .max_attempts(config.max_poll_attempts)
                    .progress(config.progress_callback.clone())
                    .run(&handle, &url)
                    .await
                    .into_result(&handle.id)?;
                let docs = completed_documents(&payload)?;
                (Some(handle.id), docs, status_summary(&payload), attempts)
            }
        };
    let poll_duration_ms = poll_start.elapsed().as_millis() as u64;
    info!(documents = docs.len(), "Documents retrieved");

    // ── Step 3: Transform ────────────────────────────────────────────────
    let transform_start = Instant::now();
    let documents = transform_all(docs, options, TransformMode::Crawl, config).await?;

    let mut output = finish(documents, total_start, transform_start)?;
    output.job_id = job_id;
    output.operation = Some(kind);
    output.original_response = original_response;
    output.stats.poll_attempts = poll_attempts;
    output.stats.poll_duration_ms = poll_duration_ms;
    Ok(output)
}

/// Transform documents supplied by the caller, without any upstream call.
pub async fn run_direct(
    docs: Vec<RawDocument>,
    options: &TransformOptions,
    config: &PipelineConfig,
) -> Result<PipelineOutput, Crawl2MdcError> {
    let total_start = Instant::now();
    info!(documents = docs.len(), "Processing submitted documents");
    let transform_start = Instant::now();
    let documents = transform_all(docs, options, TransformMode::Direct, config).await?;
    finish(documents, total_start, transform_start)
}

/// Parse the `data` field of a direct submission.
pub fn parse_documents(data: Option<Value>) -> Result<Vec<RawDocument>, Crawl2MdcError> {
    match data {
        Some(items @ Value::Array(_)) => completed_documents(&serde_json::json!({ "data": items })),
        _ => Err(Crawl2MdcError::DocumentsNotAnArray),
    }
}

async fn transform_all(
    docs: Vec<RawDocument>,
    options: &TransformOptions,
    mode: TransformMode,
    config: &PipelineConfig,
) -> Result<Vec<DocumentResult>, Crawl2MdcError> {
    if let Some(ref cb) = config.progress_callback {
        cb.on_documents_ready(docs.len());
    }
    if docs.is_empty() {
        return Ok(Vec::new());
    }
    let transformer = DocumentTransformer::new(config);
    transformer.ensure_docs_dir().await?;
    let results = transformer
        .transform_batch(docs, options, mode, config.progress_callback.clone())
        .await;
    if let Some(ref cb) = config.progress_callback {
        let written = results.iter().filter(|r| r.error.is_none()).count();
        cb.on_run_complete(results.len(), written);
    }
    Ok(results)
}

fn finish(
    documents: Vec<DocumentResult>,
    total_start: Instant,
    transform_start: Instant,
) -> Result<PipelineOutput, Crawl2MdcError> {
    let total = documents.len();
    let written = documents.iter().filter(|d| d.error.is_none()).count();

    if total > 0 && written == 0 {
        let first_error = documents
            .iter()
            .find_map(|d| d.error.as_ref())
            .map(|e| e.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        return Err(Crawl2MdcError::AllDocumentsFailed { total, first_error });
    }

    let stats = RunStats {
        total_documents: total,
        written_documents: written,
        failed_documents: total - written,
        transform_duration_ms: transform_start.elapsed().as_millis() as u64,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
        ..Default::default()
    };
    info!(
        "Run complete: {}/{} documents written in {}ms",
        written, total, stats.total_duration_ms
    );

    Ok(PipelineOutput {
        job_id: None,
        operation: None,
        documents,
        original_response: Value::Null,
        stats,
    })
}

fn resolve_api(config: &PipelineConfig) -> Result<Arc<dyn ScrapeApi>, Crawl2MdcError> {
    match config.api {
        Some(ref api) => Ok(api.clone()),
        None => Ok(Arc::new(FirecrawlClient::new(config.request_timeout_secs)?)),
    }
}

