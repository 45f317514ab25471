//! Configuration types for the crawl-to-MDC pipeline.
//!
//! All pipeline behaviour is controlled through [`PipelineConfig`], built via
//! its [`PipelineConfigBuilder`]. One struct holds every knob so the HTTP
//! server and the one-shot CLI share the exact same defaults.

use crate::client::ScrapeApi;
use crate::document::OperationKind;
use crate::error::Crawl2MdcError;
use crate::naming::NameSource;
use crate::pipeline::format::MarkdownFormatter;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Public Firecrawl v1 endpoint, used when no base can be derived.
pub const DEFAULT_API_BASE: &str = "https://api.firecrawl.dev/v1";

/// Configuration for a pipeline run.
///
/// Built via [`PipelineConfig::builder()`] or using
/// [`PipelineConfig::default()`].
///
/// # Example
/// ```rust
/// use crawl2mdc::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .docs_dir("out/docs")
///     .poll_interval_ms(500)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// Base URL for job-status polling, e.g. `https://api.firecrawl.dev/v1`.
    ///
    /// When `None` the base is derived from each submit URL by cutting it
    /// just before the operation segment (`/crawl`, `/scrape`, …).
    pub api_base: Option<String>,

    /// Wait between two status polls, in milliseconds. Default: 2000.
    pub poll_interval_ms: u64,

    /// Hard ceiling on status polls before the job counts as timed out. Default: 60.
    pub max_poll_attempts: u32,

    /// Per-call timeout for submit and status requests, in seconds. Default: 30.
    pub request_timeout_secs: u64,

    /// Directory the artifacts are written to. Created on demand. Default: `docs`.
    pub docs_dir: PathBuf,

    /// `globs:` front-matter value when the caller supplies none. Default: `backend/src`.
    pub default_globs: String,

    /// Artifact file extension, without the dot. Default: `mdc`.
    pub file_extension: String,

    /// Formatting options injected into scrape and crawl submissions.
    pub scrape_options: ScrapeOptions,

    /// Target line width for prose re-wrapping. Default: 80.
    pub print_width: usize,

    /// Largest accepted inbound request body in bytes. Default: 50 MiB.
    pub max_payload_bytes: usize,

    /// Pre-constructed upstream client. Takes precedence over the built-in
    /// reqwest client; tests inject fakes here.
    pub api: Option<Arc<dyn ScrapeApi>>,

    /// Markdown formatter. `None` uses [`crate::pipeline::format::ProseFormatter`].
    pub formatter: Option<Arc<dyn MarkdownFormatter>>,

    /// Clock and randomness for fallback file names. `None` uses the system clock.
    pub name_source: Option<Arc<dyn NameSource>>,

    /// Optional progress observer.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            api_base: None,
            poll_interval_ms: 2000,
            max_poll_attempts: 60,
            request_timeout_secs: 30,
            docs_dir: PathBuf::from("docs"),
            default_globs: "backend/src".to_string(),
            file_extension: "mdc".to_string(),
            scrape_options: ScrapeOptions::default(),
            print_width: 80,
            max_payload_bytes: 50 * 1024 * 1024,
            api: None,
            formatter: None,
            name_source: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("api_base", &self.api_base)
            .field("poll_interval_ms", &self.poll_interval_ms)
            .field("max_poll_attempts", &self.max_poll_attempts)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("docs_dir", &self.docs_dir)
            .field("default_globs", &self.default_globs)
            .field("file_extension", &self.file_extension)
            .field("scrape_options", &self.scrape_options)
            .field("print_width", &self.print_width)
            .field("max_payload_bytes", &self.max_payload_bytes)
            .field("api", &self.api.as_ref().map(|_| "<dyn ScrapeApi>"))
            .field(
                "formatter",
                &self.formatter.as_ref().map(|_| "<dyn MarkdownFormatter>"),
            )
            .field(
                "name_source",
                &self.name_source.as_ref().map(|_| "<dyn NameSource>"),
            )
            .finish()
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }

    /// Base URL the status endpoint hangs off for a given submit URL.
    pub fn api_base_for(&self, target_url: &str, kind: OperationKind) -> String {
        if let Some(ref base) = self.api_base {
            return base.trim_end_matches('/').to_string();
        }
        if kind != OperationKind::Unknown {
            let marker = format!("/{}", kind.as_str());
            if let Some(pos) = target_url.rfind(&marker) {
                return target_url[..pos].to_string();
            }
        }
        DEFAULT_API_BASE.to_string()
    }
}

/// Builder for [`PipelineConfig`].
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl fmt::Debug for PipelineConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl PipelineConfigBuilder {
    pub fn api_base(mut self, base: impl Into<String>) -> Self {
        self.config.api_base = Some(base.into());
        self
    }

    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    pub fn max_poll_attempts(mut self, n: u32) -> Self {
        self.config.max_poll_attempts = n;
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    pub fn docs_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.docs_dir = dir.into();
        self
    }

    pub fn default_globs(mut self, globs: impl Into<String>) -> Self {
        self.config.default_globs = globs.into();
        self
    }

    pub fn file_extension(mut self, ext: impl Into<String>) -> Self {
        self.config.file_extension = ext.into().trim_start_matches('.').to_string();
        self
    }

    pub fn scrape_options(mut self, options: ScrapeOptions) -> Self {
        self.config.scrape_options = options;
        self
    }

    pub fn print_width(mut self, width: usize) -> Self {
        self.config.print_width = width;
        self
    }

    pub fn max_payload_bytes(mut self, bytes: usize) -> Self {
        self.config.max_payload_bytes = bytes.max(1024);
        self
    }

    pub fn api(mut self, api: Arc<dyn ScrapeApi>) -> Self {
        self.config.api = Some(api);
        self
    }

    pub fn formatter(mut self, formatter: Arc<dyn MarkdownFormatter>) -> Self {
        self.config.formatter = Some(formatter);
        self
    }

    pub fn name_source(mut self, source: Arc<dyn NameSource>) -> Self {
        self.config.name_source = Some(source);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, Crawl2MdcError> {
        let c = &self.config;
        if c.max_poll_attempts == 0 {
            return Err(Crawl2MdcError::InvalidConfig(
                "max_poll_attempts must be ≥ 1".into(),
            ));
        }
        if c.request_timeout_secs == 0 {
            return Err(Crawl2MdcError::InvalidConfig(
                "request_timeout_secs must be ≥ 1".into(),
            ));
        }
        if c.print_width < 20 {
            return Err(Crawl2MdcError::InvalidConfig(format!(
                "print_width must be ≥ 20, got {}",
                c.print_width
            )));
        }
        if c.file_extension.is_empty()
            || !c
                .file_extension
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric())
        {
            return Err(Crawl2MdcError::InvalidConfig(format!(
                "file_extension must be non-empty ASCII alphanumerics, got {:?}",
                c.file_extension
            )));
        }
        if let Some(ref base) = c.api_base {
            if reqwest::Url::parse(base).is_err() {
                return Err(Crawl2MdcError::InvalidConfig(format!(
                    "api_base is not a valid URL: {base}"
                )));
            }
        }
        Ok(self.config)
    }
}

// ── Scrape options ───────────────────────────────────────────────────────

/// Single-document formatting options sent along with every submission.
///
/// The upstream expects these at the top level for scrapes and nested
/// under `scrapeOptions` for crawls; see
/// [`crate::pipeline::submit::augment_payload`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeOptions {
    pub formats: Vec<String>,
    pub exclude_tags: Vec<String>,
    pub only_main_content: bool,
    pub wait_for: u64,
}

impl Default for ScrapeOptions {
    fn default() -> Self {
        Self {
            formats: vec!["markdown".to_string()],
            exclude_tags: vec!["img".to_string(), "a".to_string(), "button".to_string()],
            only_main_content: true,
            wait_for: 2000,
        }
    }
}

impl ScrapeOptions {
    /// The options as a JSON object, ready to merge into a payload.
    pub fn to_json_map(&self) -> serde_json::Map<String, serde_json::Value> {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => map,
            _ => serde_json::Map::new(),
        }
    }
}
