//! Document transformation: raw markdown in, `.mdc` artifact on disk out.
//!
//! Per document: resolve a title, format the body, optionally strip
//! `@`-mention lines, prepend front matter, and write atomically. A batch
//! claims its file stems up front, then fans out; one failing document
//! never stops its siblings.

use crate::config::PipelineConfig;
use crate::document::RawDocument;
use crate::error::{Crawl2MdcError, DocumentError};
use crate::naming::{NameSource, SystemNameSource};
use crate::output::{Artifact, DocumentResult};
use crate::pipeline::format::{beautify, MarkdownFormatter, ProseFormatter};
use crate::pipeline::submit::DESCRIPTION_KEYS;
use crate::pipeline::title::{self, ResolvedTitle};
use crate::progress::ProgressCallback;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// How the documents reached the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformMode {
    /// Fetched through an upstream job: mention lines are stripped and the
    /// source URL is recorded under the front matter.
    Crawl,
    /// Handed over directly by the caller: the body is kept as formatted.
    Direct,
}

/// Caller-supplied artifact options (`mdcOptions` on the wire).
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Deserialize)]
pub struct TransformOptions {
    /// `globs:` front-matter value; falls back to the configured default.
    #[serde(default)]
    pub globs: Option<String>,
}

impl TransformOptions {
    pub fn with_globs(globs: impl Into<String>) -> Self {
        Self {
            globs: Some(globs.into()),
        }
    }
}

/// Transforms and writes documents. Cheap to clone.
#[derive(Clone)]
pub struct DocumentTransformer {
    formatter: Arc<dyn MarkdownFormatter>,
    names: Arc<dyn NameSource>,
    docs_dir: PathBuf,
    extension: String,
    default_globs: String,
}

impl DocumentTransformer {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            formatter: config
                .formatter
                .clone()
                .unwrap_or_else(|| Arc::new(ProseFormatter::new(config.print_width))),
            names: config
                .name_source
                .clone()
                .unwrap_or_else(|| Arc::new(SystemNameSource)),
            docs_dir: config.docs_dir.clone(),
            extension: config.file_extension.clone(),
            default_globs: config.default_globs.clone(),
        }
    }

    pub fn docs_dir(&self) -> &Path {
        &self.docs_dir
    }

    /// Resolve the title of a document.
    pub fn resolve_title(&self, doc: &RawDocument) -> ResolvedTitle {
        title::resolve(&doc.metadata, &doc.markdown, self.names.as_ref())
    }

    /// Assemble an artifact in memory. Nothing touches the disk.
    pub fn build(
        &self,
        doc: &RawDocument,
        title: &ResolvedTitle,
        options: &TransformOptions,
        mode: TransformMode,
    ) -> Artifact {
        let mut body = beautify(self.formatter.as_ref(), &doc.markdown);
        let source_url = match mode {
            TransformMode::Crawl => {
                body = strip_mention_lines(&body);
                Some(source_url(doc))
            }
            TransformMode::Direct => None,
        };

        let description = doc.metadata.first_of(DESCRIPTION_KEYS).unwrap_or("");
        let globs = options
            .globs
            .as_deref()
            .filter(|g| !g.trim().is_empty())
            .unwrap_or(self.default_globs.as_str());

        let relative_path = format!("{}.{}", title.stem, self.extension);
        Artifact {
            title: title.stem.clone(),
            display_title: title.display.clone(),
            front_matter: vec![
                ("title".to_string(), single_line(&title.display)),
                ("description".to_string(), single_line(description)),
                ("globs".to_string(), single_line(globs)),
            ],
            source_url,
            body,
            path: self.docs_dir.join(&relative_path),
            relative_path,
        }
    }

    /// Resolve, build and write one document.
    pub async fn transform(
        &self,
        index: usize,
        doc: &RawDocument,
        options: &TransformOptions,
        mode: TransformMode,
    ) -> Result<Artifact, DocumentError> {
        let title = self.resolve_title(doc);
        let artifact = self.build(doc, &title, options, mode);
        self.write(index, &artifact).await?;
        Ok(artifact)
    }

    /// Write via a temp file and rename so readers never see a torn file.
    pub async fn write(&self, index: usize, artifact: &Artifact) -> Result<(), DocumentError> {
        let write_failed = |detail: String| DocumentError::WriteFailed {
            index,
            path: artifact.path.clone(),
            detail,
        };
        let tmp = self.docs_dir.join(format!(".{}.tmp", artifact.relative_path));
        tokio::fs::write(&tmp, artifact.render())
            .await
            .map_err(|e| write_failed(e.to_string()))?;
        if let Err(e) = tokio::fs::rename(&tmp, &artifact.path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(write_failed(e.to_string()));
        }
        debug!(index, path = %artifact.path.display(), "Artifact written");
        Ok(())
    }

    /// Create the docs directory if needed.
    pub async fn ensure_docs_dir(&self) -> Result<(), Crawl2MdcError> {
        tokio::fs::create_dir_all(&self.docs_dir)
            .await
            .map_err(|source| Crawl2MdcError::DocsDirUnavailable {
                path: self.docs_dir.clone(),
                source,
            })
    }

    /// Transform a whole batch concurrently.
    ///
    /// Results come back in input order. Stems are made unique within the
    /// batch before any task starts.
    pub async fn transform_batch(
        &self,
        docs: Vec<RawDocument>,
        options: &TransformOptions,
        mode: TransformMode,
        progress: Option<ProgressCallback>,
    ) -> Vec<DocumentResult> {
        let total = docs.len();
        let mut registry = StemRegistry::default();
        let planned: Vec<(RawDocument, ResolvedTitle)> = docs
            .into_iter()
            .map(|doc| {
                let mut title = self.resolve_title(&doc);
                title.stem = registry.claim(&title.stem);
                (doc, title)
            })
            .collect();

        let handles: Vec<_> = planned
            .into_iter()
            .enumerate()
            .map(|(index, (doc, title))| {
                let transformer = self.clone();
                let options = options.clone();
                let progress = progress.clone();
                tokio::spawn(async move {
                    let start = Instant::now();
                    let artifact = transformer.build(&doc, &title, &options, mode);
                    let outcome = transformer.write(index, &artifact).await;
                    let duration_ms = start.elapsed().as_millis() as u64;
                    match outcome {
                        Ok(()) => {
                            if let Some(ref cb) = progress {
                                cb.on_document_written(
                                    index,
                                    total,
                                    &artifact.path.to_string_lossy(),
                                );
                            }
                            DocumentResult {
                                index,
                                artifact: Some(artifact),
                                duration_ms,
                                error: None,
                            }
                        }
                        Err(e) => {
                            warn!(index, "{e}");
                            if let Some(ref cb) = progress {
                                cb.on_document_error(index, total, &e.to_string());
                            }
                            DocumentResult {
                                index,
                                artifact: None,
                                duration_ms,
                                error: Some(e),
                            }
                        }
                    }
                })
            })
            .collect();

        let mut results = Vec::with_capacity(total);
        for (index, joined) in futures::future::join_all(handles).await.into_iter().enumerate() {
            let result = joined.unwrap_or_else(|e| {
                let error = DocumentError::Aborted {
                    index,
                    detail: e.to_string(),
                };
                warn!(index, "{error}");
                if let Some(ref cb) = progress {
                    cb.on_document_error(index, total, &error.to_string());
                }
                DocumentResult {
                    index,
                    artifact: None,
                    duration_ms: 0,
                    error: Some(error),
                }
            });
            results.push(result);
        }

        let written = results.iter().filter(|r| r.error.is_none()).count();
        info!(total, written, failed = total - written, "Batch transformed");
        results
    }
}

/// Hands out stems unique within one batch: `page`, `page-2`, `page-3`, …
#[derive(Debug, Default)]
pub struct StemRegistry {
    claimed: HashSet<String>,
}

impl StemRegistry {
    pub fn claim(&mut self, stem: &str) -> String {
        if self.claimed.insert(stem.to_string()) {
            return stem.to_string();
        }
        let mut n = 2;
        loop {
            let candidate = format!("{stem}-{n}");
            if self.claimed.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }
}

static RE_MENTION_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^@.*(?:\n|$)").unwrap());

/// Remove every line that starts with `@`.
pub fn strip_mention_lines(body: &str) -> String {
    RE_MENTION_LINE.replace_all(body, "").into_owned()
}

/// Source URL recorded under the front matter of a crawled document.
fn source_url(doc: &RawDocument) -> String {
    doc.metadata
        .first_of(&["url", "contentUrl", "sourceURL"])
        .unwrap_or("")
        .to_string()
}

/// Front-matter values must stay on one line.
fn single_line(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Metadata;
    use crate::error::FormatError;
    use crate::naming::SequenceNameSource;
    use crate::pipeline::title::MAX_STEM_LEN;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    fn transformer(dir: &Path) -> DocumentTransformer {
        let config = PipelineConfig::builder()
            .docs_dir(dir)
            .name_source(Arc::new(SequenceNameSource::new(1_700_000_000_000)))
            .build()
            .unwrap();
        DocumentTransformer::new(&config)
    }

    #[test]
    fn stem_registry_suffixes_duplicates() {
        let mut r = StemRegistry::default();
        assert_eq!(r.claim("page"), "page");
        assert_eq!(r.claim("page"), "page-2");
        assert_eq!(r.claim("page"), "page-3");
        assert_eq!(r.claim("page-2"), "page-2-2");
    }

    #[test]
    fn mention_lines_removed() {
        assert_eq!(
            strip_mention_lines("keep\n@mention me\nalso keep\n@last"),
            "keep\nalso keep\n"
        );
        assert_eq!(strip_mention_lines("mail me@example.org\n"), "mail me@example.org\n");
    }

    #[test]
    fn crawl_artifact_layout() {
        let dir = TempDir::new().unwrap();
        let t = transformer(dir.path());
        let doc = RawDocument::new(
            "# Hello\n\n@channel ping\n\nWorld",
            Metadata::new()
                .with("description", "A\ngreeting")
                .with("sourceURL", "https://example.org/hello"),
        );
        let title = t.resolve_title(&doc);
        let a = t.build(&doc, &title, &TransformOptions::default(), TransformMode::Crawl);

        assert_eq!(a.title, "hello");
        assert_eq!(a.relative_path, "hello.mdc");
        assert_eq!(a.front_matter_value("description"), Some("A greeting"));
        assert_eq!(a.front_matter_value("globs"), Some("backend/src"));
        assert_eq!(a.source_url.as_deref(), Some("https://example.org/hello"));
        assert!(!a.body.contains("@channel"));
        assert!(a.body.contains("World"));
    }

    #[test]
    fn inline_mentions_survive_crawl_stripping() {
        let dir = TempDir::new().unwrap();
        let t = transformer(dir.path());
        let body = format!(
            "{} ab @support for help with the installer today, thank you.",
            "word ".repeat(15).trim_end()
        );
        let doc = RawDocument::new(body, Metadata::new().with("title", "Help"));
        let title = t.resolve_title(&doc);
        let a = t.build(&doc, &title, &TransformOptions::default(), TransformMode::Crawl);
        assert!(a.body.contains("ab @support"), "{}", a.body);
        assert!(a.body.contains("for help with the installer"), "{}", a.body);
    }

    #[test]
    fn direct_artifact_keeps_mentions_and_has_no_source() {
        let dir = TempDir::new().unwrap();
        let t = transformer(dir.path());
        let doc = RawDocument::new(
            "# Team\n\n@everyone hello",
            Metadata::new().with("url", "https://x"),
        );
        let title = t.resolve_title(&doc);
        let a = t.build(
            &doc,
            &title,
            &TransformOptions::with_globs("src/**/*.rs"),
            TransformMode::Direct,
        );
        assert!(a.body.contains("@everyone"));
        assert!(a.source_url.is_none());
        assert_eq!(a.front_matter_value("globs"), Some("src/**/*.rs"));
    }

    #[test]
    fn fallback_title_leaves_front_matter_title_empty() {
        let dir = TempDir::new().unwrap();
        let t = transformer(dir.path());
        let doc = RawDocument::new("", Metadata::new());
        let title = t.resolve_title(&doc);
        let a = t.build(&doc, &title, &TransformOptions::default(), TransformMode::Direct);
        assert_eq!(a.front_matter_value("title"), Some(""));
        assert_eq!(a.relative_path, "doc-1700000000000-000000001.mdc");
    }

    #[tokio::test]
    async fn transform_writes_file() {
        let dir = TempDir::new().unwrap();
        let t = transformer(dir.path());
        let doc = RawDocument::new("# Hello\n\nWorld", Metadata::new());
        let a = t
            .transform(0, &doc, &TransformOptions::default(), TransformMode::Crawl)
            .await
            .unwrap();
        let text = std::fs::read_to_string(&a.path).unwrap();
        assert!(text.starts_with("---\ntitle: Hello\n"));
        assert!(text.contains("from: \n\n"));
        assert!(text.ends_with("World\n"));
        assert!(!dir.path().join(".hello.mdc.tmp").exists());
    }

    #[tokio::test]
    async fn batch_keeps_order_and_unique_paths() {
        let dir = TempDir::new().unwrap();
        let t = transformer(dir.path());
        let docs = vec![
            RawDocument::new("# Same\n\none", Metadata::new()),
            RawDocument::new("# Same\n\ntwo", Metadata::new()),
            RawDocument::new("# Other\n\nthree", Metadata::new()),
        ];
        let results = t
            .transform_batch(docs, &TransformOptions::default(), TransformMode::Crawl, None)
            .await;
        let paths: Vec<_> = results
            .iter()
            .map(|r| r.artifact.as_ref().unwrap().relative_path.clone())
            .collect();
        assert_eq!(paths, ["same.mdc", "same-2.mdc", "other.mdc"]);
        let second = std::fs::read_to_string(dir.path().join("same-2.mdc")).unwrap();
        assert!(second.contains("two"));
    }

    #[tokio::test]
    async fn oversized_titles_still_write() {
        let dir = TempDir::new().unwrap();
        let t = transformer(dir.path());
        let long = "x".repeat(300);
        let docs = vec![
            RawDocument::new("body", Metadata::new().with("title", long.as_str())),
            RawDocument::new("body", Metadata::new().with("title", long.as_str())),
            RawDocument::new(format!("{}\n\nrest", "word ".repeat(70)), Metadata::new()),
        ];
        let results = t
            .transform_batch(docs, &TransformOptions::default(), TransformMode::Direct, None)
            .await;

        assert!(results.iter().all(|r| r.error.is_none()));
        let stem = "x".repeat(MAX_STEM_LEN);
        assert_eq!(
            results[1].artifact.as_ref().unwrap().relative_path,
            format!("{stem}-2.mdc")
        );
        let first = results[0].artifact.as_ref().unwrap();
        assert_eq!(first.front_matter_value("title"), Some(long.as_str()));
        assert!(first.path.exists());
        assert!(results[2].artifact.as_ref().unwrap().path.exists());
    }

    #[tokio::test]
    async fn write_failure_is_per_document() {
        let dir = TempDir::new().unwrap();
        // The docs dir is a regular file, so every write fails.
        let blocker = dir.path().join("blocked");
        std::fs::write(&blocker, "").unwrap();
        let t = transformer(&blocker);

        #[derive(Default)]
        struct Errors(AtomicUsize);
        impl crate::progress::PipelineProgressCallback for Errors {
            fn on_document_error(&self, _i: usize, _t: usize, _e: &str) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
        let errors = Arc::new(Errors::default());

        let results = t
            .transform_batch(
                vec![RawDocument::new("a", Metadata::new()); 2],
                &TransformOptions::default(),
                TransformMode::Direct,
                Some(errors.clone() as ProgressCallback),
            )
            .await;
        assert!(results
            .iter()
            .all(|r| matches!(r.error, Some(DocumentError::WriteFailed { .. }))));
        assert_eq!(errors.0.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn panicking_formatter_aborts_only_its_document() {
        struct Picky;
        impl MarkdownFormatter for Picky {
            fn format(&self, raw: &str) -> Result<String, FormatError> {
                if raw.contains("boom") {
                    panic!("formatter exploded");
                }
                Ok(raw.to_string())
            }
        }

        let dir = TempDir::new().unwrap();
        let config = PipelineConfig::builder()
            .docs_dir(dir.path())
            .formatter(Arc::new(Picky))
            .build()
            .unwrap();
        let t = DocumentTransformer::new(&config);
        let results = t
            .transform_batch(
                vec![
                    RawDocument::new("# Fine\n\nok", Metadata::new()),
                    RawDocument::new("# Bad\n\nboom", Metadata::new()),
                ],
                &TransformOptions::default(),
                TransformMode::Direct,
                None,
            )
            .await;
        assert!(results[0].artifact.is_some());
        assert!(matches!(
            results[1].error,
            Some(DocumentError::Aborted { index: 1, .. })
        ));
    }
}
