//! CLI binary for crawl2mdc.
//!
//! A thin shim over the library crate: `serve` runs the HTTP endpoints,
//! `run` drives one job from the terminal.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use crawl2mdc::server;
use crawl2mdc::{
    run, JobRequest, PipelineConfig, PipelineProgressCallback, ProgressCallback, TransformOptions,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner while the job is pending, then a bar over the documents.
struct CliProgressCallback {
    bar: ProgressBar,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Submitting");
        bar.set_message("waiting for the extraction API…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} documents  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Writing");
    }
}

impl PipelineProgressCallback for CliProgressCallback {
    fn on_job_submitted(&self, job_id: &str, operation: &str) {
        self.bar.println(format!(
            "{} {} job {}",
            cyan("◆"),
            bold(operation),
            dim(job_id)
        ));
        self.bar.set_prefix("Polling");
    }

    fn on_poll_attempt(&self, _job_id: &str, attempt: u32, max_attempts: u32) {
        self.bar
            .set_message(format!("attempt {attempt}/{max_attempts}"));
    }

    fn on_documents_ready(&self, total: usize) {
        self.activate_bar(total);
    }

    fn on_document_written(&self, _index: usize, _total: usize, file_path: &str) {
        self.bar
            .println(format!("  {} {}", green("✓"), file_path));
        self.bar.inc(1);
    }

    fn on_document_error(&self, index: usize, _total: usize, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        let msg: String = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} document {}  {}",
            red("✗"),
            index + 1,
            red(&msg)
        ));
        self.bar.inc(1);
    }

    fn on_run_complete(&self, total: usize, success_count: usize) {
        let failed = total.saturating_sub(success_count);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} documents written",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} documents written  ({} failed)",
                if failed == total { red("✘") } else { cyan("⚠") },
                bold(&success_count.to_string()),
                total,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Serve the HTTP API on port 3000
  crawl2mdc serve

  # Crawl a documentation site into ./docs
  crawl2mdc run --url https://api.firecrawl.dev/v1/crawl \
      --body '{"url": "https://docs.example.org", "limit": 25}'

  # Scrape one page, custom globs, JSON summary
  crawl2mdc run --url https://api.firecrawl.dev/v1/scrape \
      --body '{"url": "https://example.org/guide"}' --globs 'src/**/*.ts' --json

ENVIRONMENT VARIABLES:
  FIRECRAWL_API_KEY        Credential for `run`
  PORT                     Listen port for `serve`
  CRAWL2MDC_DOCS_DIR       Output directory (default: docs)
  CRAWL2MDC_API_BASE       Status endpoint base (default: derived from --url)
  RUST_LOG                 Overrides the log filter
"#;

/// Convert Firecrawl jobs into .mdc documentation files.
#[derive(Parser, Debug)]
#[command(
    name = "crawl2mdc",
    version,
    about = "Convert Firecrawl scrape and crawl jobs into .mdc documentation files",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    pipeline: PipelineArgs,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "CRAWL2MDC_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "CRAWL2MDC_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the HTTP API.
    Serve {
        /// Interface to bind.
        #[arg(long, env = "CRAWL2MDC_HOST", default_value = "0.0.0.0")]
        host: String,

        /// Port to listen on.
        #[arg(long, env = "PORT", default_value_t = 3000)]
        port: u16,

        /// Largest accepted request body, in MiB.
        #[arg(long, env = "CRAWL2MDC_MAX_PAYLOAD_MB", default_value_t = 50)]
        max_payload_mb: usize,
    },

    /// Submit one job and write its documents.
    Run {
        /// Submit endpoint, e.g. https://api.firecrawl.dev/v1/crawl.
        #[arg(long)]
        url: String,

        /// Bearer credential for the extraction API.
        #[arg(long, env = "FIRECRAWL_API_KEY", hide_env_values = true)]
        api_key: String,

        /// Request payload as inline JSON.
        #[arg(long, conflicts_with = "body_file")]
        body: Option<String>,

        /// Request payload read from a JSON file.
        #[arg(long)]
        body_file: Option<PathBuf>,

        /// `globs:` front-matter value.
        #[arg(long, env = "CRAWL2MDC_GLOBS")]
        globs: Option<String>,

        /// Print the run summary as JSON on stdout.
        #[arg(long)]
        json: bool,

        /// Disable the progress bar.
        #[arg(long, env = "CRAWL2MDC_NO_PROGRESS")]
        no_progress: bool,
    },
}

/// Knobs shared by both subcommands.
#[derive(Args, Debug)]
struct PipelineArgs {
    /// Directory the .mdc files are written to.
    #[arg(long, global = true, env = "CRAWL2MDC_DOCS_DIR", default_value = "docs")]
    docs_dir: PathBuf,

    /// Base URL for job-status polling.
    #[arg(long, global = true, env = "CRAWL2MDC_API_BASE")]
    api_base: Option<String>,

    /// Default `globs:` value when a request supplies none.
    #[arg(long, global = true, env = "CRAWL2MDC_DEFAULT_GLOBS", default_value = "backend/src")]
    default_globs: String,

    /// Milliseconds between status polls.
    #[arg(long, global = true, env = "CRAWL2MDC_POLL_INTERVAL_MS", default_value_t = 2000)]
    poll_interval_ms: u64,

    /// Status polls before a job counts as timed out.
    #[arg(long, global = true, env = "CRAWL2MDC_MAX_POLL_ATTEMPTS", default_value_t = 60)]
    max_poll_attempts: u32,

    /// Per-request timeout in seconds.
    #[arg(long, global = true, env = "CRAWL2MDC_REQUEST_TIMEOUT", default_value_t = 30)]
    request_timeout: u64,

    /// Line width for prose re-wrapping.
    #[arg(long, global = true, env = "CRAWL2MDC_PRINT_WIDTH", default_value_t = 80)]
    print_width: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs for one-shot runs.
    let show_progress = match cli.command {
        Command::Run {
            json, no_progress, ..
        } => !cli.quiet && !no_progress && !json,
        Command::Serve { .. } => false,
    };
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Serve {
            ref host,
            port,
            max_payload_mb,
        } => {
            let config = build_config(&cli.pipeline, None)?;
            let config = PipelineConfig {
                max_payload_bytes: max_payload_mb.max(1).saturating_mul(1024 * 1024),
                ..config
            };
            let addr: SocketAddr = format!("{host}:{port}")
                .parse()
                .with_context(|| format!("Invalid listen address {host}:{port}"))?;
            server::serve(addr, config)
                .await
                .context("HTTP server failed")?;
        }
        Command::Run {
            ref url,
            ref api_key,
            ref body,
            ref body_file,
            ref globs,
            json,
            ..
        } => {
            let payload = read_payload(body.as_deref(), body_file.as_ref()).await?;
            let request = JobRequest::new(url.as_str(), api_key.as_str(), payload)
                .context("Invalid job request")?;

            let progress: Option<ProgressCallback> = if show_progress {
                Some(CliProgressCallback::new() as Arc<dyn PipelineProgressCallback>)
            } else {
                None
            };
            let config = build_config(&cli.pipeline, progress)?;
            let options = TransformOptions {
                globs: globs.clone(),
            };

            let output = run(request, &options, &config)
                .await
                .context("Job failed")?;

            if json {
                let json =
                    serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
                println!("{json}");
            } else {
                for artifact in output.artifacts() {
                    println!("{}", artifact.path.display());
                }
                if !cli.quiet && !show_progress {
                    eprintln!(
                        "Wrote {}/{} documents in {}ms",
                        output.stats.written_documents,
                        output.stats.total_documents,
                        output.stats.total_duration_ms
                    );
                }
            }
        }
    }

    Ok(())
}

/// Map shared flags onto the pipeline builder.
fn build_config(args: &PipelineArgs, progress: Option<ProgressCallback>) -> Result<PipelineConfig> {
    let mut builder = PipelineConfig::builder()
        .docs_dir(&args.docs_dir)
        .default_globs(&args.default_globs)
        .poll_interval_ms(args.poll_interval_ms)
        .max_poll_attempts(args.max_poll_attempts)
        .request_timeout_secs(args.request_timeout)
        .print_width(args.print_width);

    if let Some(ref base) = args.api_base {
        builder = builder.api_base(base);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

async fn read_payload(
    body: Option<&str>,
    body_file: Option<&PathBuf>,
) -> Result<serde_json::Value> {
    let text = match (body, body_file) {
        (Some(inline), _) => inline.to_string(),
        (None, Some(path)) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read payload from {:?}", path))?,
        (None, None) => bail!("one of --body or --body-file is required"),
    };
    serde_json::from_str(&text).context("Payload is not valid JSON")
}
