//! CLI binary for dots-ocr.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `PipelineConfig`, picks an output sink, and reports the run on stderr.

use anyhow::{Context, Result};
use clap::Parser;
use dots_ocr::config::{ENV_HOST, ENV_MODEL, ENV_PORT, ENV_TOKEN, ENV_URL};
use dots_ocr::{
    EndpointConfig, OutputSink, PageError, PageProgress, PageSelection, PipelineConfig,
    PipelineOutput, PipelineRunner, ProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Progress bar on stderr, one log line per finished page.
struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("checking endpoint…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl PageProgress for CliProgress {
    fn on_run_start(&self, total_pages: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}/{len} pages  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ");
        self.bar.set_length(total_pages as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Recognising");
    }

    fn on_page_start(&self, page: usize, _total_pages: usize) {
        self.bar.set_message(format!("page {page}"));
    }

    fn on_page_complete(&self, page: usize, total_pages: usize, text_len: usize) {
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}",
            green("✓"),
            page,
            total_pages,
            dim(&format!("{text_len:>5} chars")),
        ));
        self.bar.inc(1);
    }

    fn on_page_error(&self, page: usize, total_pages: usize, error: &PageError) {
        let mut msg = error.to_string();
        if msg.chars().count() > 80 {
            msg = msg.chars().take(79).collect::<String>() + "…";
        }
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}",
            red("✗"),
            page,
            total_pages,
            red(&msg),
        ));
        self.bar.inc(1);
    }

    fn on_run_complete(&self, _total_pages: usize, _succeeded: usize) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Recognise every page, streaming text to stdout
  dots-ocr scan.pdf

  # One page of a PDF, written to a file
  dots-ocr --page 3 scan.pdf -o page3.txt

  # A single image
  dots-ocr receipt.jpg

  # Remote endpoint with four requests in flight
  dots-ocr --url https://gpu-box:8443 --token "$TOKEN" -c 4 book.pdf -o book.txt

OUTPUT:
  Page texts are joined with "--- Page N ---" markers (none before the first
  page). A page whose request fails is reported on stderr and left empty;
  the run still exits 0 unless --strict is given.

EXIT CODES:
  0  success (possibly with failed pages)
  1  missing input, bad flag, unhealthy endpoint, invalid page, no pages rendered,
     or any failed page with --strict
  130 interrupted

ENVIRONMENT VARIABLES:
  DOTS_OCR_URL          Full endpoint base URL (overrides host/port)
  DOTS_OCR_HOST         Endpoint host               (default: localhost)
  DOTS_OCR_PORT         Endpoint port               (default: 8000)
  DOTS_OCR_TOKEN        Bearer token                (default: EMPTY)
  DOTS_OCR_MODEL        Served model name           (default: dots-ocr)
  PDFIUM_LIB_PATH       Path to libpdfium
  RUST_LOG              Log filter override
"#;

/// Extract text from PDFs and images with a dots-ocr endpoint.
#[derive(Parser, Debug)]
#[command(
    name = "dots-ocr",
    version,
    about = "Extract text from PDFs and images with a dots-ocr inference endpoint",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// PDF or image file.
    input: PathBuf,

    /// Recognise only this page (1-indexed; PDFs only).
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    page: Option<u64>,

    /// Write text to this file instead of stdout.
    #[arg(short, long, env = "DOTS_OCR_OUTPUT")]
    output: Option<PathBuf>,

    /// Endpoint base URL; overrides --host/--port.
    #[arg(long, env = ENV_URL)]
    url: Option<String>,

    /// Endpoint host.
    #[arg(long, env = ENV_HOST, default_value = dots_ocr::config::DEFAULT_HOST)]
    host: String,

    /// Endpoint port.
    #[arg(long, env = ENV_PORT, default_value_t = dots_ocr::config::DEFAULT_PORT)]
    port: u16,

    /// Bearer token.
    #[arg(long, env = ENV_TOKEN, default_value = dots_ocr::config::DEFAULT_TOKEN, hide_env_values = true)]
    token: String,

    /// Served model name.
    #[arg(long, env = ENV_MODEL, default_value = dots_ocr::prompts::DEFAULT_MODEL)]
    model: String,

    /// Inference requests in flight at once. Output order is unaffected.
    #[arg(short, long, env = "DOTS_OCR_CONCURRENCY", default_value_t = 1,
          value_parser = clap::value_parser!(u16).range(1..=64))]
    concurrency: u16,

    /// Exit 1 if any page fails (text is still written).
    #[arg(long, env = "DOTS_OCR_STRICT")]
    strict: bool,

    /// Path to the pdfium shared library.
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,

    /// Disable progress bar.
    #[arg(long, env = "DOTS_OCR_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DOTS_OCR_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "DOTS_OCR_QUIET")]
    quiet: bool,
}

/// Help and version requests exit 0; every other parse problem exits 1.
fn parse_exit_code(err: &clap::Error) -> i32 {
    match err.kind() {
        clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => 0,
        _ => 1,
    }
}

fn parse_cli() -> Cli {
    match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = parse_exit_code(&e);
            let _ = e.print();
            std::process::exit(code);
        }
    }
}

/// Exit status when the run was interrupted.
const EXIT_INTERRUPTED: u8 = 130;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = parse_cli();

    // ── Logging setup ────────────────────────────────────────────────────
    // Page failures are warnings, so the bar never hides them.
    let show_progress =
        cli.output.is_some() && !cli.quiet && !cli.no_progress && io::stderr().is_terminal();
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else if show_progress {
        "warn"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build config ─────────────────────────────────────────────────────
    let progress: Option<ProgressCallback> = if show_progress {
        Some(CliProgress::new() as Arc<dyn PageProgress>)
    } else {
        None
    };
    let config = build_config(&cli, progress)?;
    let runner = PipelineRunner::new(config).context("Failed to initialise pipeline")?;

    // ── Run ──────────────────────────────────────────────────────────────
    let mut sink = OutputSink::for_output(cli.output.as_deref());
    let output = tokio::select! {
        result = runner.run(&cli.input, &mut sink) => result.context("OCR run failed")?,
        _ = tokio::signal::ctrl_c() => {
            // The run future is dropped here, taking its page workspace with it.
            // A page still being rendered is cleaned up by its render thread,
            // which the runtime waits for on the way out of `main`.
            drop(sink);
            eprintln!("{} interrupted", red("✘"));
            return Ok(ExitCode::from(EXIT_INTERRUPTED));
        }
    };
    let target = sink.describe();
    sink.commit().context("Failed to finish output")?;

    // ── Summary ──────────────────────────────────────────────────────────
    let stats = &output.stats;
    if !cli.quiet {
        let mark = if stats.failed_pages == 0 {
            green("✔")
        } else {
            red("✘")
        };
        eprintln!(
            "{}  {}/{} pages  {}ms  →  {}",
            mark,
            stats.succeeded_pages,
            stats.total_pages,
            stats.total_duration_ms,
            target.display(),
        );
        if stats.failed_pages > 0 {
            eprintln!("   {} pages failed", red(&stats.failed_pages.to_string()));
        }
    }

    check_strict(cli.strict, output)?;
    Ok(ExitCode::SUCCESS)
}

/// Lenient runs succeed with failed pages; strict runs do not.
fn check_strict(strict: bool, output: PipelineOutput) -> Result<PipelineOutput> {
    if strict {
        output.into_result().context("Strict mode")
    } else {
        Ok(output)
    }
}

/// Map CLI args to `PipelineConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<PipelineConfig> {
    let endpoint = EndpointConfig::from_lookup(|key| match key {
        ENV_URL => cli.url.clone(),
        ENV_HOST => Some(cli.host.clone()),
        ENV_PORT => Some(cli.port.to_string()),
        ENV_TOKEN => Some(cli.token.clone()),
        ENV_MODEL => Some(cli.model.clone()),
        _ => None,
    })
    .context("Invalid endpoint configuration")?;

    let pages = match cli.page {
        Some(p) => PageSelection::Single(p as usize),
        None => PageSelection::All,
    };

    let mut builder = PipelineConfig::builder()
        .endpoint(endpoint)
        .pages(pages)
        .concurrency(cli.concurrency as usize);

    if let Some(ref lib) = cli.pdfium_lib {
        builder = builder.pdfium_lib_path(lib);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
