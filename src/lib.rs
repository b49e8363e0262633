//! # dots-ocr
//!
//! Turn PDFs and images into ordered plain text by delegating recognition to
//! a dots-ocr inference endpoint (an OpenAI-compatible chat-completions
//! server such as vLLM).
//!
//! ## Pipeline Overview
//!
//! ```text
//! input
//!  │
//!  ├─ 1. Health   GET {base}/health must answer 200, or nothing else runs
//!  ├─ 2. Detect   extension → MIME type → image or paginated
//!  ├─ 3. Split    PDF pages → PNG files in a temp workspace (pdfium, 150 DPI)
//!  ├─ 4. OCR      one chat-completion request per page, in page order
//!  └─ 5. Output   page texts joined with "--- Page N ---" markers
//! ```
//!
//! A page whose request fails is logged and left empty; the run carries on
//! and still succeeds. Fatal problems (missing input, unhealthy endpoint,
//! a page selector past the end of the document, a PDF that renders to
//! nothing) abort the run before any text is written.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dots_ocr::{EndpointConfig, PipelineConfig, PipelineRunner};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PipelineConfig::builder()
//!         .endpoint(EndpointConfig::from_env()?)
//!         .build()?;
//!     let runner = PipelineRunner::new(config)?;
//!     let output = runner.run_to_string("scan.pdf").await?;
//!     println!("{}", output.text);
//!     eprintln!("{} pages failed", output.stats.failed_pages);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `dots-ocr` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod assemble;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod runner;
pub mod sink;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{EndpointConfig, PageSelection, PipelineConfig, PipelineConfigBuilder};
pub use error::{ErrorKind, PageError, PipelineError};
pub use output::{OcrResult, PageResult, PipelineOutput, RunStats};
pub use pipeline::detect::{detect, Document, DocumentKind, MimeType};
pub use pipeline::ocr::{OcrBackend, OcrClient};
pub use pipeline::render::{PdfiumRasterizer, Rasterizer};
pub use pipeline::split::{Page, PageSet, PageSplitter};
pub use progress::{NoopProgress, PageProgress, ProgressCallback};
pub use runner::{PipelineRunner, PipelineState};
pub use sink::OutputSink;
