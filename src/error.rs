//! Error types for the dots-ocr library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`PipelineError`] — **Fatal**: the run cannot proceed at all (missing
//!   input, unreachable endpoint, a document that renders to nothing).
//!   Returned as `Err(PipelineError)` from [`crate::runner::PipelineRunner`].
//!
//! * [`PageError`] — **Non-fatal**: one page's inference call failed but every
//!   other page is fine. Stored inside [`crate::output::OcrResult::Failed`] so
//!   the run keeps going and the failure stays attached to its page slot.

use std::path::PathBuf;
use thiserror::Error;

/// Coarse classification of a fatal error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input path, bad flag, invalid page selector.
    Config,
    /// The inference endpoint is not reachable or not healthy.
    Availability,
    /// The document could not be turned into pages.
    Conversion,
    /// The assembled text could not be written.
    Output,
    /// Anything else.
    Internal,
}

/// All fatal errors returned by the dots-ocr library.
///
/// Page-level inference failures use [`PageError`] and never surface here
/// (except as [`PipelineError::PageFailures`] when strict mode is on).
#[derive(Debug, Error)]
pub enum PipelineError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Input file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The path exists but is a directory or other non-regular file.
    #[error("Input '{path}' is not a regular file")]
    NotAFile { path: PathBuf },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The requested page does not exist in the document.
    #[error("Page {page} does not exist (document has {total} pages)")]
    InvalidPage { page: usize, total: usize },

    // ── Endpoint errors ───────────────────────────────────────────────────
    /// `GET {base}/health` did not answer 200 within the health timeout.
    #[error("OCR endpoint at '{endpoint}' is not healthy.\nIs the inference service running?")]
    EndpointUnavailable { endpoint: String },

    /// The HTTP client could not be constructed.
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),

    // ── Conversion errors ─────────────────────────────────────────────────
    /// A non-empty paginated document rendered to zero page images.
    #[error("Document '{path}' produced no pages; it may be corrupt or unsupported")]
    ZeroPages { path: PathBuf },

    /// pdfium refused to open the document.
    #[error("Document '{path}' could not be opened: {detail}")]
    CorruptDocument { path: PathBuf, detail: String },

    /// pdfium returned an error for a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium (or pass --pdfium-lib), place the\n\
library in the working directory, or install it system-wide.\n"
    )]
    PdfiumBindingFailed(String),

    /// The temporary page workspace could not be created or read.
    #[error("Page workspace error: {0}")]
    Workspace(#[source] std::io::Error),

    // ── Output errors ─────────────────────────────────────────────────────
    /// Could not create or write the output text file.
    #[error("Failed to write output '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The output stream rejected a write mid-run.
    #[error("Failed to write assembled text: {0}")]
    OutputStream(#[source] std::io::Error),

    /// Strict mode only: at least one page failed inference.
    #[error("{failed}/{total} pages failed OCR")]
    PageFailures { failed: usize, total: usize },

    /// The run was dropped while pages were still being rendered.
    #[error("Run cancelled")]
    Cancelled,

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    /// Which bucket of the fatal taxonomy this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::FileNotFound { .. }
            | PipelineError::PermissionDenied { .. }
            | PipelineError::NotAFile { .. }
            | PipelineError::InvalidConfig(_)
            | PipelineError::InvalidPage { .. } => ErrorKind::Config,
            PipelineError::EndpointUnavailable { .. } | PipelineError::HttpClient(_) => {
                ErrorKind::Availability
            }
            PipelineError::ZeroPages { .. }
            | PipelineError::CorruptDocument { .. }
            | PipelineError::RasterisationFailed { .. }
            | PipelineError::PdfiumBindingFailed(_)
            | PipelineError::Workspace(_) => ErrorKind::Conversion,
            PipelineError::OutputWriteFailed { .. }
            | PipelineError::OutputStream(_)
            | PipelineError::PageFailures { .. } => ErrorKind::Output,
            PipelineError::Cancelled | PipelineError::Internal(_) => ErrorKind::Internal,
        }
    }
}

/// A non-fatal error for a single page.
///
/// The run records it in the page's slot and moves on to the next page.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize)]
pub enum PageError {
    /// The endpoint answered with something other than 200.
    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    /// Connection refused, reset, DNS failure, …
    #[error("request failed: {detail}")]
    Transport { detail: String },

    /// No response within the request timeout.
    #[error("request timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The page image could not be read back from the workspace.
    #[error("could not read page image: {detail}")]
    ReadFailed { detail: String },
}
