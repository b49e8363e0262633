//! Result types produced by a run.

use crate::error::{PageError, PipelineError};
use crate::pipeline::detect::Document;
use serde::Serialize;

/// Outcome of one inference call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OcrResult {
    /// HTTP 200 with a well-formed chat completion; `choices[0].message.content`.
    Recognized { text: String },
    /// HTTP 200 whose body did not decode as a chat completion. The raw body
    /// is kept as the page text rather than dropped.
    Unparsed { body: String },
    /// Anything other than a 200.
    Failed { error: PageError },
}

impl OcrResult {
    /// Text that goes into the page's output slot, if any.
    pub fn text(&self) -> Option<&str> {
        match self {
            OcrResult::Recognized { text } => Some(text),
            OcrResult::Unparsed { body } => Some(body),
            OcrResult::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&PageError> {
        match self {
            OcrResult::Failed { error } => Some(error),
            _ => None,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, OcrResult::Failed { .. })
    }
}

/// One page's slot in the output.
#[derive(Debug, Clone, Serialize)]
pub struct PageResult {
    /// 1-based page number in the source document.
    pub page: usize,
    pub result: OcrResult,
    /// Wall-clock time of the inference call.
    pub duration_ms: u64,
}

/// Counters for a finished run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    /// Pages sent to the endpoint (after selection).
    pub total_pages: usize,
    /// Pages with text in their slot (recognised or raw-body fallback).
    pub succeeded_pages: usize,
    /// Of the succeeded pages, those that fell back to the raw body.
    pub unparsed_pages: usize,
    /// Pages whose inference call failed.
    pub failed_pages: usize,
    pub split_duration_ms: u64,
    pub ocr_duration_ms: u64,
    pub total_duration_ms: u64,
}

impl RunStats {
    pub(crate) fn record(&mut self, result: &OcrResult) {
        match result {
            OcrResult::Recognized { .. } => self.succeeded_pages += 1,
            OcrResult::Unparsed { .. } => {
                self.succeeded_pages += 1;
                self.unparsed_pages += 1;
            }
            OcrResult::Failed { .. } => self.failed_pages += 1,
        }
    }
}

/// Everything a run produced.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutput {
    /// Assembled text exactly as written to the sink (without the final newline).
    pub text: String,
    /// Per-page results in page order.
    pub pages: Vec<PageResult>,
    pub document: Document,
    pub stats: RunStats,
}

impl PipelineOutput {
    /// Treat any failed page as an error.
    ///
    /// Runs are lenient by default; call this after the text has been
    /// written when a partial result should still fail the caller.
    pub fn into_result(self) -> Result<Self, PipelineError> {
        if self.stats.failed_pages > 0 {
            return Err(PipelineError::PageFailures {
                failed: self.stats.failed_pages,
                total: self.stats.total_pages,
            });
        }
        Ok(self)
    }
}
