//! Pipeline runner: health → detect → split → recognise → assemble.
//!
//! ```text
//! Idle ─▶ HealthChecking ─▶ Detecting ─┬─▶ Splitting ─┬─▶ Recognizing[1..N] ─▶ Assembling ─▶ Done
//!                                      └──────────────┘
//!   any state ──(fatal)──▶ Aborted
//! ```
//!
//! Per-page inference failures never leave `Recognizing`: they are logged,
//! recorded in the page's slot, and the next page is sent. Only the fatal
//! conditions in [`PipelineError`] abort a run.
//!
//! Dropping the future returned by [`PipelineRunner::run`] at any await point
//! drops the page workspace with it, so an interrupted run leaves no
//! rendered pages on disk.

use crate::assemble::Assembler;
use crate::config::{PageSelection, PipelineConfig};
use crate::error::PipelineError;
use crate::output::{OcrResult, PipelineOutput, RunStats};
use crate::pipeline::detect::Document;
use crate::pipeline::health::ensure_healthy;
use crate::pipeline::ocr::{OcrBackend, OcrClient};
use crate::pipeline::render::{PdfiumRasterizer, Rasterizer};
use crate::pipeline::split::{PageSet, PageSplitter};
use crate::stream::recognize_pages;
use futures::StreamExt;
use std::fmt;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Where a run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    HealthChecking,
    Detecting,
    Splitting,
    Recognizing { page: usize, total: usize },
    Assembling,
    Done,
    Aborted,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::Recognizing { page, total } => write!(f, "Recognizing[{page}/{total}]"),
            other => write!(f, "{:?}", other),
        }
    }
}

struct StateTracker {
    current: PipelineState,
}

impl StateTracker {
    fn new() -> Self {
        Self {
            current: PipelineState::Idle,
        }
    }

    fn enter(&mut self, next: PipelineState) {
        debug!("pipeline {} → {}", self.current, next);
        self.current = next;
    }
}

/// Runs documents through the pipeline against one backend.
pub struct PipelineRunner {
    config: PipelineConfig,
    backend: Arc<dyn OcrBackend>,
    splitter: PageSplitter,
}

impl PipelineRunner {
    /// HTTP backend from `config.endpoint`, pdfium for rendering.
    pub fn new(config: PipelineConfig) -> Result<Self, PipelineError> {
        let backend = Arc::new(OcrClient::new(&config)?);
        let rasterizer = Arc::new(PdfiumRasterizer::new(config.pdfium_lib_path.clone()));
        Ok(Self::with_parts(config, backend, rasterizer))
    }

    /// Assemble a runner from explicit parts.
    pub fn with_parts(
        config: PipelineConfig,
        backend: Arc<dyn OcrBackend>,
        rasterizer: Arc<dyn Rasterizer>,
    ) -> Self {
        let splitter = PageSplitter::new(rasterizer, config.dpi, config.workspace_root.clone());
        Self {
            config,
            backend,
            splitter,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run `input` through the pipeline, writing text to `out` page by page.
    ///
    /// # Returns
    /// `Ok(PipelineOutput)` once every page has been attempted, even if some
    /// failed (check `output.stats.failed_pages`, or call
    /// [`PipelineOutput::into_result`]).
    ///
    /// # Errors
    /// Only fatal conditions: unhealthy endpoint, missing input, invalid page
    /// selector, a document that renders to zero pages, a broken output stream.
    pub async fn run<W: Write + Send>(
        &self,
        input: impl AsRef<Path>,
        out: &mut W,
    ) -> Result<PipelineOutput, PipelineError> {
        let mut state = StateTracker::new();
        let result = self.run_inner(input.as_ref(), out, &mut state).await;
        if let Err(ref e) = result {
            warn!("Run aborted in state {}: {}", state.current, e);
            state.enter(PipelineState::Aborted);
        }
        result
    }

    /// Run without an output stream; the text is in `PipelineOutput::text`.
    pub async fn run_to_string(
        &self,
        input: impl AsRef<Path>,
    ) -> Result<PipelineOutput, PipelineError> {
        self.run(input, &mut io::sink()).await
    }

    async fn run_inner<W: Write + Send>(
        &self,
        input: &Path,
        out: &mut W,
        state: &mut StateTracker,
    ) -> Result<PipelineOutput, PipelineError> {
        let total_start = Instant::now();
        info!("Starting run: {}", input.display());

        // ── Step 1: Health gate ──────────────────────────────────────────────
        state.enter(PipelineState::HealthChecking);
        ensure_healthy(self.backend.as_ref()).await?;

        // ── Step 2: Detect ───────────────────────────────────────────────────
        state.enter(PipelineState::Detecting);
        let document = Document::load(input)?;

        // ── Step 3: Split ────────────────────────────────────────────────────
        let split_start = Instant::now();
        let page_set = if document.is_paginated() {
            state.enter(PipelineState::Splitting);
            self.splitter.split(&document.path, self.config.pages).await?
        } else {
            if let PageSelection::Single(p) = self.config.pages {
                warn!(
                    "--page {} ignored: '{}' is an image with a single page",
                    p,
                    document.path.display()
                );
            }
            PageSet::single_image(&document)
        };
        let split_duration_ms = split_start.elapsed().as_millis() as u64;

        // ── Step 4: Recognise, in page order ─────────────────────────────────
        let total = page_set.len();
        let progress = self.config.progress_callback.as_ref();
        if let Some(cb) = progress {
            cb.on_run_start(total);
        }

        let ocr_start = Instant::now();
        let mut stats = RunStats {
            total_pages: total,
            ..Default::default()
        };
        let mut assembler = Assembler::new(out);
        let mut pages = Vec::with_capacity(total);
        {
            let mut stream = recognize_pages(
                self.backend.as_ref(),
                page_set.pages(),
                self.config.concurrency,
                progress,
            );

            for expected in page_set.pages() {
                state.enter(PipelineState::Recognizing {
                    page: expected.index,
                    total,
                });
                let page = stream.next().await.ok_or_else(|| {
                    PipelineError::Internal(format!("no result for page {}", expected.index))
                })?;

                match &page.result {
                    OcrResult::Recognized { text } => {
                        debug!("Page {}: {} chars in {}ms", page.page, text.len(), page.duration_ms);
                        if let Some(cb) = progress {
                            cb.on_page_complete(page.page, total, text.len());
                        }
                    }
                    OcrResult::Unparsed { body } => {
                        warn!(
                            "Page {}: response is not a chat completion; using raw body",
                            page.page
                        );
                        if let Some(cb) = progress {
                            cb.on_page_complete(page.page, total, body.len());
                        }
                    }
                    OcrResult::Failed { error } => {
                        warn!("Page {}: OCR failed: {}", page.page, error);
                        if let Some(cb) = progress {
                            cb.on_page_error(page.page, total, error);
                        }
                    }
                }

                stats.record(&page.result);
                assembler.push(&page).map_err(PipelineError::OutputStream)?;
                pages.push(page);
            }
        }
        let ocr_duration_ms = ocr_start.elapsed().as_millis() as u64;

        // ── Step 5: Assemble ─────────────────────────────────────────────────
        state.enter(PipelineState::Assembling);
        let (_, text) = assembler.finish();
        drop(page_set);

        stats.split_duration_ms = split_duration_ms;
        stats.ocr_duration_ms = ocr_duration_ms;
        stats.total_duration_ms = total_start.elapsed().as_millis() as u64;

        if let Some(cb) = progress {
            cb.on_run_complete(total, stats.succeeded_pages);
        }
        state.enter(PipelineState::Done);
        info!(
            "Run complete: {}/{} pages recognised, {}ms total",
            stats.succeeded_pages, total, stats.total_duration_ms
        );

        Ok(PipelineOutput {
            text,
            pages,
            document,
            stats,
        })
    }
}
