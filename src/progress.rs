//! Progress events for per-page recognition.
//!
//! Inject an [`Arc<dyn PageProgress>`] via
//! [`crate::config::PipelineConfigBuilder::progress_callback`] to hear about
//! each page as it is sent and answered. The CLI uses this to drive its
//! progress bar; library callers can forward events anywhere.
//!
//! With `concurrency > 1`, `on_page_start` for page 3 may fire before
//! `on_page_complete` for page 2. Completion events themselves always arrive
//! in page order because they fire when a result leaves the ordered buffer.

use crate::error::PageError;
use std::sync::Arc;

/// Called by the pipeline as it processes each page.
///
/// All methods default to no-ops.
pub trait PageProgress: Send + Sync {
    /// Called once after splitting, before any inference call.
    fn on_run_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called just before the inference request for a page is sent.
    fn on_page_start(&self, page: usize, total_pages: usize) {
        let _ = (page, total_pages);
    }

    /// Called when a page's text is ready.
    ///
    /// `text_len` is the byte length of the recognised text.
    fn on_page_complete(&self, page: usize, total_pages: usize, text_len: usize) {
        let _ = (page, total_pages, text_len);
    }

    /// Called when a page's inference call failed. The run continues.
    fn on_page_error(&self, page: usize, total_pages: usize, error: &PageError) {
        let _ = (page, total_pages, error);
    }

    /// Called once after every page has been attempted.
    fn on_run_complete(&self, total_pages: usize, succeeded: usize) {
        let _ = (total_pages, succeeded);
    }
}

/// Does nothing.
pub struct NoopProgress;

impl PageProgress for NoopProgress {}

/// Type stored in [`crate::config::PipelineConfig`].
pub type ProgressCallback = Arc<dyn PageProgress>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counting {
        completes: AtomicUsize,
        errors: AtomicUsize,
    }

    impl PageProgress for Counting {
        fn on_page_complete(&self, _page: usize, _total: usize, _len: usize) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_page_error(&self, _page: usize, _total: usize, _error: &PageError) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_accepts_every_event() {
        let cb: ProgressCallback = Arc::new(NoopProgress);
        cb.on_run_start(2);
        cb.on_page_start(1, 2);
        cb.on_page_complete(1, 2, 10);
        cb.on_page_error(2, 2, &PageError::Timeout { secs: 1 });
        cb.on_run_complete(2, 1);
    }

    #[test]
    fn overridden_methods_receive_events() {
        let cb = Counting::default();
        cb.on_page_complete(1, 2, 5);
        cb.on_page_error(2, 2, &PageError::Transport { detail: "reset".into() });
        assert_eq!(cb.completes.load(Ordering::SeqCst), 1);
        assert_eq!(cb.errors.load(Ordering::SeqCst), 1);
    }
}
