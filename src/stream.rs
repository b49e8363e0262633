//! Ordered recognition stream: pages in, `PageResult`s out, in page order.
//!
//! Up to `concurrency` inference calls run at once. Results pass through the
//! ordered buffer of [`futures::StreamExt::buffered`], so a fast page 3
//! waits for a slow page 2 before it is yielded. With `concurrency = 1` this
//! degenerates to strictly sequential calls.

use crate::error::PageError;
use crate::output::{OcrResult, PageResult};
use crate::pipeline::ocr::OcrBackend;
use crate::pipeline::split::Page;
use crate::progress::ProgressCallback;
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use std::time::Instant;
use tokio_stream::Stream;
use tracing::debug;

/// A boxed stream of page results, yielded in page order.
pub type PageStream<'a> = Pin<Box<dyn Stream<Item = PageResult> + Send + 'a>>;

/// Recognise `pages` against `backend`, yielding one result per page.
///
/// The stream always yields exactly `pages.len()` items. A page whose image
/// cannot be read is reported as [`PageError::ReadFailed`] in its slot.
pub fn recognize_pages<'a>(
    backend: &'a dyn OcrBackend,
    pages: &'a [Page],
    concurrency: usize,
    progress: Option<&'a ProgressCallback>,
) -> PageStream<'a> {
    let total = pages.len();

    let s = stream::iter(pages.iter().map(move |page| async move {
        if let Some(cb) = progress {
            cb.on_page_start(page.index, total);
        }
        let start = Instant::now();

        let result = match page.load().await {
            Ok(bytes) => {
                debug!("Page {}: sending {} bytes ({})", page.index, bytes.len(), page.mime);
                backend.recognize(&bytes, page.mime).await
            }
            Err(e) => OcrResult::Failed {
                error: PageError::ReadFailed {
                    detail: format!("{}: {}", page.source.display(), e),
                },
            },
        };

        PageResult {
            page: page.index,
            result,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }))
    .buffered(concurrency.max(1));

    Box::pin(s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::detect::MimeType;
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::time::Duration;

    /// Answers with the image bytes as text, slower for lower page bytes.
    struct Echo;

    #[async_trait]
    impl OcrBackend for Echo {
        fn endpoint(&self) -> &str {
            "echo"
        }

        async fn check_health(&self) -> bool {
            true
        }

        async fn recognize(&self, image: &[u8], _mime: MimeType) -> OcrResult {
            let n: u64 = String::from_utf8_lossy(image).parse().unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(50u64.saturating_sub(n * 10))).await;
            OcrResult::Recognized {
                text: String::from_utf8_lossy(image).into_owned(),
            }
        }
    }

    fn pages_in(dir: &std::path::Path, n: usize) -> Vec<Page> {
        (1..=n)
            .map(|i| {
                let source = dir.join(format!("page-{i}.png"));
                std::fs::write(&source, i.to_string()).unwrap();
                Page {
                    index: i,
                    mime: MimeType::Png,
                    source,
                }
            })
            .collect()
    }

    #[tokio::test]
    async fn concurrent_results_come_out_in_page_order() {
        let dir = tempfile::tempdir().unwrap();
        let pages = pages_in(dir.path(), 4);

        let results: Vec<PageResult> = recognize_pages(&Echo, &pages, 4, None).collect().await;
        let order: Vec<usize> = results.iter().map(|r| r.page).collect();
        assert_eq!(order, vec![1, 2, 3, 4]);
        assert_eq!(results[2].result.text(), Some("3"));
    }

    #[tokio::test]
    async fn unreadable_page_keeps_its_slot() {
        let dir = tempfile::tempdir().unwrap();
        let mut pages = pages_in(dir.path(), 2);
        pages.insert(
            1,
            Page {
                index: 2,
                mime: MimeType::Png,
                source: PathBuf::from("/nonexistent/page-2.png"),
            },
        );
        pages[2].index = 3;

        let results: Vec<PageResult> = recognize_pages(&Echo, &pages, 1, None).collect().await;
        assert_eq!(results.len(), 3);
        assert!(matches!(
            results[1].result.error(),
            Some(PageError::ReadFailed { .. })
        ));
        assert_eq!(results[2].page, 3);
    }
}
