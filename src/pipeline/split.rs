//! Page splitting: paginated document → ordered page images on disk.
//!
//! Rendered pages are written as `page-{n}.png` into a [`PageWorkspace`], a
//! temporary directory owned by the run. The directory is removed when the
//! workspace is dropped, which covers normal completion, `?` early returns,
//! panics, and the run future being dropped on Ctrl-C. Rendering runs on a
//! blocking thread that only borrows the directory path, so dropping the
//! run mid-render still removes the workspace at once.
//!
//! Pages are read back from the directory listing, ordered by the numeric
//! part of the file name. A plain string sort would put `page-10.png`
//! before `page-2.png`.

use crate::config::PageSelection;
use crate::error::PipelineError;
use crate::pipeline::detect::{Document, MimeType};
use crate::pipeline::encode::encode_png;
use crate::pipeline::render::Rasterizer;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use tracing::{debug, info};

static RE_PAGE_FILE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^page-(\d+)\.png$").unwrap());

/// One recognition unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// 1-based page number in the source document.
    pub index: usize,
    pub mime: MimeType,
    /// Image file the page's bytes are read from.
    pub source: PathBuf,
}

impl Page {
    /// Read the page's image bytes.
    pub async fn load(&self) -> std::io::Result<Vec<u8>> {
        tokio::fs::read(&self.source).await
    }
}

/// Temporary directory holding rendered pages for the lifetime of a run.
#[derive(Debug)]
pub struct PageWorkspace {
    dir: TempDir,
}

impl PageWorkspace {
    /// Create a fresh workspace under `root`, or the system temp dir.
    pub fn create(root: Option<&Path>) -> Result<Self, PipelineError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("dots-ocr-pages-");
        let dir = match root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
        .map_err(PipelineError::Workspace)?;
        debug!("Created page workspace {}", dir.path().display());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Where page `n` is written.
    pub fn page_path(&self, page: usize) -> PathBuf {
        page_file(self.dir.path(), page)
    }

    /// List rendered pages in ascending numeric order.
    ///
    /// Files that do not look like `page-{n}.png` are ignored.
    pub fn collect_pages(&self) -> Result<Vec<Page>, PipelineError> {
        let mut pages = Vec::new();
        for entry in std::fs::read_dir(self.dir.path()).map_err(PipelineError::Workspace)? {
            let entry = entry.map_err(PipelineError::Workspace)?;
            let name = entry.file_name();
            let Some(index) = name.to_str().and_then(page_number) else {
                continue;
            };
            pages.push(Page {
                index,
                mime: MimeType::Png,
                source: entry.path(),
            });
        }
        pages.sort_by_key(|p| p.index);
        Ok(pages)
    }
}

fn page_file(dir: &Path, page: usize) -> PathBuf {
    dir.join(format!("page-{page}.png"))
}

fn page_number(file_name: &str) -> Option<usize> {
    RE_PAGE_FILE
        .captures(file_name)
        .and_then(|c| c[1].parse().ok())
}

/// The ordered pages of a run, plus the workspace that backs them.
///
/// Dropping a `PageSet` removes any rendered files.
#[derive(Debug)]
pub struct PageSet {
    pages: Vec<Page>,
    workspace: Option<PageWorkspace>,
}

impl PageSet {
    /// A direct image: one page, read straight from the input file.
    pub fn single_image(document: &Document) -> Self {
        Self {
            pages: vec![Page {
                index: 1,
                mime: document.mime,
                source: document.path.clone(),
            }],
            workspace: None,
        }
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Directory holding rendered pages, if any were rendered.
    pub fn workspace_path(&self) -> Option<&Path> {
        self.workspace.as_ref().map(|w| w.path())
    }
}

/// Renders a paginated document into a [`PageSet`].
#[derive(Clone)]
pub struct PageSplitter {
    rasterizer: Arc<dyn Rasterizer>,
    dpi: u32,
    workspace_root: Option<PathBuf>,
}

impl PageSplitter {
    pub fn new(rasterizer: Arc<dyn Rasterizer>, dpi: u32, workspace_root: Option<PathBuf>) -> Self {
        Self {
            rasterizer,
            dpi,
            workspace_root,
        }
    }

    /// Render the selected pages of `document` into a fresh workspace.
    ///
    /// The workspace stays owned by this future. If the future is dropped
    /// mid-render, the render task is told to stop at the next page and the
    /// directory is removed along with anything written after the drop.
    ///
    /// # Errors
    /// - [`PipelineError::InvalidPage`] if a single selected page does not exist
    /// - [`PipelineError::ZeroPages`] if rendering produced nothing
    /// - rasteriser errors (binding, corrupt document, per-page render failure)
    pub async fn split(
        &self,
        document: &Path,
        selection: PageSelection,
    ) -> Result<PageSet, PipelineError> {
        let workspace = PageWorkspace::create(self.workspace_root.as_deref())?;
        // Dropped before `workspace`, so the flag is up before the directory goes.
        let cancel = CancelOnDrop::new();

        let rasterizer = Arc::clone(&self.rasterizer);
        let path = document.to_path_buf();
        let dir = workspace.path().to_path_buf();
        let cancelled = cancel.flag();
        let dpi = self.dpi;

        tokio::task::spawn_blocking(move || {
            render_into(rasterizer.as_ref(), &path, selection, dpi, &dir, &cancelled)
        })
        .await
        .map_err(|e| PipelineError::Internal(format!("Render task panicked: {}", e)))??;

        let pages = workspace.collect_pages()?;
        if pages.is_empty() {
            return Err(PipelineError::ZeroPages {
                path: document.to_path_buf(),
            });
        }
        info!("Split {} into {} pages", document.display(), pages.len());

        Ok(PageSet {
            pages,
            workspace: Some(workspace),
        })
    }
}

/// Raises its flag when the owning future goes away.
struct CancelOnDrop(Arc<AtomicBool>);

impl CancelOnDrop {
    fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.0)
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Blocking half of [`PageSplitter::split`]: render pages as PNGs into `dir`.
fn render_into(
    rasterizer: &dyn Rasterizer,
    path: &Path,
    selection: PageSelection,
    dpi: u32,
    dir: &Path,
    cancelled: &AtomicBool,
) -> Result<(), PipelineError> {
    let result = rasterizer.rasterize(path, selection, dpi, &mut |page, image| {
        if cancelled.load(Ordering::SeqCst) {
            return Err(PipelineError::Cancelled);
        }
        let png = encode_png(&image).map_err(|e| PipelineError::RasterisationFailed {
            page,
            detail: format!("PNG encoding failed: {}", e),
        })?;
        std::fs::write(page_file(dir, page), png).map_err(PipelineError::Workspace)
    });

    if cancelled.load(Ordering::SeqCst) {
        // The workspace owner is gone; a page may have landed after it removed the directory.
        let _ = std::fs::remove_dir_all(dir);
        debug!("Render of {} cancelled", path.display());
        return Err(PipelineError::Cancelled);
    }
    result
}
