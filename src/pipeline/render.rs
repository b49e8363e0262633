//! PDF rasterisation: render selected pages to `DynamicImage` via pdfium.
//!
//! Rendering sits behind the [`Rasterizer`] trait so the splitter can be
//! driven by something other than pdfium (tests, alternative backends).
//! Implementations are synchronous; the splitter calls them from
//! `spawn_blocking` because pdfium is CPU-bound and not async-safe.

use crate::config::PageSelection;
use crate::error::PipelineError;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// PDF user space is 72 points per inch.
const POINTS_PER_INCH: f32 = 72.0;

/// Renders pages of a paginated document.
pub trait Rasterizer: Send + Sync {
    /// Render the pages chosen by `selection` at `dpi`, in ascending page
    /// order, handing each `(1-based page, image)` to `emit`.
    ///
    /// Must fail with [`PipelineError::InvalidPage`] when a single selected
    /// page does not exist.
    fn rasterize(
        &self,
        path: &Path,
        selection: PageSelection,
        dpi: u32,
        emit: &mut dyn FnMut(usize, DynamicImage) -> Result<(), PipelineError>,
    ) -> Result<(), PipelineError>;
}

/// [`Rasterizer`] backed by the pdfium shared library.
#[derive(Debug, Clone, Default)]
pub struct PdfiumRasterizer {
    lib_path: Option<PathBuf>,
}

impl PdfiumRasterizer {
    /// `lib_path` names an explicit pdfium library; `None` tries the working
    /// directory and then the system library path.
    pub fn new(lib_path: Option<PathBuf>) -> Self {
        Self { lib_path }
    }

    fn bind(&self) -> Result<Pdfium, PipelineError> {
        let bindings = match &self.lib_path {
            Some(path) => Pdfium::bind_to_library(path),
            None => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
                .or_else(|_| Pdfium::bind_to_system_library()),
        }
        .map_err(|e| PipelineError::PdfiumBindingFailed(format!("{:?}", e)))?;

        Ok(Pdfium::new(bindings))
    }
}

impl Rasterizer for PdfiumRasterizer {
    fn rasterize(
        &self,
        path: &Path,
        selection: PageSelection,
        dpi: u32,
        emit: &mut dyn FnMut(usize, DynamicImage) -> Result<(), PipelineError>,
    ) -> Result<(), PipelineError> {
        let pdfium = self.bind()?;

        let document = pdfium
            .load_pdf_from_file(path, None)
            .map_err(|e| PipelineError::CorruptDocument {
                path: path.to_path_buf(),
                detail: format!("{:?}", e),
            })?;

        let pages = document.pages();
        let total_pages = pages.len() as usize;
        info!("PDF loaded: {} pages", total_pages);

        let selected = selection.resolve(total_pages)?;

        let render_config =
            PdfRenderConfig::new().scale_page_by_factor(dpi as f32 / POINTS_PER_INCH);

        for page_num in selected {
            let page = pages
                .get((page_num - 1) as PdfPageIndex)
                .map_err(|e| PipelineError::RasterisationFailed {
                    page: page_num,
                    detail: format!("{:?}", e),
                })?;

            let bitmap = page.render_with_config(&render_config).map_err(|e| {
                PipelineError::RasterisationFailed {
                    page: page_num,
                    detail: format!("{:?}", e),
                }
            })?;

            let image = bitmap.as_image();
            debug!(
                "Rendered page {} → {}x{} px",
                page_num,
                image.width(),
                image.height()
            );

            emit(page_num, image)?;
        }

        Ok(())
    }
}
