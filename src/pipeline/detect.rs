//! Format detection: file extension → MIME type → image or paginated.
//!
//! Detection is a pure function of the file name. Unknown extensions are
//! treated as PNG rather than rejected; the endpoint is the final judge of
//! whether the bytes are an image it can read.

use crate::error::PipelineError;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// MIME types the pipeline distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MimeType {
    #[serde(rename = "image/png")]
    Png,
    #[serde(rename = "image/jpeg")]
    Jpeg,
    #[serde(rename = "image/tiff")]
    Tiff,
    #[serde(rename = "image/bmp")]
    Bmp,
    #[serde(rename = "image/webp")]
    Webp,
    #[serde(rename = "application/pdf")]
    Pdf,
}

impl MimeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MimeType::Png => "image/png",
            MimeType::Jpeg => "image/jpeg",
            MimeType::Tiff => "image/tiff",
            MimeType::Bmp => "image/bmp",
            MimeType::Webp => "image/webp",
            MimeType::Pdf => "application/pdf",
        }
    }

    /// Map a bare extension (no dot, any case). Unknown → PNG.
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "png" => MimeType::Png,
            "jpg" | "jpeg" => MimeType::Jpeg,
            "tiff" | "tif" => MimeType::Tiff,
            "bmp" => MimeType::Bmp,
            "webp" => MimeType::Webp,
            "pdf" => MimeType::Pdf,
            _ => MimeType::Png,
        }
    }

    pub fn is_paginated(&self) -> bool {
        *self == MimeType::Pdf
    }
}

impl fmt::Display for MimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Detect the MIME type of `path` from its extension.
pub fn detect(path: &Path) -> MimeType {
    path.extension()
        .and_then(|e| e.to_str())
        .map(MimeType::from_extension)
        .unwrap_or(MimeType::Png)
}

/// How a document is split into recognition units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    /// Sent to the endpoint as-is; exactly one implicit page.
    Image,
    /// Rendered page by page before recognition.
    Paginated,
}

/// An input file that exists, is readable, and has been classified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Document {
    pub path: PathBuf,
    pub mime: MimeType,
    pub kind: DocumentKind,
}

impl Document {
    /// Validate `path` and classify it.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let path = path.as_ref().to_path_buf();

        let meta = match std::fs::metadata(&path) {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                return Err(PipelineError::PermissionDenied { path });
            }
            Err(_) => return Err(PipelineError::FileNotFound { path }),
        };
        if !meta.is_file() {
            return Err(PipelineError::NotAFile { path });
        }

        // Check read permission by attempting to open
        if let Err(e) = std::fs::File::open(&path) {
            return Err(match e.kind() {
                std::io::ErrorKind::PermissionDenied => PipelineError::PermissionDenied { path },
                _ => PipelineError::FileNotFound { path },
            });
        }

        let mime = detect(&path);
        let kind = if mime.is_paginated() {
            DocumentKind::Paginated
        } else {
            DocumentKind::Image
        };
        debug!("Detected {} as {} ({:?})", path.display(), mime, kind);

        Ok(Self { path, mime, kind })
    }

    pub fn is_paginated(&self) -> bool {
        self.kind == DocumentKind::Paginated
    }
}
