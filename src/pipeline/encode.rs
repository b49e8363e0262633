//! Image encoding: rendered pages → PNG bytes, and bytes → base64 data URI.
//!
//! Pages are stored as PNG because it is lossless; JPEG artefacts on
//! rendered glyphs degrade recognition at 150 DPI.

use crate::pipeline::detect::MimeType;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode a rendered page as PNG.
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    Ok(buf)
}

/// `data:{mime};base64,{data}` for embedding in an `image_url` content part.
pub fn data_uri(bytes: &[u8], mime: MimeType) -> String {
    let b64 = STANDARD.encode(bytes);
    debug!("Encoded {} bytes → {} bytes base64", bytes.len(), b64.len());
    format!("data:{};base64,{}", mime.as_str(), b64)
}
