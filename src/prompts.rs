//! Fixed request parameters for the dots-ocr chat endpoint.
//!
//! The served model answers a bare "extract the text" instruction best; it
//! is trained for document parsing, so no system prompt or layout rules are
//! sent. Everything that ends up in a request body besides the image lives
//! here.

/// Text part sent alongside every page image.
pub const OCR_INSTRUCTION: &str = "Extract all text from this document.";

/// Model name the inference server registers the checkpoint under.
pub const DEFAULT_MODEL: &str = "dots-ocr";

/// Output token budget per page.
pub const DEFAULT_MAX_TOKENS: usize = 2048;
