//! Pipeline stages for document-to-text recognition.
//!
//! Each submodule implements exactly one step.
//!
//! ## Data Flow
//!
//! ```text
//! health ──▶ detect ──▶ split ──▶ encode ──▶ ocr
//! (GET)      (ext→MIME) (pdfium)  (base64)   (POST, per page)
//! ```
//!
//! 1. [`health`] — probe `{base}/health` before anything touches disk
//! 2. [`detect`] — validate the input path and classify it by extension
//! 3. [`split`]  — for PDFs, render pages into a scoped temp workspace;
//!    [`render`] holds the pdfium rasteriser behind a trait
//! 4. [`encode`] — PNG-encode rendered pages, base64 data URIs for requests
//! 5. [`ocr`]    — the only stage with request/response network I/O

pub mod detect;
pub mod encode;
pub mod health;
pub mod ocr;
pub mod render;
pub mod split;
