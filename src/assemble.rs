//! Output assembly: page texts joined with `--- Page N ---` markers.
//!
//! The marker goes before every page after the first one written, labelled
//! with that page's own number, so a run restricted to page 3 has no marker
//! at all. A failed page still gets its marker and an empty slot; page
//! numbering in the output never shifts because of a failure.
//!
//! Failure details never go into the text. Every failed page is logged at
//! `warn` with its status and body, counted in `RunStats::failed_pages`, and
//! kept in `PipelineOutput::pages`, so an empty slot between two markers
//! always means "this page failed", never "this page was blank and nobody
//! said so".

use crate::output::PageResult;
use std::io::{self, Write};

/// Marker written before page `page`.
pub fn page_separator(page: usize) -> String {
    format!("\n\n--- Page {page} ---\n\n")
}

/// Join results already in page order.
pub fn assemble(pages: &[PageResult]) -> String {
    let mut assembler = Assembler::new(io::sink());
    for page in pages {
        // io::Sink never fails
        let _ = assembler.push(page);
    }
    assembler.finish().1
}

/// Writes page texts to `W` as they arrive, keeping a copy of everything written.
pub struct Assembler<W: Write> {
    writer: W,
    emitted: usize,
    text: String,
}

impl<W: Write> Assembler<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            emitted: 0,
            text: String::new(),
        }
    }

    /// Append one page and flush, so stdout consumers see it immediately.
    pub fn push(&mut self, page: &PageResult) -> io::Result<()> {
        let mut chunk = String::new();
        if self.emitted > 0 {
            chunk.push_str(&page_separator(page.page));
        }
        chunk.push_str(page.result.text().unwrap_or(""));

        self.writer.write_all(chunk.as_bytes())?;
        self.writer.flush()?;
        self.text.push_str(&chunk);
        self.emitted += 1;
        Ok(())
    }

    /// Pages written so far.
    pub fn emitted(&self) -> usize {
        self.emitted
    }

    /// Hand back the writer and the assembled text.
    pub fn finish(self) -> (W, String) {
        (self.writer, self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PageError;
    use crate::output::OcrResult;

    fn ok(page: usize, text: &str) -> PageResult {
        PageResult {
            page,
            result: OcrResult::Recognized { text: text.into() },
            duration_ms: 0,
        }
    }

    fn failed(page: usize) -> PageResult {
        PageResult {
            page,
            result: OcrResult::Failed {
                error: PageError::HttpStatus {
                    status: 500,
                    body: "boom".into(),
                },
            },
            duration_ms: 0,
        }
    }

    #[test]
    fn separators_only_between_pages() {
        let text = assemble(&[ok(1, "A"), ok(2, "B"), ok(3, "C")]);
        assert_eq!(text, "A\n\n--- Page 2 ---\n\nB\n\n--- Page 3 ---\n\nC");
    }

    #[test]
    fn single_page_has_no_separator() {
        assert_eq!(assemble(&[ok(3, "only")]), "only");
    }

    #[test]
    fn failed_page_keeps_marker_with_empty_slot() {
        let text = assemble(&[ok(1, "A"), failed(2), ok(3, "C")]);
        assert_eq!(text, "A\n\n--- Page 2 ---\n\n\n\n--- Page 3 ---\n\nC");
        assert!(!text.contains("boom"));
    }

    #[test]
    fn writer_receives_same_bytes_as_text() {
        let mut a = Assembler::new(Vec::new());
        a.push(&ok(1, "x")).unwrap();
        a.push(&ok(2, "y")).unwrap();
        assert_eq!(a.emitted(), 2);
        let (buf, text) = a.finish();
        assert_eq!(String::from_utf8(buf).unwrap(), text);
    }
}
