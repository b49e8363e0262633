//! Output sinks: progressive stdout or an atomically written file.
//!
//! A file sink writes into a sibling temp file that is only renamed over the
//! target in [`OutputSink::commit`]. The temp file is created on the first
//! write, so a run that aborts before producing text leaves nothing behind,
//! and one that aborts midway leaves the previous target untouched.

use crate::error::PipelineError;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

enum Target {
    Stdout(io::Stdout),
    File {
        path: PathBuf,
        tmp: Option<NamedTempFile>,
    },
}

/// Where assembled text goes.
pub struct OutputSink {
    target: Target,
    last_byte: Option<u8>,
}

impl OutputSink {
    pub fn stdout() -> Self {
        Self {
            target: Target::Stdout(io::stdout()),
            last_byte: None,
        }
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            target: Target::File {
                path: path.into(),
                tmp: None,
            },
            last_byte: None,
        }
    }

    /// `Some(path)` → file sink, `None` → stdout.
    pub fn for_output(path: Option<&Path>) -> Self {
        match path {
            Some(p) => Self::file(p),
            None => Self::stdout(),
        }
    }

    /// Display name for error messages.
    pub fn describe(&self) -> PathBuf {
        match &self.target {
            Target::Stdout(_) => PathBuf::from("<stdout>"),
            Target::File { path, .. } => path.clone(),
        }
    }

    /// Terminate the text with a newline and make it visible.
    ///
    /// For a file sink this is the atomic rename; until then the target
    /// path is not touched.
    pub fn commit(mut self) -> Result<(), PipelineError> {
        let target = self.describe();
        let wrap = |source| PipelineError::OutputWriteFailed {
            path: target.clone(),
            source,
        };

        if self.last_byte != Some(b'\n') {
            self.write_all(b"\n").map_err(wrap)?;
        }
        self.flush().map_err(wrap)?;

        if let Target::File { path, tmp } = self.target {
            if let Some(tmp) = tmp {
                tmp.persist(&path).map_err(|e| wrap(e.error))?;
                debug!("Wrote {}", path.display());
            }
        }
        Ok(())
    }
}

fn open_sibling_temp(path: &Path) -> io::Result<NamedTempFile> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent)?;
    tempfile::Builder::new()
        .prefix(".dots-ocr-")
        .suffix(".tmp")
        .tempfile_in(parent)
}

impl Write for OutputSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = match &mut self.target {
            Target::Stdout(out) => out.write(buf)?,
            Target::File { path, tmp } => {
                if tmp.is_none() {
                    *tmp = Some(open_sibling_temp(path)?);
                }
                match tmp.as_mut() {
                    Some(f) => f.write(buf)?,
                    None => return Err(io::Error::other("output temp file is not open")),
                }
            }
        };
        if n > 0 {
            self.last_byte = Some(buf[n - 1]);
        }
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.target {
            Target::Stdout(out) => out.flush(),
            Target::File { tmp: Some(f), .. } => f.flush(),
            Target::File { tmp: None, .. } => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_sink_appears_only_on_commit() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.txt");

        let mut sink = OutputSink::file(&out);
        sink.write_all(b"A\n\n--- Page 2 ---\n\nB").unwrap();
        assert!(!out.exists());

        sink.commit().unwrap();
        assert_eq!(std::fs::read_to_string(&out).unwrap(), "A\n\n--- Page 2 ---\n\nB\n");
    }

    #[test]
    fn dropped_sink_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.txt");

        let mut sink = OutputSink::file(&out);
        sink.write_all(b"partial").unwrap();
        drop(sink);

        assert!(!out.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn trailing_newline_not_doubled() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested/out.txt");

        let mut sink = OutputSink::file(&out);
        sink.write_all(b"text\n").unwrap();
        sink.commit().unwrap();
        assert_eq!(std::fs::read_to_string(&out).unwrap(), "text\n");
    }

    #[test]
    fn empty_commit_still_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("empty.txt");
        OutputSink::file(&out).commit().unwrap();
        assert_eq!(std::fs::read_to_string(&out).unwrap(), "\n");
    }
}
