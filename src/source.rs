//! Newline-delimited JSON record input.
//!
//! Collectors write one JSON object per line. Records are read lazily so
//! a run's memory stays bounded by the batch buffer, not the input size,
//! and reads go through tokio so stdin never blocks a runtime worker.
//!
//! Lines are read as raw bytes. Blank lines are skipped; a line that is
//! not valid JSON (including one that is not valid UTF-8) becomes a
//! per-record [`IngestError::MalformedRecord`] and the stream continues.
//! Only an I/O error ends the stream.

use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::error;

use seismograph_core::error::IngestError;

/// Boxed reader returned by [`open`].
pub type InputReader = Box<dyn AsyncBufRead + Unpin + Send>;

/// Lazy reader over the records of an NDJSON stream.
pub struct NdjsonSource<R> {
    reader: R,
    buf: Vec<u8>,
    line_no: usize,
    done: bool,
}

impl<R: AsyncBufRead + Unpin> NdjsonSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::new(),
            line_no: 0,
            done: false,
        }
    }

    /// Next non-blank line as JSON, or `None` at end of input.
    pub async fn next_record(&mut self) -> Option<Result<Value, IngestError>> {
        while !self.done {
            self.buf.clear();
            match self.reader.read_until(b'\n', &mut self.buf).await {
                Ok(0) => self.done = true,
                Ok(_) => {
                    self.line_no += 1;
                    if self.buf.iter().all(u8::is_ascii_whitespace) {
                        continue;
                    }
                    return Some(parse_line(self.line_no, &self.buf));
                }
                Err(e) => {
                    error!(line = self.line_no + 1, error = %e, "input read failed; stopping");
                    self.done = true;
                }
            }
        }
        None
    }
}

fn parse_line(line_no: usize, bytes: &[u8]) -> Result<Value, IngestError> {
    serde_json::from_slice(bytes).map_err(|e| IngestError::MalformedRecord {
        kind: "<unparsed>".to_string(),
        reason: format!("line {}: {}", line_no, e),
    })
}

/// Open `path`, or stdin when `path` is `None` or `-`.
pub async fn open(path: Option<&Path>) -> Result<NdjsonSource<InputReader>> {
    let reader: InputReader = match path {
        Some(p) if p != Path::new("-") => {
            let file = tokio::fs::File::open(p)
                .await
                .with_context(|| format!("Failed to open record file: {}", p.display()))?;
            Box::new(BufReader::new(file))
        }
        _ => Box::new(BufReader::new(tokio::io::stdin())),
    };
    Ok(NdjsonSource::new(reader))
}
