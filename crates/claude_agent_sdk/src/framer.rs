//! Reassembles the child's stdout byte stream into complete JSON lines.
//!
//! Unlike a plain `BufReader::lines()` loop, a line that fails to parse as
//! JSON is not dropped: it's speculative, meaning the child may have written
//! a partial line across two `read()` calls that happened to straddle a
//! newline the framer doesn't actually own (pretty-printed output, an
//! embedded literal newline inside a string that a naive split would have
//! cut wrong). The unparsed bytes are retained and prefixed onto the next
//! read, up to `max_buffer_size`; exceeding it is a protocol violation, not
//! silently dropped data.

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, warn};

use crate::error::ClaudeAgentError;

pub struct LineFramer<R> {
    reader: BufReader<R>,
    pending: String,
    max_buffer_size: usize,
}

#[derive(Debug)]
pub enum FramedLine {
    Json(Value),
    /// A line that didn't parse as JSON even after accumulation; carried so
    /// the caller can log or surface it rather than the framer silently
    /// eating it.
    Unparsed(String),
}

impl<R> LineFramer<R>
where
    R: tokio::io::AsyncRead + Unpin,
{
    pub fn new(reader: R, max_buffer_size: usize) -> Self {
        Self {
            reader: BufReader::new(reader),
            pending: String::new(),
            max_buffer_size,
        }
    }

    /// Reads the next complete, parseable line, reassembling across reads as
    /// needed. Returns `Ok(None)` on clean EOF with no pending bytes left.
    pub async fn next_line(&mut self) -> Result<Option<FramedLine>, ClaudeAgentError> {
        loop {
            let mut raw = String::new();
            let bytes_read = self
                .reader
                .read_line(&mut raw)
                .await
                .map_err(ClaudeAgentError::StdoutRead)?;

            if bytes_read == 0 {
                if self.pending.is_empty() {
                    return Ok(None);
                }
                let leftover = std::mem::take(&mut self.pending);
                return Ok(Some(FramedLine::Unparsed(leftover)));
            }

            let had_pending = !self.pending.is_empty();
            self.pending.push_str(&raw);

            let candidate = self.pending.trim_end_matches(['\n', '\r']);
            if candidate.is_empty() {
                self.pending.clear();
                continue;
            }

            match serde_json::from_str::<Value>(candidate) {
                Ok(value) => {
                    self.pending.clear();
                    if had_pending {
                        debug!("line completed after speculative reassembly");
                    }
                    return Ok(Some(FramedLine::Json(value)));
                }
                Err(_) if raw.ends_with('\n') => {
                    if self.pending.len() > self.max_buffer_size {
                        let overflowed = self.pending.len();
                        self.pending.clear();
                        return Err(ClaudeAgentError::Parse {
                            line_number: 0,
                            message: format!(
                                "line buffer exceeded {} bytes ({overflowed} accumulated) without becoming valid JSON",
                                self.max_buffer_size
                            ),
                        });
                    }
                    warn!(len = self.pending.len(), "line not yet valid JSON, retaining for reassembly");
                    continue;
                }
                Err(_) => {
                    // raw didn't end in '\n': we hit EOF mid-line. Keep
                    // accumulating; the next read_line call will return 0
                    // and we'll surface what's left as Unparsed.
                    continue;
                }
            }
        }
    }
}
