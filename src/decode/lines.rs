use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc::{Receiver, Sender};

use crate::error::{Error, Result};
use crate::pipeline::cancel::CancelToken;
use crate::pipeline::pipe::Pipe;

const DEFAULT_MAX_LINE_BYTES: usize = 1024 * 1024;

/// One newline-delimited line of a file, independent of how it was chunked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalLine {
    /// 1-based position in the file; the header is line 1.
    pub number: usize,
    pub text: String,
}

/// Reassembles logical lines out of raw byte chunks.
///
/// Bytes after the last `\n` of a chunk are carried over into the next one,
/// so a line (or a multi-byte character) may straddle any chunk boundary.
/// Whatever is left when the input closes is flushed as the final line.
pub struct LineDecoder {
    max_line_bytes: usize,
    allow_empty_lines: bool,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self {
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
            allow_empty_lines: false,
        }
    }

    /// Maximum number of bytes allowed for a single line.
    pub fn max_line_bytes(mut self, n: usize) -> Self {
        self.max_line_bytes = n;
        self
    }

    /// Whether blank lines should be dropped instead of forwarded.
    pub fn allow_empty_lines(mut self, yes: bool) -> Self {
        self.allow_empty_lines = yes;
        self
    }
}

impl Default for LineDecoder {
    fn default() -> Self {
        Self::new()
    }
}

enum EmitOutcome {
    Continue,
    Stop,
}

impl LineDecoder {
    async fn emit_line(
        &self,
        number: usize,
        line: &[u8],
        output: &Sender<LogicalLine>,
        cancel: &CancelToken,
    ) -> Result<EmitOutcome> {
        let line = strip_cr(line);

        if line.is_empty() && self.allow_empty_lines {
            return Ok(EmitOutcome::Continue);
        }

        let text = std::str::from_utf8(line)
            .map_err(|source| Error::Decode {
                line: number,
                source,
            })?
            .to_owned();

        tokio::select! {
            _ = cancel.cancelled() => {
                #[cfg(feature = "tracing")]
                tracing::event!(tracing::Level::DEBUG, event = "rowpipe.cancelled", stage = "line_decoder", where_ = "send", "rowpipe.cancelled");
                Ok(EmitOutcome::Stop)
            },
            sent = output.send(LogicalLine { number, text }) => {
                if sent.is_err() {
                    #[cfg(feature = "tracing")]
                    tracing::event!(tracing::Level::DEBUG, event = "rowpipe.downstream.closed", stage = "line_decoder", "rowpipe.downstream.closed");
                    Ok(EmitOutcome::Stop)
                } else {
                    Ok(EmitOutcome::Continue)
                }
            }
        }
    }
}

#[async_trait]
impl Pipe<Bytes, LogicalLine> for LineDecoder {
    fn stage_name(&self) -> &'static str {
        "line_decoder"
    }

    async fn process(
        &self,
        mut input: Receiver<Bytes>,
        output: Sender<LogicalLine>,
        _buffer: usize,
        cancel: CancelToken,
    ) -> Result<()> {
        #[cfg(feature = "tracing")]
        let stage = self.stage_name();

        let mut carry = Vec::new();
        let mut number = 0usize;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    #[cfg(feature = "tracing")]
                    tracing::event!(tracing::Level::DEBUG, event = "rowpipe.cancelled", stage = stage, where_ = "recv", "rowpipe.cancelled");
                    return Ok(())
                },
                msg = input.recv() => {
                    let Some(chunk) = msg else { break; };

                    let mut rest: &[u8] = &chunk;
                    while let Some(pos) = rest.iter().position(|&b| b == b'\n') {
                        carry.extend_from_slice(&rest[..pos]);
                        rest = &rest[pos + 1..];
                        self.check_len(carry.len())?;

                        number += 1;
                        match self.emit_line(number, &carry, &output, &cancel).await? {
                            EmitOutcome::Continue => carry.clear(),
                            EmitOutcome::Stop => return Ok(()),
                        }
                    }

                    carry.extend_from_slice(rest);
                    self.check_len(carry.len())?;
                    // `chunk` is released here; only the partial tail survives.
                }
            }
        }

        if !carry.is_empty() {
            number += 1;
            let _ = self.emit_line(number, &carry, &output, &cancel).await?;
        }

        Ok(())
    }
}

impl LineDecoder {
    fn check_len(&self, len: usize) -> Result<()> {
        if len > self.max_line_bytes {
            return Err(Error::stage(
                "line_decoder",
                format!(
                    "line exceeded max_line_bytes ({} > {})",
                    len, self.max_line_bytes
                ),
            ));
        }
        Ok(())
    }
}

fn strip_cr(line: &[u8]) -> &[u8] {
    if let Some(stripped) = line.strip_suffix(b"\r") {
        stripped
    } else {
        line
    }
}
