use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc::{Receiver, Sender};

use crate::decode::LogicalLine;
use crate::error::Result;
use crate::ingest::IngestStats;
use crate::pipeline::cancel::CancelToken;
use crate::pipeline::pipe::Pipe;
use crate::record::LineTokenizer;

/// Tokenizes data lines into message bodies.
///
/// A line that fails to tokenize is logged with its line number and dropped;
/// it never fails the stage.
pub struct TokenizeStage {
    stats: IngestStats,
}

impl TokenizeStage {
    pub fn new(stats: IngestStats) -> Self {
        Self { stats }
    }
}

#[async_trait]
impl Pipe<LogicalLine, Bytes> for TokenizeStage {
    fn stage_name(&self) -> &'static str {
        "tokenize"
    }

    async fn process(
        &self,
        mut input: Receiver<LogicalLine>,
        output: Sender<Bytes>,
        _buffer: usize,
        cancel: CancelToken,
    ) -> Result<()> {
        #[cfg(feature = "tracing")]
        let stage = self.stage_name();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    #[cfg(feature = "tracing")]
                    tracing::event!(tracing::Level::DEBUG, event = "rowpipe.cancelled", stage = stage, where_ = "recv", "rowpipe.cancelled");
                    break
                },
                msg = input.recv() => {
                    let Some(line) = msg else { break; };
                    self.stats.record_line();

                    let body = match LineTokenizer::tokenize(&line.text) {
                        Ok(body) => body,
                        Err(_err) => {
                            self.stats.record_rejected();
                            #[cfg(feature = "tracing")]
                            tracing::event!(
                                tracing::Level::WARN,
                                event = "rowpipe.line.rejected",
                                line = line.number,
                                reason = %_err,
                                "error processing line {}: {}",
                                line.number,
                                _err
                            );
                            continue;
                        }
                    };

                    if output.send(body).await.is_err() {
                        #[cfg(feature = "tracing")]
                        tracing::event!(tracing::Level::DEBUG, event = "rowpipe.downstream.closed", stage = stage, "rowpipe.downstream.closed");
                        break;
                    }
                    self.stats.record_forwarded();
                }
            }
        }
        Ok(())
    }
}
