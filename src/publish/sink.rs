use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc::{Receiver, Sender};

use crate::error::Result;
use crate::ingest::IngestStats;
use crate::pipeline::cancel::CancelToken;
use crate::pipeline::pipe::Pipe;
use crate::publish::RecordPublisher;

/// Terminal stage: publishes every message body it receives.
///
/// Each `process` call is one file run with its own permit pool, so a slow
/// channel throttles reading of that file only. Before returning, the sink
/// waits for its outstanding sends to settle.
pub struct PublishSink {
    publisher: RecordPublisher,
    stats: IngestStats,
}

impl PublishSink {
    pub fn new(publisher: RecordPublisher, stats: IngestStats) -> Self {
        Self { publisher, stats }
    }
}

#[async_trait]
impl Pipe<Bytes, ()> for PublishSink {
    fn stage_name(&self) -> &'static str {
        "publish_sink"
    }

    async fn process(
        &self,
        mut input: Receiver<Bytes>,
        _output: Sender<()>,
        _buffer: usize,
        cancel: CancelToken,
    ) -> Result<()> {
        #[cfg(feature = "tracing")]
        let stage = self.stage_name();

        let run = self.publisher.start_run().with_stats(self.stats.clone());

        loop {
            let body = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    #[cfg(feature = "tracing")]
                    tracing::event!(tracing::Level::DEBUG, event = "rowpipe.cancelled", stage = stage, where_ = "recv", "rowpipe.cancelled");
                    break
                },
                msg = input.recv() => {
                    let Some(body) = msg else { break; };
                    body
                }
            };

            // Waiting for a permit must not outlive cancellation.
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    #[cfg(feature = "tracing")]
                    tracing::event!(tracing::Level::DEBUG, event = "rowpipe.cancelled", stage = stage, where_ = "permit", "rowpipe.cancelled");
                    break
                },
                res = run.publish(body) => res?,
            }
        }

        run.settle().await
    }
}
