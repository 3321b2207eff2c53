use async_trait::async_trait;
use tokio::sync::mpsc::{Receiver, Sender};

use crate::error::Result;
use crate::pipeline::cancel::CancelToken;
use crate::pipeline::pipe::Pipe;

/// Drop the first `n` items, forward the rest unchanged.
///
/// Items are dropped regardless of their content, which is how a file's
/// header line is discarded.
pub struct SkipPipe {
    n: usize,
}

impl SkipPipe {
    pub fn new(n: usize) -> Self {
        Self { n }
    }
}

#[async_trait]
impl<T> Pipe<T, T> for SkipPipe
where
    T: Send + 'static,
{
    fn stage_name(&self) -> &'static str {
        "skip"
    }

    async fn process(
        &self,
        mut input: Receiver<T>,
        output: Sender<T>,
        _buffer: usize,
        cancel: CancelToken,
    ) -> Result<()> {
        let mut skipped = 0usize;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                msg = input.recv() => {
                    let Some(v) = msg else { break; };
                    if skipped < self.n {
                        skipped += 1;
                        continue;
                    }
                    if output.send(v).await.is_err() {
                        downstream_closed("skip");
                        break;
                    }
                }
            }
        }
        Ok(())
    }
}

fn downstream_closed(_stage: &'static str) {
    #[cfg(feature = "tracing")]
    tracing::event!(
        tracing::Level::DEBUG,
        event = "rowpipe.downstream.closed",
        stage = _stage,
        "rowpipe.downstream.closed"
    );
}
