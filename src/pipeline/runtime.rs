use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::Result;
use crate::pipeline::cancel::CancelToken;
use crate::pipeline::pipe::Pipe;

const DEFAULT_BUFFER: usize = 128;

/// Spawns composed pipelines onto the current Tokio runtime.
pub struct Runtime {
    buffer: usize,
    cancel: Option<CancelToken>,
}

impl Runtime {
    pub fn new() -> Self {
        Self {
            buffer: DEFAULT_BUFFER,
            cancel: None,
        }
    }

    /// Capacity of every channel between stages.
    pub fn buffer(mut self, buffer: usize) -> Self {
        self.buffer = buffer.max(1);
        self
    }

    /// Run under an existing token instead of a fresh one.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Spawn a pipeline whose last stage is a sink.
    ///
    /// The unit output channel is drained internally, so awaiting the handle
    /// is all a caller needs to do.
    pub fn spawn_sink<I, P>(
        &self,
        pipe: P,
    ) -> (mpsc::Sender<I>, CancelToken, JoinHandle<Result<()>>)
    where
        I: Send + 'static,
        P: Pipe<I, ()> + Send + Sync + 'static,
    {
        let (tx_in, rx_in) = mpsc::channel::<I>(self.buffer);
        let (tx_out, mut rx_out) = mpsc::channel::<()>(self.buffer);
        let (cancel, inner) = self.launch(pipe, rx_in, tx_out);

        let handle = tokio::spawn(async move {
            let drain = async { while rx_out.recv().await.is_some() {} };
            let (res, ()) = tokio::join!(inner, drain);
            res?
        });

        (tx_in, cancel, handle)
    }

    fn launch<I, O, P>(
        &self,
        pipe: P,
        rx_in: mpsc::Receiver<I>,
        tx_out: mpsc::Sender<O>,
    ) -> (CancelToken, JoinHandle<Result<()>>)
    where
        I: Send + 'static,
        O: Send + 'static,
        P: Pipe<I, O> + Send + Sync + 'static,
    {
        let buffer = self.buffer;
        let cancel = self.cancel.clone().unwrap_or_default();
        let cancel_task = cancel.clone();

        #[cfg(feature = "tracing")]
        let handle = {
            use tracing::Instrument;
            let stage = pipe.stage_name();
            let span = tracing::info_span!("rowpipe.stage", stage = stage, buffer = buffer);
            tokio::spawn(
                async move { pipe.process(rx_in, tx_out, buffer, cancel_task).await }
                    .instrument(span),
            )
        };

        #[cfg(not(feature = "tracing"))]
        let handle =
            tokio::spawn(async move { pipe.process(rx_in, tx_out, buffer, cancel_task).await });

        (cancel, handle)
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}
