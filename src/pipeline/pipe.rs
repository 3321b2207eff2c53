use async_trait::async_trait;
use tokio::sync::mpsc::{Receiver, Sender};

use crate::error::Result;
use crate::pipeline::cancel::CancelToken;

/// One stage of a streaming pipeline.
///
/// A stage reads from `input` until it is closed, writes to `output`, and
/// returns promptly once `cancel` fires. `buffer` is the capacity used for
/// any channel the stage creates internally.
#[async_trait]
pub trait Pipe<I: Send + 'static, O: Send + 'static>: Send + Sync {
    fn stage_name(&self) -> &'static str {
        "stage"
    }

    async fn process(
        &self,
        input: Receiver<I>,
        output: Sender<O>,
        buffer: usize,
        cancel: CancelToken,
    ) -> Result<()>;
}
