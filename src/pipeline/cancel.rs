use tokio_util::sync::CancellationToken;

/// Cooperative cancellation shared by every stage of a pipeline.
///
/// Tokens form a tree: cancelling a token cancels all of its children, while
/// cancelling a child leaves the parent running. Each file run executes under
/// a child of its ingestor's token, so one failing file never stops another,
/// and the watcher's own token is not in that tree at all.
#[derive(Clone, Default, Debug)]
pub struct CancelToken {
    inner: CancellationToken,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.inner.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.is_cancelled()
    }

    /// Resolves once this token (or any ancestor) is cancelled.
    pub async fn cancelled(&self) {
        self.inner.cancelled().await
    }

    pub fn child(&self) -> Self {
        Self {
            inner: self.inner.child_token(),
        }
    }
}
