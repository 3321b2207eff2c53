//! Fire-and-forget publishing with a bounded number of sends in flight.

mod sink;

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::channel::{Channel, PublishResult};
use crate::error::{Error, Result};
use crate::ingest::IngestStats;

pub use sink::PublishSink;

pub const DEFAULT_MAX_IN_FLIGHT: usize = 64;

type ResultObserver = Arc<dyn Fn(&PublishResult) + Send + Sync>;

/// Hands serialized records to a [`Channel`] without waiting for them.
///
/// Outcomes are logged and passed to the optional observer, never returned
/// to the caller and never retried.
#[derive(Clone)]
pub struct RecordPublisher {
    channel: Arc<dyn Channel>,
    topic: Arc<str>,
    max_in_flight: usize,
    observer: Option<ResultObserver>,
}

impl RecordPublisher {
    pub fn new(channel: Arc<dyn Channel>, topic: impl Into<Arc<str>>) -> Self {
        Self {
            channel,
            topic: topic.into(),
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            observer: None,
        }
    }

    /// Upper bound on unacknowledged sends per file run.
    pub fn max_in_flight(mut self, n: usize) -> Self {
        self.max_in_flight = n.clamp(1, u32::MAX as usize);
        self
    }

    /// Called with every send outcome, after it has been logged.
    pub fn on_result<F>(mut self, f: F) -> Self
    where
        F: Fn(&PublishResult) + Send + Sync + 'static,
    {
        self.observer = Some(Arc::new(f));
        self
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Start sending `message` and return without waiting for the result.
    ///
    /// This path is unbounded; ingestion goes through [`PublishRun`] instead.
    pub fn publish(&self, message: Bytes) {
        self.spawn_send(None, message, None);
    }

    /// Open a permit pool for one file run.
    pub fn start_run(&self) -> PublishRun {
        PublishRun {
            publisher: self.clone(),
            permits: Arc::new(Semaphore::new(self.max_in_flight)),
            stats: None,
        }
    }

    fn spawn_send(
        &self,
        permit: Option<OwnedSemaphorePermit>,
        message: Bytes,
        stats: Option<IngestStats>,
    ) {
        let channel = self.channel.clone();
        let topic = self.topic.clone();
        let observer = self.observer.clone();

        tokio::spawn(async move {
            let sent = channel.send(&topic, message.clone()).await;

            let result = PublishResult::from(&sent);
            log_outcome(&topic, &message, &result);
            if let Some(stats) = stats {
                stats.record_delivery(result.success);
            }
            if let Some(observer) = observer {
                observer(&result);
            }
            // Released last so that settling a run implies every outcome is recorded.
            drop(permit);
        });
    }
}

/// Publishing state for one file: at most `max_in_flight` sends outstanding.
pub struct PublishRun {
    publisher: RecordPublisher,
    permits: Arc<Semaphore>,
    stats: Option<IngestStats>,
}

impl PublishRun {
    pub fn with_stats(mut self, stats: IngestStats) -> Self {
        self.stats = Some(stats);
        self
    }

    /// Wait for a free permit, start the send, return without awaiting it.
    pub async fn publish(&self, message: Bytes) -> Result<()> {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| Error::pipeline("publish permits closed"))?;
        self.publisher
            .spawn_send(Some(permit), message, self.stats.clone());
        Ok(())
    }

    /// Sends started but not yet completed.
    pub fn in_flight(&self) -> usize {
        self.publisher.max_in_flight - self.permits.available_permits()
    }

    /// Wait until every send started by this run has completed.
    pub async fn settle(&self) -> Result<()> {
        let all = u32::try_from(self.publisher.max_in_flight).unwrap_or(u32::MAX);
        let _all = self
            .permits
            .acquire_many(all)
            .await
            .map_err(|_| Error::pipeline("publish permits closed"))?;
        Ok(())
    }
}

fn log_outcome(_topic: &str, _message: &Bytes, _result: &PublishResult) {
    #[cfg(feature = "tracing")]
    match &_result.error_detail {
        None => tracing::event!(
            tracing::Level::INFO,
            event = "rowpipe.publish.ok",
            topic = _topic,
            "message published to {}: {}",
            _topic,
            String::from_utf8_lossy(_message)
        ),
        Some(detail) => tracing::event!(
            tracing::Level::ERROR,
            event = "rowpipe.publish.failed",
            topic = _topic,
            "error publishing message to {}: {}",
            _topic,
            detail
        ),
    }
}
