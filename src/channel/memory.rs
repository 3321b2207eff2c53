use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use crate::channel::Channel;
use crate::error::{Error, Result};

#[derive(Default)]
struct Topic {
    subscribers: Vec<mpsc::UnboundedSender<Bytes>>,
    backlog: Vec<Bytes>,
}

/// In-process, topic-addressed transport.
///
/// Every subscriber of a topic receives every message sent to it after it
/// subscribed. Messages sent before anyone subscribed are kept and handed to
/// the first subscriber.
#[derive(Clone, Default)]
pub struct MemoryChannel {
    topics: Arc<Mutex<HashMap<String, Topic>>>,
    closed: Arc<AtomicBool>,
}

impl MemoryChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, topic: &str) -> mpsc::UnboundedReceiver<Bytes> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut topics = self.topics.lock().unwrap_or_else(|e| e.into_inner());
        let entry = topics.entry(topic.to_owned()).or_default();
        for msg in entry.backlog.drain(..) {
            let _ = tx.send(msg);
        }
        entry.subscribers.push(tx);
        rx
    }

    /// Refuse every later send, as an unreachable broker would.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Channel for MemoryChannel {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn send(&self, topic: &str, payload: Bytes) -> Result<()> {
        if self.is_closed() {
            return Err(Error::publish(topic, "channel closed"));
        }

        let mut topics = self.topics.lock().unwrap_or_else(|e| e.into_inner());
        let entry = topics.entry(topic.to_owned()).or_default();
        entry.subscribers.retain(|sub| !sub.is_closed());

        if entry.subscribers.is_empty() {
            entry.backlog.push(payload);
            return Ok(());
        }
        for sub in &entry.subscribers {
            let _ = sub.send(payload.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn backlog_goes_to_first_subscriber() {
        let channel = MemoryChannel::new();
        channel.send("t", Bytes::from_static(b"early")).await.unwrap();

        let mut rx = channel.subscribe("t");
        channel.send("t", Bytes::from_static(b"late")).await.unwrap();
        channel.send("other", Bytes::from_static(b"elsewhere")).await.unwrap();

        assert_eq!(rx.recv().await.unwrap(), Bytes::from_static(b"early"));
        assert_eq!(rx.recv().await.unwrap(), Bytes::from_static(b"late"));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn closed_channel_refuses_sends() {
        let channel = MemoryChannel::new();
        channel.close();
        let err = channel.send("t", Bytes::from_static(b"x")).await.unwrap_err();
        assert!(matches!(err, Error::Publish { ref topic, .. } if topic == "t"));
    }
}
