use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::channel::Channel;
use crate::error::{Error, Result};

/// Spools each topic to `<dir>/<topic>.ndjson`, one message per line.
///
/// Sends are serialized so that concurrent messages never interleave.
pub struct FileChannel {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl FileChannel {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn topic_path(&self, topic: &str) -> PathBuf {
        self.dir.join(format!("{topic}.ndjson"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl Channel for FileChannel {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn send(&self, topic: &str, payload: Bytes) -> Result<()> {
        if topic.is_empty() || topic.contains(['/', '\\']) || topic.starts_with('.') {
            return Err(Error::publish(topic, "invalid topic name for file spool"));
        }

        let _guard = self.lock.lock().await;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.topic_path(topic))
            .await
            .map_err(|e| Error::publish(topic, e))?;

        let mut line = Vec::with_capacity(payload.len() + 1);
        line.extend_from_slice(&payload);
        line.push(b'\n');
        file.write_all(&line).await.map_err(|e| Error::publish(topic, e))?;
        file.flush().await.map_err(|e| Error::publish(topic, e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn appends_one_line_per_message() {
        let dir = tempfile::tempdir().unwrap();
        let channel = FileChannel::new(dir.path());

        channel.send("todo-topic", Bytes::from_static(b"{\"a\":1}")).await.unwrap();
        channel.send("todo-topic", Bytes::from_static(b"{\"a\":2}")).await.unwrap();

        let text = std::fs::read_to_string(channel.topic_path("todo-topic")).unwrap();
        assert_eq!(text, "{\"a\":1}\n{\"a\":2}\n");
    }

    #[tokio::test]
    async fn missing_spool_dir_is_a_publish_error() {
        let dir = tempfile::tempdir().unwrap();
        let channel = FileChannel::new(dir.path().join("gone"));
        let err = channel.send("t", Bytes::from_static(b"x")).await.unwrap_err();
        assert!(matches!(err, Error::Publish { .. }));
    }

    #[tokio::test]
    async fn rejects_path_like_topics() {
        let dir = tempfile::tempdir().unwrap();
        let channel = FileChannel::new(dir.path());
        assert!(channel.send("../escape", Bytes::from_static(b"x")).await.is_err());
    }
}
