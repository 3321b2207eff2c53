#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use rowpipe::channel::Channel;
use rowpipe::error::{Error, Result};
use rowpipe::pipeline::cancel::CancelToken;
use rowpipe::pipeline::pipe::Pipe;
use rowpipe::record::Record;
use tokio::sync::mpsc::{Receiver, Sender};
use tokio::sync::Semaphore;

pub const HEADER: &str = "id,title,description,completed,ownerId";

#[derive(Clone)]
pub struct VecSource<T> {
    items: Vec<T>,
}

impl<T> VecSource<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self { items }
    }
}

#[async_trait]
impl<T> Pipe<(), T> for VecSource<T>
where
    T: Send + Sync + Clone + 'static,
{
    async fn process(
        &self,
        mut input: Receiver<()>,
        output: Sender<T>,
        _buffer: usize,
        cancel: CancelToken,
    ) -> Result<()> {
        tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            _ = input.recv() => {}
        }

        for item in self.items.clone() {
            if cancel.is_cancelled() {
                break;
            }
            if output.send(item).await.is_err() {
                break;
            }
        }
        Ok(())
    }
}

pub struct CollectSink<T> {
    out: Arc<Mutex<Vec<T>>>,
}

impl<T> CollectSink<T> {
    pub fn new(out: Arc<Mutex<Vec<T>>>) -> Self {
        Self { out }
    }
}

#[async_trait]
impl<T> Pipe<T, ()> for CollectSink<T>
where
    T: Send + Sync + 'static,
{
    async fn process(
        &self,
        mut input: Receiver<T>,
        _output: Sender<()>,
        _buffer: usize,
        cancel: CancelToken,
    ) -> Result<()> {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                msg = input.recv() => {
                    let Some(v) = msg else { break; };
                    self.out.lock().expect("mutex poisoned").push(v);
                }
            }
        }
        Ok(())
    }
}

/// Channel that records every message and can be told to refuse some.
#[derive(Clone, Default)]
pub struct RecordingChannel {
    sent: Arc<Mutex<Vec<(String, Bytes)>>>,
    refuse_containing: Option<&'static str>,
    attempts: Arc<AtomicUsize>,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every send whose payload contains `needle`.
    pub fn refusing(needle: &'static str) -> Self {
        Self {
            refuse_containing: Some(needle),
            ..Self::default()
        }
    }

    pub fn payloads(&self) -> Vec<Bytes> {
        self.sent
            .lock()
            .expect("mutex poisoned")
            .iter()
            .map(|(_, p)| p.clone())
            .collect()
    }

    pub fn records(&self) -> Vec<Record> {
        self.payloads()
            .iter()
            .map(|p| Record::decode(p).expect("published payload is a record"))
            .collect()
    }

    pub fn topics(&self) -> Vec<String> {
        self.sent
            .lock()
            .expect("mutex poisoned")
            .iter()
            .map(|(t, _)| t.clone())
            .collect()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Channel for RecordingChannel {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn send(&self, topic: &str, payload: Bytes) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(needle) = self.refuse_containing {
            if String::from_utf8_lossy(&payload).contains(needle) {
                return Err(Error::publish(topic, "broker unreachable"));
            }
        }
        self.sent
            .lock()
            .expect("mutex poisoned")
            .push((topic.to_string(), payload));
        Ok(())
    }
}

/// Channel whose sends block until the test opens the gate.
#[derive(Clone)]
pub struct GatedChannel {
    pub gate: Arc<Semaphore>,
    pub inner: RecordingChannel,
    pub in_flight: Arc<AtomicUsize>,
    pub max_seen: Arc<AtomicUsize>,
}

impl GatedChannel {
    pub fn new() -> Self {
        Self {
            gate: Arc::new(Semaphore::new(0)),
            inner: RecordingChannel::new(),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_seen: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn open(&self) {
        self.gate.add_permits(Semaphore::MAX_PERMITS / 2);
    }
}

#[async_trait]
impl Channel for GatedChannel {
    fn name(&self) -> &'static str {
        "gated"
    }

    async fn send(&self, topic: &str, payload: Bytes) -> Result<()> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_seen.fetch_max(now, Ordering::SeqCst);

        let permit = self
            .gate
            .acquire()
            .await
            .map_err(|_| Error::publish(topic, "gate closed"))?;
        permit.forget();

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.inner.send(topic, payload).await
    }
}

pub fn write_file(dir: &Path, name: &str, content: impl AsRef<[u8]>) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).expect("write test file");
    path
}

/// Write outside `dir`, then rename in, so the watcher sees a complete file.
pub fn drop_file(staging: &Path, dir: &Path, name: &str, content: impl AsRef<[u8]>) -> PathBuf {
    let staged = write_file(staging, name, content);
    let target = dir.join(name);
    std::fs::rename(&staged, &target).expect("move test file into place");
    target
}

pub fn data_line(i: usize) -> String {
    format!("{i},title {i},description {i},{},owner{}", i % 2 == 0, i % 7)
}

/// Poll `check` until it holds or `timeout` passes.
pub async fn eventually<F>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
