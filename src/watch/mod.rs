//! Directory watcher: every file created in one directory is ingested.

mod event;

use std::path::{Path, PathBuf};

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;

use crate::error::{Error, Result};
use crate::ingest::FileIngestor;
use crate::pipeline::cancel::CancelToken;

pub use event::{WatchEvent, WatchEventKind};

const DEFAULT_EVENT_BUFFER: usize = 256;

/// Watches one directory (non-recursively) for newly created files.
///
/// Each new file is ingested on its own task. The watch loop never waits for
/// an ingestion to finish, and stopping the loop leaves running ingestions
/// alone.
pub struct DirectoryWatcher {
    dir: PathBuf,
    ingestor: FileIngestor,
    event_buffer: usize,
    ingestions: TaskTracker,
}

/// An established OS watch, not yet being drained.
pub struct Subscription {
    dir: PathBuf,
    watcher: RecommendedWatcher,
    events: mpsc::Receiver<notify::Result<notify::Event>>,
}

impl Subscription {
    /// Absolute path of the watched directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn release(self) {
        let Subscription {
            dir,
            mut watcher,
            events,
        } = self;
        // The notify thread may be parked on a full queue; closing it first
        // lets that thread answer the unwatch request.
        drop(events);

        if let Err(_err) = watcher.unwatch(&dir) {
            #[cfg(feature = "tracing")]
            tracing::event!(tracing::Level::DEBUG, event = "rowpipe.watch.unwatch_failed", error = %_err, "rowpipe.watch.unwatch_failed");
        }
        #[cfg(feature = "tracing")]
        tracing::event!(tracing::Level::INFO, event = "rowpipe.watch.released", dir = %dir.display(), "rowpipe.watch.released");
    }
}

impl DirectoryWatcher {
    pub fn new(dir: impl Into<PathBuf>, ingestor: FileIngestor) -> Self {
        Self {
            dir: dir.into(),
            ingestor,
            event_buffer: DEFAULT_EVENT_BUFFER,
            ingestions: TaskTracker::new(),
        }
    }

    /// Capacity of the queue between the OS watcher thread and the loop.
    pub fn event_buffer(mut self, n: usize) -> Self {
        self.event_buffer = n.max(1);
        self
    }

    /// Tracker of the ingestion tasks this watcher starts.
    pub fn ingestions(&self) -> TaskTracker {
        self.ingestions.clone()
    }

    /// Establish the OS watch.
    ///
    /// Fails if the directory is missing, is not a directory, or cannot be
    /// watched. Nothing is retried.
    pub fn subscribe(&self) -> Result<Subscription> {
        let meta = std::fs::metadata(&self.dir).map_err(|e| Error::watch(&self.dir, e))?;
        if !meta.is_dir() {
            return Err(Error::watch(&self.dir, "not a directory"));
        }
        let dir = self
            .dir
            .canonicalize()
            .map_err(|e| Error::watch(&self.dir, e))?;

        let (tx, rx) = mpsc::channel(self.event_buffer);
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            // Runs on the notify thread; a closed receiver means the loop is gone.
            let _ = tx.blocking_send(res);
        })
        .map_err(|e| Error::watch(&dir, e))?;

        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .map_err(|e| Error::watch(&dir, e))?;

        #[cfg(feature = "tracing")]
        tracing::event!(tracing::Level::INFO, event = "rowpipe.watch.started", dir = %dir.display(), "watching {}", dir.display());

        Ok(Subscription {
            dir,
            watcher,
            events: rx,
        })
    }

    /// Subscribe and run the loop until `cancel` fires.
    pub async fn watch(self, cancel: CancelToken) -> Result<()> {
        let sub = self.subscribe()?;
        self.run(sub, cancel).await
    }

    /// Subscribe now, then run the loop on its own task.
    ///
    /// Subscription errors are returned here; the loop never starts.
    pub fn spawn(self) -> Result<WatchHandle> {
        let sub = self.subscribe()?;
        let cancel = CancelToken::new();
        let ingestions = self.ingestions();
        let task = tokio::spawn(self.run(sub, cancel.clone()));
        Ok(WatchHandle {
            cancel,
            task: Some(task),
            ingestions,
        })
    }

    /// Drain events until cancelled. The watch is released on every exit.
    pub async fn run(self, mut sub: Subscription, cancel: CancelToken) -> Result<()> {
        let result = loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    #[cfg(feature = "tracing")]
                    tracing::event!(tracing::Level::DEBUG, event = "rowpipe.cancelled", stage = "watcher", where_ = "recv", "rowpipe.cancelled");
                    break Ok(());
                },
                first = sub.events.recv() => {
                    let Some(first) = first else {
                        break Err(Error::watch(&sub.dir, "event stream closed"));
                    };

                    // Bounded, so a steady burst cannot starve the cancel check.
                    let mut batch = vec![first];
                    while batch.len() < self.event_buffer {
                        let Ok(more) = sub.events.try_recv() else { break };
                        batch.push(more);
                    }

                    for res in batch {
                        match res {
                            Ok(event) => self.dispatch(&sub.dir, event),
                            Err(_err) => {
                                #[cfg(feature = "tracing")]
                                tracing::event!(tracing::Level::ERROR, event = "rowpipe.watch.error", error = %_err, "file watch error: {}", _err);
                            }
                        }
                    }
                }
            }
        };

        sub.release();
        result
    }

    fn dispatch(&self, dir: &Path, event: notify::Event) {
        for created in WatchEvent::from_notify(dir, event) {
            match std::fs::metadata(&created.path) {
                Ok(meta) if meta.is_file() => {}
                _ => {
                    #[cfg(feature = "tracing")]
                    tracing::event!(tracing::Level::DEBUG, event = "rowpipe.watch.ignored", path = %created.path.display(), "rowpipe.watch.ignored");
                    continue;
                }
            }

            #[cfg(feature = "tracing")]
            tracing::event!(tracing::Level::INFO, event = "rowpipe.watch.created", path = %created.path.display(), "new file {}", created.path.display());

            self.ingestions
                .spawn(self.ingestor.clone().run_logged(created.path));
        }
    }
}

/// Control over a watch loop started with [`DirectoryWatcher::spawn`].
pub struct WatchHandle {
    cancel: CancelToken,
    task: Option<JoinHandle<Result<()>>>,
    ingestions: TaskTracker,
}

impl WatchHandle {
    /// Stop accepting new files. Running ingestions continue.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Ingestion tasks started and not yet finished.
    pub fn in_flight(&self) -> usize {
        self.ingestions.len()
    }

    /// Resolves when the loop ends, leaving the handle usable for
    /// [`Self::shutdown`]. Cancel-safe.
    pub async fn stopped(&mut self) -> Result<()> {
        let Some(task) = self.task.as_mut() else {
            return Ok(());
        };
        let res = task.await;
        self.task = None;
        res?
    }

    /// Wait for the loop to end on its own (or after [`Self::cancel`]).
    pub async fn join(mut self) -> Result<()> {
        self.stopped().await
    }

    /// Cancel the loop, then wait for it and for every ingestion it started.
    pub async fn shutdown(mut self) -> Result<()> {
        self.cancel.cancel();
        let res = self.stopped().await;
        self.ingestions.close();
        self.ingestions.wait().await;
        res
    }
}
