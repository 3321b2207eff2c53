//! Per-file ingestion: chunked read, line reassembly, tokenize, publish.

mod stats;

use std::path::{Path, PathBuf};

use tokio::task::JoinHandle;

use crate::decode::LineDecoder;
use crate::error::{Error, Result};
use crate::pipeline::cancel::CancelToken;
use crate::pipeline::chain::PipeExt;
use crate::pipeline::runtime::Runtime;
use crate::publish::{PublishSink, RecordPublisher};
use crate::record::TokenizeStage;
use crate::source::chunks::{ChunkSource, DEFAULT_CHUNK_BYTES};

pub use stats::{IngestStats, IngestSummary};

const DEFAULT_BUFFER: usize = 64;
const DEFAULT_MAX_LINE_BYTES: usize = 1024 * 1024;

/// Turns one file into a stream of published records.
///
/// The first line of every file is a header and is never published. Lines
/// that fail to tokenize are logged and skipped. Only an unreadable or
/// undecodable file fails [`FileIngestor::process`], and then only for that
/// file.
///
/// Every file run gets a child of the ingestor's token: a failing file
/// cancels only its own stages, while cancelling the ingestor's token aborts
/// every run started from it (and its clones).
#[derive(Clone)]
pub struct FileIngestor {
    publisher: RecordPublisher,
    cancel: CancelToken,
    chunk_bytes: usize,
    buffer: usize,
    max_line_bytes: usize,
    allow_empty_lines: bool,
}

impl FileIngestor {
    pub fn new(publisher: RecordPublisher) -> Self {
        Self {
            publisher,
            cancel: CancelToken::new(),
            chunk_bytes: DEFAULT_CHUNK_BYTES,
            buffer: DEFAULT_BUFFER,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
            allow_empty_lines: false,
        }
    }

    pub fn chunk_bytes(mut self, n: usize) -> Self {
        self.chunk_bytes = n.max(1);
        self
    }

    /// Capacity of the channels between stages.
    pub fn buffer(mut self, n: usize) -> Self {
        self.buffer = n.max(1);
        self
    }

    pub fn max_line_bytes(mut self, n: usize) -> Self {
        self.max_line_bytes = n;
        self
    }

    pub fn allow_empty_lines(mut self, yes: bool) -> Self {
        self.allow_empty_lines = yes;
        self
    }

    /// Run under `cancel` instead of a private token.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that aborts all runs of this ingestor when cancelled.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Ingest `path` to completion, or until the ingestor is cancelled.
    ///
    /// An aborted run still settles the sends it started and returns the
    /// partial summary.
    pub async fn process(&self, path: impl AsRef<Path>) -> Result<IngestSummary> {
        let path = path.as_ref();
        let stats = IngestStats::new();

        let pipe = ChunkSource::new(path)
            .chunk_bytes(self.chunk_bytes)
            .pipe(
                LineDecoder::new()
                    .max_line_bytes(self.max_line_bytes)
                    .allow_empty_lines(self.allow_empty_lines),
            )
            .skip(1)
            .pipe(TokenizeStage::new(stats.clone()))
            .pipe::<(), _>(PublishSink::new(self.publisher.clone(), stats.clone()));

        let rt = Runtime::new()
            .buffer(self.buffer)
            .with_cancel(self.cancel.child());
        let (tx, _cancel, handle) = rt.spawn_sink(pipe);

        tx.send(())
            .await
            .map_err(|_| Error::pipeline("ingestion pipeline exited before start"))?;
        drop(tx);

        handle.await??;

        let summary = stats.summary(path);
        #[cfg(feature = "tracing")]
        tracing::event!(
            tracing::Level::INFO,
            event = "rowpipe.file.done",
            aborted = self.cancel.is_cancelled(),
            path = %summary.path.display(),
            lines = summary.lines,
            forwarded = summary.forwarded,
            rejected = summary.rejected,
            failed = summary.failed,
            "rowpipe.file.done"
        );
        Ok(summary)
    }

    /// Ingest `path` on its own task; failures are logged, not returned.
    pub fn spawn(&self, path: PathBuf) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move { this.run_logged(path).await })
    }

    pub(crate) async fn run_logged(self, path: PathBuf) {
        if let Err(_err) = self.process(&path).await {
            #[cfg(feature = "tracing")]
            tracing::event!(
                tracing::Level::ERROR,
                event = "rowpipe.file.failed",
                path = %path.display(),
                decode = _err.is_decode(),
                "failed to ingest {}: {}",
                path.display(),
                _err
            );
        }
    }
}
