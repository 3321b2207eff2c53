use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Counters shared by the stages of one file run.
#[derive(Clone, Default, Debug)]
pub struct IngestStats {
    lines: Arc<AtomicUsize>,
    forwarded: Arc<AtomicUsize>,
    rejected: Arc<AtomicUsize>,
    delivered: Arc<AtomicUsize>,
    failed: Arc<AtomicUsize>,
}

impl IngestStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_line(&self) {
        self.lines.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_forwarded(&self) {
        self.forwarded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_delivery(&self, success: bool) {
        let counter = if success { &self.delivered } else { &self.failed };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn summary(&self, path: impl Into<PathBuf>) -> IngestSummary {
        IngestSummary {
            path: path.into(),
            lines: self.lines.load(Ordering::Relaxed),
            forwarded: self.forwarded.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Outcome of ingesting one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestSummary {
    pub path: PathBuf,
    /// Data lines seen, header excluded.
    pub lines: usize,
    /// Lines handed to the publisher.
    pub forwarded: usize,
    /// Lines dropped as malformed.
    pub rejected: usize,
    /// Sends the channel acknowledged.
    pub delivered: usize,
    /// Sends the channel refused.
    pub failed: usize,
}
