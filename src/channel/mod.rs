//! Outbound message transport.
//!
//! The pipeline only needs "send this payload to that topic"; anything that
//! can do that asynchronously implements [`Channel`].

mod file;
mod memory;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

pub use file::FileChannel;
pub use memory::MemoryChannel;

#[async_trait]
pub trait Channel: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    /// Deliver one message. An `Err` is always [`crate::error::Error::Publish`].
    async fn send(&self, topic: &str, payload: Bytes) -> Result<()>;
}

/// Outcome of one send, reported once it completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishResult {
    pub success: bool,
    pub error_detail: Option<String>,
}

impl PublishResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            error_detail: None,
        }
    }

    pub fn failed(detail: impl Into<String>) -> Self {
        Self {
            success: false,
            error_detail: Some(detail.into()),
        }
    }
}

impl<E: std::fmt::Display> From<&std::result::Result<(), E>> for PublishResult {
    fn from(res: &std::result::Result<(), E>) -> Self {
        match res {
            Ok(()) => Self::ok(),
            Err(err) => Self::failed(err.to_string()),
        }
    }
}
