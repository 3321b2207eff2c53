//! # rowpipe
//!
//! **Watch a directory, stream every new delimited-text file onto a message channel.**
//!
//! Each file dropped into the watched directory is read in bounded chunks,
//! reassembled into lines, tokenized into five-field records and published,
//! one message per data row. Files of any size stream through in constant
//! memory, a bad row never stops the file, and a slow channel slows only the
//! file that feeds it.
//!
//! ---
//!
//! ## Core Model
//!
//! Ingesting one file is a chain of stages:
//!
//! ```text
//! ChunkSource → LineDecoder → skip(1) → TokenizeStage → PublishSink
//!   4 KiB chunks   logical lines   header     JSON bodies     channel
//! ```
//!
//! Each stage implements the [`Pipe`] trait and talks to its neighbours
//! through bounded Tokio channels. A [`DirectoryWatcher`] starts one such
//! chain per created file.
//!
//! ---
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use rowpipe::channel::FileChannel;
//! use rowpipe::ingest::FileIngestor;
//! use rowpipe::publish::RecordPublisher;
//! use rowpipe::watch::DirectoryWatcher;
//!
//! #[tokio::main]
//! async fn main() -> rowpipe::error::Result<()> {
//!     let channel = Arc::new(FileChannel::new("./spool"));
//!     let publisher = RecordPublisher::new(channel, "todo-topic").max_in_flight(32);
//!     let ingestor = FileIngestor::new(publisher);
//!
//!     // Fails right here if the directory cannot be watched.
//!     let handle = DirectoryWatcher::new("./inbox", ingestor).spawn()?;
//!
//!     tokio::signal::ctrl_c().await?;
//!     handle.shutdown().await
//! }
//! ```
//!
//! ---
//!
//! ## Input Format
//!
//! UTF-8, one header line, then rows of exactly five comma-separated fields:
//!
//! ```text
//! id,title,description,completed,ownerId
//! 2,Walk dog,,false,u2
//! ```
//!
//! There is no quoting. A comma inside a field changes the field count and
//! the row is rejected.
//!
//! ---
//!
//! ## Error Handling Contract
//!
//! - Malformed row: logged with its line number, skipped.
//! - Failed send: logged, not retried, not reported to the ingestor.
//! - Unreadable or non-UTF-8 file: that file's task ends, the watcher goes on.
//! - Watch cannot be established: returned from [`DirectoryWatcher::spawn`].
//!
//! ---
//!
//! ## Observability
//!
//! With the default `tracing` feature, stages run inside `rowpipe.stage`
//! spans and emit events such as `rowpipe.line.rejected`,
//! `rowpipe.publish.ok`, `rowpipe.publish.failed`, `rowpipe.file.done`,
//! `rowpipe.watch.created` and `rowpipe.cancelled`.
//!
//! [`Pipe`]: pipeline::pipe::Pipe
//! [`DirectoryWatcher`]: watch::DirectoryWatcher
//! [`DirectoryWatcher::spawn`]: watch::DirectoryWatcher::spawn

pub mod channel;
pub mod config;
pub mod decode;
pub mod error;
pub mod ingest;
#[cfg(feature = "tracing")]
pub mod logging;
pub mod pipeline;
pub mod publish;
pub mod record;
pub mod source;
pub mod watch;

pub mod prelude {
    //! Convenient imports for most `rowpipe` users.

    pub use crate::channel::{Channel, FileChannel, MemoryChannel};
    pub use crate::ingest::{FileIngestor, IngestSummary};
    pub use crate::pipeline::cancel::CancelToken;
    pub use crate::pipeline::chain::PipeExt;
    pub use crate::pipeline::runtime::Runtime;
    pub use crate::publish::RecordPublisher;
    pub use crate::record::{LineTokenizer, Record};
    pub use crate::watch::DirectoryWatcher;
}
