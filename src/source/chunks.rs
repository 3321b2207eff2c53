use std::path::PathBuf;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc::{Receiver, Sender};

use crate::error::{Error, Result};
use crate::pipeline::cancel::CancelToken;
use crate::pipeline::pipe::Pipe;

pub const DEFAULT_CHUNK_BYTES: usize = 4096;

/// Reads a file sequentially and emits its raw bytes in bounded chunks.
///
/// Each chunk is handed to the next stage by value; the source keeps no
/// reference to it, so at most `buffer` chunks per file are alive at once.
pub struct ChunkSource {
    path: PathBuf,
    chunk_bytes: usize,
}

impl ChunkSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            chunk_bytes: DEFAULT_CHUNK_BYTES,
        }
    }

    /// Number of bytes requested per read.
    pub fn chunk_bytes(mut self, n: usize) -> Self {
        self.chunk_bytes = n.max(1);
        self
    }
}

#[async_trait]
impl Pipe<(), Bytes> for ChunkSource {
    fn stage_name(&self) -> &'static str {
        "chunk_source"
    }

    async fn process(
        &self,
        mut input: Receiver<()>,
        output: Sender<Bytes>,
        _buffer: usize,
        cancel: CancelToken,
    ) -> Result<()> {
        #[cfg(feature = "tracing")]
        let stage = self.stage_name();

        tokio::select! {
            _ = cancel.cancelled() => {
                #[cfg(feature = "tracing")]
                tracing::event!(tracing::Level::DEBUG, event = "rowpipe.cancelled", stage = stage, where_ = "start", "rowpipe.cancelled");
                return Ok(());
            },
            _ = input.recv() => {}
        }

        let mut file = File::open(&self.path)
            .await
            .map_err(|e| Error::stage_source("chunk_source", e.into()))?;

        loop {
            let mut chunk = BytesMut::with_capacity(self.chunk_bytes);
            let n = tokio::select! {
                _ = cancel.cancelled() => {
                    #[cfg(feature = "tracing")]
                    tracing::event!(tracing::Level::DEBUG, event = "rowpipe.cancelled", stage = stage, where_ = "read", "rowpipe.cancelled");
                    return Ok(());
                },
                read = read_chunk(&mut file, &mut chunk, self.chunk_bytes) => {
                    read.map_err(|e| Error::stage_source("chunk_source", e.into()))?
                }
            };

            if n == 0 {
                break;
            }

            if output.send(chunk.freeze()).await.is_err() {
                #[cfg(feature = "tracing")]
                tracing::event!(tracing::Level::DEBUG, event = "rowpipe.downstream.closed", stage = stage, "rowpipe.downstream.closed");
                break;
            }
        }

        Ok(())
    }
}

/// Fill `chunk` with up to `limit` bytes; short only at end of file.
async fn read_chunk(file: &mut File, chunk: &mut BytesMut, limit: usize) -> std::io::Result<usize> {
    while chunk.len() < limit {
        let remaining = limit - chunk.len();
        let n = (&mut *file).take(remaining as u64).read_buf(chunk).await?;
        if n == 0 {
            break;
        }
    }
    Ok(chunk.len())
}

