//! Async file-backed chunk store using tokio.
//!
//! Gated behind the `async` feature flag. Every chunk read opens the file,
//! seeks to the chunk address and reads exactly one chunk, so many decodes
//! can run against the same store from different tasks without sharing a
//! file cursor.

use std::io;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use rustyhdf5_select::{
    decode_async, ChunkCache, ChunkReader, DecodeInfo, Error, RawCopy, Result, Selection,
};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, trace};

use crate::ImplicitChunkLayout;

/// Chunks of an [`ImplicitChunkLayout`] read from a file with non-blocking I/O.
#[derive(Debug, Clone)]
pub struct AsyncFileChunkStore {
    path: PathBuf,
    layout: ImplicitChunkLayout,
}

impl AsyncFileChunkStore {
    /// Open `path` and check that it is large enough for `layout`.
    pub async fn open<P: AsRef<Path>>(path: P, layout: ImplicitChunkLayout) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let len = tokio::fs::metadata(&path).await?.len();
        let needed = layout.base_offset() + layout.total_bytes();
        if len < needed {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "{} holds {len} bytes, chunk layout needs {needed}",
                    path.display()
                ),
            )));
        }
        debug!(path = %path.display(), bytes = len, "opened async chunk store");
        Ok(Self { path, layout })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn layout(&self) -> &ImplicitChunkLayout {
        &self.layout
    }

    async fn read_range(&self, chunk: &[u64]) -> Result<Bytes> {
        let range = self.layout.chunk_range(chunk)?;
        trace!(chunk = ?chunk, offset = range.start, len = range.len(), "async chunk read");

        let mut file = tokio::fs::File::open(&self.path).await?;
        file.seek(io::SeekFrom::Start(range.start as u64)).await?;
        let mut buf = vec![0u8; range.len()];
        match file.read_exact(&mut buf).await {
            Ok(_) => Ok(Bytes::from(buf)),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(Error::ChunkNotFound {
                chunk: chunk.to_vec(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// Gather `selection` into a dense buffer in selection order.
    pub async fn read_selection(
        &self,
        selection: &Selection,
        cache: Option<&ChunkCache>,
    ) -> Result<Vec<u8>> {
        let n = selection.total_element_count();
        let target_dims = [n];
        let target = Selection::all(&target_dims);
        let mut out = vec![0u8; n as usize * self.layout.element_size()];

        decode_async(
            self.layout.rank(),
            1,
            DecodeInfo {
                source_dims: self.layout.dims(),
                source_chunk_dims: self.layout.chunk_dims(),
                target_dims: &target_dims,
                source_selection: selection,
                target_selection: &target,
                reader: self,
                target: &mut out,
                decoder: RawCopy,
                cache,
                source_type_size: self.layout.element_size(),
                target_type_factor: 1,
            },
        )
        .await?;
        Ok(out)
    }
}

impl ChunkReader for AsyncFileChunkStore {
    type Error = Error;

    async fn read_chunk(&self, chunk: &[u64]) -> Result<Bytes> {
        self.read_range(chunk).await
    }
}
