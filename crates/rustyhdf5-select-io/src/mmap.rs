//! Memory-mapped chunk store.
//!
//! [`MmapChunkStore`] maps the file once. [`MmapChunkStore::chunk`] borrows
//! straight out of the mapping; a decode copies each chunk it fetches once
//! into an owned buffer, which is what the chunk cache holds. Only the pages
//! a decode touches are read in.

use std::fs;
use std::io;
use std::path::Path;

use bytes::Bytes;
use memmap2::Mmap;
use rustyhdf5_select::{ChunkCache, ChunkReader, Error, Result, Selection};
use tracing::debug;

use crate::{ChunkBytes, ChunkStore, ImplicitChunkLayout};

impl ChunkBytes for Mmap {}

/// Read-only memory-mapped file holding an implicit chunk layout.
pub struct MmapChunkStore {
    store: ChunkStore<Mmap>,
}

impl MmapChunkStore {
    /// Map `path` and check that it is large enough for `layout`.
    ///
    /// The file must not be modified by another process while mapped.
    pub fn open<P: AsRef<Path>>(path: P, layout: ImplicitChunkLayout) -> Result<Self> {
        let file = fs::File::open(path.as_ref())?;
        // SAFETY: read-only mapping; callers guarantee no concurrent writers.
        let mmap = unsafe { Mmap::map(&file)? };

        let needed = layout.base_offset() + layout.total_bytes();
        if (mmap.len() as u64) < needed {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "{} holds {} bytes, chunk layout needs {needed}",
                    path.as_ref().display(),
                    mmap.len()
                ),
            )));
        }

        debug!(
            path = %path.as_ref().display(),
            bytes = mmap.len(),
            chunks = layout.chunk_count(),
            "mapped chunk store"
        );
        Ok(Self {
            store: ChunkStore::new(layout, mmap),
        })
    }

    pub fn layout(&self) -> &ImplicitChunkLayout {
        self.store.layout()
    }

    /// The underlying store, for APIs that take a [`ChunkStore`].
    pub fn store(&self) -> &ChunkStore<Mmap> {
        &self.store
    }

    /// Zero-copy view of one chunk.
    pub fn chunk(&self, chunk: &[u64]) -> Result<&[u8]> {
        self.store.chunk(chunk)
    }

    pub fn len(&self) -> usize {
        self.store.data().len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.data().is_empty()
    }

    /// Ask the kernel to start paging in `chunk` (madvise WILLNEED).
    #[cfg(unix)]
    pub fn prefetch(&self, chunk: &[u64]) -> Result<()> {
        let range = self.store.layout().chunk_range(chunk)?;
        self.store
            .data()
            .advise_range(memmap2::Advice::WillNeed, range.start, range.len())?;
        Ok(())
    }

    /// No-op on non-Unix platforms.
    #[cfg(not(unix))]
    pub fn prefetch(&self, _chunk: &[u64]) -> Result<()> {
        Ok(())
    }

    pub fn read_selection(
        &self,
        selection: &Selection,
        cache: Option<&ChunkCache>,
    ) -> Result<Vec<u8>> {
        self.store.read_selection(selection, cache)
    }

    pub fn read_box(
        &self,
        start: &[u64],
        shape: &[u64],
        cache: Option<&ChunkCache>,
    ) -> Result<Vec<u8>> {
        self.store.read_box(start, shape, cache)
    }
}

impl ChunkReader for MmapChunkStore {
    type Error = Error;

    fn read_chunk(
        &self,
        chunk: &[u64],
    ) -> impl std::future::Future<Output = Result<Bytes>> + Send {
        self.store.read_chunk(chunk)
    }
}

impl std::fmt::Debug for MmapChunkStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MmapChunkStore")
            .field("layout", self.store.layout())
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(bytes: &[u8]) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(bytes).unwrap();
        f.flush().unwrap();
        f
    }

    #[test]
    fn open_and_read_chunks() {
        // 16-byte header, then two 1x3 chunks of u8
        let mut bytes = vec![0xFFu8; 16];
        bytes.extend_from_slice(&[1, 2, 3, 4, 5, 6]);
        let file = write_temp(&bytes);

        let layout = ImplicitChunkLayout::new(vec![6], vec![3], 1)
            .unwrap()
            .with_base_offset(16);
        let store = MmapChunkStore::open(file.path(), layout).unwrap();

        assert_eq!(store.len(), 22);
        assert_eq!(store.chunk(&[1]).unwrap(), &[4, 5, 6]);
        store.prefetch(&[0]).unwrap();
        assert_eq!(store.read_box(&[2], &[3], None).unwrap(), vec![3, 4, 5]);
    }

    #[test]
    fn fetched_chunks_are_owned_copies() {
        let file = write_temp(&[1, 2, 3, 4, 5, 6]);
        let layout = ImplicitChunkLayout::new(vec![6], vec![3], 1).unwrap();
        let store = MmapChunkStore::open(file.path(), layout).unwrap();

        let fetched = futures::executor::block_on(store.read_chunk(&[1])).unwrap();
        let view = store.chunk(&[1]).unwrap();
        assert_eq!(&fetched[..], view);
        assert_ne!(fetched.as_ptr(), view.as_ptr());
    }

    #[test]
    fn short_file_is_rejected() {
        let file = write_temp(&[0u8; 5]);
        let layout = ImplicitChunkLayout::new(vec![6], vec![3], 1).unwrap();
        let err = MmapChunkStore::open(file.path(), layout).unwrap_err();
        assert!(matches!(err, Error::Io(ref e) if e.kind() == io::ErrorKind::UnexpectedEof));
    }

    #[test]
    fn missing_file() {
        let layout = ImplicitChunkLayout::new(vec![6], vec![3], 1).unwrap();
        let err = MmapChunkStore::open("/nonexistent/rustyhdf5_select_io.bin", layout);
        assert!(matches!(err, Err(Error::Io(_))));
    }
}
