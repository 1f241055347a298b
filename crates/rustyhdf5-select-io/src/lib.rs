//! Chunk sources for `rustyhdf5-select`.
//!
//! A dataset stored with an implicit chunk index keeps every chunk, edge
//! chunks included, at full size and in row-major order of the chunk grid,
//! so a chunk's address is pure arithmetic. [`ChunkStore`] serves such a
//! layout out of any byte container; the optional modules add a
//! memory-mapped store, a tokio file-backed store and parallel box reads.

use std::ops::Range;

use bytes::Bytes;
use rustyhdf5_select::index::{element_count, scaled_dims, to_linear_index};
use rustyhdf5_select::{
    decode, ChunkCache, ChunkReader, DecodeInfo, Error, RawCopy, RegularHyperslab, Result,
    Selection,
};

pub use rustyhdf5_select;

// ---------------------------------------------------------------------------
// ImplicitChunkLayout
// ---------------------------------------------------------------------------

/// Address arithmetic for chunks stored back to back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImplicitChunkLayout {
    dims: Vec<u64>,
    chunk_dims: Vec<u64>,
    element_size: usize,
    base_offset: u64,
}

impl ImplicitChunkLayout {
    /// Describe a dataset of shape `dims` split into `chunk_dims` chunks of
    /// `element_size`-byte elements, starting at offset 0.
    pub fn new(dims: Vec<u64>, chunk_dims: Vec<u64>, element_size: usize) -> Result<Self> {
        if dims.is_empty() {
            return Err(Error::RankMismatch {
                what: "chunked dataspace",
                expected: 1,
                actual: 0,
            });
        }
        if chunk_dims.len() != dims.len() {
            return Err(Error::RankMismatch {
                what: "chunk dims",
                expected: dims.len(),
                actual: chunk_dims.len(),
            });
        }
        if let Some(dimension) = chunk_dims.iter().position(|&c| c == 0) {
            return Err(Error::ZeroDimension { dimension });
        }
        if element_size == 0 {
            return Err(Error::InvalidTypeSize {
                source_type_size: 0,
                target_type_factor: 1,
            });
        }
        Ok(Self {
            dims,
            chunk_dims,
            element_size,
            base_offset: 0,
        })
    }

    /// Shift every chunk address by `offset` bytes.
    pub fn with_base_offset(mut self, offset: u64) -> Self {
        self.base_offset = offset;
        self
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    pub fn dims(&self) -> &[u64] {
        &self.dims
    }

    pub fn chunk_dims(&self) -> &[u64] {
        &self.chunk_dims
    }

    pub fn element_size(&self) -> usize {
        self.element_size
    }

    pub fn base_offset(&self) -> u64 {
        self.base_offset
    }

    /// Shape of the chunk grid.
    pub fn scaled_dims(&self) -> Vec<u64> {
        scaled_dims(&self.dims, &self.chunk_dims)
    }

    pub fn chunk_count(&self) -> u64 {
        element_count(&self.scaled_dims())
    }

    /// Size of one stored chunk in bytes.
    pub fn chunk_bytes(&self) -> usize {
        element_count(&self.chunk_dims) as usize * self.element_size
    }

    /// Bytes needed past the base offset to hold every chunk.
    pub fn total_bytes(&self) -> u64 {
        self.chunk_count() * self.chunk_bytes() as u64
    }

    /// Absolute byte range of `chunk`.
    pub fn chunk_range(&self, chunk: &[u64]) -> Result<Range<usize>> {
        if chunk.len() != self.rank() {
            return Err(Error::RankMismatch {
                what: "chunk coordinates",
                expected: self.rank(),
                actual: chunk.len(),
            });
        }
        let scaled = self.scaled_dims();
        if chunk.iter().zip(&scaled).any(|(&c, &s)| c >= s) {
            return Err(Error::ChunkNotFound {
                chunk: chunk.to_vec(),
            });
        }
        let size = self.chunk_bytes();
        let start = self.base_offset as usize + to_linear_index(chunk, &scaled) as usize * size;
        Ok(start..start + size)
    }
}

// ---------------------------------------------------------------------------
// ChunkBytes
// ---------------------------------------------------------------------------

/// Byte container a [`ChunkStore`] can hand chunks out of as [`Bytes`].
///
/// The default copies the range. Containers that are already reference
/// counted override [`share`](Self::share) to return a view instead.
pub trait ChunkBytes: AsRef<[u8]> + Send + Sync {
    /// Owned bytes of `range`, which the caller has bounds checked.
    fn share(&self, range: Range<usize>) -> Bytes {
        Bytes::copy_from_slice(&self.as_ref()[range])
    }
}

impl ChunkBytes for Vec<u8> {}

impl ChunkBytes for &[u8] {}

impl ChunkBytes for Bytes {
    fn share(&self, range: Range<usize>) -> Bytes {
        self.slice(range)
    }
}

// ---------------------------------------------------------------------------
// ChunkStore
// ---------------------------------------------------------------------------

/// Chunks of an [`ImplicitChunkLayout`] held in a byte container.
///
/// Works over `Vec<u8>`, `Bytes`, `&[u8]` or a memory map alike. Only a
/// `Bytes` container serves [`read_chunk`](ChunkReader::read_chunk) without
/// copying; the others copy each fetched chunk once.
#[derive(Debug, Clone)]
pub struct ChunkStore<B> {
    layout: ImplicitChunkLayout,
    data: B,
}

impl<B: AsRef<[u8]>> ChunkStore<B> {
    pub fn new(layout: ImplicitChunkLayout, data: B) -> Self {
        Self { layout, data }
    }

    pub fn layout(&self) -> &ImplicitChunkLayout {
        &self.layout
    }

    pub fn data(&self) -> &B {
        &self.data
    }

    pub fn into_inner(self) -> B {
        self.data
    }

    /// Borrow the stored bytes of `chunk`.
    ///
    /// A container too short to hold the chunk reports it as missing.
    pub fn chunk(&self, chunk: &[u64]) -> Result<&[u8]> {
        let range = self.stored_range(chunk)?;
        Ok(&self.data.as_ref()[range])
    }

    /// Byte range of `chunk`, checked against the container length.
    fn stored_range(&self, chunk: &[u64]) -> Result<Range<usize>> {
        let range = self.layout.chunk_range(chunk)?;
        if range.end > self.data.as_ref().len() {
            return Err(Error::ChunkNotFound {
                chunk: chunk.to_vec(),
            });
        }
        Ok(range)
    }

    /// Gather `selection` into a dense buffer in selection order.
    pub fn read_selection(
        &self,
        selection: &Selection,
        cache: Option<&ChunkCache>,
    ) -> Result<Vec<u8>>
    where
        B: ChunkBytes,
    {
        read_into_dense(self, &self.layout, selection, cache)
    }

    /// Read the box `start .. start + shape` as a dense row-major buffer.
    pub fn read_box(
        &self,
        start: &[u64],
        shape: &[u64],
        cache: Option<&ChunkCache>,
    ) -> Result<Vec<u8>>
    where
        B: ChunkBytes,
    {
        let selection: Selection =
            RegularHyperslab::contiguous(start.to_vec(), shape.to_vec())?.into();
        self.read_selection(&selection, cache)
    }
}

impl<B: ChunkBytes> ChunkReader for ChunkStore<B> {
    type Error = Error;

    fn read_chunk(
        &self,
        chunk: &[u64],
    ) -> impl std::future::Future<Output = Result<Bytes>> + Send {
        std::future::ready(
            self.stored_range(chunk)
                .map(|range| self.data.share(range)),
        )
    }
}

/// Decode `selection` from `reader` into a fresh buffer of
/// `total_element_count * element_size` bytes.
pub(crate) fn read_into_dense<R>(
    reader: &R,
    layout: &ImplicitChunkLayout,
    selection: &Selection,
    cache: Option<&ChunkCache>,
) -> std::result::Result<Vec<u8>, R::Error>
where
    R: ChunkReader,
{
    let n = selection.total_element_count();
    let target_dims = [n];
    let target = Selection::all(&target_dims);
    let mut out = vec![0u8; n as usize * layout.element_size()];

    decode(
        layout.rank(),
        1,
        DecodeInfo {
            source_dims: layout.dims(),
            source_chunk_dims: layout.chunk_dims(),
            target_dims: &target_dims,
            source_selection: selection,
            target_selection: &target,
            reader,
            target: &mut out,
            decoder: RawCopy,
            cache,
            source_type_size: layout.element_size(),
            target_type_factor: 1,
        },
    )?;
    Ok(out)
}

// ---------------------------------------------------------------------------
// Optional modules
// ---------------------------------------------------------------------------

#[cfg(feature = "async")]
pub mod async_read;

#[cfg(feature = "mmap")]
pub mod mmap;

#[cfg(feature = "parallel")]
pub mod parallel_read;

#[cfg(feature = "async")]
pub use async_read::AsyncFileChunkStore;

#[cfg(feature = "mmap")]
pub use mmap::MmapChunkStore;

#[cfg(feature = "parallel")]
pub use parallel_read::read_box_parallel;
