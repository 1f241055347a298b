//! Chunk fetch and target buffer capabilities used by the decode engine.
//!
//! [`ChunkReader`] is the single read abstraction: its `read_chunk` returns a
//! future, so blocking sources resolve immediately ([`SyncReader`]) and
//! non-blocking ones suspend ([`AsyncReader`]) without the engine being
//! written twice.

use std::future::Future;

use bytes::Bytes;

use crate::error::{Error, Result};

/// Source of decoded chunk bytes, addressed by chunk grid coordinates.
///
/// The associated error type lets callers thread their own error through
/// [`decode`](crate::decode::decode) unchanged; it only has to absorb this
/// crate's validation errors.
pub trait ChunkReader: Send + Sync {
    type Error: From<Error> + Send;

    /// Fetch the full byte buffer of one chunk.
    fn read_chunk(
        &self,
        chunk: &[u64],
    ) -> impl Future<Output = std::result::Result<Bytes, Self::Error>> + Send;
}

impl<R: ChunkReader> ChunkReader for &R {
    type Error = R::Error;

    fn read_chunk(
        &self,
        chunk: &[u64],
    ) -> impl Future<Output = std::result::Result<Bytes, Self::Error>> + Send {
        (**self).read_chunk(chunk)
    }
}

// ---------------------------------------------------------------------------
// SyncReader
// ---------------------------------------------------------------------------

/// Blocking adapter: wraps `Fn(&[u64]) -> Result<Bytes, E>`.
///
/// The returned futures are always ready.
#[derive(Debug, Clone, Copy)]
pub struct SyncReader<F>(pub F);

impl<F, E> ChunkReader for SyncReader<F>
where
    F: Fn(&[u64]) -> std::result::Result<Bytes, E> + Send + Sync,
    E: From<Error> + Send,
{
    type Error = E;

    fn read_chunk(
        &self,
        chunk: &[u64],
    ) -> impl Future<Output = std::result::Result<Bytes, E>> + Send {
        std::future::ready((self.0)(chunk))
    }
}

// ---------------------------------------------------------------------------
// AsyncReader
// ---------------------------------------------------------------------------

/// Non-blocking adapter: wraps `Fn(Vec<u64>) -> impl Future<Output = Result<Bytes, E>>`.
///
/// The chunk coordinates are passed by value so the future can own them.
#[derive(Debug, Clone, Copy)]
pub struct AsyncReader<F>(pub F);

impl<F, Fut, E> ChunkReader for AsyncReader<F>
where
    F: Fn(Vec<u64>) -> Fut + Send + Sync,
    Fut: Future<Output = std::result::Result<Bytes, E>> + Send,
    E: From<Error> + Send,
{
    type Error = E;

    fn read_chunk(
        &self,
        chunk: &[u64],
    ) -> impl Future<Output = std::result::Result<Bytes, E>> + Send {
        (self.0)(chunk.to_vec())
    }
}

// ---------------------------------------------------------------------------
// TargetBuffer
// ---------------------------------------------------------------------------

/// Writable memory a decode scatters into.
///
/// `chunk` is the target step's chunk key. The target side is walked as one
/// chunk covering the whole buffer, so it is always the origin.
pub trait TargetBuffer {
    fn region(&mut self, chunk: &[u64]) -> Result<&mut [u8]>;
}

impl TargetBuffer for [u8] {
    fn region(&mut self, _chunk: &[u64]) -> Result<&mut [u8]> {
        Ok(self)
    }
}

impl TargetBuffer for Vec<u8> {
    fn region(&mut self, _chunk: &[u64]) -> Result<&mut [u8]> {
        Ok(self.as_mut_slice())
    }
}

impl<T: TargetBuffer + ?Sized> TargetBuffer for &mut T {
    fn region(&mut self, chunk: &[u64]) -> Result<&mut [u8]> {
        (**self).region(chunk)
    }
}
