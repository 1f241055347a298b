//! Scatter/gather decoding between a chunked source and a memory target.
//!
//! The engine walks the source selection over the chunk grid and the target
//! selection over the memory buffer (one chunk spanning the whole buffer),
//! pairs their runs positionally and hands each matched byte range to an
//! [`ElementDecoder`]. Chunks are fetched through the [`ChunkReader`], and
//! through the [`ChunkCache`] when one is supplied, only when the source
//! walk moves to a different chunk.
//!
//! [`decode_async`] is the engine; [`decode`] blocks on it, which is free for
//! readers whose futures are always ready such as
//! [`SyncReader`](crate::reader::SyncReader).

use bytes::Bytes;
use tracing::{debug, trace};

use crate::chunk_cache::ChunkCache;
use crate::convert::ElementDecoder;
use crate::error::{Error, Side};
use crate::reader::{ChunkReader, TargetBuffer};
use crate::selection::Selection;
use crate::walker::{walk, Walk};

/// Parameters of one decode operation.
pub struct DecodeInfo<'a, R, T, D> {
    /// Shape of the dataset.
    pub source_dims: &'a [u64],
    /// Shape of one dataset chunk.
    pub source_chunk_dims: &'a [u64],
    /// Shape of the memory buffer.
    pub target_dims: &'a [u64],
    pub source_selection: &'a Selection,
    pub target_selection: &'a Selection,
    /// Chunk fetch capability.
    pub reader: R,
    /// Memory the decoded elements are written to.
    pub target: T,
    /// Per-transfer element conversion.
    pub decoder: D,
    /// Optional cache shared with other decodes of the same dataset.
    pub cache: Option<&'a ChunkCache>,
    /// Bytes per source element.
    pub source_type_size: usize,
    /// Target element bytes divided by source element bytes.
    pub target_type_factor: usize,
}

/// Blocking decode: [`decode_async`] driven to completion on the current
/// thread.
pub fn decode<R, T, D>(
    source_rank: usize,
    target_rank: usize,
    info: DecodeInfo<'_, R, T, D>,
) -> Result<(), R::Error>
where
    R: ChunkReader,
    T: TargetBuffer,
    D: ElementDecoder<R::Error>,
{
    futures::executor::block_on(decode_async(source_rank, target_rank, info))
}

/// Decode every element of `info.source_selection` into the positions of
/// `info.target_selection`.
///
/// All validation (element counts, ranks, type sizes, shapes and bounds)
/// happens before the first chunk is requested. Reader and decoder errors
/// abort the operation and are returned unchanged; the target may then be
/// partially written.
pub async fn decode_async<R, T, D>(
    source_rank: usize,
    target_rank: usize,
    info: DecodeInfo<'_, R, T, D>,
) -> Result<(), R::Error>
where
    R: ChunkReader,
    T: TargetBuffer,
    D: ElementDecoder<R::Error>,
{
    let engine = Engine::new(source_rank, target_rank, info)?;
    debug!(
        source_rank,
        target_rank,
        elements = engine.element_count,
        "decode started"
    );
    engine.run().await
}

fn check_rank(what: &'static str, expected: usize, actual: usize) -> Result<(), Error> {
    if expected != actual {
        return Err(Error::RankMismatch {
            what,
            expected,
            actual,
        });
    }
    Ok(())
}

/// Fetch one chunk, through the cache when there is one.
///
/// Borrows only the reader and the cache so the engine's walkers are not
/// held across the await.
async fn fetch<R: ChunkReader>(
    reader: &R,
    cache: Option<&ChunkCache>,
    chunk: &[u64],
) -> Result<Bytes, R::Error> {
    trace!(chunk = ?chunk, "fetching chunk");
    match cache {
        Some(cache) => {
            cache
                .get_or_create_async(chunk, || reader.read_chunk(chunk))
                .await
        }
        None => reader.read_chunk(chunk).await,
    }
}

/// Remaining part of the current target step.
struct TargetCursor {
    chunk: Vec<u64>,
    offset: u64,
    remaining: u64,
}

struct Engine<'a, R, T, D> {
    source: Walk<'a>,
    target: Walk<'a>,
    reader: R,
    buffer: T,
    decoder: D,
    cache: Option<&'a ChunkCache>,
    element_count: u64,
    source_type_size: usize,
    target_type_size: usize,
}

impl<'a, R, T, D> Engine<'a, R, T, D>
where
    R: ChunkReader,
    T: TargetBuffer,
    D: ElementDecoder<R::Error>,
{
    fn new(
        source_rank: usize,
        target_rank: usize,
        info: DecodeInfo<'a, R, T, D>,
    ) -> Result<Self, Error> {
        let source_count = info.source_selection.total_element_count();
        let target_count = info.target_selection.total_element_count();
        if source_count != target_count {
            return Err(Error::ElementCountMismatch {
                source_count,
                target_count,
            });
        }

        check_rank("source dims", source_rank, info.source_dims.len())?;
        check_rank("source chunk dims", source_rank, info.source_chunk_dims.len())?;
        check_rank("target dims", target_rank, info.target_dims.len())?;

        if info.source_type_size == 0 || info.target_type_factor == 0 {
            return Err(Error::InvalidTypeSize {
                source_type_size: info.source_type_size,
                target_type_factor: info.target_type_factor,
            });
        }

        let source = walk(
            source_rank,
            info.source_dims,
            info.source_chunk_dims,
            info.source_selection,
        )?;
        let target = walk(
            target_rank,
            info.target_dims,
            info.target_dims,
            info.target_selection,
        )?;

        Ok(Self {
            source,
            target,
            reader: info.reader,
            buffer: info.target,
            decoder: info.decoder,
            cache: info.cache,
            element_count: source_count,
            source_type_size: info.source_type_size,
            target_type_size: info.source_type_size * info.target_type_factor,
        })
    }

    fn next_target(&mut self) -> Result<TargetCursor, R::Error> {
        match self.target.next() {
            Some(step) => {
                let step = step?;
                Ok(TargetCursor {
                    chunk: step.chunk,
                    offset: step.offset,
                    remaining: step.length,
                })
            }
            None => Err(Error::WalkerExhausted { side: Side::Target }.into()),
        }
    }

    fn transfer(
        &mut self,
        chunk: &[u8],
        source_offset: u64,
        cursor: &TargetCursor,
        count: u64,
    ) -> Result<(), R::Error> {
        let count = count as usize;

        let start = source_offset as usize * self.source_type_size;
        let len = count * self.source_type_size;
        let source = chunk
            .get(start..start + len)
            .ok_or(Error::SourceOutOfRange {
                offset: start,
                len,
                available: chunk.len(),
            })?;

        let region = self.buffer.region(&cursor.chunk)?;
        let available = region.len();
        let start = cursor.offset as usize * self.target_type_size;
        let len = count * self.target_type_size;
        let target = region
            .get_mut(start..start + len)
            .ok_or(Error::TargetOutOfRange {
                offset: start,
                len,
                available,
            })?;

        self.decoder.decode(source, target, count)
    }

    async fn run(mut self) -> Result<(), R::Error> {
        let mut current_chunk: Option<Vec<u64>> = None;
        let mut chunk_bytes = Bytes::new();
        let mut cursor: Option<TargetCursor> = None;
        let mut fetches = 0u64;
        let mut transfers = 0u64;

        while let Some(step) = self.source.next() {
            let step = step?;

            if current_chunk.as_deref() != Some(step.chunk.as_slice()) {
                chunk_bytes = fetch(&self.reader, self.cache, &step.chunk).await?;
                fetches += 1;
                current_chunk = Some(step.chunk);
            }

            let mut offset = step.offset;
            let mut remaining = step.length;
            while remaining > 0 {
                let mut target = match cursor.take() {
                    Some(c) => c,
                    None => self.next_target()?,
                };

                let n = remaining.min(target.remaining);
                self.transfer(&chunk_bytes, offset, &target, n)?;
                transfers += 1;

                offset += n;
                remaining -= n;
                target.offset += n;
                target.remaining -= n;
                if target.remaining > 0 {
                    cursor = Some(target);
                }
            }
        }

        // the source is done; the target must be too
        if cursor.is_some() {
            return Err(Error::WalkerExhausted { side: Side::Source }.into());
        }
        if let Some(step) = self.target.next() {
            step?;
            return Err(Error::WalkerExhausted { side: Side::Source }.into());
        }

        debug!(
            elements = self.element_count,
            fetches, transfers, "decode finished"
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
