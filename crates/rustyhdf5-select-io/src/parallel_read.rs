//! Parallel box reads using rayon.
//!
//! The box is cut along the first axis at chunk boundaries into bands. Each
//! band is an independent decode into its own slice of the output buffer;
//! all bands share one [`ChunkCache`]. The parallel path is only taken when
//! there are more than [`PARALLEL_THRESHOLD`] bands.

use rayon::prelude::*;
use rustyhdf5_select::index::element_count;
use rustyhdf5_select::{
    decode, ChunkCache, ChunkReader, DecodeInfo, RawCopy, RegularHyperslab, Selection,
};
use tracing::debug;

use crate::ImplicitChunkLayout;

/// Only fan out when the band count exceeds this.
pub const PARALLEL_THRESHOLD: usize = 4;

/// Returns `true` if the parallel path should be used for `band_count` bands.
pub fn should_use_parallel(band_count: usize) -> bool {
    band_count > PARALLEL_THRESHOLD
}

/// Row ranges `(first_row, rows)` of `start..start + extent` along an axis
/// chunked by `chunk`, each inside a single chunk row.
fn bands(start: u64, extent: u64, chunk: u64) -> Vec<(u64, u64)> {
    let mut out = Vec::new();
    let end = start + extent;
    let mut row = start;
    while row < end {
        let next = ((row / chunk + 1) * chunk).min(end);
        out.push((row, next - row));
        row = next;
    }
    out
}

/// Read the box `start .. start + shape` into a dense row-major buffer,
/// decoding one chunk row of the box per rayon task.
///
/// `reader` futures are driven with a blocking executor on the worker
/// threads, so it should be a store whose reads complete immediately such as
/// [`ChunkStore`](crate::ChunkStore) or
/// [`MmapChunkStore`](crate::MmapChunkStore).
pub fn read_box_parallel<R>(
    reader: &R,
    layout: &ImplicitChunkLayout,
    start: &[u64],
    shape: &[u64],
    cache: &ChunkCache,
) -> Result<Vec<u8>, R::Error>
where
    R: ChunkReader,
{
    let rank = layout.rank();
    let whole = RegularHyperslab::contiguous(start.to_vec(), shape.to_vec())?;
    whole.steps(layout.dims())?;

    let element_size = layout.element_size();
    let mut out = vec![0u8; whole.total_element_count() as usize * element_size];
    if out.is_empty() {
        return Ok(out);
    }

    let row_bytes = element_count(&shape[1..]) as usize * element_size;
    let bands = bands(start[0], shape[0], layout.chunk_dims()[0]);
    debug!(bands = bands.len(), bytes = out.len(), "parallel box read");

    let mut work = Vec::with_capacity(bands.len());
    let mut rest = out.as_mut_slice();
    for (first_row, rows) in bands {
        let (head, tail) = std::mem::take(&mut rest).split_at_mut(rows as usize * row_bytes);
        work.push((first_row, rows, head));
        rest = tail;
    }

    let read_band = |(first_row, rows, buf): (u64, u64, &mut [u8])| -> Result<(), R::Error> {
        let mut band_start = start.to_vec();
        band_start[0] = first_row;
        let mut band_shape = shape.to_vec();
        band_shape[0] = rows;

        let source: Selection = RegularHyperslab::contiguous(band_start, band_shape.clone())?.into();
        let target = Selection::all(&band_shape);
        decode(
            rank,
            rank,
            DecodeInfo {
                source_dims: layout.dims(),
                source_chunk_dims: layout.chunk_dims(),
                target_dims: &band_shape,
                source_selection: &source,
                target_selection: &target,
                reader,
                target: buf,
                decoder: RawCopy,
                cache: Some(cache),
                source_type_size: element_size,
                target_type_factor: 1,
            },
        )
    };

    if should_use_parallel(work.len()) {
        work.into_par_iter().try_for_each(read_band)?;
    } else {
        work.into_iter().try_for_each(read_band)?;
    }
    Ok(out)
}
