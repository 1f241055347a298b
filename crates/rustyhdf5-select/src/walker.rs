//! Chunk-relative walking of selections.
//!
//! [`walk`] turns the absolute runs of a [`Selection`] into
//! [`RelativeStep`]s: chunk grid coordinates, a row-major element offset
//! inside that chunk and a run length that never crosses the chunk boundary
//! along the last dimension.

use crate::error::{Error, Result};
use crate::index::to_linear_index;
use crate::selection::{Selection, Step, Steps};

/// A run of elements contained in a single chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelativeStep {
    /// Chunk grid coordinates (`coord / chunk_dims` per axis).
    pub chunk: Vec<u64>,
    /// Row-major element offset within the chunk.
    pub offset: u64,
    /// Number of contiguous elements along the last axis.
    pub length: u64,
}

/// Walk `selection` over a dataset of shape `dims` stored in chunks of shape
/// `chunk_dims`.
///
/// An empty selection yields nothing without looking at the shapes. Otherwise
/// ranks, zero-length dimensions and selection bounds are validated before
/// the iterator is returned.
pub fn walk<'a>(
    rank: usize,
    dims: &[u64],
    chunk_dims: &'a [u64],
    selection: &'a Selection,
) -> Result<Walk<'a>> {
    if selection.total_element_count() == 0 {
        return Ok(Walk::empty(rank, chunk_dims));
    }

    if dims.len() != rank {
        return Err(Error::RankMismatch {
            what: "dataset dims",
            expected: rank,
            actual: dims.len(),
        });
    }
    if chunk_dims.len() != rank {
        return Err(Error::RankMismatch {
            what: "chunk dims",
            expected: rank,
            actual: chunk_dims.len(),
        });
    }
    if rank == 0 {
        // scalar dataspaces are never chunked
        return Err(Error::RankMismatch {
            what: "chunked dataspace",
            expected: 1,
            actual: 0,
        });
    }
    if let Some(dimension) = dims.iter().position(|&d| d == 0) {
        return Err(Error::ZeroDimension { dimension });
    }
    if let Some(dimension) = chunk_dims.iter().position(|&d| d == 0) {
        return Err(Error::ZeroDimension { dimension });
    }

    let steps = selection.steps(dims)?;
    Ok(Walk {
        steps,
        chunk_dims,
        rank,
        current: None,
    })
}

/// Lazy iterator over the [`RelativeStep`]s of a selection.
///
/// Yields an error item (and then stops) if a custom selection produces a
/// step of the wrong rank.
#[derive(Debug)]
pub struct Walk<'a> {
    steps: Steps<'a>,
    chunk_dims: &'a [u64],
    rank: usize,
    current: Option<Step>,
}

impl<'a> Walk<'a> {
    fn empty(rank: usize, chunk_dims: &'a [u64]) -> Self {
        Self {
            steps: Steps::Empty,
            chunk_dims,
            rank,
            current: None,
        }
    }

    fn split(&mut self) -> Option<RelativeStep> {
        let step = self.current.as_mut()?;
        if step.element_count == 0 {
            return None;
        }

        let last = self.rank - 1;
        let mut chunk = Vec::with_capacity(self.rank);
        let mut within = Vec::with_capacity(self.rank);
        for (&c, &cd) in step.coordinates.iter().zip(self.chunk_dims.iter()) {
            chunk.push(c / cd);
            within.push(c % cd);
        }

        let offset = to_linear_index(&within, self.chunk_dims);
        let length = (self.chunk_dims[last] - within[last]).min(step.element_count);

        step.coordinates[last] += length;
        step.element_count -= length;

        Some(RelativeStep {
            chunk,
            offset,
            length,
        })
    }
}

impl Iterator for Walk<'_> {
    type Item = Result<RelativeStep>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(relative) = self.split() {
                return Some(Ok(relative));
            }

            let step = self.steps.next()?;
            if step.coordinates.len() != self.rank {
                self.steps = Steps::Empty;
                self.current = None;
                return Some(Err(Error::RankMismatch {
                    what: "step coordinates",
                    expected: self.rank,
                    actual: step.coordinates.len(),
                }));
            }
            self.current = Some(step);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
