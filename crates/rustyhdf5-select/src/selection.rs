//! Hyperslab, point and custom selections for partial dataset reads.
//!
//! A [`Selection`] describes which elements of an N-dimensional dataspace
//! take part in a transfer. Every variant enumerates its elements as a
//! sequence of [`Step`]s: contiguous runs along the last (fastest varying)
//! dimension, starting at absolute coordinates.
//!
//! # Example
//!
//! ```
//! use rustyhdf5_select::selection::{RegularHyperslab, Selection};
//!
//! // rows 2..4, every other column starting at 1 (three columns)
//! let slab = RegularHyperslab::new(2, vec![2, 1], vec![1, 2], vec![2, 3], vec![1, 1]).unwrap();
//! let sel = Selection::from(slab);
//! assert_eq!(sel.total_element_count(), 6);
//! assert_eq!(sel.steps(&[10, 10]).unwrap().count(), 6);
//! ```

use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::index::{element_count, Odometer};

/// A contiguous run of `element_count` elements along the last dimension,
/// starting at absolute `coordinates`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub coordinates: Vec<u64>,
    pub element_count: u64,
}

impl Step {
    pub fn new(coordinates: Vec<u64>, element_count: u64) -> Self {
        Self {
            coordinates,
            element_count,
        }
    }
}

/// A selection describing which elements of a dataspace to access.
#[derive(Debug, Clone)]
pub enum Selection {
    /// Select no elements.
    None,
    /// An ordered list of single elements.
    Point(PointSelection),
    /// A regular hyperslab defined by start, stride, count and block.
    Regular(RegularHyperslab),
    /// A list of axis-aligned blocks, walked in list order.
    Irregular(IrregularHyperslab),
    /// A caller-supplied step generator.
    Custom(CustomSelection),
}

impl Selection {
    /// A regular hyperslab covering the whole dataspace `dims`.
    pub fn all(dims: &[u64]) -> Self {
        Selection::Regular(RegularHyperslab::all(dims))
    }

    /// Number of selected elements.
    pub fn total_element_count(&self) -> u64 {
        match self {
            Selection::None => 0,
            Selection::Point(p) => p.total_element_count(),
            Selection::Regular(h) => h.total_element_count(),
            Selection::Irregular(h) => h.total_element_count(),
            Selection::Custom(c) => c.total_element_count(),
        }
    }

    /// The rank of this selection, if it has an intrinsic one.
    pub fn rank(&self) -> Option<usize> {
        match self {
            Selection::None | Selection::Custom(_) => None,
            Selection::Point(p) => Some(p.rank()),
            Selection::Regular(h) => Some(h.rank()),
            Selection::Irregular(h) => Some(h.rank()),
        }
    }

    /// Enumerate the selected runs within a dataspace of shape `limits`.
    ///
    /// Rank and bounds are checked eagerly, before the first step is
    /// produced. Custom selections are not checked.
    pub fn steps(&self, limits: &[u64]) -> Result<Steps<'_>> {
        match self {
            Selection::None => Ok(Steps::Empty),
            Selection::Point(p) => p.steps(limits).map(Steps::Points),
            Selection::Regular(h) => h.steps(limits).map(Steps::Regular),
            Selection::Irregular(h) => h.steps(limits).map(Steps::Irregular),
            Selection::Custom(c) => Ok(Steps::Custom(c.steps(limits))),
        }
    }
}

impl From<PointSelection> for Selection {
    fn from(p: PointSelection) -> Self {
        Selection::Point(p)
    }
}

impl From<RegularHyperslab> for Selection {
    fn from(h: RegularHyperslab) -> Self {
        Selection::Regular(h)
    }
}

impl From<IrregularHyperslab> for Selection {
    fn from(h: IrregularHyperslab) -> Self {
        Selection::Irregular(h)
    }
}

impl From<CustomSelection> for Selection {
    fn from(c: CustomSelection) -> Self {
        Selection::Custom(c)
    }
}

/// Product of per-axis extents. Zero if any extent is zero, otherwise an
/// overflow error once the product leaves `u64`.
fn checked_product(extents: &[u64], what: &'static str) -> Result<u64> {
    if extents.contains(&0) {
        return Ok(0);
    }
    extents
        .iter()
        .try_fold(1u64, |acc, &e| acc.checked_mul(e))
        .ok_or(Error::Overflow { what })
}

fn check_rank(what: &'static str, expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(Error::RankMismatch {
            what,
            expected,
            actual,
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Steps
// ---------------------------------------------------------------------------

/// Lazy step sequence of a [`Selection`].
pub enum Steps<'a> {
    Empty,
    Points(PointSteps<'a>),
    Regular(RegularSteps<'a>),
    Irregular(IrregularSteps<'a>),
    Custom(BoxedSteps),
}

impl Iterator for Steps<'_> {
    type Item = Step;

    fn next(&mut self) -> Option<Step> {
        match self {
            Steps::Empty => None,
            Steps::Points(it) => it.next(),
            Steps::Regular(it) => it.next(),
            Steps::Irregular(it) => it.next(),
            Steps::Custom(it) => it.next(),
        }
    }
}

impl fmt::Debug for Steps<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Steps::Empty => "Empty",
            Steps::Points(_) => "Points",
            Steps::Regular(_) => "Regular",
            Steps::Irregular(_) => "Irregular",
            Steps::Custom(_) => "Custom",
        };
        f.debug_tuple("Steps").field(&kind).finish()
    }
}

// ---------------------------------------------------------------------------
// PointSelection
// ---------------------------------------------------------------------------

/// An ordered table of absolute coordinates, one row per selected element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointSelection {
    rank: usize,
    points: Vec<Vec<u64>>,
}

impl PointSelection {
    /// Create a point selection; every row must have `rank` coordinates.
    pub fn new(rank: usize, points: Vec<Vec<u64>>) -> Result<Self> {
        for p in &points {
            check_rank("point coordinates", rank, p.len())?;
        }
        Ok(Self { rank, points })
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn points(&self) -> &[Vec<u64>] {
        &self.points
    }

    pub fn total_element_count(&self) -> u64 {
        self.points.len() as u64
    }

    pub fn steps(&self, limits: &[u64]) -> Result<PointSteps<'_>> {
        check_rank("limits", self.rank, limits.len())?;
        for p in &self.points {
            for (dimension, (&c, &limit)) in p.iter().zip(limits.iter()).enumerate() {
                if c >= limit {
                    return Err(Error::ExceedsLimits {
                        dimension,
                        stop: c.saturating_add(1),
                        limit,
                    });
                }
            }
        }
        Ok(PointSteps {
            inner: self.points.iter(),
        })
    }
}

/// Steps of a [`PointSelection`], in caller order.
pub struct PointSteps<'a> {
    inner: std::slice::Iter<'a, Vec<u64>>,
}

impl Iterator for PointSteps<'_> {
    type Item = Step;

    fn next(&mut self) -> Option<Step> {
        self.inner.next().map(|p| Step::new(p.clone(), 1))
    }
}

// ---------------------------------------------------------------------------
// RegularHyperslab
// ---------------------------------------------------------------------------

/// A regular hyperslab selection.
///
/// For each dimension:
/// - `start[d]`: first element index
/// - `stride[d]`: step between blocks (must be >= block[d] and > 0)
/// - `count[d]`: number of blocks
/// - `block[d]`: number of consecutive elements per block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegularHyperslab {
    start: Vec<u64>,
    stride: Vec<u64>,
    count: Vec<u64>,
    block: Vec<u64>,
    total: u64,
}

impl RegularHyperslab {
    pub fn new(
        rank: usize,
        start: Vec<u64>,
        stride: Vec<u64>,
        count: Vec<u64>,
        block: Vec<u64>,
    ) -> Result<Self> {
        check_rank("hyperslab start", rank, start.len())?;
        check_rank("hyperslab stride", rank, stride.len())?;
        check_rank("hyperslab count", rank, count.len())?;
        check_rank("hyperslab block", rank, block.len())?;

        for d in 0..rank {
            if stride[d] == 0 || stride[d] < block[d] {
                return Err(Error::InvalidStride {
                    dimension: d,
                    stride: stride[d],
                    block: block[d],
                });
            }
            // one past the last selected coordinate must fit in u64
            if count[d] > 0 {
                (count[d] - 1)
                    .checked_mul(stride[d])
                    .and_then(|v| v.checked_add(start[d]))
                    .and_then(|v| v.checked_add(block[d]))
                    .ok_or(Error::Overflow {
                        what: "hyperslab stop",
                    })?;
            }
        }

        // stride >= block, so each count * block is bounded by the stop above
        let extents: Vec<u64> = count.iter().zip(block.iter()).map(|(&c, &b)| c * b).collect();
        let total = if rank > 0 {
            checked_product(&extents, "hyperslab element count")?
        } else {
            0
        };

        Ok(Self {
            start,
            stride,
            count,
            block,
            total,
        })
    }

    /// A single block of shape `block` at `start`.
    pub fn contiguous(start: Vec<u64>, block: Vec<u64>) -> Result<Self> {
        let rank = start.len();
        let stride = block.iter().map(|&b| b.max(1)).collect();
        Self::new(rank, start, stride, vec![1; rank], block)
    }

    /// A single block covering the whole extent `dims`.
    pub fn all(dims: &[u64]) -> Self {
        let rank = dims.len();
        Self {
            start: vec![0; rank],
            stride: dims.iter().map(|&d| d.max(1)).collect(),
            count: vec![1; rank],
            block: dims.to_vec(),
            total: if rank > 0 { element_count(dims) } else { 0 },
        }
    }

    pub fn rank(&self) -> usize {
        self.start.len()
    }

    pub fn start(&self) -> &[u64] {
        &self.start
    }

    pub fn stride(&self) -> &[u64] {
        &self.stride
    }

    pub fn count(&self) -> &[u64] {
        &self.count
    }

    pub fn block(&self) -> &[u64] {
        &self.block
    }

    pub fn total_element_count(&self) -> u64 {
        self.total
    }

    /// One past the last selected coordinate along `dimension`.
    fn stop(&self, dimension: usize) -> u64 {
        let d = dimension;
        if self.count[d] == 0 {
            0
        } else {
            self.start[d] + (self.count[d] - 1) * self.stride[d] + self.block[d]
        }
    }

    pub fn steps(&self, limits: &[u64]) -> Result<RegularSteps<'_>> {
        let rank = self.rank();
        check_rank("limits", rank, limits.len())?;
        for (dimension, &limit) in limits.iter().enumerate() {
            let stop = self.stop(dimension);
            if stop > limit {
                return Err(Error::ExceedsLimits {
                    dimension,
                    stop,
                    limit,
                });
            }
        }

        if self.total == 0 {
            return Ok(RegularSteps {
                slab: self,
                odometer: Odometer::new(vec![0]),
                run_length: 0,
                bulk: false,
            });
        }

        let last = rank - 1;
        // touching blocks along the last axis collapse into one run
        let bulk = self.stride[last] == self.block[last];
        let mut extents: Vec<u64> = (0..last).map(|d| self.count[d] * self.block[d]).collect();
        let run_length = if bulk {
            extents.push(1);
            self.count[last] * self.block[last]
        } else {
            extents.push(self.count[last]);
            self.block[last]
        };

        Ok(RegularSteps {
            slab: self,
            odometer: Odometer::new(extents),
            run_length,
            bulk,
        })
    }
}

/// Steps of a [`RegularHyperslab`], row-major.
#[derive(Debug)]
pub struct RegularSteps<'a> {
    slab: &'a RegularHyperslab,
    odometer: Odometer,
    run_length: u64,
    bulk: bool,
}

impl Iterator for RegularSteps<'_> {
    type Item = Step;

    fn next(&mut self) -> Option<Step> {
        let position = self.odometer.current()?;
        let s = self.slab;
        let last = s.rank() - 1;

        let mut coordinates = Vec::with_capacity(s.rank());
        for (d, &p) in position.iter().enumerate().take(last) {
            coordinates.push(s.start[d] + (p / s.block[d]) * s.stride[d] + p % s.block[d]);
        }
        coordinates.push(if self.bulk {
            s.start[last]
        } else {
            s.start[last] + position[last] * s.stride[last]
        });

        self.odometer.advance();
        Some(Step::new(coordinates, self.run_length))
    }
}

// ---------------------------------------------------------------------------
// IrregularHyperslab
// ---------------------------------------------------------------------------

/// An axis-aligned block `start..end` (end exclusive) of an irregular hyperslab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HyperslabBlock {
    pub start: Vec<u64>,
    pub end: Vec<u64>,
}

impl HyperslabBlock {
    /// Number of elements in the block.
    ///
    /// Fails with `InvalidBlock` if an end precedes its start and with
    /// `Overflow` if the count does not fit in `u64`.
    pub fn element_count(&self) -> Result<u64> {
        let extents = self
            .start
            .iter()
            .zip(self.end.iter())
            .enumerate()
            .map(|(dimension, (&start, &end))| {
                end.checked_sub(start).ok_or(Error::InvalidBlock {
                    dimension,
                    start,
                    end,
                })
            })
            .collect::<Result<Vec<u64>>>()?;
        if extents.is_empty() {
            return Ok(0);
        }
        checked_product(&extents, "block element count")
    }
}

/// A list of axis-aligned blocks. Blocks may be disjoint, adjacent or
/// overlapping and are walked in list order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrregularHyperslab {
    rank: usize,
    blocks: Vec<HyperslabBlock>,
    total: u64,
}

impl IrregularHyperslab {
    /// Create from `(start, end_exclusive)` pairs.
    pub fn new(rank: usize, blocks: Vec<(Vec<u64>, Vec<u64>)>) -> Result<Self> {
        let mut checked = Vec::with_capacity(blocks.len());
        for (start, end) in blocks {
            check_rank("block start", rank, start.len())?;
            check_rank("block end", rank, end.len())?;
            for d in 0..rank {
                if end[d] < start[d] {
                    return Err(Error::InvalidBlock {
                        dimension: d,
                        start: start[d],
                        end: end[d],
                    });
                }
            }
            checked.push(HyperslabBlock { start, end });
        }

        let mut total = 0u64;
        if rank > 0 {
            for block in &checked {
                total = block
                    .element_count()?
                    .checked_add(total)
                    .ok_or(Error::Overflow {
                        what: "irregular hyperslab element count",
                    })?;
            }
        }

        Ok(Self {
            rank,
            blocks: checked,
            total,
        })
    }

    /// Create from the flat on-disk layout: per block, `rank` start
    /// coordinates followed by `rank` inclusive end coordinates.
    pub fn from_inclusive_offsets(rank: usize, offsets: &[u64]) -> Result<Self> {
        if rank == 0 || offsets.len() % (2 * rank) != 0 {
            return Err(Error::InvalidOffsets {
                len: offsets.len(),
                rank,
            });
        }
        let mut blocks = Vec::with_capacity(offsets.len() / (2 * rank));
        for b in offsets.chunks_exact(2 * rank) {
            let end = b[rank..]
                .iter()
                .map(|&e| e.checked_add(1).ok_or(Error::Overflow { what: "block end" }))
                .collect::<Result<Vec<u64>>>()?;
            blocks.push((b[..rank].to_vec(), end));
        }
        Self::new(rank, blocks)
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn blocks(&self) -> &[HyperslabBlock] {
        &self.blocks
    }

    pub fn total_element_count(&self) -> u64 {
        self.total
    }

    pub fn steps(&self, limits: &[u64]) -> Result<IrregularSteps<'_>> {
        check_rank("limits", self.rank, limits.len())?;
        for block in &self.blocks {
            for (dimension, (&end, &limit)) in block.end.iter().zip(limits.iter()).enumerate() {
                if end > limit {
                    return Err(Error::ExceedsLimits {
                        dimension,
                        stop: end,
                        limit,
                    });
                }
            }
        }
        // rank 0 or all blocks empty
        let blocks: &[HyperslabBlock] = if self.total == 0 { &[] } else { &self.blocks };
        Ok(IrregularSteps {
            blocks: blocks.iter(),
            current: None,
        })
    }
}

/// Steps of an [`IrregularHyperslab`]: each block row-major, blocks in order.
pub struct IrregularSteps<'a> {
    blocks: std::slice::Iter<'a, HyperslabBlock>,
    current: Option<(&'a HyperslabBlock, Odometer)>,
}

impl Iterator for IrregularSteps<'_> {
    type Item = Step;

    fn next(&mut self) -> Option<Step> {
        loop {
            if let Some((block, odometer)) = &mut self.current {
                if let Some(position) = odometer.current() {
                    let last = block.start.len() - 1;
                    let coordinates = block
                        .start
                        .iter()
                        .zip(position.iter())
                        .map(|(&s, &p)| s + p)
                        .collect();
                    let run = block.end[last] - block.start[last];
                    odometer.advance();
                    return Some(Step::new(coordinates, run));
                }
            }

            let block = self.blocks.next()?;
            let last = block.start.len() - 1;
            let mut extents: Vec<u64> = (0..last).map(|d| block.end[d] - block.start[d]).collect();
            extents.push(if block.end[last] > block.start[last] { 1 } else { 0 });
            self.current = Some((block, Odometer::new(extents)));
        }
    }
}

// ---------------------------------------------------------------------------
// CustomSelection
// ---------------------------------------------------------------------------

/// Step iterator produced by a [`CustomSelection`].
pub type BoxedSteps = Box<dyn Iterator<Item = Step> + Send + Sync>;

type StepFn = dyn Fn(&[u64]) -> BoxedSteps + Send + Sync;

/// A selection backed by a caller-supplied step generator.
///
/// The generator receives the walk limits and may produce steps in any
/// order; the declared total must match what it yields.
#[derive(Clone)]
pub struct CustomSelection {
    total: u64,
    walker: Arc<StepFn>,
}

impl CustomSelection {
    pub fn new<F, I>(total_element_count: u64, walker: F) -> Self
    where
        F: Fn(&[u64]) -> I + Send + Sync + 'static,
        I: IntoIterator<Item = Step>,
        I::IntoIter: Send + Sync + 'static,
    {
        Self {
            total: total_element_count,
            walker: Arc::new(move |limits: &[u64]| {
                Box::new(walker(limits).into_iter()) as BoxedSteps
            }),
        }
    }

    pub fn total_element_count(&self) -> u64 {
        self.total
    }

    pub fn steps(&self, limits: &[u64]) -> BoxedSteps {
        (self.walker)(limits)
    }
}

impl fmt::Debug for CustomSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomSelection")
            .field("total", &self.total)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(sel: &Selection, limits: &[u64]) -> Vec<(Vec<u64>, u64)> {
        sel.steps(limits)
            .unwrap()
            .map(|s| (s.coordinates, s.element_count))
            .collect()
    }

    #[test]
    fn none_selection_is_empty() {
        let sel = Selection::None;
        assert_eq!(sel.total_element_count(), 0);
        assert!(collect(&sel, &[4, 4]).is_empty());
        assert_eq!(sel.rank(), None);
    }

    #[test]
    fn hyperslab_rank_mismatch() {
        let cases: [[Vec<u64>; 4]; 4] = [
            [vec![1, 3], vec![1, 2, 3], vec![1, 2, 3], vec![1, 2, 3]],
            [vec![1, 2, 3], vec![1, 3], vec![1, 2, 3], vec![1, 2, 3]],
            [vec![1, 2, 3], vec![1, 2, 3], vec![1, 3], vec![1, 2, 3]],
            [vec![1, 2, 3], vec![1, 2, 3], vec![1, 2, 3], vec![1, 3]],
        ];
        for [start, stride, count, block] in cases {
            let err = RegularHyperslab::new(3, start, stride, count, block).unwrap_err();
            assert!(matches!(err, Error::RankMismatch { .. }), "{err}");
        }
    }

    #[test]
    fn hyperslab_invalid_stride() {
        // zero stride
        let err = RegularHyperslab::new(3, vec![1, 2, 3], vec![1, 2, 0], vec![1, 2, 3], vec![1, 2, 3])
            .unwrap_err();
        assert!(matches!(err, Error::InvalidStride { dimension: 2, .. }));

        // stride < block
        let err = RegularHyperslab::new(3, vec![1, 2, 3], vec![1, 2, 2], vec![1, 2, 3], vec![1, 2, 3])
            .unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidStride {
                dimension: 2,
                stride: 2,
                block: 3
            }
        ));
    }

    #[test]
    fn hyperslab_limits_rank_mismatch() {
        let slab =
            RegularHyperslab::new(2, vec![1, 25], vec![4, 4], vec![4, 4], vec![2, 3]).unwrap();
        let err = slab.steps(&[100, 100, 100]).unwrap_err();
        assert!(matches!(err, Error::RankMismatch { .. }));
    }

    #[test]
    fn hyperslab_exceeds_limits() {
        let slab =
            RegularHyperslab::new(2, vec![1, 25], vec![4, 4], vec![4, 4], vec![2, 3]).unwrap();

        let err = slab.steps(&[14, 40]).unwrap_err();
        assert!(matches!(
            err,
            Error::ExceedsLimits {
                dimension: 0,
                stop: 15,
                limit: 14
            }
        ));

        let err = slab.steps(&[15, 39]).unwrap_err();
        assert!(matches!(
            err,
            Error::ExceedsLimits {
                dimension: 1,
                stop: 40,
                limit: 39
            }
        ));

        assert!(slab.steps(&[15, 40]).is_ok());
    }

    #[test]
    fn hyperslab_strided_runs() {
        // every other column, two rows
        let sel: Selection =
            RegularHyperslab::new(2, vec![0, 1], vec![1, 2], vec![2, 3], vec![1, 1])
                .unwrap()
                .into();
        assert_eq!(
            collect(&sel, &[4, 8]),
            vec![
                (vec![0, 1], 1),
                (vec![0, 3], 1),
                (vec![0, 5], 1),
                (vec![1, 1], 1),
                (vec![1, 3], 1),
                (vec![1, 5], 1),
            ]
        );
    }

    #[test]
    fn hyperslab_touching_blocks_merge_on_last_axis() {
        // stride == block on the last axis -> one run per row
        let sel: Selection =
            RegularHyperslab::new(2, vec![1, 2], vec![3, 2], vec![2, 3], vec![2, 2])
                .unwrap()
                .into();
        assert_eq!(sel.total_element_count(), 24);
        assert_eq!(
            collect(&sel, &[10, 10]),
            vec![
                (vec![1, 2], 6),
                (vec![2, 2], 6),
                (vec![4, 2], 6),
                (vec![5, 2], 6),
            ]
        );
    }

    #[test]
    fn hyperslab_zero_count_or_block_yields_nothing() {
        let a = RegularHyperslab::new(2, vec![0, 1], vec![5, 5], vec![0, 2], vec![3, 2]).unwrap();
        let b = RegularHyperslab::new(2, vec![0, 1], vec![5, 5], vec![2, 2], vec![0, 2]).unwrap();
        for slab in [a, b] {
            assert_eq!(slab.total_element_count(), 0);
            assert_eq!(slab.steps(&[10, 10]).unwrap().count(), 0);
        }
    }

    #[test]
    fn hyperslab_all_and_contiguous() {
        let all = RegularHyperslab::all(&[3, 4]);
        assert_eq!(all.total_element_count(), 12);
        let steps: Vec<_> = all.steps(&[3, 4]).unwrap().collect();
        assert_eq!(steps.len(), 3);
        assert!(steps.iter().all(|s| s.element_count == 4));

        let slab = RegularHyperslab::contiguous(vec![1, 1], vec![2, 3]).unwrap();
        assert_eq!(slab.total_element_count(), 6);
        assert_eq!(slab.stride(), &[2, 3]);
        assert!(matches!(
            RegularHyperslab::contiguous(vec![1, 1], vec![2]),
            Err(Error::RankMismatch { .. })
        ));
    }

    #[test]
    fn irregular_blocks_in_list_order() {
        let slab = IrregularHyperslab::new(
            2,
            vec![(vec![4, 4], vec![5, 6]), (vec![0, 0], vec![2, 1])],
        )
        .unwrap();
        assert_eq!(slab.total_element_count(), 4);
        let sel = Selection::from(slab);
        assert_eq!(
            collect(&sel, &[8, 8]),
            vec![(vec![4, 4], 2), (vec![0, 0], 1), (vec![1, 0], 1)]
        );
    }

    #[test]
    fn irregular_from_inclusive_offsets() {
        let slab = IrregularHyperslab::from_inclusive_offsets(
            3,
            &[
                0, 0, 0, 0, 0, 2, // block 1
                0, 1, 0, 0, 1, 4, // block 2
                0, 2, 1, 0, 3, 4, // block 3
                1, 0, 0, 2, 1, 2, // block 4
            ],
        )
        .unwrap();
        assert_eq!(slab.blocks().len(), 4);
        assert_eq!(slab.total_element_count(), 3 + 5 + 8 + 12);

        assert!(matches!(
            IrregularHyperslab::from_inclusive_offsets(3, &[0, 0, 0, 1]),
            Err(Error::InvalidOffsets { len: 4, rank: 3 })
        ));
    }

    #[test]
    fn irregular_empty_block_is_skipped() {
        let slab = IrregularHyperslab::new(
            2,
            vec![(vec![1, 1], vec![1, 3]), (vec![0, 0], vec![1, 2])],
        )
        .unwrap();
        assert_eq!(slab.total_element_count(), 2);
        let sel = Selection::from(slab);
        assert_eq!(collect(&sel, &[4, 4]), vec![(vec![0, 0], 2)]);
    }

    #[test]
    fn irregular_rejects_reversed_block() {
        let err = IrregularHyperslab::new(2, vec![(vec![2, 0], vec![1, 1])]).unwrap_err();
        assert!(matches!(err, Error::InvalidBlock { dimension: 0, .. }));
    }

    #[test]
    fn hyperslab_arithmetic_overflow_is_an_error() {
        let huge = 1u64 << 32;
        let err = RegularHyperslab::new(2, vec![0, 0], vec![huge; 2], vec![huge; 2], vec![huge; 2])
            .unwrap_err();
        assert!(matches!(err, Error::Overflow { .. }), "{err}");

        // stop of the single axis lands just past u64::MAX
        let err = RegularHyperslab::new(1, vec![u64::MAX - 1], vec![1], vec![2], vec![1])
            .unwrap_err();
        assert!(matches!(err, Error::Overflow { what: "hyperslab stop" }));

        // every stop fits but the element count does not
        let err = RegularHyperslab::new(3, vec![0; 3], vec![huge; 3], vec![1; 3], vec![huge; 3])
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Overflow {
                what: "hyperslab element count"
            }
        ));

        // a zero axis keeps the total at zero however large the others are
        let slab = RegularHyperslab::new(3, vec![0; 3], vec![huge; 3], vec![1, 0, 1], vec![huge; 3])
            .unwrap();
        assert_eq!(slab.total_element_count(), 0);
    }

    #[test]
    fn irregular_arithmetic_overflow_is_an_error() {
        let huge = 1u64 << 32;
        let err = IrregularHyperslab::new(2, vec![(vec![0, 0], vec![huge, huge])]).unwrap_err();
        assert!(matches!(err, Error::Overflow { .. }));

        // each block fits, their sum does not
        let half = u64::MAX / 2 + 1;
        let err = IrregularHyperslab::new(
            2,
            vec![(vec![0, 0], vec![1, half]), (vec![0, 0], vec![1, half])],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            Error::Overflow {
                what: "irregular hyperslab element count"
            }
        ));

        let err = IrregularHyperslab::from_inclusive_offsets(1, &[0, u64::MAX]).unwrap_err();
        assert!(matches!(err, Error::Overflow { what: "block end" }));
    }

    #[test]
    fn hand_built_block_counts_are_checked() {
        let block = HyperslabBlock {
            start: vec![1, 2],
            end: vec![4, 7],
        };
        assert_eq!(block.element_count().unwrap(), 15);

        let reversed = HyperslabBlock {
            start: vec![0, 5],
            end: vec![3, 2],
        };
        assert!(matches!(
            reversed.element_count(),
            Err(Error::InvalidBlock { dimension: 1, start: 5, end: 2 })
        ));

        let huge = HyperslabBlock {
            start: vec![0, 0],
            end: vec![u64::MAX, 2],
        };
        assert!(matches!(
            huge.element_count(),
            Err(Error::Overflow { what: "block element count" })
        ));
    }

    #[test]
    fn irregular_exceeds_limits() {
        let slab = IrregularHyperslab::new(2, vec![(vec![0, 0], vec![2, 5])]).unwrap();
        assert!(matches!(
            slab.steps(&[2, 4]),
            Err(Error::ExceedsLimits { dimension: 1, .. })
        ));
    }

    #[test]
    fn points_preserve_order_and_check_bounds() {
        let pts = PointSelection::new(2, vec![vec![3, 1], vec![0, 0], vec![2, 2]]).unwrap();
        let sel = Selection::from(pts.clone());
        assert_eq!(sel.total_element_count(), 3);
        assert_eq!(sel.rank(), Some(2));
        assert_eq!(
            collect(&sel, &[4, 4]),
            vec![(vec![3, 1], 1), (vec![0, 0], 1), (vec![2, 2], 1)]
        );
        assert!(matches!(
            pts.steps(&[3, 4]),
            Err(Error::ExceedsLimits { dimension: 0, stop: 4, limit: 3 })
        ));
        assert!(matches!(
            PointSelection::new(2, vec![vec![1, 2, 3]]),
            Err(Error::RankMismatch { .. })
        ));
    }

    #[test]
    fn custom_selection_is_restartable() {
        let sel = Selection::from(CustomSelection::new(3, |_limits: &[u64]| {
            vec![Step::new(vec![0, 2], 2), Step::new(vec![5, 0], 1)]
        }));
        assert_eq!(sel.total_element_count(), 3);
        let first = collect(&sel, &[8, 8]);
        let second = collect(&sel, &[8, 8]);
        assert_eq!(first, second);
        assert_eq!(first, vec![(vec![0, 2], 2), (vec![5, 0], 1)]);
    }
}
