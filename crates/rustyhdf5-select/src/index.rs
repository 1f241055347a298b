//! Row-major index arithmetic and N-dimensional odometer iteration.
//!
//! All helpers treat the last dimension as the fastest varying one, which is
//! the layout HDF5 uses both for chunk contents and for the chunk grid.

/// Number of elements in an array of the given shape.
///
/// A rank-0 shape has one element.
#[inline]
pub fn element_count(dims: &[u64]) -> u64 {
    dims.iter().product()
}

/// Row-major linear index of `coords` within an array of shape `dims`.
pub fn to_linear_index(coords: &[u64], dims: &[u64]) -> u64 {
    debug_assert_eq!(coords.len(), dims.len());
    let mut index = 0u64;
    for (&c, &d) in coords.iter().zip(dims.iter()) {
        index = index * d + c;
    }
    index
}

/// Inverse of [`to_linear_index`]: the coordinates of a linear index.
pub fn to_coordinates(mut index: u64, dims: &[u64]) -> Vec<u64> {
    let mut coords = vec![0u64; dims.len()];
    for d in (0..dims.len()).rev() {
        let dim = dims[d].max(1);
        coords[d] = index % dim;
        index /= dim;
    }
    coords
}

/// Shape of the chunk grid: `ceil(dims[i] / chunk_dims[i])` per dimension.
///
/// Partial edge chunks count as a whole chunk.
pub fn scaled_dims(dims: &[u64], chunk_dims: &[u64]) -> Vec<u64> {
    dims.iter()
        .zip(chunk_dims.iter())
        .map(|(&d, &c)| d.div_ceil(c.max(1)))
        .collect()
}

/// An explicit N-dimensional counter with carry.
///
/// Each digit `i` runs over `0..extents[i]`; [`Odometer::advance`] bumps the
/// last digit and carries into the previous ones, so the visiting order is
/// row-major. An odometer whose extents contain a zero visits nothing.
#[derive(Debug, Clone)]
pub struct Odometer {
    index: Vec<u64>,
    extents: Vec<u64>,
    done: bool,
}

impl Odometer {
    /// Create an odometer positioned at the origin.
    pub fn new(extents: Vec<u64>) -> Self {
        let done = extents.iter().any(|&e| e == 0);
        Self {
            index: vec![0; extents.len()],
            extents,
            done,
        }
    }

    /// The current digits, or `None` once every combination was visited.
    #[inline]
    pub fn current(&self) -> Option<&[u64]> {
        if self.done {
            None
        } else {
            Some(&self.index)
        }
    }

    /// Step to the next combination. Returns `false` when the odometer rolls
    /// over past its last combination.
    pub fn advance(&mut self) -> bool {
        if self.done {
            return false;
        }
        for d in (0..self.index.len()).rev() {
            self.index[d] += 1;
            if self.index[d] < self.extents[d] {
                return true;
            }
            self.index[d] = 0;
        }
        // every digit carried (or rank 0): exhausted
        self.done = true;
        false
    }

    /// Rewind to the origin.
    pub fn reset(&mut self) {
        self.index.iter_mut().for_each(|i| *i = 0);
        self.done = self.extents.iter().any(|&e| e == 0);
    }

    /// Total number of combinations this odometer visits.
    pub fn len(&self) -> u64 {
        element_count(&self.extents)
    }

    /// Whether the odometer visits no combination at all.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
