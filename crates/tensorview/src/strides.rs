//! Stride computation utilities.
//!
//! Uses column-major (Fortran) order: axis 0 is the fastest-varying axis,
//! matching faer and the storage object's `rows x cols` layout.

use smallvec::SmallVec;

/// Per-axis extents.
pub type Dims = SmallVec<[usize; 8]>;

/// Per-axis signed element strides.
pub type Strides = SmallVec<[isize; 8]>;

/// Compute column-major strides from shape.
///
/// For shape [d0, d1, d2, ...], returns strides [1, d0, d0*d1, ...].
///
/// # Examples
///
/// ```
/// use tensorview::strides::compute_strides;
///
/// assert_eq!(compute_strides(&[3, 4, 5]).as_slice(), &[1, 3, 12]);
/// assert_eq!(compute_strides(&[5]).as_slice(), &[1]);
/// assert!(compute_strides(&[]).is_empty());
/// ```
pub fn compute_strides(shape: &[usize]) -> Strides {
    let mut strides = Strides::with_capacity(shape.len());
    let mut stride: isize = 1;

    for &dim in shape.iter() {
        strides.push(stride);
        stride *= dim as isize;
    }

    strides
}

/// Convert cartesian indices to a signed storage offset.
///
/// The result is relative to the shape's base offset and may be negative
/// for views with reversed axes.
#[inline]
pub fn cartesian_to_linear(indices: &[usize], strides: &[isize]) -> isize {
    indices
        .iter()
        .zip(strides.iter())
        .map(|(&idx, &stride)| idx as isize * stride)
        .sum()
}

/// Convert linear index to cartesian indices using column-major order.
pub fn linear_to_cartesian(mut linear: usize, shape: &[usize]) -> Vec<usize> {
    let mut indices = Vec::with_capacity(shape.len());

    for &dim in shape.iter() {
        indices.push(linear % dim);
        linear /= dim;
    }

    indices
}

/// Column-major odometer over a set of extents.
///
/// Alongside the multi-index it tracks one running offset per stride set,
/// so kernels can walk several operands in lock-step without recomputing
/// dot products. A rank-0 odometer yields exactly one position.
#[derive(Debug, Clone)]
pub struct MultiIndex<'a> {
    dims: &'a [usize],
    strides: &'a [&'a [isize]],
    index: Dims,
    offsets: SmallVec<[isize; 5]>,
    remaining: usize,
}

impl<'a> MultiIndex<'a> {
    /// Start at the all-zero index with the given base offsets.
    ///
    /// `strides[i]` must have one entry per axis of `dims`.
    pub fn new(dims: &'a [usize], strides: &'a [&'a [isize]], base: &[isize]) -> Self {
        debug_assert_eq!(strides.len(), base.len());
        debug_assert!(strides.iter().all(|s| s.len() == dims.len()));
        Self {
            dims,
            strides,
            index: smallvec::smallvec![0; dims.len()],
            offsets: base.iter().copied().collect(),
            remaining: dims.iter().product(),
        }
    }

    /// Current running offsets, one per stride set.
    #[inline]
    pub fn offsets(&self) -> &[isize] {
        &self.offsets
    }

    /// Number of positions not yet visited, including the current one.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.remaining
    }

    /// Advance to the next position. Returns `false` once exhausted.
    pub fn advance(&mut self) -> bool {
        if self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        if self.remaining == 0 {
            return false;
        }
        for k in 0..self.dims.len() {
            self.index[k] += 1;
            for (off, s) in self.offsets.iter_mut().zip(self.strides.iter()) {
                *off += s[k];
            }
            if self.index[k] < self.dims[k] {
                return true;
            }
            // carry
            let steps = self.index[k] as isize;
            for (off, s) in self.offsets.iter_mut().zip(self.strides.iter()) {
                *off -= steps * s[k];
            }
            self.index[k] = 0;
        }
        true
    }
}
