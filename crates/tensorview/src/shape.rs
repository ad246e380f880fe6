//! Tensor shape: extents, signed strides and an element offset.
//!
//! A shape describes how a view indexes its storage object. Strides are in
//! elements, may be zero (broadcast) or negative (reversed axis), and the
//! default layout is column-major.

use std::fmt;

use crate::error::TensorError;
use crate::strides::{Dims, Strides, compute_strides};

/// Extents, strides and offset of a tensor view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorShape {
    dims: Dims,
    strides: Strides,
    offset: usize,
}

impl TensorShape {
    /// Dense column-major shape with offset 0.
    ///
    /// # Example
    ///
    /// ```
    /// use tensorview::TensorShape;
    ///
    /// let s = TensorShape::new(&[3, 4]);
    /// assert_eq!(s.strides(), &[1, 3]);
    /// assert_eq!(s.num_elements(), 12);
    /// assert!(s.is_dense());
    /// ```
    pub fn new(dims: &[usize]) -> Self {
        Self {
            dims: dims.iter().copied().collect(),
            strides: compute_strides(dims),
            offset: 0,
        }
    }

    /// Rank-0 shape addressing a single element.
    pub fn scalar() -> Self {
        Self::new(&[])
    }

    /// Shape with explicit strides and offset.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `dims` and `strides` differ in length.
    pub fn from_parts(
        dims: &[usize],
        strides: &[isize],
        offset: usize,
    ) -> Result<Self, TensorError> {
        if dims.len() != strides.len() {
            return Err(TensorError::invalid(format!(
                "shape has {} dimensions but {} strides",
                dims.len(),
                strides.len()
            )));
        }
        Ok(Self {
            dims: dims.iter().copied().collect(),
            strides: strides.iter().copied().collect(),
            offset,
        })
    }

    #[inline]
    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    #[inline]
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    #[inline]
    pub fn strides(&self) -> &[isize] {
        &self.strides
    }

    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Extent of axis `k`, or 1 beyond the rank (implicit trailing unit axes).
    #[inline]
    pub fn dim_or_one(&self, k: usize) -> usize {
        self.dims.get(k).copied().unwrap_or(1)
    }

    /// Number of addressed elements (1 for a scalar).
    pub fn num_elements(&self) -> usize {
        self.dims.iter().product()
    }

    /// Half-open range `[begin, end)` of storage elements this shape touches.
    ///
    /// An empty shape (some extent 0) yields `(offset, offset)`.
    pub fn location_range(&self) -> (isize, isize) {
        let mut begin = self.offset as isize;
        let mut end = self.offset as isize + 1;
        for (&dim, &stride) in self.dims.iter().zip(self.strides.iter()) {
            if dim == 0 {
                return (self.offset as isize, self.offset as isize);
            }
            let span = (dim as isize - 1) * stride;
            if span < 0 {
                begin += span;
            } else {
                end += span;
            }
        }
        (begin, end)
    }

    /// True if the elements, in natural order, cover a contiguous storage
    /// range without gaps or overlap.
    pub fn is_dense(&self) -> bool {
        let mut expected: isize = 1;
        for (&dim, &stride) in self.dims.iter().zip(self.strides.iter()) {
            if dim != 1 && stride != expected {
                return false;
            }
            expected *= dim as isize;
        }
        true
    }

    /// Pad with trailing unit axes up to `rank`.
    pub fn pad_rank_in_place(&mut self, rank: usize) {
        while self.dims.len() < rank {
            let next = match (self.dims.last(), self.strides.last()) {
                (Some(&d), Some(&s)) => s * d as isize,
                _ => 1,
            };
            self.dims.push(1);
            self.strides.push(next);
        }
    }

    /// Whether axes `k-1` and `k` can be merged into one.
    ///
    /// A unit axis never constrains the merge; otherwise axis `k` must start
    /// exactly where axis `k-1` ends.
    pub fn can_flatten(&self, k: usize) -> bool {
        assert!(k > 0 && k < self.rank(), "can_flatten: axis {k} out of range");
        if self.dims[k] == 1 || self.dims[k - 1] == 1 {
            return true;
        }
        self.strides[k] == self.strides[k - 1] * self.dims[k - 1] as isize
    }

    /// Merge axis `k-1` into axis `k`, leaving a unit axis at `k-1`.
    ///
    /// Merging to the right lets a left-to-right scan chain several merges.
    /// Callers drop the leftover unit axes afterwards.
    pub fn flatten_in_place(&mut self, k: usize) {
        debug_assert!(self.can_flatten(k));
        if self.dims[k - 1] != 1 {
            self.strides[k] = self.strides[k - 1];
        }
        self.dims[k] *= self.dims[k - 1];
        self.dims[k - 1] = 1;
    }

    /// Remove every axis whose `mask` entry is true.
    pub fn drop_dims_in_place(&mut self, mask: &[bool]) {
        debug_assert_eq!(mask.len(), self.rank());
        let mut k = 0;
        self.dims.retain(|_| {
            k += 1;
            !mask[k - 1]
        });
        let mut k = 0;
        self.strides.retain(|_| {
            k += 1;
            !mask[k - 1]
        });
    }

    /// Copy with every masked axis removed.
    pub fn drop_dims(&self, mask: &[bool]) -> Self {
        let mut shape = self.clone();
        shape.drop_dims_in_place(mask);
        shape
    }

    /// Set the stride of axis `k`.
    pub(crate) fn set_stride(&mut self, k: usize, stride: isize) {
        self.strides[k] = stride;
    }

    /// Restrict axis `axis` to `[begin, end)`.
    ///
    /// # Errors
    ///
    /// Returns `SliceOutOfBounds` if the range exceeds the axis.
    pub fn narrow_to(&mut self, axis: usize, begin: usize, end: usize) -> Result<(), TensorError> {
        let size = self.dims.get(axis).copied().ok_or_else(|| {
            TensorError::invalid(format!("narrow_to: axis {axis} out of range for {self}"))
        })?;
        if begin > end || end > size {
            return Err(TensorError::SliceOutOfBounds {
                start: begin,
                end,
                dim: axis,
                size,
            });
        }
        let shift = begin as isize * self.strides[axis];
        self.offset = (self.offset as isize + shift) as usize;
        self.dims[axis] = end - begin;
        Ok(())
    }

    /// Copy narrowed along `axis` to `[begin, end)`.
    pub fn narrowed(&self, axis: usize, begin: usize, end: usize) -> Result<Self, TensorError> {
        let mut shape = self.clone();
        shape.narrow_to(axis, begin, end)?;
        Ok(shape)
    }

    /// Flatten to rank 2: axes `[0, split)` become rows, `[split, rank)` columns.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` (prefixed with `context`) if either axis
    /// group is not contiguous in memory.
    pub fn flatten_to_2d_in_place(
        &mut self,
        split: usize,
        context: &str,
    ) -> Result<(), TensorError> {
        let rank = self.rank();
        if split > rank {
            return Err(TensorError::invalid(format!(
                "{context}: split point {split} exceeds rank of {self}"
            )));
        }
        for k in (1..split).chain(split + 1..rank) {
            if !self.can_flatten(k) {
                return Err(TensorError::invalid(format!(
                    "{context}: {self} cannot be flattened to a matrix at axis {split}, axes are not contiguous in memory"
                )));
            }
        }
        let rows: usize = self.dims[..split].iter().product();
        let cols: usize = self.dims[split..].iter().product();
        let row_stride = group_stride(&self.dims[..split], &self.strides[..split]).unwrap_or(1);
        let col_stride = group_stride(&self.dims[split..], &self.strides[split..])
            .unwrap_or(row_stride * rows as isize);
        self.dims = smallvec::smallvec![rows, cols];
        self.strides = smallvec::smallvec![row_stride, col_stride];
        Ok(())
    }

    /// Dense shape with new extents and the same offset.
    ///
    /// # Errors
    ///
    /// Returns an error if this shape is not dense or the element counts differ.
    pub fn reshaped(&self, dims: &[usize]) -> Result<Self, TensorError> {
        if !self.is_dense() {
            return Err(TensorError::invalid(format!(
                "cannot reshape {self}: it is not dense in memory"
            )));
        }
        let new_len: usize = dims.iter().product();
        if new_len != self.num_elements() {
            return Err(TensorError::ShapeMismatch {
                expected: self.num_elements(),
                actual: new_len,
            });
        }
        let mut shape = Self::new(dims);
        shape.offset = self.offset;
        Ok(shape)
    }
}

// stride of the first non-unit axis in a flattenable group
fn group_stride(dims: &[usize], strides: &[isize]) -> Option<isize> {
    dims.iter()
        .zip(strides.iter())
        .find(|(d, _)| **d != 1)
        .map(|(_, s)| *s)
        .or_else(|| strides.first().copied())
}

impl fmt::Display for TensorShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (k, d) in self.dims.iter().enumerate() {
            if k > 0 {
                write!(f, " x ")?;
            }
            write!(f, "{d}")?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(TensorShape::new(&[3, 4, 5]).to_string(), "[3 x 4 x 5]");
        assert_eq!(TensorShape::scalar().to_string(), "[]");
    }

    #[test]
    fn test_scalar() {
        let s = TensorShape::scalar();
        assert_eq!(s.rank(), 0);
        assert_eq!(s.num_elements(), 1);
        assert_eq!(s.location_range(), (0, 1));
        assert!(s.is_dense());
    }

    #[test]
    fn test_from_parts_length_mismatch() {
        assert!(TensorShape::from_parts(&[2, 3], &[1], 0).is_err());
    }

    #[test]
    fn test_location_range_reversed() {
        // 3 elements walking backwards from offset 4
        let s = TensorShape::from_parts(&[3], &[-2], 4).unwrap();
        assert_eq!(s.location_range(), (0, 5));
    }

    #[test]
    fn test_is_dense() {
        assert!(TensorShape::new(&[2, 3]).is_dense());
        assert!(TensorShape::from_parts(&[2, 1, 3], &[1, 99, 2], 5).unwrap().is_dense());
        assert!(!TensorShape::from_parts(&[2, 3], &[1, 3], 0).unwrap().is_dense());
        assert!(!TensorShape::from_parts(&[2, 3], &[3, 1], 0).unwrap().is_dense());
    }

    #[test]
    fn test_pad_rank() {
        let mut s = TensorShape::new(&[3]);
        s.pad_rank_in_place(3);
        assert_eq!(s.dims(), &[3, 1, 1]);
        assert_eq!(s.strides(), &[1, 3, 3]);

        let mut scalar = TensorShape::scalar();
        scalar.pad_rank_in_place(1);
        assert_eq!(scalar.dims(), &[1]);
        assert_eq!(scalar.strides(), &[1]);
    }

    #[test]
    fn test_flatten_merges_right() {
        let mut s = TensorShape::new(&[2, 3, 4]);
        assert!(s.can_flatten(1));
        s.flatten_in_place(1);
        assert_eq!(s.dims(), &[1, 6, 4]);
        assert_eq!(s.strides(), &[1, 1, 6]);
        s.flatten_in_place(2);
        assert_eq!(s.dims(), &[1, 1, 24]);
        assert_eq!(s.strides()[2], 1);
    }

    #[test]
    fn test_flatten_keeps_stride_of_non_unit_axis() {
        // leading unit axis with an unrelated stride must not clobber axis 1
        let mut s = TensorShape::from_parts(&[1, 4], &[7, 5], 0).unwrap();
        assert!(s.can_flatten(1));
        s.flatten_in_place(1);
        assert_eq!(s.dims(), &[1, 4]);
        assert_eq!(s.strides()[1], 5);
    }

    #[test]
    fn test_cannot_flatten_gap() {
        let s = TensorShape::from_parts(&[2, 3], &[1, 4], 0).unwrap();
        assert!(!s.can_flatten(1));
    }

    #[test]
    fn test_drop_dims() {
        let s = TensorShape::new(&[1, 3, 1, 4]);
        let d = s.drop_dims(&[true, false, true, false]);
        assert_eq!(d.dims(), &[3, 4]);
        assert_eq!(d.strides(), &[1, 3]);
    }

    #[test]
    fn test_narrow_to() {
        let s = TensorShape::new(&[4, 6]);
        let n = s.narrowed(1, 2, 5).unwrap();
        assert_eq!(n.dims(), &[4, 3]);
        assert_eq!(n.offset(), 8);
        assert!(s.narrowed(1, 4, 7).is_err());
        assert!(s.narrowed(2, 0, 1).is_err());
    }

    #[test]
    fn test_flatten_to_2d() {
        let mut s = TensorShape::new(&[2, 3, 4]);
        s.flatten_to_2d_in_place(2, "test").unwrap();
        assert_eq!(s.dims(), &[6, 4]);
        assert_eq!(s.strides(), &[1, 6]);

        let mut v = TensorShape::new(&[5]);
        v.flatten_to_2d_in_place(0, "test").unwrap();
        assert_eq!(v.dims(), &[1, 5]);
        assert_eq!(v.strides(), &[1, 1]);

        let mut w = TensorShape::new(&[5]);
        w.flatten_to_2d_in_place(1, "test").unwrap();
        assert_eq!(w.dims(), &[5, 1]);
        assert_eq!(w.strides(), &[1, 5]);
    }

    #[test]
    fn test_flatten_to_2d_rejects_gaps() {
        let mut s = TensorShape::from_parts(&[2, 3, 4], &[1, 3, 6], 0).unwrap();
        let err = s.flatten_to_2d_in_place(2, "DoMatrixProductOf").unwrap_err();
        assert!(err.to_string().contains("DoMatrixProductOf"));
    }

    #[test]
    fn test_reshaped() {
        let s = TensorShape::from_parts(&[2, 3], &[1, 2], 4).unwrap();
        let r = s.reshaped(&[3, 2]).unwrap();
        assert_eq!(r.dims(), &[3, 2]);
        assert_eq!(r.offset(), 4);
        assert!(s.reshaped(&[5]).is_err());
        let gap = TensorShape::from_parts(&[2, 3], &[1, 3], 0).unwrap();
        assert!(gap.reshaped(&[6]).is_err());
    }
}
