//! Compressed sparse column data.

use crate::error::TensorError;
use crate::scalar::Scalar;

/// Read-only compressed-sparse-column (CSC) matrix data.
///
/// Column `j` holds the entries `values[col_ptr[j]..col_ptr[j+1]]` at the
/// rows `row_idx[...]`, with row indices strictly increasing per column.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseColumns<T: Scalar> {
    rows: usize,
    col_ptr: Vec<usize>,
    row_idx: Vec<usize>,
    values: Vec<T>,
}

impl<T: Scalar> SparseColumns<T> {
    /// Build from `(row, col, value)` triplets.
    ///
    /// Duplicate coordinates are summed.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if a coordinate is outside `rows x cols`.
    pub fn from_triplets(
        rows: usize,
        cols: usize,
        triplets: &[(usize, usize, T)],
    ) -> Result<Self, TensorError> {
        let mut sorted = triplets.to_vec();
        for &(i, j, _) in &sorted {
            if i >= rows || j >= cols {
                return Err(TensorError::invalid(format!(
                    "sparse entry ({i}, {j}) outside a {rows} x {cols} matrix"
                )));
            }
        }
        sorted.sort_by_key(|&(i, j, _)| (j, i));

        let mut col_ptr = vec![0; cols + 1];
        let mut row_idx: Vec<usize> = Vec::with_capacity(sorted.len());
        let mut values: Vec<T> = Vec::with_capacity(sorted.len());
        let mut last: Option<(usize, usize)> = None;
        for (i, j, v) in sorted {
            if last == Some((i, j)) {
                if let Some(prev) = values.last_mut() {
                    *prev = *prev + v;
                }
                continue;
            }
            row_idx.push(i);
            values.push(v);
            col_ptr[j + 1] += 1;
            last = Some((i, j));
        }
        for j in 0..cols {
            col_ptr[j + 1] += col_ptr[j];
        }

        Ok(Self {
            rows,
            col_ptr,
            row_idx,
            values,
        })
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.col_ptr.len() - 1
    }

    /// Number of stored (structurally non-zero) entries.
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Value at `(i, j)`, zero when not stored.
    pub fn get(&self, i: usize, j: usize) -> T {
        let range = self.col_ptr[j]..self.col_ptr[j + 1];
        match self.row_idx[range.clone()].binary_search(&i) {
            Ok(pos) => self.values[range.start + pos],
            Err(_) => T::zero(),
        }
    }
}
