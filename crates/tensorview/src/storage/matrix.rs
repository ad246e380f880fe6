//! The storage object: a column-major matrix over shared data.

use std::rc::Rc;

use crate::error::TensorError;
use crate::scalar::Scalar;
use crate::storage::buffer::DenseBuffer;
use crate::storage::sparse::SparseColumns;

/// Storage class of a [`Matrix`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatrixKind {
    Dense,
    Sparse,
}

#[derive(Debug, Clone)]
enum Repr<T: Scalar> {
    /// Elements `buffer[offset .. offset + rows*cols]`, column-major.
    Dense { buffer: DenseBuffer<T>, offset: usize },
    /// Columns `first_col .. first_col + cols` of shared CSC data.
    Sparse { data: Rc<SparseColumns<T>>, first_col: usize },
}

/// A `rows x cols` column-major matrix over shared storage.
///
/// Cloning a `Matrix`, slicing its columns, or reshaping it never copies
/// elements: all results address the same underlying data.
#[derive(Debug, Clone)]
pub struct Matrix<T: Scalar> {
    repr: Repr<T>,
    rows: usize,
    cols: usize,
}

impl<T: Scalar> Matrix<T> {
    /// Zero-initialized dense matrix.
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            repr: Repr::Dense {
                buffer: DenseBuffer::zeros(rows * cols),
                offset: 0,
            },
            rows,
            cols,
        }
    }

    /// Dense matrix from column-major data.
    ///
    /// # Errors
    ///
    /// Returns `ShapeMismatch` if `data.len() != rows * cols`.
    ///
    /// # Example
    ///
    /// ```
    /// use tensorview::Matrix;
    ///
    /// let m = Matrix::from_column_major(2, 3, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
    /// assert_eq!(m.get(1, 0), 2.0);
    /// assert_eq!(m.get(0, 1), 3.0);
    /// ```
    pub fn from_column_major(rows: usize, cols: usize, data: Vec<T>) -> Result<Self, TensorError> {
        if data.len() != rows * cols {
            return Err(TensorError::ShapeMismatch {
                expected: rows * cols,
                actual: data.len(),
            });
        }
        Ok(Self {
            repr: Repr::Dense {
                buffer: DenseBuffer::from_vec(data),
                offset: 0,
            },
            rows,
            cols,
        })
    }

    /// Sparse matrix over CSC data.
    pub fn from_sparse(data: SparseColumns<T>) -> Self {
        let (rows, cols) = (data.rows(), data.cols());
        Self {
            repr: Repr::Sparse {
                data: Rc::new(data),
                first_col: 0,
            },
            rows,
            cols,
        }
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn element_count(&self) -> usize {
        self.rows * self.cols
    }

    pub fn kind(&self) -> MatrixKind {
        match self.repr {
            Repr::Dense { .. } => MatrixKind::Dense,
            Repr::Sparse { .. } => MatrixKind::Sparse,
        }
    }

    /// Columns `[first, first + count)` as a new matrix sharing this data.
    ///
    /// # Errors
    ///
    /// Returns `SliceOutOfBounds` if the range exceeds the column count.
    pub fn column_slice(&self, first: usize, count: usize) -> Result<Self, TensorError> {
        self.column_slice_with_pretend(first, count, self.cols)
    }

    /// Column slice after pretending the matrix has `pretend_cols` columns.
    ///
    /// A dense matrix of `n` elements is first viewed as
    /// `(n / pretend_cols) x pretend_cols`; with `pretend_cols == n` this
    /// slices an arbitrary element range out of a flat row vector.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `pretend_cols` does not divide the element
    /// count, `SliceOutOfBounds` for a bad range, and `Unsupported` when a
    /// sparse matrix would have to be reinterpreted.
    pub fn column_slice_with_pretend(
        &self,
        first: usize,
        count: usize,
        pretend_cols: usize,
    ) -> Result<Self, TensorError> {
        if first + count > pretend_cols {
            return Err(TensorError::SliceOutOfBounds {
                start: first,
                end: first + count,
                dim: 1,
                size: pretend_cols,
            });
        }
        match &self.repr {
            Repr::Dense { buffer, offset } => {
                let total = self.element_count();
                if pretend_cols == 0 || total % pretend_cols != 0 {
                    return Err(TensorError::invalid(format!(
                        "column_slice: {total} elements cannot be viewed as {pretend_cols} columns"
                    )));
                }
                let rows = total / pretend_cols;
                Ok(Self {
                    repr: Repr::Dense {
                        buffer: buffer.clone(),
                        offset: offset + first * rows,
                    },
                    rows,
                    cols: count,
                })
            }
            Repr::Sparse { data, first_col } => {
                if pretend_cols != self.cols {
                    return Err(TensorError::Unsupported(
                        "sparse matrices can only be column-sliced along their own columns".into(),
                    ));
                }
                Ok(Self {
                    repr: Repr::Sparse {
                        data: Rc::clone(data),
                        first_col: first_col + first,
                    },
                    rows: self.rows,
                    cols: count,
                })
            }
        }
    }

    /// Reinterpret as `rows x cols` without moving data.
    ///
    /// # Errors
    ///
    /// Returns `ShapeMismatch` on element-count mismatch and `Unsupported`
    /// for sparse matrices.
    pub fn reshape(&mut self, rows: usize, cols: usize) -> Result<(), TensorError> {
        if self.kind() == MatrixKind::Sparse {
            return Err(TensorError::Unsupported("sparse matrices cannot be reshaped".into()));
        }
        if rows * cols != self.element_count() {
            return Err(TensorError::ShapeMismatch {
                expected: self.element_count(),
                actual: rows * cols,
            });
        }
        self.rows = rows;
        self.cols = cols;
        Ok(())
    }

    /// Element at linear (column-major) position `linear`.
    ///
    /// # Panics
    ///
    /// Panics if `linear >= element_count()`.
    pub fn read(&self, linear: usize) -> T {
        assert!(
            linear < self.element_count(),
            "element {linear} out of range for a {} x {} matrix",
            self.rows,
            self.cols
        );
        match &self.repr {
            Repr::Dense { buffer, offset } => buffer.borrow()[offset + linear],
            Repr::Sparse { data, first_col } => {
                data.get(linear % self.rows, first_col + linear / self.rows)
            }
        }
    }

    /// Element at `(i, j)`.
    pub fn get(&self, i: usize, j: usize) -> T {
        self.read(i + j * self.rows)
    }

    /// Overwrite elements starting at linear position `start`.
    ///
    /// # Errors
    ///
    /// Returns `Unsupported` for sparse matrices and `SliceOutOfBounds` if
    /// the values run past the end of the matrix.
    pub fn write_from(&self, start: usize, values: &[T]) -> Result<(), TensorError> {
        let end = start + values.len();
        if end > self.element_count() {
            return Err(TensorError::SliceOutOfBounds {
                start,
                end,
                dim: 0,
                size: self.element_count(),
            });
        }
        let (buffer, offset) = self.dense_parts()?;
        buffer.borrow_mut()[offset + start..offset + end].copy_from_slice(values);
        Ok(())
    }

    /// Overwrite scattered elements `(linear, value)`.
    ///
    /// # Errors
    ///
    /// Returns `Unsupported` for sparse matrices.
    pub fn write_scattered(&self, updates: &[(usize, T)]) -> Result<(), TensorError> {
        let (buffer, offset) = self.dense_parts()?;
        let count = self.element_count();
        let mut data = buffer.borrow_mut();
        for &(linear, value) in updates {
            assert!(linear < count, "element {linear} out of range");
            data[offset + linear] = value;
        }
        Ok(())
    }

    /// Copy every element, column-major, into a new vector.
    pub fn copy_to_host(&self) -> Vec<T> {
        match &self.repr {
            Repr::Dense { buffer, offset } => {
                buffer.borrow()[*offset..offset + self.element_count()].to_vec()
            }
            Repr::Sparse { .. } => (0..self.element_count()).map(|k| self.read(k)).collect(),
        }
    }

    /// True if both matrices address the same underlying data.
    pub fn shares_buffer_with(&self, other: &Self) -> bool {
        match (&self.repr, &other.repr) {
            (Repr::Dense { buffer: a, .. }, Repr::Dense { buffer: b, .. }) => {
                a.shares_storage_with(b)
            }
            (Repr::Sparse { data: a, .. }, Repr::Sparse { data: b, .. }) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    fn dense_parts(&self) -> Result<(&DenseBuffer<T>, usize), TensorError> {
        match &self.repr {
            Repr::Dense { buffer, offset } => Ok((buffer, *offset)),
            Repr::Sparse { .. } => Err(TensorError::Unsupported(
                "sparse matrices cannot be written to".into(),
            )),
        }
    }

    /// Fail with `Unsupported` unless this matrix can be written.
    pub fn ensure_writable(&self) -> Result<(), TensorError> {
        self.dense_parts().map(|_| ())
    }
}
