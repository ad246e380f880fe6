//! Tensor to matrix bridge and the generalized matrix product.
//!
//! A matrix product over tensors of arbitrary rank flattens each operand to
//! two axis groups around the reduction boundary:
//!
//! ```text
//! A: [ m1 .. mi | k1 .. kr ]  -> [M x K]
//! B: [ k1 .. kr | n1 .. nj ]  -> [K x N]
//! C: [ m1 .. mi | n1 .. nj ]  -> [M x N]
//! ```
//!
//! with `r = (rank(A) + rank(B) - rank(C)) / 2` reduced axes.

use std::rc::Rc;

use crate::backend::multiply_and_weighted_add;
use crate::error::TensorError;
use crate::scalar::Scalar;
use crate::shape::TensorShape;
use crate::storage::{Matrix, MatrixKind};
use crate::view::TensorView;

fn tick(transposed: bool) -> &'static str {
    if transposed { "'" } else { "" }
}

fn product_format(
    a: &TensorShape,
    transpose_a: bool,
    b: &TensorShape,
    transpose_b: bool,
    c: &TensorShape,
    transpose_c: bool,
) -> String {
    format!(
        "{a}{} * {b}{} -> {c}{}",
        tick(transpose_a),
        tick(transpose_b),
        tick(transpose_c)
    )
}

// a transposed operand has its axis groups swapped
fn flatten_to_matrix(
    shape: &mut TensorShape,
    transposed: bool,
    split: usize,
) -> Result<(), TensorError> {
    let split = if transposed { shape.rank() - split } else { split };
    shape.flatten_to_2d_in_place(split, "do_matrix_product_of")
}

impl<T: Scalar> TensorView<T> {
    /// Reinterpret a view of rank at most 2 as a matrix.
    ///
    /// Returns the storage object itself when the view already matches its
    /// `rows x cols` exactly. Otherwise dense storage is sliced and reshaped
    /// over the same data, and sparse storage is column-sliced.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` for rank > 2, for a view that is not contiguous in
    ///   column-major order, and for a sparse view whose offset or size is not
    ///   a multiple of the storage row count.
    /// - `Unsupported` when a sparse view would need reshaping.
    ///
    /// # Example
    ///
    /// ```
    /// use tensorview::{TensorShape, TensorView};
    ///
    /// let t = TensorView::from_vec((0..12).map(f64::from).collect(), &[3, 4]).unwrap();
    /// // elements 6..12, seen as a [2 x 3] matrix
    /// let v = t.reviewed(TensorShape::from_parts(&[2, 3], &[1, 2], 6).unwrap());
    /// let m = v.as_matrix().unwrap();
    /// assert_eq!((m.rows(), m.cols()), (2, 3));
    /// assert_eq!(m.get(0, 1), 8.0);
    /// ```
    pub fn as_matrix(&self) -> Result<Rc<Matrix<T>>, TensorError> {
        let shape = self.shape();
        let rank = shape.rank();
        if rank > 2 {
            return Err(TensorError::invalid(format!(
                "as_matrix: the {shape} tensor has too many axes to be interpreted as a matrix (max 2)"
            )));
        }
        let (rows, cols) = (shape.dim_or_one(0), shape.dim_or_one(1));
        if rank > 0 && shape.strides()[0] != 1 && rows != 1 {
            return Err(TensorError::invalid(format!(
                "as_matrix: flattened {shape} matrix is not dense (it has a stride)"
            )));
        }
        if rank == 2 && cols > 1 && shape.strides()[1] != rows as isize {
            return Err(TensorError::invalid(format!(
                "as_matrix: columns of the {shape} matrix are not adjacent in memory (column stride {})",
                shape.strides()[1]
            )));
        }

        let sob = self.sob();
        let view_elements = rows * cols;
        let needs_slicing = view_elements != sob.element_count();
        let needs_reshaping = rows != sob.rows() || cols != sob.cols();
        if !needs_slicing && !needs_reshaping {
            tracing::debug!(%shape, "as_matrix: passing storage object unmodified");
            return Ok(Rc::clone(sob));
        }

        let matrix = match sob.kind() {
            MatrixKind::Sparse => {
                // column slicing keeps the row count; anything else is a reshape
                if rows != sob.rows() {
                    return Err(TensorError::Unsupported(format!(
                        "as_matrix: sparse tensors can only be column-sliced, {shape} would need a reshape of a {} x {} storage object",
                        sob.rows(),
                        sob.cols()
                    )));
                }
                let sob_rows = sob.rows();
                let offset = shape.offset();
                if sob_rows == 0 || offset % sob_rows != 0 || view_elements % sob_rows != 0 {
                    return Err(TensorError::invalid(format!(
                        "as_matrix: flattened {shape} matrix has an offset or width that is not a multiple of the storage object's row dimension"
                    )));
                }
                sob.column_slice(offset / sob_rows, view_elements / sob_rows)?
            }
            MatrixKind::Dense => {
                let mut slice = sob.column_slice_with_pretend(
                    shape.offset(),
                    view_elements,
                    sob.element_count(),
                )?;
                slice.reshape(rows, cols)?;
                slice
            }
        };
        tracing::debug!(%shape, rows, cols, "as_matrix: sliced storage object");
        Ok(Rc::new(matrix))
    }

    /// `self = beta * self + alpha * op(a) * op(b)` over tensors.
    ///
    /// `op` transposes an operand when its flag is set. A rank-1 `a` is a row
    /// vector: its flag is replaced by whether `b` has any axes. A transposed
    /// output is computed as `(op(b)' * op(a)')`.
    ///
    /// # Errors
    ///
    /// Returns `MatrixProduct` when the ranks do not leave an even number of
    /// reduced axes, or the flattened extents do not chain; `InvalidArgument`
    /// when an axis group is not contiguous in memory.
    pub fn do_matrix_product_of(
        &self,
        beta: T,
        transpose_c: bool,
        a: &TensorView<T>,
        transpose_a: bool,
        b: &TensorView<T>,
        transpose_b: bool,
        alpha: T,
    ) -> Result<(), TensorError> {
        let mut shape_a = a.shape().clone();
        let mut shape_b = b.shape().clone();
        let mut shape_c = self.shape().clone();
        let transpose_a = if shape_a.rank() == 1 { shape_b.rank() > 0 } else { transpose_a };

        let format = |sa: &TensorShape, sb: &TensorShape, sc: &TensorShape| {
            product_format(sa, transpose_a, sb, transpose_b, sc, transpose_c)
        };
        if shape_a.rank() + shape_b.rank() < shape_c.rank() {
            return Err(TensorError::MatrixProduct {
                message: "ranks don't match, output must have a non-reduced output dimension",
                format: format(&shape_a, &shape_b, &shape_c),
            });
        }
        let removed = shape_a.rank() + shape_b.rank() - shape_c.rank();
        let num_reduced = removed / 2;
        if num_reduced * 2 != removed
            || num_reduced > shape_a.rank()
            || num_reduced > shape_b.rank()
        {
            return Err(TensorError::MatrixProduct {
                message: "ranks mismatch",
                format: format(&shape_a, &shape_b, &shape_c),
            });
        }
        let first_reduced = shape_a.rank() - num_reduced;

        flatten_to_matrix(&mut shape_a, transpose_a, first_reduced)?;
        flatten_to_matrix(&mut shape_b, transpose_b, num_reduced)?;
        flatten_to_matrix(&mut shape_c, transpose_c, first_reduced)?;

        // [row, col] of each operand, swapped when transposed
        let (ta, tb, tc) = (transpose_a as usize, transpose_b as usize, transpose_c as usize);
        let (da, db, dc) = (shape_a.dims(), shape_b.dims(), shape_c.dims());
        if da[ta] != dc[tc] || db[1 - tb] != dc[1 - tc] || da[1 - ta] != db[tb] {
            return Err(TensorError::MatrixProduct {
                message: "flattened tensor dimensions mismatch",
                format: format(&shape_a, &shape_b, &shape_c),
            });
        }

        let ma = a.reviewed(shape_a).as_matrix()?;
        let mb = b.reviewed(shape_b).as_matrix()?;
        let mc = self.reviewed(shape_c).as_matrix()?;
        if !transpose_c {
            multiply_and_weighted_add(alpha, &ma, transpose_a, &mb, transpose_b, beta, &mc)
        } else {
            // C' = A * B  <=>  C = B' * A'
            multiply_and_weighted_add(alpha, &mb, !transpose_b, &ma, !transpose_a, beta, &mc)
        }
    }

    /// `self = op(a) * op(b)`.
    pub fn assign_matrix_product_of(
        &self,
        transpose_c: bool,
        a: &TensorView<T>,
        transpose_a: bool,
        b: &TensorView<T>,
        transpose_b: bool,
    ) -> Result<(), TensorError> {
        self.do_matrix_product_of(T::zero(), transpose_c, a, transpose_a, b, transpose_b, T::one())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SparseColumns;

    fn iota(dims: &[usize]) -> TensorView<f64> {
        let n: usize = dims.iter().product();
        TensorView::from_vec((0..n).map(|x| x as f64).collect(), dims).unwrap()
    }

    #[test]
    fn test_as_matrix_passes_storage_through() {
        let t = iota(&[3, 4]);
        let m = t.as_matrix().unwrap();
        assert!(Rc::ptr_eq(&m, t.sob()));
    }

    #[test]
    fn test_as_matrix_reshapes_dense() {
        let t = iota(&[3, 4]);
        let v = t.reshaped(&[6, 2]).unwrap();
        let m = v.as_matrix().unwrap();
        assert!(!Rc::ptr_eq(&m, t.sob()));
        assert_eq!((m.rows(), m.cols()), (6, 2));
        assert_eq!(m.get(5, 1), 11.0);
        assert!(m.shares_buffer_with(t.sob()));
    }

    #[test]
    fn test_as_matrix_rank_and_stride_errors() {
        assert!(iota(&[2, 2, 2]).as_matrix().is_err());
        let t = iota(&[4, 4]);
        let rows = t.reviewed(TensorShape::from_parts(&[2, 4], &[2, 4], 0).unwrap());
        assert!(rows.as_matrix().is_err());
        let gap = t.reviewed(TensorShape::from_parts(&[2, 2], &[1, 4], 0).unwrap());
        assert!(gap.as_matrix().is_err());
    }

    #[test]
    fn test_as_matrix_sparse() {
        let data = SparseColumns::from_triplets(2, 4, &[(0, 1, 1.0), (1, 3, 2.0)]).unwrap();
        let t = TensorView::from_matrix(Matrix::from_sparse(data));

        let cols = t.reviewed(TensorShape::from_parts(&[2, 2], &[1, 2], 4).unwrap());
        let m = cols.as_matrix().unwrap();
        assert_eq!(m.copy_to_host(), vec![0.0, 0.0, 0.0, 2.0]);

        let flat = t.reshaped(&[8]).unwrap();
        let err = flat.as_matrix().unwrap_err();
        assert!(matches!(err, TensorError::Unsupported(_)));

        let misaligned = t.reviewed(TensorShape::from_parts(&[2, 1], &[1, 2], 1).unwrap());
        assert!(matches!(misaligned.as_matrix(), Err(TensorError::InvalidArgument(_))));
    }

    #[test]
    fn test_matrix_product_plain() {
        let a = TensorView::from_vec(vec![1.0, 2.0, 3.0, 4.0], &[2, 2]).unwrap();
        let b = TensorView::from_vec(vec![5.0, 6.0, 7.0, 8.0], &[2, 2]).unwrap();
        let c = TensorView::zeros(&[2, 2]);
        c.assign_matrix_product_of(false, &a, false, &b, false).unwrap();
        assert_eq!(c.to_vec(), vec![23.0, 34.0, 31.0, 46.0]);
    }

    #[test]
    fn test_matrix_product_row_vector() {
        // [3] * [3 x 2] -> [2]
        let a = TensorView::from_vec(vec![1.0, 1.0, 1.0], &[3]).unwrap();
        let b = iota(&[3, 2]);
        let c = TensorView::zeros(&[2]);
        c.assign_matrix_product_of(false, &a, false, &b, false).unwrap();
        assert_eq!(c.to_vec(), vec![3.0, 12.0]);
    }

    #[test]
    fn test_matrix_product_odd_rank_difference() {
        let a = iota(&[2, 3]);
        let b = iota(&[3, 2]);
        let c: TensorView<f64> = TensorView::zeros(&[2, 2, 1]);
        let err = c.assign_matrix_product_of(false, &a, false, &b, false).unwrap_err();
        assert!(matches!(err, TensorError::MatrixProduct { .. }));
        assert!(err.to_string().contains("[2 x 3] * [3 x 2] -> [2 x 2 x 1]"));
    }

    #[test]
    fn test_matrix_product_dimension_mismatch() {
        let a = iota(&[2, 3]);
        let b = iota(&[2, 2]);
        let c: TensorView<f64> = TensorView::zeros(&[2, 2]);
        let err = c.assign_matrix_product_of(false, &a, false, &b, false).unwrap_err();
        assert!(err.to_string().contains("mismatch"));
    }
}
