//! Conversion between storage objects and faer matrices, and the GEMM kernel.
//!
//! Storage objects and faer both use column-major order. A `Matrix` may be
//! sparse or live behind a shared buffer, so the conversions here copy;
//! the product itself runs on faer's `matmul`.

use faer::linalg::matmul::matmul;
use faer::{Accum, Mat, MatRef, Par};

use crate::error::TensorError;
use crate::scalar::Scalar;
use crate::storage::Matrix;

/// Create an owned faer Mat from a storage object (copies data).
///
/// Sparse storage is densified.
///
/// # Example
///
/// ```
/// use tensorview::Matrix;
/// use tensorview::backend::faer_mat_from_matrix;
///
/// let m = Matrix::from_column_major(2, 3, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
/// let mat = faer_mat_from_matrix(&m);
/// assert_eq!(mat.nrows(), 2);
/// assert_eq!(mat[(1, 2)], 6.0);
/// ```
pub fn faer_mat_from_matrix<T: Scalar>(m: &Matrix<T>) -> Mat<T> {
    let data = m.copy_to_host();
    MatRef::from_column_major_slice(&data, m.rows(), m.cols()).to_owned()
}

/// `C = beta * C + alpha * op(A) * op(B)` where `op` optionally transposes.
///
/// `C` is overwritten only after the product is complete, so it may share
/// storage with `A` or `B`. With `beta == 0` the previous contents of `C`
/// are never read.
///
/// # Errors
///
/// Returns `ShapeMismatch` if the operand dimensions do not chain, and
/// `Unsupported` if `C` is sparse.
///
/// # Example
///
/// ```
/// use tensorview::Matrix;
/// use tensorview::backend::multiply_and_weighted_add;
///
/// let a = Matrix::from_column_major(2, 2, vec![1.0, 0.0, 0.0, 2.0]).unwrap();
/// let b = Matrix::from_column_major(2, 1, vec![3.0, 4.0]).unwrap();
/// let c = Matrix::zeros(2, 1);
/// multiply_and_weighted_add(1.0, &a, false, &b, false, 0.0, &c).unwrap();
/// assert_eq!(c.copy_to_host(), vec![3.0, 8.0]);
/// ```
pub fn multiply_and_weighted_add<T: Scalar>(
    alpha: T,
    a: &Matrix<T>,
    trans_a: bool,
    b: &Matrix<T>,
    trans_b: bool,
    beta: T,
    c: &Matrix<T>,
) -> Result<(), TensorError> {
    c.ensure_writable()?;

    let a_mat = faer_mat_from_matrix(a);
    let b_mat = faer_mat_from_matrix(b);
    let a_op = if trans_a { a_mat.as_ref().transpose() } else { a_mat.as_ref() };
    let b_op = if trans_b { b_mat.as_ref().transpose() } else { b_mat.as_ref() };

    let (m, k, n) = (a_op.nrows(), a_op.ncols(), b_op.ncols());
    if b_op.nrows() != k {
        return Err(TensorError::ShapeMismatch {
            expected: k,
            actual: b_op.nrows(),
        });
    }
    if c.rows() != m || c.cols() != n {
        return Err(TensorError::ShapeMismatch {
            expected: m * n,
            actual: c.element_count(),
        });
    }

    let mut product = Mat::<T>::zeros(m, n);
    // product = alpha * op(A) * op(B)
    matmul(product.as_mut(), Accum::Replace, a_op, b_op, alpha, Par::Seq);

    let mut result = Vec::with_capacity(m * n);
    for j in 0..n {
        for i in 0..m {
            let p = product[(i, j)];
            result.push(if beta == T::zero() { p } else { beta * c.get(i, j) + p });
        }
    }
    tracing::trace!(m, k, n, trans_a, trans_b, "gemm");
    c.write_from(0, &result)
}
