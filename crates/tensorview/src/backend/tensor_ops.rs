//! Storage-level kernel trait.

use crate::error::TensorError;
use crate::negotiate::BroadcastPlan;
use crate::opcode::ElementWiseOperator;
use crate::scalar::Scalar;
use crate::storage::Matrix;

/// Kernels the dispatcher drives on storage objects.
///
/// Every kernel computes its full result before writing, so an output may
/// share storage with its inputs. Writes go through the storage object and
/// fail with `Unsupported` when it cannot be written (sparse data).
pub trait TensorOpBackend {
    /// `out = beta * out + alpha * reduce(op(inputs...))` over a negotiated plan.
    ///
    /// `inputs` holds `op.arity()` storage objects in participant order; the
    /// output is the plan's last participant. With `beta == 0` the previous
    /// output is never read.
    fn tensor_op<T: Scalar>(
        beta: T,
        inputs: &[&Matrix<T>],
        output: &Matrix<T>,
        alpha: T,
        op: ElementWiseOperator,
        reduction_op: ElementWiseOperator,
        plan: &BroadcastPlan,
    ) -> Result<(), TensorError>;

    /// Write, per output element, the position within the reduced axes of
    /// the first maximum (`Max`) or minimum (`Min`) of the input.
    fn tensor_arg_op<T: Scalar>(
        input: &Matrix<T>,
        output: &Matrix<T>,
        reduction_op: ElementWiseOperator,
        plan: &BroadcastPlan,
    ) -> Result<(), TensorError>;

    /// Column-wise (or row-wise) dot products of `a` and `b` into `c`.
    ///
    /// Column-wise: `a`, `b` are `k x n`, `c` is `1 x n`.
    /// Row-wise: `a`, `b` are `m x k`, `c` is `m x 1`.
    fn inner_product<T: Scalar>(
        beta: T,
        a: &Matrix<T>,
        b: &Matrix<T>,
        alpha: T,
        c: &Matrix<T>,
        columnwise: bool,
    ) -> Result<(), TensorError>;

    /// `c[i, j] = beta * c[i, j] + alpha * a[i, j] * v[j]`.
    fn columnwise_scale_and_weighted_add<T: Scalar>(
        alpha: T,
        a: &Matrix<T>,
        v: &Matrix<T>,
        beta: T,
        c: &Matrix<T>,
    ) -> Result<(), TensorError>;

    /// Concatenate the columns of `num_items` matrices, each viewed with
    /// `num_rows` rows, into `output`.
    fn gather_batch<T: Scalar, F>(
        num_rows: usize,
        num_items: usize,
        item: F,
        output: &Matrix<T>,
    ) -> Result<(), TensorError>
    where
        F: FnMut(usize) -> Result<Matrix<T>, TensorError>;

    /// Split the columns of `input` into `num_items` matrices:
    /// `item = beta * item + columns`.
    fn scatter_batch<T: Scalar, F>(
        beta: T,
        num_rows: usize,
        input: &Matrix<T>,
        num_items: usize,
        item: F,
    ) -> Result<(), TensorError>
    where
        F: FnMut(usize) -> Result<Matrix<T>, TensorError>;
}
