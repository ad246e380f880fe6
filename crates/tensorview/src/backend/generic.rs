//! Generic (naive loop-based) backend implementation.

use smallvec::SmallVec;

use crate::backend::elementwise::{apply, reduce, reduction_identity};
use crate::backend::TensorOpBackend;
use crate::error::TensorError;
use crate::negotiate::BroadcastPlan;
use crate::opcode::ElementWiseOperator;
use crate::scalar::Scalar;
use crate::storage::Matrix;
use crate::strides::MultiIndex;

/// Generic backend using naive loop-based implementations.
///
/// This backend is always available and serves as the reference for the
/// fused fast paths.
pub struct GenericBackend;

#[inline]
fn read_at<T: Scalar>(m: &Matrix<T>, pos: isize) -> T {
    debug_assert!(pos >= 0, "negative storage position {pos}");
    m.read(pos as usize)
}

#[inline]
fn blend<T: Scalar>(beta: T, old: impl FnOnce() -> T, alpha: T, value: T) -> T {
    if beta == T::zero() {
        alpha * value
    } else {
        beta * old() + alpha * value
    }
}

fn check_same_size(expected: usize, actual: usize) -> Result<(), TensorError> {
    if expected != actual {
        return Err(TensorError::ShapeMismatch { expected, actual });
    }
    Ok(())
}

fn plan_strides(strides: &[crate::strides::Strides]) -> SmallVec<[&[isize]; 5]> {
    strides.iter().map(|s| s.as_slice()).collect()
}

impl TensorOpBackend for GenericBackend {
    fn tensor_op<T: Scalar>(
        beta: T,
        inputs: &[&Matrix<T>],
        output: &Matrix<T>,
        alpha: T,
        op: ElementWiseOperator,
        reduction_op: ElementWiseOperator,
        plan: &BroadcastPlan,
    ) -> Result<(), TensorError> {
        debug_assert_eq!(inputs.len() + 1, plan.operand_count());
        output.ensure_writable()?;

        let out = inputs.len();
        let regular = plan_strides(&plan.regular_strides);
        let reducing = plan_strides(&plan.reducing_strides);
        let base: SmallVec<[isize; 5]> = plan.offsets.iter().map(|&o| o as isize).collect();

        let mut outer = MultiIndex::new(&plan.regular_op_dims, &regular, &base);
        if outer.remaining() == 0 {
            return Ok(());
        }
        let mut args: SmallVec<[T; 4]> = SmallVec::with_capacity(inputs.len());
        let mut eval = |pos: &[isize]| -> T {
            args.clear();
            args.extend(inputs.iter().zip(pos.iter()).map(|(m, &p)| read_at(m, p)));
            apply(op, &args)
        };

        let mut updates = Vec::with_capacity(outer.remaining());
        loop {
            let pos = outer.offsets();
            let value = if plan.is_reducing() {
                let mut inner = MultiIndex::new(&plan.reducing_op_dims, &reducing, pos);
                let mut acc = reduction_identity(reduction_op);
                if inner.remaining() > 0 {
                    loop {
                        acc = reduce(reduction_op, acc, eval(inner.offsets()));
                        if !inner.advance() {
                            break;
                        }
                    }
                }
                acc
            } else {
                eval(pos)
            };
            let out_pos = pos[out];
            let result = blend(beta, || read_at(output, out_pos), alpha, value);
            updates.push((out_pos as usize, result));
            if !outer.advance() {
                break;
            }
        }
        output.write_scattered(&updates)
    }

    fn tensor_arg_op<T: Scalar>(
        input: &Matrix<T>,
        output: &Matrix<T>,
        reduction_op: ElementWiseOperator,
        plan: &BroadcastPlan,
    ) -> Result<(), TensorError> {
        debug_assert_eq!(plan.operand_count(), 2);
        output.ensure_writable()?;

        let regular = plan_strides(&plan.regular_strides);
        let reducing = plan_strides(&plan.reducing_strides);
        let base: SmallVec<[isize; 5]> = plan.offsets.iter().map(|&o| o as isize).collect();

        let mut outer = MultiIndex::new(&plan.regular_op_dims, &regular, &base);
        if outer.remaining() == 0 {
            return Ok(());
        }
        let mut updates = Vec::with_capacity(outer.remaining());
        loop {
            let pos = outer.offsets();
            let mut inner = MultiIndex::new(&plan.reducing_op_dims, &reducing, pos);
            let mut best: Option<(usize, T)> = None;
            let mut k = 0;
            if inner.remaining() > 0 {
                loop {
                    let v = read_at(input, inner.offsets()[0]);
                    // strict comparison keeps the first extremum
                    let better = match best {
                        None => true,
                        Some((_, b)) => match reduction_op {
                            ElementWiseOperator::Min => v < b,
                            _ => v > b,
                        },
                    };
                    if better {
                        best = Some((k, v));
                    }
                    k += 1;
                    if !inner.advance() {
                        break;
                    }
                }
            }
            let index = best.map_or(0, |(i, _)| i);
            updates.push((pos[1] as usize, T::from_f64(index as f64)));
            if !outer.advance() {
                break;
            }
        }
        output.write_scattered(&updates)
    }

    fn inner_product<T: Scalar>(
        beta: T,
        a: &Matrix<T>,
        b: &Matrix<T>,
        alpha: T,
        c: &Matrix<T>,
        columnwise: bool,
    ) -> Result<(), TensorError> {
        check_same_size(a.rows(), b.rows())?;
        check_same_size(a.cols(), b.cols())?;
        c.ensure_writable()?;
        let (rows, cols) = (a.rows(), a.cols());

        let dots: Vec<T> = if columnwise {
            check_same_size(cols, c.element_count())?;
            (0..cols)
                .map(|j| (0..rows).fold(T::zero(), |acc, i| acc + a.get(i, j) * b.get(i, j)))
                .collect()
        } else {
            check_same_size(rows, c.element_count())?;
            (0..rows)
                .map(|i| (0..cols).fold(T::zero(), |acc, j| acc + a.get(i, j) * b.get(i, j)))
                .collect()
        };
        let result: Vec<T> = dots
            .iter()
            .enumerate()
            .map(|(k, &d)| blend(beta, || c.read(k), alpha, d))
            .collect();
        c.write_from(0, &result)
    }

    fn columnwise_scale_and_weighted_add<T: Scalar>(
        alpha: T,
        a: &Matrix<T>,
        v: &Matrix<T>,
        beta: T,
        c: &Matrix<T>,
    ) -> Result<(), TensorError> {
        check_same_size(a.cols(), v.element_count())?;
        check_same_size(a.element_count(), c.element_count())?;
        c.ensure_writable()?;
        let rows = a.rows();

        let result: Vec<T> = (0..a.element_count())
            .map(|k| {
                let scaled = a.read(k) * v.read(k / rows);
                blend(beta, || c.read(k), alpha, scaled)
            })
            .collect();
        c.write_from(0, &result)
    }

    fn gather_batch<T: Scalar, F>(
        num_rows: usize,
        num_items: usize,
        mut item: F,
        output: &Matrix<T>,
    ) -> Result<(), TensorError>
    where
        F: FnMut(usize) -> Result<Matrix<T>, TensorError>,
    {
        output.ensure_writable()?;
        let mut gathered = Vec::with_capacity(output.element_count());
        for i in 0..num_items {
            let m = item(i)?;
            if num_rows == 0 || m.element_count() % num_rows != 0 {
                return Err(TensorError::invalid(format!(
                    "gather_batch: item {i} has {} elements, not a multiple of {num_rows} rows",
                    m.element_count()
                )));
            }
            gathered.extend(m.copy_to_host());
        }
        check_same_size(output.element_count(), gathered.len())?;
        output.write_from(0, &gathered)
    }

    fn scatter_batch<T: Scalar, F>(
        beta: T,
        num_rows: usize,
        input: &Matrix<T>,
        num_items: usize,
        mut item: F,
    ) -> Result<(), TensorError>
    where
        F: FnMut(usize) -> Result<Matrix<T>, TensorError>,
    {
        let source = input.copy_to_host();
        let mut start = 0;
        for i in 0..num_items {
            let m = item(i)?;
            let n = m.element_count();
            if num_rows == 0 || n % num_rows != 0 {
                return Err(TensorError::invalid(format!(
                    "scatter_batch: item {i} has {n} elements, not a multiple of {num_rows} rows"
                )));
            }
            if start + n > source.len() {
                return Err(TensorError::SliceOutOfBounds {
                    start,
                    end: start + n,
                    dim: 1,
                    size: source.len(),
                });
            }
            let values: Vec<T> = source[start..start + n]
                .iter()
                .enumerate()
                .map(|(k, &x)| blend(beta, || m.read(k), T::one(), x))
                .collect();
            m.write_from(0, &values)?;
            start += n;
        }
        check_same_size(source.len(), start)
    }
}
