//! Gathering tensors into a batch along an axis, and scattering a batch back.
//!
//! When every item is dense, the items share one shape, and the splice axis
//! is the batch's last axis, the batch is just the items' storage laid end
//! to end and the work goes to a single storage-level kernel. Anything else
//! is copied item by item through a narrowed view of the batch.

use smallvec::SmallVec;

use crate::backend::{GenericBackend, TensorOpBackend};
use crate::error::TensorError;
use crate::scalar::Scalar;
use crate::shape::TensorShape;
use crate::view::TensorView;

/// Whether items of the given shapes can be spliced into (or split out of)
/// `batched` along `axis` by the storage-level kernel.
///
/// Requires `axis` to be the last axis of `batched`, every item to be dense
/// with the dims of the first item, and the first item, padded with unit
/// axes, to match `batched` except along `axis` where the batch holds all
/// items.
///
/// # Errors
///
/// Returns `InvalidArgument` if `batched` is a scalar or `items` is empty.
///
/// # Example
///
/// ```
/// use tensorview::{TensorShape, can_gather_scatter_batch};
///
/// let batched = TensorShape::new(&[4, 6]);
/// let item = TensorShape::new(&[4, 2]);
/// assert!(can_gather_scatter_batch(&batched, &[&item, &item, &item], 1).unwrap());
/// assert!(!can_gather_scatter_batch(&batched, &[&item, &item, &item], 0).unwrap());
/// ```
pub fn can_gather_scatter_batch(
    batched: &TensorShape,
    items: &[&TensorShape],
    axis: usize,
) -> Result<bool, TensorError> {
    let rank = batched.rank();
    if rank == 0 {
        return Err(TensorError::invalid(
            "gather/scatter batch: the batched tensor cannot be a scalar",
        ));
    }
    let Some(first) = items.first() else {
        return Err(TensorError::invalid("gather/scatter batch: no items"));
    };
    if axis != rank - 1 || !first.is_dense() {
        return Ok(false);
    }
    let arity = items.len();
    let fits = (0..rank).all(|k| {
        let dim = first.dim_or_one(k);
        let dim = if k == axis { dim * arity } else { dim };
        dim == batched.dims()[k]
    });
    if !fits {
        return Ok(false);
    }
    Ok(items[1..]
        .iter()
        .all(|s| s.dims() == first.dims() && s.is_dense()))
}

fn item_shapes<'a, T: Scalar>(views: &[&'a TensorView<T>]) -> SmallVec<[&'a TensorShape; 8]> {
    views.iter().map(|v| v.shape()).collect()
}

// number of elements per unit step along the batch's last axis
fn rows_per_column(batched: &TensorShape) -> usize {
    match batched.dims().last() {
        Some(&last) if last > 0 => batched.num_elements() / last,
        _ => 0,
    }
}

impl<T: Scalar> TensorView<T> {
    /// Splice `items` into `self` along `axis`, in order.
    ///
    /// Along `axis` each item occupies as many positions as its own extent
    /// there (1 if it has fewer axes); its remaining axes are broadcast into
    /// the batch as for [`assign_copy_of`](Self::assign_copy_of).
    ///
    /// # Example
    ///
    /// ```
    /// use tensorview::TensorView;
    ///
    /// let a = TensorView::from_vec(vec![1.0, 2.0], &[2]).unwrap();
    /// let b = TensorView::from_vec(vec![3.0, 4.0], &[2]).unwrap();
    /// let batch = TensorView::zeros(&[2, 2]);
    /// batch.do_gather_batch_of(&[&a, &b], 1).unwrap();
    /// assert_eq!(batch.to_vec(), vec![1.0, 2.0, 3.0, 4.0]);
    /// ```
    pub fn do_gather_batch_of(
        &self,
        items: &[&TensorView<T>],
        axis: usize,
    ) -> Result<(), TensorError> {
        if can_gather_scatter_batch(self.shape(), &item_shapes(items), axis)? {
            let num_rows = rows_per_column(self.shape());
            tracing::debug!(num_rows, items = items.len(), "gather batch: storage kernel");
            let output = self.sob_view()?;
            return GenericBackend::gather_batch(
                num_rows,
                items.len(),
                |i| items[i].sob_view(),
                &output,
            );
        }

        tracing::debug!(items = items.len(), axis, "gather batch: item-wise copy");
        let mut start = 0;
        for item in items {
            let height = item.shape().dim_or_one(axis);
            let slice = self.shape().narrowed(axis, start, start + height)?;
            self.reviewed(slice).assign_copy_of(item)?;
            start += height;
        }
        Ok(())
    }

    /// Split `self` along `axis` into `outputs`: `output = beta * output + slice`.
    ///
    /// Outputs are written in order; if they overlap, pass `beta = 1` or a
    /// later output overwrites an earlier one.
    pub fn do_scatter_batch_of(
        &self,
        beta: T,
        outputs: &[&TensorView<T>],
        axis: usize,
    ) -> Result<(), TensorError> {
        if can_gather_scatter_batch(self.shape(), &item_shapes(outputs), axis)? {
            let num_rows = rows_per_column(self.shape());
            tracing::debug!(num_rows, items = outputs.len(), "scatter batch: storage kernel");
            let input = self.sob_view()?;
            return GenericBackend::scatter_batch(beta, num_rows, &input, outputs.len(), |i| {
                outputs[i].sob_view()
            });
        }

        tracing::debug!(items = outputs.len(), axis, "scatter batch: item-wise copy");
        let mut start = 0;
        for output in outputs {
            let height = output.shape().dim_or_one(axis);
            let slice = self.shape().narrowed(axis, start, start + height)?;
            output.do_copy_of(beta, &self.reviewed(slice), T::one())?;
            start += height;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seq(dims: &[usize], start: f64) -> TensorView<f64> {
        let n: usize = dims.iter().product();
        TensorView::from_vec((0..n).map(|i| start + i as f64).collect(), dims).unwrap()
    }

    #[test]
    fn test_classifier_errors() {
        let item = TensorShape::new(&[2]);
        assert!(can_gather_scatter_batch(&TensorShape::scalar(), &[&item], 0).is_err());
        assert!(can_gather_scatter_batch(&TensorShape::new(&[2, 1]), &[], 1).is_err());
    }

    #[test]
    fn test_classifier_pads_item_rank() {
        let batched = TensorShape::new(&[3, 2]);
        let item = TensorShape::new(&[3]);
        assert!(can_gather_scatter_batch(&batched, &[&item, &item], 1).unwrap());
        let other = TensorShape::new(&[1, 3]);
        assert!(!can_gather_scatter_batch(&batched, &[&item, &other], 1).unwrap());
    }

    #[test]
    fn test_classifier_rejects_strided_items() {
        let batched = TensorShape::new(&[2, 2]);
        let strided = TensorShape::from_parts(&[2], &[2], 0).unwrap();
        assert!(!can_gather_scatter_batch(&batched, &[&strided, &strided], 1).unwrap());
    }

    #[test]
    fn test_gather_fast_path_with_offset_item() {
        let big = seq(&[2, 3], 0.0);
        // second column of `big`: offset 2, dense
        let col = big.reviewed(TensorShape::from_parts(&[2, 1], &[1, 2], 2).unwrap());
        let other = seq(&[2, 1], 10.0);
        let batch = TensorView::zeros(&[2, 2]);
        batch.do_gather_batch_of(&[&col, &other], 1).unwrap();
        assert_eq!(batch.to_vec(), vec![2.0, 3.0, 10.0, 11.0]);
    }

    #[test]
    fn test_gather_fallback_along_first_axis() {
        let a = seq(&[1, 3], 0.0);
        let b = seq(&[2, 3], 10.0);
        let batch = TensorView::zeros(&[3, 3]);
        batch.do_gather_batch_of(&[&a, &b], 0).unwrap();
        assert_eq!(batch.get(&[0, 2]), Some(2.0));
        assert_eq!(batch.get(&[1, 0]), Some(10.0));
        assert_eq!(batch.get(&[2, 2]), Some(15.0));
    }

    #[test]
    fn test_scatter_accumulates_with_beta() {
        let batch = seq(&[2, 2], 1.0);
        let a = TensorView::from_vec(vec![100.0, 100.0], &[2]).unwrap();
        let b = TensorView::from_vec(vec![100.0, 100.0], &[2]).unwrap();
        batch.do_scatter_batch_of(1.0, &[&a, &b], 1).unwrap();
        assert_eq!(a.to_vec(), vec![101.0, 102.0]);
        assert_eq!(b.to_vec(), vec![103.0, 104.0]);
    }

    #[test]
    fn test_scatter_fallback_inverts_gather() {
        let a = seq(&[2, 3], 0.0);
        let b = seq(&[1, 3], 50.0);
        let batch = TensorView::zeros(&[3, 3]);
        batch.do_gather_batch_of(&[&a, &b], 0).unwrap();

        let a2 = TensorView::zeros(&[2, 3]);
        let b2 = TensorView::zeros(&[1, 3]);
        batch.do_scatter_batch_of(0.0, &[&a2, &b2], 0).unwrap();
        assert_eq!(a2.to_vec(), a.to_vec());
        assert_eq!(b2.to_vec(), b.to_vec());
    }
}
