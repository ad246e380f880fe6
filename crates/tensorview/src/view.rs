//! Tensor views: a shared storage object interpreted through a shape.

use std::any::Any;
use std::rc::Rc;

use crate::error::TensorError;
use crate::scalar::Scalar;
use crate::shape::TensorShape;
use crate::storage::{Matrix, MatrixKind};
use crate::strides::{MultiIndex, cartesian_to_linear};

/// A shape over a shared, reference-counted storage object.
///
/// Views never allocate on their own (the `from_vec`/`zeros` helpers create
/// the storage first). Cloning a view, or calling [`reviewed`](Self::reviewed),
/// yields another view over the same storage: writes through one are visible
/// through all of them.
#[derive(Debug, Clone)]
pub struct TensorView<T: Scalar> {
    sob: Rc<Matrix<T>>,
    shape: TensorShape,
}

// storage layout used for freshly allocated tensors
fn natural_matrix_dims(dims: &[usize]) -> (usize, usize) {
    match dims.split_first() {
        None => (1, 1),
        Some((&rows, rest)) => (rows, rest.iter().product()),
    }
}

impl<T: Scalar> TensorView<T> {
    /// View `sob` through `shape`.
    ///
    /// # Panics
    ///
    /// In debug builds, panics with a logic error if the shape addresses
    /// elements outside the storage object.
    pub fn new(sob: Rc<Matrix<T>>, shape: TensorShape) -> Self {
        if cfg!(debug_assertions) && shape.num_elements() > 0 {
            let (begin, end) = shape.location_range();
            let count = sob.element_count() as isize;
            if begin < 0 || end > count {
                panic!(
                    "logic error: TensorView: shape {shape} (offset {}) addresses elements [{begin}, {end}) outside a storage object of {count} elements",
                    shape.offset()
                );
            }
        }
        Self { sob, shape }
    }

    /// Type-erased constructor.
    ///
    /// # Panics
    ///
    /// Panics with a logic error if `sob` is not a `Matrix<T>`, e.g. a
    /// `Matrix<f32>` bound to a `TensorView<f64>`.
    pub fn from_any(sob: Rc<dyn Any>, shape: TensorShape) -> Self {
        match sob.downcast::<Matrix<T>>() {
            Ok(sob) => Self::new(sob, shape),
            Err(_) => panic!(
                "logic error: TensorView: storage object does not hold elements of type {}",
                std::any::type_name::<T>()
            ),
        }
    }

    /// View a whole matrix as a `[rows x cols]` tensor.
    pub fn from_matrix(m: Matrix<T>) -> Self {
        let shape = TensorShape::new(&[m.rows(), m.cols()]);
        Self::new(Rc::new(m), shape)
    }

    /// Dense tensor from column-major data.
    ///
    /// # Errors
    ///
    /// Returns `ShapeMismatch` if `data.len()` is not the product of `dims`.
    ///
    /// # Example
    ///
    /// ```
    /// use tensorview::TensorView;
    ///
    /// let t = TensorView::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]).unwrap();
    /// assert_eq!(t.get(&[1, 2]), Some(6.0));
    /// ```
    pub fn from_vec(data: Vec<T>, dims: &[usize]) -> Result<Self, TensorError> {
        let (rows, cols) = natural_matrix_dims(dims);
        let m = Matrix::from_column_major(rows, cols, data)?;
        Ok(Self::new(Rc::new(m), TensorShape::new(dims)))
    }

    /// Zero-filled dense tensor.
    pub fn zeros(dims: &[usize]) -> Self {
        let (rows, cols) = natural_matrix_dims(dims);
        Self::new(Rc::new(Matrix::zeros(rows, cols)), TensorShape::new(dims))
    }

    #[inline]
    pub fn shape(&self) -> &TensorShape {
        &self.shape
    }

    #[inline]
    pub fn rank(&self) -> usize {
        self.shape.rank()
    }

    /// The storage object behind this view.
    #[inline]
    pub fn sob(&self) -> &Rc<Matrix<T>> {
        &self.sob
    }

    /// Same storage, different shape.
    pub fn reviewed(&self, shape: TensorShape) -> Self {
        Self::new(Rc::clone(&self.sob), shape)
    }

    /// Same storage and offset, new extents. Dense views only.
    pub fn reshaped(&self, dims: &[usize]) -> Result<Self, TensorError> {
        Ok(self.reviewed(self.shape.reshaped(dims)?))
    }

    /// True if both views share the storage handle and the shape, which
    /// makes them the same tensor for aliasing purposes.
    pub fn is_same_object(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.sob, &other.sob) && self.shape == other.shape
    }

    fn storage_position(&self, indices: &[usize]) -> Option<usize> {
        if indices.len() != self.rank() {
            return None;
        }
        if indices.iter().zip(self.shape.dims()).any(|(&i, &d)| i >= d) {
            return None;
        }
        let pos = self.shape.offset() as isize + cartesian_to_linear(indices, self.shape.strides());
        usize::try_from(pos).ok()
    }

    /// Element at `indices`, or `None` when out of range.
    pub fn get(&self, indices: &[usize]) -> Option<T> {
        self.storage_position(indices).map(|pos| self.sob.read(pos))
    }

    /// Overwrite the element at `indices`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` when the indices are out of range and
    /// `Unsupported` for sparse storage.
    pub fn set(&self, indices: &[usize], value: T) -> Result<(), TensorError> {
        let pos = self.storage_position(indices).ok_or_else(|| {
            TensorError::invalid(format!("set: index {indices:?} out of range for {}", self.shape))
        })?;
        self.sob.write_from(pos, &[value])
    }

    /// All addressed elements in natural (column-major) order.
    pub fn to_vec(&self) -> Vec<T> {
        let strides = [self.shape.strides()];
        let mut it = MultiIndex::new(self.shape.dims(), &strides, &[self.shape.offset() as isize]);
        let mut out = Vec::with_capacity(it.remaining());
        if it.remaining() == 0 {
            return out;
        }
        loop {
            out.push(self.sob.read(it.offsets()[0] as usize));
            if !it.advance() {
                break;
            }
        }
        out
    }

    /// Whether the storage object can be handed to a kernel as is: the view
    /// covers it completely, starting at offset 0.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the view is not dense.
    pub fn can_pass_sob(&self) -> Result<bool, TensorError> {
        self.verify_is_dense()?;
        Ok(self.shape.num_elements() == self.sob.element_count() && self.shape.offset() == 0)
    }

    /// The addressed region as a storage object: the storage itself when it
    /// can be passed as is, else a column slice over the same data.
    ///
    /// Dense storage is sliced as a flat row of elements. Sparse storage can
    /// only be sliced in whole columns.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the view is not dense, or if a sparse
    /// view's offset or size is not a multiple of the storage row count.
    pub fn sob_view(&self) -> Result<Matrix<T>, TensorError> {
        if self.can_pass_sob()? {
            return Ok(self.sob.as_ref().clone());
        }
        let offset = self.shape.offset();
        let elements = self.shape.num_elements();
        match self.sob.kind() {
            MatrixKind::Sparse => {
                let rows = self.sob.rows();
                if rows == 0 || offset % rows != 0 || elements % rows != 0 {
                    return Err(TensorError::invalid(format!(
                        "sob_view: sparse {} tensor has an offset or width that is not a multiple of the storage object's row dimension",
                        self.shape
                    )));
                }
                self.sob.column_slice(offset / rows, elements / rows)
            }
            MatrixKind::Dense => {
                self.sob
                    .column_slice_with_pretend(offset, elements, self.sob.element_count())
            }
        }
    }

    pub(crate) fn verify_is_dense(&self) -> Result<(), TensorError> {
        if !self.shape.is_dense() {
            return Err(TensorError::invalid(format!(
                "{} tensor is not dense (strides {:?})",
                self.shape,
                self.shape.strides()
            )));
        }
        Ok(())
    }
}
