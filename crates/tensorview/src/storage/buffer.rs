//! Shared dense data buffer.
//!
//! Every dense `Matrix` that was sliced or reshaped from the same source
//! holds a clone of the same `DenseBuffer`. Clones share one allocation,
//! so a write through one handle is visible through all of them.

use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;

use crate::scalar::Scalar;

/// Reference-counted, interior-mutable element buffer.
#[derive(Debug, Clone)]
pub struct DenseBuffer<T: Scalar> {
    data: Rc<RefCell<Vec<T>>>,
}

impl<T: Scalar> DenseBuffer<T> {
    /// Wrap an existing vector.
    pub fn from_vec(data: Vec<T>) -> Self {
        Self {
            data: Rc::new(RefCell::new(data)),
        }
    }

    /// Zero-initialized buffer of `len` elements.
    pub fn zeros(len: usize) -> Self {
        Self::from_vec(vec![T::zero(); len])
    }

    /// Number of elements in the whole allocation.
    pub fn len(&self) -> usize {
        self.data.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Immutable access; panics if a mutable borrow is live.
    pub fn borrow(&self) -> Ref<'_, Vec<T>> {
        self.data.borrow()
    }

    /// Mutable access; panics if any other borrow is live.
    pub fn borrow_mut(&self) -> RefMut<'_, Vec<T>> {
        self.data.borrow_mut()
    }

    /// True if both handles refer to the same allocation.
    pub fn shares_storage_with(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.data, &other.data)
    }
}
