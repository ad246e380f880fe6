//! Storage objects addressed by tensor views.
//!
//! ```text
//! Matrix<T>
//! ├── Dense   - DenseBuffer (shared, column-major), sliceable and reshapable
//! └── Sparse  - SparseColumns (shared CSC), column-sliceable only
//! ```
//!
//! Views never allocate: they pair an `Rc<Matrix<T>>` with a shape. The
//! kernels that execute operations on matrices live in [`crate::backend`].

mod buffer;
mod matrix;
mod sparse;

pub use buffer::DenseBuffer;
pub use matrix::{Matrix, MatrixKind};
pub use sparse::SparseColumns;
