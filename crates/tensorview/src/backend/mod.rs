//! Computational backends behind the tensor view operations.
//!
//! # Backends
//!
//! - `GenericBackend`: loop-based elementwise, reduction, dot-product and
//!   gather/scatter kernels (always available)
//!
//! # faer Integration
//!
//! The `faer_interop` module converts storage objects to faer matrices and
//! runs the matrix product through faer's `matmul`.

mod elementwise;
mod faer_interop;
mod generic;
mod tensor_ops;

pub use elementwise::{apply, reduction_identity};
pub use faer_interop::{faer_mat_from_matrix, multiply_and_weighted_add};
pub use generic::GenericBackend;
pub use tensor_ops::TensorOpBackend;
