//! tensorview - N-dimensional strided views over shared matrix storage
//!
//! A [`TensorView`] interprets a reference-counted storage object
//! ([`Matrix`]) through a [`TensorShape`]: column-major dims, signed
//! strides and an element offset. Views never allocate; many of them can
//! look at the same storage.
//!
//! # Architecture
//!
//! ```text
//! Level 1: View operations (view, dispatch, matrix_product, batch, format)
//!     → do_binary_op_of, do_matrix_product_of, do_gather_batch_of, as_string
//!
//! Level 2: Shape negotiation (negotiate)
//!     → broadcast, flatten and classify axes into a BroadcastPlan
//!
//! Level 3: Kernels (backend module)
//!     → GenericBackend (strided loops, dot products, gather/scatter)
//!     → faer GEMM
//! ```
//!
//! # Example
//!
//! ```
//! use tensorview::{ElementWiseOperator, TensorView};
//!
//! // a [3 x 2] matrix plus a [3] column, broadcast along the second axis
//! let a = TensorView::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[3, 2]).unwrap();
//! let b = TensorView::from_vec(vec![10.0, 20.0, 30.0], &[3]).unwrap();
//! let c = TensorView::zeros(&[3, 2]);
//! c.assign_sum_of(&a, &b).unwrap();
//! assert_eq!(c.to_vec(), vec![11.0, 22.0, 33.0, 14.0, 25.0, 36.0]);
//!
//! // reduce over the second axis into a [3 x 1] column
//! let r = TensorView::zeros(&[3, 1]);
//! r.do_unary_op_of(0.0, &a, 1.0, ElementWiseOperator::Copy, ElementWiseOperator::Max)
//!     .unwrap();
//! assert_eq!(r.to_vec(), vec![4.0, 5.0, 6.0]);
//! ```

pub mod backend;
mod batch;
mod dispatch;
pub mod error;
mod format;
mod matrix_product;
pub mod negotiate;
pub mod opcode;
pub mod scalar;
pub mod shape;
pub mod storage;
pub mod strides;
mod view;

pub use batch::can_gather_scatter_batch;
pub use dispatch::{DispatchConfig, FusedPattern, classify_fused_pattern};
pub use error::{ErrorKind, TensorError};
pub use format::FormatOptions;
pub use negotiate::{BroadcastPlan, negotiate};
pub use opcode::ElementWiseOperator;
pub use scalar::Scalar;
pub use shape::TensorShape;
pub use storage::{DenseBuffer, Matrix, MatrixKind, SparseColumns};
pub use view::TensorView;
