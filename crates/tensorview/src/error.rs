//! Error types for tensorview.
//!
//! Two of the three failure classes are represented here: caller-recoverable
//! invalid arguments and runtime "unsupported for this data" errors. Logic
//! errors (aliasing under reduction, element-type mismatch, storage bounds)
//! are programming mistakes and panic with a `logic error:` prefix instead.

use thiserror::Error;

/// Coarse classification of a [`TensorError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Precondition violated by the caller (shapes, ranks, names, offsets).
    InvalidArgument,
    /// Operation is legitimately unsupported for the given data class.
    Runtime,
}

/// Errors that can occur in tensor view operations.
#[derive(Debug, Error)]
pub enum TensorError {
    /// An operand cannot be broadcast against the operation shape.
    #[error(
        "dimension {axis} of operand [{operand}] is incompatible with operation dimensions ({shape} vs. {op_shape})"
    )]
    IncompatibleShape {
        axis: usize,
        operand: usize,
        shape: String,
        op_shape: String,
    },

    /// Operator name not present in the operator table.
    #[error("'{name}' is not a valid tensor operation code")]
    UnknownOperation { name: String },

    /// Shape negotiation supports 1 to 5 participants.
    #[error("shape negotiation takes 1 to 5 operands, got {count}")]
    OperandCount { count: usize },

    /// Operator used through an entry point of the wrong arity.
    #[error("operation {op} takes {expected} inputs, got {actual}")]
    ArityMismatch {
        op: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A reducing operation was requested with a non-reduction operator.
    #[error("{op} cannot be used as a reduction operation")]
    NotAReduction { op: &'static str },

    /// Matrix product ranks or flattened dimensions do not line up.
    #[error("matrix product: {message} {format}")]
    MatrixProduct { message: &'static str, format: String },

    /// Element count mismatch.
    #[error("shape mismatch: expected {expected} elements, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    /// Slice range out of bounds.
    #[error("slice range {start}..{end} out of bounds for dimension {dim} with size {size}")]
    SliceOutOfBounds {
        start: usize,
        end: usize,
        dim: usize,
        size: usize,
    },

    /// Any other caller-side precondition violation.
    #[error("{0}")]
    InvalidArgument(String),

    /// Operation not supported for this storage class (e.g. reshaping sparse data).
    #[error("unsupported: {0}")]
    Unsupported(String),
}

impl TensorError {
    /// Create an [`TensorError::InvalidArgument`] from any message.
    pub fn invalid(message: impl Into<String>) -> Self {
        TensorError::InvalidArgument(message.into())
    }

    /// Severity class of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            TensorError::Unsupported(_) => ErrorKind::Runtime,
            _ => ErrorKind::InvalidArgument,
        }
    }
}
