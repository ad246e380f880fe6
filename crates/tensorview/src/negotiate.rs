//! Shape negotiation for broadcasting operations.
//!
//! Given the shapes of all participants of one operation (inputs first, the
//! output last), [`negotiate`] derives:
//!
//! ```text
//! 1. rank alignment        pad trailing unit axes up to the largest rank (min 1)
//! 2. operation shape       per-axis max over participants
//! 3. compatibility         every extent equals the op extent or 1
//! 4. axis flattening       merge adjacent axes that are contiguous and agree
//!                          on broadcasting for every participant
//! 5. unit-axis elimination drop axes that are 1 for everybody
//! 6. broadcast strides     stride 0 wherever a participant is smaller
//! 7. regular / reducing    output extent 1 => reducing axis
//! ```
//!
//! The function is pure: it never touches storage.

use smallvec::SmallVec;

use crate::error::TensorError;
use crate::shape::TensorShape;
use crate::strides::{Dims, Strides};

/// Maximum number of participants (4 inputs plus the output).
pub const MAX_OPERANDS: usize = 5;

/// One entry per participant.
pub type PerOperand<X> = SmallVec<[X; MAX_OPERANDS]>;

/// Result of shape negotiation.
///
/// `regular_*` describe the axes the kernel maps one-to-one onto output
/// elements; `reducing_*` the axes it loops over and accumulates. Both
/// stride sets are indexed `[participant][axis]`; the output is the last
/// participant and has stride 0 on every reducing axis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastPlan {
    /// Operation extents after flattening and unit-axis elimination.
    pub op_dims: Dims,
    /// Participant shapes after flattening, elimination and broadcast strides.
    pub shapes: PerOperand<TensorShape>,
    /// Element offset of each participant, carried through unchanged.
    pub offsets: PerOperand<usize>,
    pub regular_op_dims: Dims,
    pub regular_strides: PerOperand<Strides>,
    pub reducing_op_dims: Dims,
    pub reducing_strides: PerOperand<Strides>,
}

impl BroadcastPlan {
    /// Number of participants, output included.
    pub fn operand_count(&self) -> usize {
        self.offsets.len()
    }

    /// True if at least one axis accumulates into the output.
    pub fn is_reducing(&self) -> bool {
        !self.reducing_op_dims.is_empty()
    }

    /// Number of output elements written.
    pub fn regular_size(&self) -> usize {
        self.regular_op_dims.iter().product()
    }

    /// Number of terms accumulated per output element.
    pub fn reduction_size(&self) -> usize {
        self.reducing_op_dims.iter().product()
    }
}

// same-or-broadcasting
fn is_compatible(dim: usize, op_dim: usize) -> bool {
    dim == op_dim || dim == 1
}

/// Negotiate a common operation shape for 1 to 5 participants.
///
/// The last shape is conventionally the output.
///
/// # Errors
///
/// Returns `OperandCount` for zero or more than five shapes, and
/// `IncompatibleShape` naming the first offending axis and participant when
/// an extent is neither the operation extent nor 1.
///
/// # Example
///
/// ```
/// use tensorview::TensorShape;
/// use tensorview::negotiate::negotiate;
///
/// // broadcast a [3] vector across the 4 columns of a [3 x 4] matrix
/// let a = TensorShape::new(&[3]);
/// let b = TensorShape::new(&[3, 4]);
/// let c = TensorShape::new(&[3, 4]);
/// let plan = negotiate(&[a, b, c]).unwrap();
/// assert_eq!(plan.regular_op_dims.as_slice(), &[3, 4]);
/// assert_eq!(plan.regular_strides[0].as_slice(), &[1, 0]);
/// assert_eq!(plan.regular_strides[1].as_slice(), &[1, 3]);
/// assert!(!plan.is_reducing());
/// ```
pub fn negotiate(shapes: &[TensorShape]) -> Result<BroadcastPlan, TensorError> {
    let n = shapes.len();
    if n == 0 || n > MAX_OPERANDS {
        return Err(TensorError::OperandCount { count: n });
    }
    let mut shapes: PerOperand<TensorShape> = shapes.iter().cloned().collect();

    // rank alignment; rank 0 is padded to 1 and comes back out as rank 0
    // through unit-axis elimination
    let mut rank = shapes.iter().map(TensorShape::rank).max().unwrap_or(0).max(1);
    for shape in shapes.iter_mut() {
        shape.pad_rank_in_place(rank);
    }

    let mut op_dims: Dims = (0..rank)
        .map(|k| shapes.iter().map(|s| s.dims()[k]).max().unwrap_or(1))
        .collect();

    for k in 0..rank {
        for (i, shape) in shapes.iter().enumerate() {
            if !is_compatible(shape.dims()[k], op_dims[k]) {
                return Err(TensorError::IncompatibleShape {
                    axis: k,
                    operand: i,
                    shape: shape.to_string(),
                    op_shape: TensorShape::new(&op_dims).to_string(),
                });
            }
        }
    }

    // flatten consecutive axes: contiguous in memory, and either all
    // non-broadcasting or all broadcasting, for every participant
    for k in 1..rank {
        let mergeable = shapes.iter().all(|s| {
            let d = s.dims();
            let regular = d[k] == op_dims[k] && d[k - 1] == op_dims[k - 1];
            let broadcast = d[k] == 1 && d[k - 1] == 1;
            s.can_flatten(k) && (regular || broadcast)
        });
        if mergeable {
            for shape in shapes.iter_mut() {
                shape.flatten_in_place(k);
            }
            op_dims[k] *= op_dims[k - 1];
            op_dims[k - 1] = 1;
        }
    }

    // drop axes that are 1 for every participant
    let to_drop: SmallVec<[bool; 8]> = (0..rank)
        .map(|k| shapes.iter().all(|s| s.dims()[k] == 1))
        .collect();
    if to_drop.iter().any(|&d| d) {
        for shape in shapes.iter_mut() {
            shape.drop_dims_in_place(&to_drop);
        }
        op_dims = op_dims
            .iter()
            .zip(to_drop.iter())
            .filter(|(_, drop)| !**drop)
            .map(|(&d, _)| d)
            .collect();
        rank = op_dims.len();
    }

    // every remaining 1 is a genuine broadcast, since all-1 axes are gone
    for shape in shapes.iter_mut() {
        for k in 0..rank {
            if shape.dims()[k] < op_dims[k] {
                shape.set_stride(k, 0);
            }
        }
    }

    // a 1 in the output means some input is non-1 there: accumulate over it
    let is_reducing: SmallVec<[bool; 8]> = match shapes.last() {
        Some(output) => output.dims().iter().map(|&d| d == 1).collect(),
        None => return Err(TensorError::OperandCount { count: 0 }),
    };
    let is_regular: SmallVec<[bool; 8]> = is_reducing.iter().map(|&r| !r).collect();

    let split = |mask: &[bool]| -> Dims {
        op_dims
            .iter()
            .zip(mask.iter())
            .filter(|(_, drop)| !**drop)
            .map(|(&d, _)| d)
            .collect()
    };
    let regular_op_dims = split(&is_reducing);
    let reducing_op_dims = split(&is_regular);
    let regular_strides = shapes
        .iter()
        .map(|s| s.drop_dims(&is_reducing).strides().iter().copied().collect())
        .collect();
    let reducing_strides = shapes
        .iter()
        .map(|s| s.drop_dims(&is_regular).strides().iter().copied().collect())
        .collect();
    let offsets = shapes.iter().map(TensorShape::offset).collect();

    let plan = BroadcastPlan {
        op_dims,
        shapes,
        offsets,
        regular_op_dims,
        regular_strides,
        reducing_op_dims,
        reducing_strides,
    };
    tracing::trace!(
        regular = ?plan.regular_op_dims,
        reducing = ?plan.reducing_op_dims,
        operands = plan.operand_count(),
        "negotiated operation shape"
    );
    Ok(plan)
}
