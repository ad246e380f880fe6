//! Elementwise operation dispatch.
//!
//! Every entry point computes
//!
//! ```text
//! out = beta * out + alpha * reduce(op(in_1, ..., in_n))
//! ```
//!
//! where `reduce` accumulates with the reduction operator over the axes on
//! which the output has extent 1 and some input does not. The dispatcher
//! negotiates the operand shapes, enforces the aliasing rule, and hands the
//! plan to a kernel.

use smallvec::SmallVec;

use crate::backend::{GenericBackend, TensorOpBackend};
use crate::error::TensorError;
use crate::negotiate::{BroadcastPlan, negotiate};
use crate::opcode::ElementWiseOperator;
use crate::scalar::Scalar;
use crate::shape::TensorShape;
use crate::storage::Matrix;
use crate::view::TensorView;

/// Options for [`TensorView::do_binary_op_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Route recognized product-and-sum shapes to dedicated
    /// linear-algebra kernels instead of the generic one.
    pub fuse_linear_algebra: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            fuse_linear_algebra: true,
        }
    }
}

/// Shape signatures that have a dedicated kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FusedPattern {
    /// Sum of products over one contiguous reducing axis, for every column
    /// of a contiguous batch: a column-wise inner product.
    DotProduct,
    /// No reduction; one input (the weight) is broadcast down the first
    /// axis and scales the columns of the other (the data).
    DotProductGradient {
        /// Whether the first input is the weight.
        a_is_weight: bool,
    },
}

/// Recognize a fused pattern in a negotiated three-operand plan.
///
/// Only `ElementwiseProduct` with a `Sum` reduction qualifies. Either input
/// may be the weight of a gradient pattern.
pub fn classify_fused_pattern(
    op: ElementWiseOperator,
    reduction_op: ElementWiseOperator,
    plan: &BroadcastPlan,
) -> Option<FusedPattern> {
    if op != ElementWiseOperator::ElementwiseProduct
        || reduction_op != ElementWiseOperator::Sum
        || plan.operand_count() != 3
    {
        return None;
    }
    if is_dot_product(plan) {
        return Some(FusedPattern::DotProduct);
    }
    dot_product_gradient(plan)
}

fn is_dot_product(plan: &BroadcastPlan) -> bool {
    let (rd, rs) = (&plan.reducing_op_dims, &plan.reducing_strides);
    if rd.len() != 1 || rs[0][0] != 1 || rs[1][0] != 1 || rs[2][0] != 0 {
        return false;
    }
    let regular = &plan.regular_strides;
    match plan.regular_op_dims.len() {
        0 => true,
        1 => {
            let reduced = rd[0] as isize;
            regular[0][0] == reduced && regular[1][0] == reduced && regular[2][0] == 1
        }
        _ => false,
    }
}

fn dot_product_gradient(plan: &BroadcastPlan) -> Option<FusedPattern> {
    if plan.is_reducing() || plan.regular_op_dims.len() > 2 {
        return None;
    }
    let (dims, rs) = (&plan.regular_op_dims, &plan.regular_strides);
    if dims.is_empty() {
        return Some(FusedPattern::DotProductGradient { a_is_weight: true });
    }

    // one input broadcasts down the first axis, both are consecutive along it
    let (sa, sb) = (rs[0][0], rs[1][0]);
    if sa != 0 && sb != 0 {
        return None;
    }
    if !(0..=1).contains(&sa) || !(0..=1).contains(&sb) {
        return None;
    }
    let a_is_weight = sa == 0;
    let data = if a_is_weight { 1 } else { 0 };
    if rs[data][0] != 1 || rs[2][0] != 1 {
        return None;
    }

    // batch axis: consecutive in memory for every operand
    if dims.len() == 2 {
        let height = dims[0] as isize;
        let a_height = if sa == 0 { 1 } else { height };
        let b_height = if sb == 0 { 1 } else { height };
        if rs[0][1] != a_height || rs[1][1] != b_height || rs[2][1] != height {
            return None;
        }
    }
    Some(FusedPattern::DotProductGradient { a_is_weight })
}

// matrix over the plan's layout for one operand: [rows x cols], column-major
fn plan_matrix<T: Scalar>(
    view: &TensorView<T>,
    rows: usize,
    cols: usize,
    offset: usize,
) -> Result<std::rc::Rc<Matrix<T>>, TensorError> {
    let shape = TensorShape::from_parts(&[rows, cols], &[1, rows as isize], offset)?;
    view.reviewed(shape).as_matrix()
}

impl<T: Scalar> TensorView<T> {
    fn dispatch(
        &self,
        beta: T,
        inputs: &[&TensorView<T>],
        alpha: T,
        op: ElementWiseOperator,
        reduction_op: ElementWiseOperator,
        config: DispatchConfig,
    ) -> Result<(), TensorError> {
        if op.arity() != inputs.len() {
            return Err(TensorError::ArityMismatch {
                op: op.name(),
                expected: op.arity(),
                actual: inputs.len(),
            });
        }
        let plan = self.negotiate_with(inputs)?;
        if plan.is_reducing() {
            if !reduction_op.is_reduction() {
                return Err(TensorError::NotAReduction {
                    op: reduction_op.name(),
                });
            }
            self.check_not_an_input(inputs);
        }

        if config.fuse_linear_algebra {
            if let Some(pattern) = classify_fused_pattern(op, reduction_op, &plan) {
                tracing::debug!(?pattern, %op, "fused linear-algebra path");
                return self.run_fused(pattern, beta, inputs, alpha, &plan);
            }
        }

        let sobs: SmallVec<[&Matrix<T>; 4]> = inputs.iter().map(|v| v.sob().as_ref()).collect();
        GenericBackend::tensor_op(beta, &sobs, self.sob(), alpha, op, reduction_op, &plan)
    }

    fn negotiate_with(&self, inputs: &[&TensorView<T>]) -> Result<BroadcastPlan, TensorError> {
        let shapes: SmallVec<[TensorShape; 5]> = inputs
            .iter()
            .map(|v| v.shape().clone())
            .chain(std::iter::once(self.shape().clone()))
            .collect();
        negotiate(&shapes)
    }

    // accumulating into a tensor that is also read as fan-in is undefined
    fn check_not_an_input(&self, inputs: &[&TensorView<T>]) {
        if let Some(i) = inputs.iter().position(|v| v.is_same_object(self)) {
            panic!(
                "logic error: reducing operation: output {} must not be an input (operand {i})",
                self.shape()
            );
        }
    }

    fn run_fused(
        &self,
        pattern: FusedPattern,
        beta: T,
        inputs: &[&TensorView<T>],
        alpha: T,
        plan: &BroadcastPlan,
    ) -> Result<(), TensorError> {
        let off = &plan.offsets;
        match pattern {
            FusedPattern::DotProduct => {
                let reduced = plan.reduction_size();
                let remaining = plan.regular_size();
                let a = plan_matrix(inputs[0], reduced, remaining, off[0])?;
                let b = plan_matrix(inputs[1], reduced, remaining, off[1])?;
                let c = plan_matrix(self, 1, remaining, off[2])?;
                GenericBackend::inner_product(beta, &a, &b, alpha, &c, true)
            }
            FusedPattern::DotProductGradient { a_is_weight } => {
                let (data, weight) = if a_is_weight { (1, 0) } else { (0, 1) };
                let dims = &plan.regular_op_dims;
                // the weight is broadcast down the first axis
                let height = dims.first().copied().unwrap_or(1);
                let width = dims.get(1).copied().unwrap_or(1);
                let d = plan_matrix(inputs[data], height, width, off[data])?;
                let w = plan_matrix(inputs[weight], 1, width, off[weight])?;
                let c = plan_matrix(self, height, width, off[2])?;
                GenericBackend::columnwise_scale_and_weighted_add(alpha, &d, &w, beta, &c)
            }
        }
    }

    /// Fill from a generator opcode (`ConstZero`, `ConstOne`).
    pub fn do_nullary_op_of(
        &self,
        beta: T,
        alpha: T,
        op: ElementWiseOperator,
        reduction_op: ElementWiseOperator,
    ) -> Result<(), TensorError> {
        self.dispatch(beta, &[], alpha, op, reduction_op, DispatchConfig::default())
    }

    /// `self = beta * self + alpha * reduce(op(a))`.
    ///
    /// # Example
    ///
    /// ```
    /// use tensorview::{ElementWiseOperator, TensorView};
    ///
    /// // sum each row of a [2 x 3] matrix into a [2 x 1] column
    /// let a = TensorView::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]).unwrap();
    /// let c = TensorView::zeros(&[2, 1]);
    /// c.do_unary_op_of(0.0, &a, 1.0, ElementWiseOperator::Copy, ElementWiseOperator::Sum)
    ///     .unwrap();
    /// assert_eq!(c.to_vec(), vec![9.0, 12.0]);
    /// ```
    pub fn do_unary_op_of(
        &self,
        beta: T,
        a: &TensorView<T>,
        alpha: T,
        op: ElementWiseOperator,
        reduction_op: ElementWiseOperator,
    ) -> Result<(), TensorError> {
        self.dispatch(beta, &[a], alpha, op, reduction_op, DispatchConfig::default())
    }

    /// `self = beta * self + alpha * reduce(op(a, b))`.
    pub fn do_binary_op_of(
        &self,
        beta: T,
        a: &TensorView<T>,
        b: &TensorView<T>,
        alpha: T,
        op: ElementWiseOperator,
        reduction_op: ElementWiseOperator,
    ) -> Result<(), TensorError> {
        self.do_binary_op_with(beta, a, b, alpha, op, reduction_op, DispatchConfig::default())
    }

    /// [`do_binary_op_of`](Self::do_binary_op_of) with explicit options.
    #[allow(clippy::too_many_arguments)]
    pub fn do_binary_op_with(
        &self,
        beta: T,
        a: &TensorView<T>,
        b: &TensorView<T>,
        alpha: T,
        op: ElementWiseOperator,
        reduction_op: ElementWiseOperator,
        config: DispatchConfig,
    ) -> Result<(), TensorError> {
        self.dispatch(beta, &[a, b], alpha, op, reduction_op, config)
    }

    /// `self = beta * self + alpha * reduce(op(a, b, c))`.
    #[allow(clippy::too_many_arguments)]
    pub fn do_ternary_op_of(
        &self,
        beta: T,
        a: &TensorView<T>,
        b: &TensorView<T>,
        c: &TensorView<T>,
        alpha: T,
        op: ElementWiseOperator,
        reduction_op: ElementWiseOperator,
    ) -> Result<(), TensorError> {
        self.dispatch(beta, &[a, b, c], alpha, op, reduction_op, DispatchConfig::default())
    }

    /// `self = beta * self + alpha * reduce(op(a, b, c, d))`.
    #[allow(clippy::too_many_arguments)]
    pub fn do_quaternary_op_of(
        &self,
        beta: T,
        a: &TensorView<T>,
        b: &TensorView<T>,
        c: &TensorView<T>,
        d: &TensorView<T>,
        alpha: T,
        op: ElementWiseOperator,
        reduction_op: ElementWiseOperator,
    ) -> Result<(), TensorError> {
        self.dispatch(beta, &[a, b, c, d], alpha, op, reduction_op, DispatchConfig::default())
    }

    /// Write the position of the first maximum (`Max`) or minimum (`Min`)
    /// of `a` along the reduced axes.
    ///
    /// # Errors
    ///
    /// Returns `NotAReduction` for any other reduction operator.
    pub fn do_arg_reduction_op_of(
        &self,
        a: &TensorView<T>,
        reduction_op: ElementWiseOperator,
    ) -> Result<(), TensorError> {
        if !reduction_op.is_arg_reduction() {
            return Err(TensorError::NotAReduction {
                op: reduction_op.name(),
            });
        }
        let plan = self.negotiate_with(&[a])?;
        if plan.is_reducing() {
            self.check_not_an_input(&[a]);
        }
        GenericBackend::tensor_arg_op(a.sob(), self.sob(), reduction_op, &plan)
    }

    /// `self = a`, broadcasting or reducing (by summation) as needed.
    pub fn assign_copy_of(&self, a: &TensorView<T>) -> Result<(), TensorError> {
        self.do_copy_of(T::zero(), a, T::one())
    }

    /// `self = beta * self + alpha * a`.
    pub fn do_copy_of(&self, beta: T, a: &TensorView<T>, alpha: T) -> Result<(), TensorError> {
        self.do_unary_op_of(beta, a, alpha, ElementWiseOperator::Copy, ElementWiseOperator::Sum)
    }

    /// `self = a + b`.
    pub fn assign_sum_of(&self, a: &TensorView<T>, b: &TensorView<T>) -> Result<(), TensorError> {
        self.assign_binary(a, b, ElementWiseOperator::Sum)
    }

    /// `self = a - b`.
    pub fn assign_difference_of(
        &self,
        a: &TensorView<T>,
        b: &TensorView<T>,
    ) -> Result<(), TensorError> {
        self.assign_binary(a, b, ElementWiseOperator::Difference)
    }

    /// `self = a .* b`, summed over reduced axes.
    pub fn assign_elementwise_product_of(
        &self,
        a: &TensorView<T>,
        b: &TensorView<T>,
    ) -> Result<(), TensorError> {
        self.assign_binary(a, b, ElementWiseOperator::ElementwiseProduct)
    }

    fn assign_binary(
        &self,
        a: &TensorView<T>,
        b: &TensorView<T>,
        op: ElementWiseOperator,
    ) -> Result<(), TensorError> {
        self.do_binary_op_of(T::zero(), a, b, T::one(), op, ElementWiseOperator::Sum)
    }
}
