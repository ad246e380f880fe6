//! Scalar semantics of the elementwise and reduction operators.

use crate::opcode::ElementWiseOperator;
use crate::scalar::Scalar;

#[inline]
fn flag<T: Scalar>(b: bool) -> T {
    if b { T::one() } else { T::zero() }
}

#[inline]
fn truthy<T: Scalar>(x: T) -> bool {
    x != T::zero()
}

#[inline]
fn via_f64<T: Scalar>(x: T, f: impl FnOnce(f64) -> f64) -> T {
    T::from_f64(f(x.to_f64()))
}

#[inline]
fn max<T: Scalar>(a: T, b: T) -> T {
    if a > b { a } else { b }
}

#[inline]
fn min<T: Scalar>(a: T, b: T) -> T {
    if a < b { a } else { b }
}

fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// `log(exp(a) + exp(b))` without overflow.
fn log_add(a: f64, b: f64) -> f64 {
    let (hi, lo) = if a > b { (a, b) } else { (b, a) };
    if lo == f64::NEG_INFINITY {
        return hi;
    }
    hi + (lo - hi).exp().ln_1p()
}

/// Evaluate `op` on one set of input values.
///
/// `args` holds exactly `op.arity()` values.
pub fn apply<T: Scalar>(op: ElementWiseOperator, args: &[T]) -> T {
    use ElementWiseOperator::*;
    debug_assert_eq!(args.len(), op.arity(), "{op} called with {} arguments", args.len());
    match op {
        ConstZero => T::zero(),
        ConstOne => T::one(),

        Copy => args[0],
        Negate => -args[0],
        Not => flag(!truthy(args[0])),
        Abs => {
            if args[0] < T::zero() { -args[0] } else { args[0] }
        }
        Floor => via_f64(args[0], f64::floor),
        Reciprocal => {
            if args[0] == T::zero() { T::zero() } else { T::one() / args[0] }
        }
        Sigmoid => via_f64(args[0], sigmoid),
        Tanh => via_f64(args[0], f64::tanh),
        Sqr => args[0] * args[0],
        Sqrt => via_f64(args[0], |x| x.max(0.0).sqrt()),
        Exp => via_f64(args[0], f64::exp),
        Log => via_f64(args[0], f64::ln),
        LinearRectifier => max(args[0], T::zero()),
        Cosine => via_f64(args[0], f64::cos),
        Sin => via_f64(args[0], f64::sin),

        Sum => args[0] + args[1],
        Difference => args[0] - args[1],
        ElementwiseProduct => args[0] * args[1],
        ElementwiseQuotient => args[0] / args[1],
        LogSum => T::from_f64(log_add(args[0].to_f64(), args[1].to_f64())),
        Pow => T::from_f64(args[0].to_f64().powf(args[1].to_f64())),
        Max => max(args[0], args[1]),
        Min => min(args[0], args[1]),
        Equal => flag(args[0] == args[1]),
        NotEqual => flag(args[0] != args[1]),
        Greater => flag(args[0] > args[1]),
        Less => flag(args[0] < args[1]),
        GreaterEqual => flag(args[0] >= args[1]),
        LessEqual => flag(args[0] <= args[1]),
        And => flag(truthy(args[0]) && truthy(args[1])),
        Or => flag(truthy(args[0]) || truthy(args[1])),
        Xor => flag(truthy(args[0]) != truthy(args[1])),
        ElementwiseProductWithSigmoidDerivativeFromOutput => {
            args[0] * args[1] * (T::one() - args[1])
        }
        ElementwiseProductWithTanhDerivativeFromOutput => {
            args[0] * (T::one() - args[1] * args[1])
        }
        ElementwiseProductWithLinearRectifierDerivativeFromOutput => {
            if args[1] > T::zero() { args[0] } else { T::zero() }
        }

        // condition, value-if-true, value-if-false
        Cond => {
            if truthy(args[0]) { args[1] } else { args[2] }
        }
        CopyIfEqual => {
            if args[0] == args[1] { args[2] } else { T::zero() }
        }
        // lower bound, upper bound, value
        Clip => {
            if args[2] < args[0] {
                args[0]
            } else if args[2] > args[1] {
                args[1]
            } else {
                args[2]
            }
        }
        AxBplusC => args[0] * args[1] + args[2],

        AxBplusCxD => args[0] * args[1] + args[2] * args[3],
    }
}

/// Starting value of an accumulation with `reduction_op`.
///
/// Only meaningful for operators where `is_reduction()` holds.
pub fn reduction_identity<T: Scalar>(reduction_op: ElementWiseOperator) -> T {
    match reduction_op {
        ElementWiseOperator::ElementwiseProduct => T::one(),
        ElementWiseOperator::Max | ElementWiseOperator::LogSum => T::from_f64(f64::NEG_INFINITY),
        ElementWiseOperator::Min => T::from_f64(f64::INFINITY),
        _ => T::zero(),
    }
}

/// Fold one more term into an accumulator.
#[inline]
pub fn reduce<T: Scalar>(reduction_op: ElementWiseOperator, acc: T, value: T) -> T {
    apply(reduction_op, &[acc, value])
}
