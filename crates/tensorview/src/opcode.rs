//! Elementwise operator vocabulary and the name lookup table.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use crate::error::TensorError;

macro_rules! element_wise_operators {
    ($($arity:literal => [$($name:ident),* $(,)?]),* $(,)?) => {
        /// Closed set of elementwise operators understood by the kernels.
        ///
        /// The same enum names reduction operators (`Sum`, `Max`, `Min`,
        /// `LogSum`, `ElementwiseProduct`) when passed as the reduction opcode.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum ElementWiseOperator {
            $($($name,)*)*
        }

        /// Every operator with its canonical name.
        static OPERATORS: &[(&str, ElementWiseOperator)] = &[
            $($((stringify!($name), ElementWiseOperator::$name),)*)*
        ];

        impl ElementWiseOperator {
            /// Canonical (case-sensitive) name.
            pub fn name(self) -> &'static str {
                match self {
                    $($(ElementWiseOperator::$name => stringify!($name),)*)*
                }
            }

            /// Number of inputs the operator consumes.
            pub fn arity(self) -> usize {
                match self {
                    $($(ElementWiseOperator::$name => $arity,)*)*
                }
            }
        }
    };
}

element_wise_operators! {
    0 => [ConstZero, ConstOne],
    1 => [
        Copy, Negate, Not, Abs, Floor, Reciprocal, Sigmoid, Tanh, Sqr, Sqrt,
        Exp, Log, LinearRectifier, Cosine, Sin,
    ],
    2 => [
        Sum, Difference, ElementwiseProduct, ElementwiseQuotient, LogSum, Pow,
        Max, Min, Equal, NotEqual, Greater, Less, GreaterEqual, LessEqual,
        And, Or, Xor,
        ElementwiseProductWithSigmoidDerivativeFromOutput,
        ElementwiseProductWithTanhDerivativeFromOutput,
        ElementwiseProductWithLinearRectifierDerivativeFromOutput,
    ],
    3 => [Cond, CopyIfEqual, Clip, AxBplusC],
    4 => [AxBplusCxD],
}

static NAME_TO_OP: LazyLock<HashMap<&'static str, ElementWiseOperator>> =
    LazyLock::new(|| OPERATORS.iter().copied().collect());

impl ElementWiseOperator {
    /// Look up an operator by name.
    ///
    /// # Errors
    ///
    /// Returns `UnknownOperation` if the name is not in the table. There is
    /// no default fallback.
    ///
    /// # Example
    ///
    /// ```
    /// use tensorview::ElementWiseOperator;
    ///
    /// let op = ElementWiseOperator::from_name("ElementwiseProduct").unwrap();
    /// assert_eq!(op, ElementWiseOperator::ElementwiseProduct);
    /// assert!(ElementWiseOperator::from_name("elementwiseproduct").is_err());
    /// ```
    pub fn from_name(name: &str) -> Result<Self, TensorError> {
        NAME_TO_OP
            .get(name)
            .copied()
            .ok_or_else(|| TensorError::UnknownOperation { name: name.to_string() })
    }

    /// All operators, in declaration order.
    pub fn all() -> impl Iterator<Item = ElementWiseOperator> {
        OPERATORS.iter().map(|&(_, op)| op)
    }

    /// Whether this operator can combine accumulated terms of a reduction.
    pub fn is_reduction(self) -> bool {
        matches!(
            self,
            ElementWiseOperator::Sum
                | ElementWiseOperator::Max
                | ElementWiseOperator::Min
                | ElementWiseOperator::LogSum
                | ElementWiseOperator::ElementwiseProduct
        )
    }

    /// Whether this operator selects an index in an argument reduction.
    pub fn is_arg_reduction(self) -> bool {
        matches!(self, ElementWiseOperator::Max | ElementWiseOperator::Min)
    }
}

impl FromStr for ElementWiseOperator {
    type Err = TensorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s)
    }
}

impl fmt::Display for ElementWiseOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
