//! Binary operators and their dispatch table.
use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;

use tidyframe_error::{FrameError, Result};

use crate::arrays::array::{Array, ArrayData};
use crate::arrays::compute::binary::{binary_map, checked_i64, scalar_binary_map, try_binary_map};
use crate::arrays::datatype::DataType;
use crate::arrays::scalar::{ScalarValue, cmp_i64_f64};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOperator {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    NotEq,
    Gt,
    GtEq,
    Lt,
    LtEq,
    And,
    Or,
}

impl BinaryOperator {
    pub const fn symbol(&self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Eq => "==",
            Self::NotEq => "!=",
            Self::Gt => ">",
            Self::GtEq => ">=",
            Self::Lt => "<",
            Self::LtEq => "<=",
            Self::And => "and",
            Self::Or => "or",
        }
    }

    /// Check a comparison result against this operator.
    ///
    /// None means the values are unordered (NaN), which only satisfies `!=`.
    fn accepts(&self, ord: Option<Ordering>) -> bool {
        match self {
            Self::Eq => ord == Some(Ordering::Equal),
            Self::NotEq => ord != Some(Ordering::Equal),
            Self::Gt => ord == Some(Ordering::Greater),
            Self::GtEq => matches!(ord, Some(Ordering::Greater | Ordering::Equal)),
            Self::Lt => ord == Some(Ordering::Less),
            Self::LtEq => matches!(ord, Some(Ordering::Less | Ordering::Equal)),
            _ => false,
        }
    }
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// Vectorized implementation backing one or more signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryKernel {
    /// Checked Int64 arithmetic.
    IntArith,
    /// Float64 arithmetic, integers are promoted.
    FloatArith,
    /// String concatenation of the display forms of both sides.
    Concat,
    CompareInt,
    CompareFloat,
    /// Exact comparison of an integer left side with a float right side.
    CompareIntFloat,
    CompareFloatInt,
    CompareUtf8,
    CompareBool,
    /// Value equality for columns holding mixed kinds.
    CompareAny,
    Logical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinarySignature {
    pub left: DataType,
    pub right: DataType,
    pub return_type: DataType,
}

impl BinarySignature {
    pub const fn new(left: DataType, right: DataType, return_type: DataType) -> Self {
        BinarySignature {
            left,
            right,
            return_type,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RawBinaryFunction {
    pub signature: BinarySignature,
    pub kernel: BinaryKernel,
}

impl RawBinaryFunction {
    pub const fn new(signature: BinarySignature, kernel: BinaryKernel) -> Self {
        RawBinaryFunction { signature, kernel }
    }
}

/// All implementations of a single operator.
#[derive(Debug, Clone, Copy)]
pub struct BinaryFunctionSet {
    pub op: BinaryOperator,
    pub functions: &'static [RawBinaryFunction],
}

use BinaryKernel as K;
use DataType::{Any, Boolean as B, Float64 as F, Int64 as I, Utf8 as U};

const fn f(left: DataType, right: DataType, ret: DataType, kernel: BinaryKernel) -> RawBinaryFunction {
    RawBinaryFunction::new(BinarySignature::new(left, right, ret), kernel)
}

const ADD_FUNCTIONS: &[RawBinaryFunction] = &[
    f(I, I, I, K::IntArith),
    f(F, F, F, K::FloatArith),
    f(I, F, F, K::FloatArith),
    f(F, I, F, K::FloatArith),
    f(U, U, U, K::Concat),
    f(U, I, U, K::Concat),
    f(U, F, U, K::Concat),
    f(U, B, U, K::Concat),
    f(I, U, U, K::Concat),
    f(F, U, U, K::Concat),
    f(B, U, U, K::Concat),
];

const ARITH_FUNCTIONS: &[RawBinaryFunction] = &[
    f(I, I, I, K::IntArith),
    f(F, F, F, K::FloatArith),
    f(I, F, F, K::FloatArith),
    f(F, I, F, K::FloatArith),
];

const DIV_FUNCTIONS: &[RawBinaryFunction] = &[
    f(F, F, F, K::FloatArith),
    f(I, I, F, K::FloatArith),
    f(I, F, F, K::FloatArith),
    f(F, I, F, K::FloatArith),
];

const COMPARISON_FUNCTIONS: &[RawBinaryFunction] = &[
    f(I, I, B, K::CompareInt),
    f(F, F, B, K::CompareFloat),
    f(I, F, B, K::CompareIntFloat),
    f(F, I, B, K::CompareFloatInt),
    f(U, U, B, K::CompareUtf8),
    f(B, B, B, K::CompareBool),
];

const EQUALITY_FUNCTIONS: &[RawBinaryFunction] = &[
    f(I, I, B, K::CompareInt),
    f(F, F, B, K::CompareFloat),
    f(I, F, B, K::CompareIntFloat),
    f(F, I, B, K::CompareFloatInt),
    f(U, U, B, K::CompareUtf8),
    f(B, B, B, K::CompareBool),
    f(Any, Any, B, K::CompareAny),
    f(Any, I, B, K::CompareAny),
    f(Any, F, B, K::CompareAny),
    f(Any, U, B, K::CompareAny),
    f(Any, B, B, K::CompareAny),
    f(I, Any, B, K::CompareAny),
    f(F, Any, B, K::CompareAny),
    f(U, Any, B, K::CompareAny),
    f(B, Any, B, K::CompareAny),
];

const LOGICAL_FUNCTIONS: &[RawBinaryFunction] = &[f(B, B, B, K::Logical)];

/// Dispatch table keyed by operator, then by (left, right) input types.
pub const BINARY_FUNCTIONS: &[BinaryFunctionSet] = &[
    BinaryFunctionSet {
        op: BinaryOperator::Add,
        functions: ADD_FUNCTIONS,
    },
    BinaryFunctionSet {
        op: BinaryOperator::Sub,
        functions: ARITH_FUNCTIONS,
    },
    BinaryFunctionSet {
        op: BinaryOperator::Mul,
        functions: ARITH_FUNCTIONS,
    },
    BinaryFunctionSet {
        op: BinaryOperator::Div,
        functions: DIV_FUNCTIONS,
    },
    BinaryFunctionSet {
        op: BinaryOperator::Eq,
        functions: EQUALITY_FUNCTIONS,
    },
    BinaryFunctionSet {
        op: BinaryOperator::NotEq,
        functions: EQUALITY_FUNCTIONS,
    },
    BinaryFunctionSet {
        op: BinaryOperator::Gt,
        functions: COMPARISON_FUNCTIONS,
    },
    BinaryFunctionSet {
        op: BinaryOperator::GtEq,
        functions: COMPARISON_FUNCTIONS,
    },
    BinaryFunctionSet {
        op: BinaryOperator::Lt,
        functions: COMPARISON_FUNCTIONS,
    },
    BinaryFunctionSet {
        op: BinaryOperator::LtEq,
        functions: COMPARISON_FUNCTIONS,
    },
    BinaryFunctionSet {
        op: BinaryOperator::And,
        functions: LOGICAL_FUNCTIONS,
    },
    BinaryFunctionSet {
        op: BinaryOperator::Or,
        functions: LOGICAL_FUNCTIONS,
    },
];

fn function_set(op: BinaryOperator) -> Result<&'static BinaryFunctionSet> {
    BINARY_FUNCTIONS
        .iter()
        .find(|set| set.op == op)
        .ok_or_else(|| FrameError::new("Missing function set").with_field("op", op))
}

fn no_signature(op: BinaryOperator, left: Option<DataType>, right: Option<DataType>) -> FrameError {
    let name = |dt: Option<DataType>| dt.map(|dt| dt.to_string()).unwrap_or("Null".to_string());
    FrameError::type_mismatch("No implementation of operator for input types")
        .with_field("op", op)
        .with_field("left", name(left))
        .with_field("right", name(right))
}

/// Find the implementation for the given input types.
///
/// A `None` type stands for a null literal and matches the first signature
/// compatible with the other side.
pub fn find_function(
    op: BinaryOperator,
    left: Option<DataType>,
    right: Option<DataType>,
) -> Result<&'static RawBinaryFunction> {
    let set = function_set(op)?;
    set.functions
        .iter()
        .find(|func| {
            left.is_none_or(|dt| dt == func.signature.left)
                && right.is_none_or(|dt| dt == func.signature.right)
        })
        .ok_or_else(|| no_signature(op, left, right))
}

/// Evaluate `op` over two arrays of equal length.
pub fn eval_binary(op: BinaryOperator, left: &Array, right: &Array) -> Result<Array> {
    let func = find_function(op, Some(left.datatype()), Some(right.datatype()))?;
    let ret = func.signature.return_type;

    match func.kernel {
        K::IntArith => {
            let (lv, rv) = (i64_values(left)?, i64_values(right)?);
            let checked: fn(i64, i64) -> Option<i64> = match op {
                BinaryOperator::Add => i64::checked_add,
                BinaryOperator::Sub => i64::checked_sub,
                BinaryOperator::Mul => i64::checked_mul,
                other => return Err(unexpected_kernel(other, func.kernel)),
            };
            let kernel = checked_i64(op.symbol(), checked);
            try_binary_map(left, lv, right, rv, ArrayData::Int64, kernel)
        }
        K::FloatArith => {
            let (lv, rv) = (f64_values(left)?, f64_values(right)?);
            let kernel: fn(&f64, &f64) -> f64 = match op {
                BinaryOperator::Add => |a, b| a + b,
                BinaryOperator::Sub => |a, b| a - b,
                BinaryOperator::Mul => |a, b| a * b,
                BinaryOperator::Div => |a, b| a / b,
                other => return Err(unexpected_kernel(other, func.kernel)),
            };
            binary_map(left, &lv[..], right, &rv[..], ArrayData::Float64, kernel)
        }
        K::Concat => scalar_binary_map(left, right, ret, |a, b| {
            Ok(ScalarValue::Utf8(format!("{a}{b}")))
        }),
        K::CompareInt => {
            let (lv, rv) = (i64_values(left)?, i64_values(right)?);
            binary_map(left, lv, right, rv, ArrayData::Boolean, |a, b| {
                op.accepts(Some(a.cmp(b)))
            })
        }
        K::CompareFloat => {
            let (lv, rv) = (f64_values(left)?, f64_values(right)?);
            binary_map(left, &lv[..], right, &rv[..], ArrayData::Boolean, |a, b| {
                op.accepts(a.partial_cmp(b))
            })
        }
        K::CompareIntFloat => {
            let (lv, rv) = (i64_values(left)?, f64_values(right)?);
            binary_map(left, lv, right, &rv[..], ArrayData::Boolean, |a, b| {
                op.accepts(cmp_i64_f64(*a, *b))
            })
        }
        K::CompareFloatInt => {
            let (lv, rv) = (f64_values(left)?, i64_values(right)?);
            binary_map(left, &lv[..], right, rv, ArrayData::Boolean, |a, b| {
                op.accepts(cmp_i64_f64(*b, *a).map(Ordering::reverse))
            })
        }
        K::CompareUtf8 => {
            let (lv, rv) = (utf8_values(left)?, utf8_values(right)?);
            binary_map(left, lv, right, rv, ArrayData::Boolean, |a, b| {
                op.accepts(Some(a.cmp(b)))
            })
        }
        K::CompareBool => {
            let (lv, rv) = (bool_values(left)?, bool_values(right)?);
            binary_map(left, lv, right, rv, ArrayData::Boolean, |a, b| {
                op.accepts(Some(a.cmp(b)))
            })
        }
        K::CompareAny => scalar_binary_map(left, right, ret, |a, b| {
            Ok(ScalarValue::Boolean(op.accepts(Some(a.total_cmp(b)))))
        }),
        K::Logical => {
            let (lv, rv) = (bool_values(left)?, bool_values(right)?);
            let kernel: fn(&bool, &bool) -> bool = match op {
                BinaryOperator::And => |a, b| *a && *b,
                BinaryOperator::Or => |a, b| *a || *b,
                other => return Err(unexpected_kernel(other, func.kernel)),
            };
            binary_map(left, lv, right, rv, ArrayData::Boolean, kernel)
        }
    }
}

fn unexpected_kernel(op: BinaryOperator, kernel: BinaryKernel) -> FrameError {
    FrameError::new("Operator dispatched to unexpected kernel")
        .with_field("op", op)
        .with_field("kernel", format!("{kernel:?}"))
}

fn wrong_physical(want: DataType, array: &Array) -> FrameError {
    FrameError::new("Unexpected physical type for kernel")
        .with_field("want", want)
        .with_field("got", array.datatype())
}

fn i64_values(array: &Array) -> Result<&[i64]> {
    match array.data() {
        ArrayData::Int64(v) => Ok(v),
        _ => Err(wrong_physical(DataType::Int64, array)),
    }
}

fn bool_values(array: &Array) -> Result<&[bool]> {
    match array.data() {
        ArrayData::Boolean(v) => Ok(v),
        _ => Err(wrong_physical(DataType::Boolean, array)),
    }
}

fn utf8_values(array: &Array) -> Result<&[String]> {
    match array.data() {
        ArrayData::Utf8(v) => Ok(v),
        _ => Err(wrong_physical(DataType::Utf8, array)),
    }
}

/// Float values, widening integers.
fn f64_values(array: &Array) -> Result<Cow<'_, [f64]>> {
    match array.data() {
        ArrayData::Float64(v) => Ok(Cow::Borrowed(v)),
        ArrayData::Int64(v) => Ok(Cow::Owned(v.iter().map(|v| *v as f64).collect())),
        _ => Err(wrong_physical(DataType::Float64, array)),
    }
}

#[cfg(test)]
mod tests {
    use tidyframe_error::ErrorKind;

    use super::*;

    #[test]
    fn every_operator_has_a_set() {
        for op in [
            BinaryOperator::Add,
            BinaryOperator::Sub,
            BinaryOperator::Mul,
            BinaryOperator::Div,
            BinaryOperator::Eq,
            BinaryOperator::NotEq,
            BinaryOperator::Gt,
            BinaryOperator::GtEq,
            BinaryOperator::Lt,
            BinaryOperator::LtEq,
            BinaryOperator::And,
            BinaryOperator::Or,
        ] {
            function_set(op).unwrap();
        }
    }

    #[test]
    fn int_arith_and_promotion() {
        let a = Array::from_iter([Some(23_i64), None, Some(12)]);
        let b = Array::from_iter([3_i64, 3, 3]);
        assert_eq!(
            Array::from_iter([Some(26_i64), None, Some(15)]),
            eval_binary(BinaryOperator::Add, &a, &b).unwrap()
        );

        let c = Array::from_iter([0.5, 0.5, 0.5]);
        assert_eq!(
            Array::from_iter([Some(23.5), None, Some(12.5)]),
            eval_binary(BinaryOperator::Add, &a, &c).unwrap()
        );
    }

    #[test]
    fn division_is_float() {
        let a = Array::from_iter([1_i64, 1, 0]);
        let b = Array::from_iter([2_i64, 0, 0]);
        let got = eval_binary(BinaryOperator::Div, &a, &b).unwrap();
        assert_eq!(DataType::Float64, got.datatype());
        assert_eq!(ScalarValue::Float64(0.5), got.get(0).unwrap());
        assert_eq!(ScalarValue::Float64(f64::INFINITY), got.get(1).unwrap());
        let ScalarValue::Float64(nan) = got.get(2).unwrap() else {
            panic!("expected float")
        };
        assert!(nan.is_nan());
    }

    #[test]
    fn overflow() {
        let a = Array::from_iter([i64::MAX]);
        let b = Array::from_iter([2_i64]);
        let err = eval_binary(BinaryOperator::Mul, &a, &b).unwrap_err();
        assert_eq!(ErrorKind::NumericOverflow, err.kind());
    }

    #[test]
    fn concat_mixed() {
        let a = Array::from_iter([Some("age: "), None]);
        let b = Array::from_iter([23_i64, 12]);
        assert_eq!(
            Array::from_iter([Some("age: 23"), None]),
            eval_binary(BinaryOperator::Add, &a, &b).unwrap()
        );
        assert_eq!(
            Array::from_iter([Some("23age: "), None]),
            eval_binary(BinaryOperator::Add, &b, &a).unwrap()
        );
    }

    #[test]
    fn comparison_null_is_null() {
        let a = Array::from_iter([Some(1.0), None, Some(f64::NAN)]);
        let b = Array::from_iter([1_i64, 1, 1]);
        assert_eq!(
            Array::from_iter([Some(true), None, Some(false)]),
            eval_binary(BinaryOperator::Eq, &a, &b).unwrap()
        );
        assert_eq!(
            Array::from_iter([Some(false), None, Some(true)]),
            eval_binary(BinaryOperator::NotEq, &a, &b).unwrap()
        );
    }

    #[test]
    fn int_float_comparison_is_exact() {
        let ints = Array::from_iter([9_007_199_254_740_993_i64, 9_007_199_254_740_992, 2]);
        let floats = Array::from_iter([9_007_199_254_740_992.0, 9_007_199_254_740_992.0, 2.5]);
        assert_eq!(
            Array::from_iter([false, true, false]),
            eval_binary(BinaryOperator::Eq, &ints, &floats).unwrap()
        );
        assert_eq!(
            Array::from_iter([true, false, false]),
            eval_binary(BinaryOperator::Gt, &ints, &floats).unwrap()
        );
        assert_eq!(
            Array::from_iter([true, false, true]),
            eval_binary(BinaryOperator::Lt, &floats, &ints).unwrap()
        );
    }

    #[test]
    fn any_equality_only() {
        let any = Array::from_scalars_inferred(vec![1.into(), "a".into(), ScalarValue::Null]);
        let b = Array::from_iter(["a", "a", "a"]);
        assert_eq!(
            Array::from_iter([Some(false), Some(true), None]),
            eval_binary(BinaryOperator::Eq, &any, &b).unwrap()
        );

        let err = eval_binary(BinaryOperator::Add, &any, &b).unwrap_err();
        assert_eq!(ErrorKind::TypeMismatch, err.kind());
        let err = eval_binary(BinaryOperator::Lt, &any, &b).unwrap_err();
        assert_eq!(ErrorKind::TypeMismatch, err.kind());
    }

    #[test]
    fn logical_strict_nulls() {
        let a = Array::from_iter([Some(true), Some(false), None]);
        let b = Array::from_iter([Some(true), None, Some(false)]);
        assert_eq!(
            Array::from_iter([Some(true), None, None]),
            eval_binary(BinaryOperator::And, &a, &b).unwrap()
        );
    }

    #[test]
    fn mismatched_types() {
        let a = Array::from_iter([true]);
        let b = Array::from_iter([1_i64]);
        let err = eval_binary(BinaryOperator::Sub, &a, &b).unwrap_err();
        assert_eq!(ErrorKind::TypeMismatch, err.kind());
        assert_eq!(Some("-"), err.get_field("op"));
    }

    #[test]
    fn null_literal_signature() {
        let func = find_function(BinaryOperator::Div, None, Some(DataType::Int64)).unwrap();
        assert_eq!(DataType::Float64, func.signature.return_type);
        let func = find_function(BinaryOperator::Add, Some(DataType::Utf8), None).unwrap();
        assert_eq!(DataType::Utf8, func.signature.return_type);
        assert!(find_function(BinaryOperator::And, Some(DataType::Int64), None).is_err());
    }
}
