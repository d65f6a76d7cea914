//! Expressions evaluated against a table.
//!
//! Expressions are built with the free functions in this module, e.g.
//! `add(col("age"), lit(3))`, and evaluate to either a single value or one
//! value per row.
pub mod binary;
pub mod predicate;
pub mod row;
pub mod strings;

use std::fmt;

use tidyframe_error::{ErrorKind, FrameError, Result};

use self::binary::{BinaryOperator, eval_binary, find_function};
use self::row::{RowFn, ValueFn};
use self::strings::{StringFunction, compile_regex};
use crate::aggregate::AggregateExpr;
use crate::arrays::array::{Array, ArrayData};
use crate::arrays::compute::strings::map_non_null as map_values;
use crate::arrays::datatype::DataType;
use crate::arrays::row::RowContext;
use crate::arrays::scalar::ScalarValue;
use crate::arrays::table::Table;

#[derive(Debug, Clone)]
pub enum Expression {
    Column(String),
    Literal(ScalarValue),
    Binary {
        op: BinaryOperator,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Not(Box<Expression>),
    Negate(Box<Expression>),
    IsNull(Box<Expression>),
    IsNotNull(Box<Expression>),
    /// Reduces a column to a single value, broadcast where a column is
    /// needed.
    Aggregate(AggregateExpr),
    StringFunction {
        function: StringFunction,
        input: Box<Expression>,
    },
    /// Apply a function to the non-null values of the input, keeping nulls.
    MapNonNull {
        function: ValueFn,
        output: DataType,
        input: Box<Expression>,
    },
    /// Zero based position of each row.
    RowNumber,
    RowWise(RowFn),
}

/// Result of evaluating an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Datum {
    Scalar(ScalarValue),
    Array(Array),
}

impl Datum {
    /// Type of the result. None for a null scalar.
    pub fn datatype(&self) -> Option<DataType> {
        match self {
            Datum::Scalar(v) => v.datatype(),
            Datum::Array(arr) => Some(arr.datatype()),
        }
    }

    /// Get an array of `len` rows, broadcasting a scalar.
    ///
    /// A null scalar becomes a null array of `null_type`. Errors with
    /// `LengthMismatch` if an array result has the wrong length.
    pub fn into_array(self, len: usize, null_type: DataType) -> Result<Array> {
        match self {
            Datum::Scalar(v) => Ok(Array::repeat_scalar(&v, null_type, len)),
            Datum::Array(arr) if arr.len() == len => Ok(arr),
            Datum::Array(arr) => Err(FrameError::length_mismatch(len, arr.len())),
        }
    }
}

/// An expression with an output column name.
#[derive(Debug, Clone)]
pub struct NamedExpr {
    pub name: String,
    pub expr: Expression,
}

impl Expression {
    pub fn alias(self, name: impl Into<String>) -> NamedExpr {
        NamedExpr {
            name: name.into(),
            expr: self,
        }
    }

    /// Evaluate against every row of `table`.
    pub fn evaluate(&self, table: &Table) -> Result<Datum> {
        Ok(match self {
            Self::Column(name) => Datum::Array(table.column(name)?.array().clone()),
            Self::Literal(v) => Datum::Scalar(v.clone()),
            Self::Binary { op, left, right } => {
                let left = left.evaluate(table)?;
                let right = right.evaluate(table)?;
                eval_binary_datums(*op, left, right)?
            }
            Self::Not(input) => match input.evaluate(table)? {
                Datum::Scalar(v) => Datum::Scalar(v.try_as_bool()?.map(|v| !v).into()),
                Datum::Array(arr) => Datum::Array(not_array(&arr)?),
            },
            Self::Negate(input) => match input.evaluate(table)? {
                Datum::Scalar(v) => Datum::Scalar(negate_scalar(&v)?),
                Datum::Array(arr) => Datum::Array(negate_array(&arr)?),
            },
            Self::IsNull(input) => is_null_datum(input.evaluate(table)?, true),
            Self::IsNotNull(input) => is_null_datum(input.evaluate(table)?, false),
            Self::Aggregate(agg) => Datum::Scalar(agg.evaluate(table)?),
            Self::StringFunction { function, input } => match input.evaluate(table)? {
                Datum::Scalar(v) => Datum::Scalar(function.apply_scalar(&v)?),
                Datum::Array(arr) => Datum::Array(function.apply_array(&arr)?),
            },
            Self::MapNonNull {
                function,
                output,
                input,
            } => {
                let f = |v| function.call(v);
                match input.evaluate(table)? {
                    Datum::Scalar(v) => {
                        let single = Array::repeat_scalar(&v, *output, 1);
                        Datum::Scalar(map_values(&single, *output, f)?.get(0)?)
                    }
                    Datum::Array(arr) => Datum::Array(map_values(&arr, *output, f)?),
                }
            }
            Self::RowNumber => Datum::Array((0..table.num_rows() as i64).collect()),
            Self::RowWise(f) => Datum::Array(f.evaluate(table)?),
        })
    }

    /// Output type when it can be known without evaluating.
    ///
    /// None when the type depends on the values produced (row-wise functions
    /// and null literals).
    pub fn datatype(&self, table: &Table) -> Result<Option<DataType>> {
        Ok(match self {
            Self::Column(name) => Some(table.column_kind(name)?),
            Self::Literal(v) => v.datatype(),
            Self::Binary { op, left, right } => {
                match (left.datatype(table)?, right.datatype(table)?) {
                    (Some(l), Some(r)) => {
                        Some(find_function(*op, Some(l), Some(r))?.signature.return_type)
                    }
                    _ => None,
                }
            }
            Self::Not(_) | Self::IsNull(_) | Self::IsNotNull(_) => Some(DataType::Boolean),
            Self::Negate(input) => input.datatype(table)?,
            Self::Aggregate(agg) => Some(agg.return_type(table)?),
            Self::StringFunction { function, .. } => Some(function.return_type()),
            Self::MapNonNull { output, .. } => Some(*output),
            Self::RowNumber => Some(DataType::Int64),
            Self::RowWise(_) => None,
        })
    }

    /// Column names referenced by this expression. Row-wise functions are
    /// opaque and reference nothing.
    pub fn referenced_columns(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::Column(name) => out.push(name),
            Self::Aggregate(agg) => out.push(&agg.column),
            Self::Binary { left, right, .. } => {
                left.collect_columns(out);
                right.collect_columns(out);
            }
            Self::Not(input)
            | Self::Negate(input)
            | Self::IsNull(input)
            | Self::IsNotNull(input)
            | Self::StringFunction { input, .. }
            | Self::MapNonNull { input, .. } => input.collect_columns(out),
            Self::Literal(_) | Self::RowNumber | Self::RowWise(_) => (),
        }
    }
}

fn eval_binary_datums(op: BinaryOperator, left: Datum, right: Datum) -> Result<Datum> {
    let is_null = |d: &Datum| matches!(d, Datum::Scalar(ScalarValue::Null));
    if is_null(&left) || is_null(&right) {
        // Still validate the operand types, then produce nulls of the
        // operator's natural output type.
        let ret = find_function(op, left.datatype(), right.datatype())?
            .signature
            .return_type;
        return Ok(match (left, right) {
            (Datum::Array(arr), _) | (_, Datum::Array(arr)) => {
                Datum::Array(Array::new_null(ret, arr.len()))
            }
            _ => Datum::Scalar(ScalarValue::Null),
        });
    }

    Ok(match (left, right) {
        (Datum::Array(left), Datum::Array(right)) => Datum::Array(eval_binary(op, &left, &right)?),
        (Datum::Array(left), Datum::Scalar(right)) => {
            let right = Array::repeat_scalar(&right, left.datatype(), left.len());
            Datum::Array(eval_binary(op, &left, &right)?)
        }
        (Datum::Scalar(left), Datum::Array(right)) => {
            let left = Array::repeat_scalar(&left, right.datatype(), right.len());
            Datum::Array(eval_binary(op, &left, &right)?)
        }
        (Datum::Scalar(left), Datum::Scalar(right)) => {
            let left = Array::repeat_scalar(&left, DataType::Any, 1);
            let right = Array::repeat_scalar(&right, DataType::Any, 1);
            Datum::Scalar(eval_binary(op, &left, &right)?.get(0)?)
        }
    })
}

fn not_array(arr: &Array) -> Result<Array> {
    let ArrayData::Boolean(values) = arr.data() else {
        return Err(FrameError::type_mismatch("Expected a boolean column")
            .with_field("op", "not")
            .with_field("datatype", arr.datatype()));
    };
    Ok(Array {
        validity: arr.validity.clone(),
        data: ArrayData::Boolean(values.iter().map(|v| !v).collect()),
    })
}

fn negate_scalar(v: &ScalarValue) -> Result<ScalarValue> {
    match v {
        ScalarValue::Null => Ok(ScalarValue::Null),
        ScalarValue::Int64(v) => Ok(ScalarValue::Int64(checked_neg(*v)?)),
        ScalarValue::Float64(v) => Ok(ScalarValue::Float64(-v)),
        other => Err(FrameError::type_mismatch("Cannot negate a non-numeric value")
            .with_field("value", other)),
    }
}

fn checked_neg(v: i64) -> Result<i64> {
    v.checked_neg().ok_or_else(|| {
        FrameError::with_kind(ErrorKind::NumericOverflow, "Integer overflow")
            .with_field("op", "negate")
            .with_field("value", v)
    })
}

fn negate_array(arr: &Array) -> Result<Array> {
    let data = match arr.data() {
        ArrayData::Int64(values) => ArrayData::Int64(
            values
                .iter()
                .enumerate()
                .map(|(idx, v)| if arr.is_valid(idx) { checked_neg(*v) } else { Ok(0) })
                .collect::<Result<_>>()?,
        ),
        ArrayData::Float64(values) => ArrayData::Float64(values.iter().map(|v| -v).collect()),
        other => {
            return Err(FrameError::type_mismatch("Cannot negate a non-numeric column")
                .with_field("datatype", other.datatype()));
        }
    };
    Ok(Array {
        validity: arr.validity.clone(),
        data,
    })
}

fn is_null_datum(datum: Datum, want_null: bool) -> Datum {
    match datum {
        Datum::Scalar(v) => Datum::Scalar(ScalarValue::Boolean(v.is_null() == want_null)),
        Datum::Array(arr) => Datum::Array(
            (0..arr.len())
                .map(|idx| arr.is_valid(idx) != want_null)
                .collect(),
        ),
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Column(name) => write!(f, "{name}"),
            Self::Literal(ScalarValue::Utf8(s)) => write!(f, "'{s}'"),
            Self::Literal(v) => write!(f, "{v}"),
            Self::Binary { op, left, right } => write!(f, "({left} {op} {right})"),
            Self::Not(input) => write!(f, "not({input})"),
            Self::Negate(input) => write!(f, "-{input}"),
            Self::IsNull(input) => write!(f, "is_null({input})"),
            Self::IsNotNull(input) => write!(f, "is_not_null({input})"),
            Self::Aggregate(agg) => write!(f, "{}({})", agg.function, agg.column),
            Self::StringFunction { function, input } => write!(f, "{function}({input})"),
            Self::MapNonNull { input, .. } => write!(f, "map_non_null({input})"),
            Self::RowNumber => write!(f, "row_number()"),
            Self::RowWise(_) => write!(f, "<row fn>"),
        }
    }
}

impl From<ScalarValue> for Expression {
    fn from(value: ScalarValue) -> Self {
        Expression::Literal(value)
    }
}

impl From<AggregateExpr> for Expression {
    fn from(agg: AggregateExpr) -> Self {
        Expression::Aggregate(agg)
    }
}

impl From<RowFn> for Expression {
    fn from(f: RowFn) -> Self {
        Expression::RowWise(f)
    }
}

macro_rules! impl_literal_from {
    ($($native:ty),*) => {
        $(
            impl From<$native> for Expression {
                fn from(value: $native) -> Self {
                    Expression::Literal(value.into())
                }
            }
        )*
    };
}

impl_literal_from!(bool, i32, i64, f64);

/// Reference a column by name.
pub fn col(name: impl Into<String>) -> Expression {
    Expression::Column(name.into())
}

/// A constant value.
pub fn lit(value: impl Into<ScalarValue>) -> Expression {
    Expression::Literal(value.into())
}

/// The zero based position of each row.
pub fn row_number() -> Expression {
    Expression::RowNumber
}

/// Evaluate `f` once per row.
pub fn row_wise<F>(f: F) -> Expression
where
    F: Fn(&RowContext<'_>) -> Result<ScalarValue> + Send + Sync + 'static,
{
    Expression::RowWise(RowFn::new(f))
}

/// Apply `f` to every non-null value of `input`, producing values of kind
/// `output`. Nulls pass through without calling `f`, and `f` may return null.
///
/// Errors with `TypeMismatch` if `f` returns a value of another kind.
pub fn map_non_null<F>(input: impl Into<Expression>, output: DataType, f: F) -> Expression
where
    F: Fn(ScalarValue) -> Result<ScalarValue> + Send + Sync + 'static,
{
    Expression::MapNonNull {
        function: ValueFn::new(f),
        output,
        input: Box::new(input.into()),
    }
}

fn binary(op: BinaryOperator, left: impl Into<Expression>, right: impl Into<Expression>) -> Expression {
    Expression::Binary {
        op,
        left: Box::new(left.into()),
        right: Box::new(right.into()),
    }
}

macro_rules! binary_constructors {
    ($($name:ident => $op:ident),* $(,)?) => {
        $(
            pub fn $name(left: impl Into<Expression>, right: impl Into<Expression>) -> Expression {
                binary(BinaryOperator::$op, left, right)
            }
        )*
    };
}

binary_constructors! {
    add => Add,
    sub => Sub,
    mul => Mul,
    div => Div,
    eq => Eq,
    not_eq => NotEq,
    gt => Gt,
    gt_eq => GtEq,
    lt => Lt,
    lt_eq => LtEq,
    and => And,
    or => Or,
}

pub fn not(input: impl Into<Expression>) -> Expression {
    Expression::Not(Box::new(input.into()))
}

pub fn negate(input: impl Into<Expression>) -> Expression {
    Expression::Negate(Box::new(input.into()))
}

pub fn is_null(input: impl Into<Expression>) -> Expression {
    Expression::IsNull(Box::new(input.into()))
}

pub fn is_not_null(input: impl Into<Expression>) -> Expression {
    Expression::IsNotNull(Box::new(input.into()))
}

fn string_fn(function: StringFunction, input: impl Into<Expression>) -> Expression {
    Expression::StringFunction {
        function,
        input: Box::new(input.into()),
    }
}

pub fn str_contains(input: impl Into<Expression>, pattern: impl Into<String>) -> Expression {
    string_fn(StringFunction::Contains(pattern.into()), input)
}

pub fn str_starts_with(input: impl Into<Expression>, prefix: impl Into<String>) -> Expression {
    string_fn(StringFunction::StartsWith(prefix.into()), input)
}

pub fn str_ends_with(input: impl Into<Expression>, suffix: impl Into<String>) -> Expression {
    string_fn(StringFunction::EndsWith(suffix.into()), input)
}

pub fn str_length(input: impl Into<Expression>) -> Expression {
    string_fn(StringFunction::Length, input)
}

pub fn str_upper(input: impl Into<Expression>) -> Expression {
    string_fn(StringFunction::Upper, input)
}

pub fn str_lower(input: impl Into<Expression>) -> Expression {
    string_fn(StringFunction::Lower, input)
}

/// True where the regex matches anywhere in the string.
///
/// Errors with `InvalidArgument` if the pattern doesn't compile.
pub fn str_matches(input: impl Into<Expression>, pattern: &str) -> Result<Expression> {
    Ok(string_fn(
        StringFunction::RegexMatches(compile_regex(pattern)?),
        input,
    ))
}

/// Capture `group` of the first match, null where the regex doesn't match.
pub fn str_extract(
    input: impl Into<Expression>,
    pattern: &str,
    group: usize,
) -> Result<Expression> {
    Ok(string_fn(
        StringFunction::RegexExtract {
            regex: compile_regex(pattern)?,
            group,
        },
        input,
    ))
}

/// Split on a separator regex into at most `limit` parts and take part
/// `index`, null if there is no such part.
pub fn str_split_part(
    input: impl Into<Expression>,
    separator: &str,
    limit: Option<usize>,
    index: usize,
) -> Result<Expression> {
    Ok(string_fn(
        StringFunction::SplitPart {
            separator: compile_regex(separator)?,
            limit,
            index,
        },
        input,
    ))
}
