//! Null propagating element-wise kernels over two equal length arrays.
use std::sync::Arc;

use tidyframe_error::{ErrorKind, FrameError, Result};

use crate::arrays::array::{Array, ArrayData};
use crate::arrays::bitmap::Bitmap;
use crate::arrays::datatype::DataType;
use crate::arrays::scalar::ScalarValue;

/// AND of both validities. None if both are fully valid.
pub(crate) fn union_validities(left: &Array, right: &Array) -> Option<Bitmap> {
    match (left.validity(), right.validity()) {
        (Some(l), Some(r)) => Some(l.bit_and(r)),
        (Some(l), None) => Some(l.clone()),
        (None, Some(r)) => Some(r.clone()),
        (None, None) => None,
    }
}

fn check_lengths(left: &Array, right: &Array) -> Result<()> {
    if left.len() != right.len() {
        return Err(FrameError::length_mismatch(left.len(), right.len())
            .with_field("reason", "binary operands"));
    }
    Ok(())
}

/// Apply an infallible op to every row.
///
/// The op is also called for null rows (on placeholder values), the result
/// there is masked out by the validity.
pub fn binary_map<A, B, O, F>(
    left: &Array,
    left_values: &[A],
    right: &Array,
    right_values: &[B],
    wrap: impl FnOnce(Arc<[O]>) -> ArrayData,
    op: F,
) -> Result<Array>
where
    F: Fn(&A, &B) -> O,
{
    check_lengths(left, right)?;
    let values: Arc<[O]> = left_values
        .iter()
        .zip(right_values.iter())
        .map(|(a, b)| op(a, b))
        .collect();
    Ok(Array::from_parts(wrap(values), union_validities(left, right)))
}

/// Apply a fallible op, only to rows where both sides are valid.
pub fn try_binary_map<A, B, O, F>(
    left: &Array,
    left_values: &[A],
    right: &Array,
    right_values: &[B],
    wrap: impl FnOnce(Arc<[O]>) -> ArrayData,
    op: F,
) -> Result<Array>
where
    O: Default,
    F: Fn(&A, &B) -> Result<O>,
{
    check_lengths(left, right)?;
    let validity = union_validities(left, right);
    let mut values = Vec::with_capacity(left_values.len());
    for (idx, (a, b)) in left_values.iter().zip(right_values.iter()).enumerate() {
        let valid = validity.as_ref().is_none_or(|v| v.value(idx));
        if valid {
            values.push(op(a, b)?);
        } else {
            values.push(O::default());
        }
    }
    Ok(Array::from_parts(wrap(values.into()), validity))
}

/// Row-by-row op over scalars, used for kinds without a typed fast path
/// (Any columns, mixed string concatenation).
pub fn scalar_binary_map<F>(left: &Array, right: &Array, out: DataType, op: F) -> Result<Array>
where
    F: Fn(&ScalarValue, &ScalarValue) -> Result<ScalarValue>,
{
    check_lengths(left, right)?;
    let values = left
        .iter_scalars()
        .zip(right.iter_scalars())
        .map(|(a, b)| {
            if a.is_null() || b.is_null() {
                Ok(ScalarValue::Null)
            } else {
                op(&a, &b)
            }
        })
        .collect::<Result<Vec<_>>>()?;
    Array::try_from_scalars(out, values)
}

pub(crate) fn checked_i64(
    op: &'static str,
    f: impl Fn(i64, i64) -> Option<i64>,
) -> impl Fn(&i64, &i64) -> Result<i64> {
    move |a, b| {
        f(*a, *b).ok_or_else(|| {
            FrameError::with_kind(ErrorKind::NumericOverflow, "Integer overflow")
                .with_field("op", op)
                .with_field("left", a)
                .with_field("right", b)
        })
    }
}
