use std::sync::Arc;

use tidyframe_error::{FrameError, OptionExt, Result};

use crate::arrays::array::{Array, ArrayData};
use crate::arrays::bitmap::Bitmap;
use crate::arrays::datatype::DataType;

/// Concat multiple arrays into a single array.
///
/// All arrays must be of the same type.
pub fn concat(arrays: &[&Array]) -> Result<Array> {
    let datatype = arrays.first().required("array to concat")?.datatype();

    if let Some(other) = arrays.iter().find(|arr| arr.datatype() != datatype) {
        return Err(FrameError::type_mismatch("Cannot concat arrays of different types")
            .with_field("first", datatype)
            .with_field("other", other.datatype()));
    }

    let data = match datatype {
        DataType::Boolean => ArrayData::Boolean(concat_values(arrays, |d| match d {
            ArrayData::Boolean(v) => Some(v.as_ref()),
            _ => None,
        })?),
        DataType::Int64 => ArrayData::Int64(concat_values(arrays, |d| match d {
            ArrayData::Int64(v) => Some(v.as_ref()),
            _ => None,
        })?),
        DataType::Float64 => ArrayData::Float64(concat_values(arrays, |d| match d {
            ArrayData::Float64(v) => Some(v.as_ref()),
            _ => None,
        })?),
        DataType::Utf8 => ArrayData::Utf8(concat_values(arrays, |d| match d {
            ArrayData::Utf8(v) => Some(v.as_ref()),
            _ => None,
        })?),
        DataType::Any => ArrayData::Any(concat_values(arrays, |d| match d {
            ArrayData::Any(v) => Some(v.as_ref()),
            _ => None,
        })?),
    };

    Ok(Array::from_parts(data, concat_validities(arrays)))
}

fn concat_values<T: Clone>(
    arrays: &[&Array],
    downcast: impl Fn(&ArrayData) -> Option<&[T]>,
) -> Result<Arc<[T]>> {
    let cap = arrays.iter().map(|arr| arr.len()).sum();
    let mut out = Vec::with_capacity(cap);
    for arr in arrays {
        let values = downcast(&arr.data).required("array data matching its datatype")?;
        out.extend_from_slice(values);
    }
    Ok(out.into())
}

/// Concat validities.
///
/// If all validities are None, None will be returned.
fn concat_validities(arrays: &[&Array]) -> Option<Bitmap> {
    if arrays.iter().all(|arr| arr.validity().is_none()) {
        return None;
    }

    let cap = arrays.iter().map(|arr| arr.len()).sum();
    let mut validity = Bitmap::with_capacity(cap);
    for arr in arrays {
        match arr.validity() {
            Some(bitmap) => validity.extend(bitmap.iter()),
            None => validity.extend(std::iter::repeat_n(true, arr.len())),
        }
    }

    Some(validity)
}

#[cfg(test)]
mod tests {
    use tidyframe_error::ErrorKind;

    use super::*;

    #[test]
    fn concat_mixed_validity() {
        let a = Array::from_iter([1_i64, 2]);
        let b = Array::from_iter([None, Some(4_i64)]);
        let got = concat(&[&a, &b]).unwrap();
        assert_eq!(Array::from_iter([Some(1_i64), Some(2), None, Some(4)]), got);
    }

    #[test]
    fn concat_type_mismatch() {
        let a = Array::from_iter([1_i64]);
        let b = Array::from_iter(["a"]);
        let err = concat(&[&a, &b]).unwrap_err();
        assert_eq!(ErrorKind::TypeMismatch, err.kind());
    }

    #[test]
    fn concat_nothing() {
        let err = concat(&[]).unwrap_err();
        assert_eq!(ErrorKind::Internal, err.kind());
    }
}
