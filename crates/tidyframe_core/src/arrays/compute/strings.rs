use tidyframe_error::{FrameError, Result};

use crate::arrays::array::{Array, ArrayData};
use crate::arrays::datatype::DataType;
use crate::arrays::scalar::ScalarValue;

/// Apply `f` only to non-null positions, putting nulls back where the input
/// was null.
///
/// `f` may itself return null (e.g. a regex that didn't match). The output
/// type is `out`.
pub fn map_non_null<F>(array: &Array, out: DataType, f: F) -> Result<Array>
where
    F: Fn(ScalarValue) -> Result<ScalarValue>,
{
    let values = array
        .iter_scalars()
        .map(|v| if v.is_null() { Ok(ScalarValue::Null) } else { f(v) })
        .collect::<Result<Vec<_>>>()?;
    Array::try_from_scalars(out, values)
}

/// Like `map_non_null`, but over the string values of a Utf8 array.
pub fn map_utf8<F>(array: &Array, out: DataType, f: F) -> Result<Array>
where
    F: Fn(&str) -> Result<ScalarValue>,
{
    let ArrayData::Utf8(values) = array.data() else {
        return Err(FrameError::type_mismatch("Expected a string column")
            .with_field("datatype", array.datatype()));
    };

    let values = values
        .iter()
        .enumerate()
        .map(|(idx, s)| {
            if array.is_valid(idx) {
                f(s)
            } else {
                Ok(ScalarValue::Null)
            }
        })
        .collect::<Result<Vec<_>>>()?;
    Array::try_from_scalars(out, values)
}

#[cfg(test)]
mod tests {
    use tidyframe_error::ErrorKind;

    use super::*;

    #[test]
    fn nulls_skipped_and_restored() {
        let arr = Array::from_iter([Some("Max Doe"), None, Some("Horst")]);
        let got = map_utf8(&arr, DataType::Utf8, |s| {
            Ok(s.split(' ').nth(1).map(|s| s.to_string()).into())
        })
        .unwrap();
        assert_eq!(Array::from_iter([Some("Doe"), None, None]), got);
    }

    #[test]
    fn map_non_null_never_sees_null() {
        let arr = Array::from_iter([Some(1_i64), None]);
        let got = map_non_null(&arr, DataType::Int64, |v| {
            assert!(!v.is_null());
            Ok(ScalarValue::Int64(v.try_as_i64()?.unwrap_or_default() * 2))
        })
        .unwrap();
        assert_eq!(Array::from_iter([Some(2_i64), None]), got);
    }

    #[test]
    fn map_utf8_wrong_type() {
        let arr = Array::from_iter([1_i64]);
        let err = map_utf8(&arr, DataType::Utf8, |s| Ok(s.into())).unwrap_err();
        assert_eq!(ErrorKind::TypeMismatch, err.kind());
    }
}
