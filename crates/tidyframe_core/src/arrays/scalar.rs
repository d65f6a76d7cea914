use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use tidyframe_error::{FrameError, Result};

use super::datatype::DataType;

/// A single value of any kind, or null.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ScalarValue {
    #[default]
    Null,
    Boolean(bool),
    Int64(i64),
    Float64(f64),
    Utf8(String),
}

impl ScalarValue {
    /// Data type of this value. Null has no data type.
    pub fn datatype(&self) -> Option<DataType> {
        Some(match self {
            ScalarValue::Null => return None,
            ScalarValue::Boolean(_) => DataType::Boolean,
            ScalarValue::Int64(_) => DataType::Int64,
            ScalarValue::Float64(_) => DataType::Float64,
            ScalarValue::Utf8(_) => DataType::Utf8,
        })
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ScalarValue::Null)
    }

    pub fn try_as_bool(&self) -> Result<Option<bool>> {
        match self {
            ScalarValue::Null => Ok(None),
            ScalarValue::Boolean(v) => Ok(Some(*v)),
            other => Err(unexpected(other, DataType::Boolean)),
        }
    }

    pub fn try_as_i64(&self) -> Result<Option<i64>> {
        match self {
            ScalarValue::Null => Ok(None),
            ScalarValue::Int64(v) => Ok(Some(*v)),
            other => Err(unexpected(other, DataType::Int64)),
        }
    }

    /// Get the value as an f64, widening integers.
    pub fn try_as_f64(&self) -> Result<Option<f64>> {
        match self {
            ScalarValue::Null => Ok(None),
            ScalarValue::Int64(v) => Ok(Some(*v as f64)),
            ScalarValue::Float64(v) => Ok(Some(*v)),
            other => Err(unexpected(other, DataType::Float64)),
        }
    }

    pub fn try_as_str(&self) -> Result<Option<&str>> {
        match self {
            ScalarValue::Null => Ok(None),
            ScalarValue::Utf8(v) => Ok(Some(v.as_str())),
            other => Err(unexpected(other, DataType::Utf8)),
        }
    }

    /// Total ordering used for sorting heterogeneous values.
    ///
    /// Values of different kinds order by kind (booleans, then numbers, then
    /// strings). Integers and floats compare numerically. Null ordering is
    /// the caller's concern, here it sorts last.
    pub fn total_cmp(&self, other: &ScalarValue) -> Ordering {
        fn rank(v: &ScalarValue) -> u8 {
            match v {
                ScalarValue::Boolean(_) => 0,
                ScalarValue::Int64(_) | ScalarValue::Float64(_) => 1,
                ScalarValue::Utf8(_) => 2,
                ScalarValue::Null => 3,
            }
        }

        match (self, other) {
            (ScalarValue::Boolean(a), ScalarValue::Boolean(b)) => a.cmp(b),
            (ScalarValue::Int64(a), ScalarValue::Int64(b)) => a.cmp(b),
            (ScalarValue::Float64(a), ScalarValue::Float64(b)) => a.total_cmp(b),
            (ScalarValue::Int64(a), ScalarValue::Float64(b)) => {
                cmp_i64_f64(*a, *b).unwrap_or_else(|| (*a as f64).total_cmp(b))
            }
            (ScalarValue::Float64(a), ScalarValue::Int64(b)) => cmp_i64_f64(*b, *a)
                .map(Ordering::reverse)
                .unwrap_or_else(|| a.total_cmp(&(*b as f64))),
            (ScalarValue::Utf8(a), ScalarValue::Utf8(b)) => a.cmp(b),
            (a, b) => rank(a).cmp(&rank(b)),
        }
    }

    /// Equality where null equals null and floats compare by normalized bit
    /// pattern. This is the equality used for group keys.
    pub fn key_eq(&self, other: &ScalarValue) -> bool {
        GroupKeyValue(self) == GroupKeyValue(other)
    }
}

/// Compare an integer with a float without rounding the integer.
///
/// None if the float is NaN.
pub(crate) fn cmp_i64_f64(int: i64, float: f64) -> Option<Ordering> {
    // 2^63, the first float past i64::MAX.
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;

    if float.is_nan() {
        return None;
    }
    if float >= LIMIT {
        return Some(Ordering::Less);
    }
    if float < -LIMIT {
        return Some(Ordering::Greater);
    }

    let whole = float.trunc();
    let ord = match int.cmp(&(whole as i64)) {
        Ordering::Equal => whole.partial_cmp(&float)?,
        ord => ord,
    };
    Some(ord)
}

fn unexpected(value: &ScalarValue, want: DataType) -> FrameError {
    FrameError::type_mismatch("Unexpected value kind")
        .with_field("value", value)
        .with_field("expected", want)
}

/// Normalize a float so that -0.0 == 0.0 and all NaNs are equal.
pub(crate) fn normalized_f64_bits(v: f64) -> u64 {
    if v.is_nan() {
        f64::NAN.to_bits()
    } else if v == 0.0 {
        0.0f64.to_bits()
    } else {
        v.to_bits()
    }
}

/// Wrapper providing Eq + Hash for scalars used as group keys.
#[derive(Debug, Clone, Copy)]
pub(crate) struct GroupKeyValue<'a>(pub &'a ScalarValue);

impl PartialEq for GroupKeyValue<'_> {
    fn eq(&self, other: &Self) -> bool {
        match (self.0, other.0) {
            (ScalarValue::Null, ScalarValue::Null) => true,
            (ScalarValue::Boolean(a), ScalarValue::Boolean(b)) => a == b,
            (ScalarValue::Int64(a), ScalarValue::Int64(b)) => a == b,
            (ScalarValue::Float64(a), ScalarValue::Float64(b)) => {
                normalized_f64_bits(*a) == normalized_f64_bits(*b)
            }
            (ScalarValue::Utf8(a), ScalarValue::Utf8(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for GroupKeyValue<'_> {}

impl Hash for GroupKeyValue<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self.0).hash(state);
        match self.0 {
            ScalarValue::Null => (),
            ScalarValue::Boolean(v) => v.hash(state),
            ScalarValue::Int64(v) => v.hash(state),
            ScalarValue::Float64(v) => normalized_f64_bits(*v).hash(state),
            ScalarValue::Utf8(v) => v.hash(state),
        }
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Boolean(v) => write!(f, "{v}"),
            Self::Int64(v) => write!(f, "{v}"),
            Self::Float64(v) => write!(f, "{v}"),
            Self::Utf8(v) => write!(f, "{v}"),
        }
    }
}

impl From<bool> for ScalarValue {
    fn from(value: bool) -> Self {
        ScalarValue::Boolean(value)
    }
}

impl From<i64> for ScalarValue {
    fn from(value: i64) -> Self {
        ScalarValue::Int64(value)
    }
}

impl From<i32> for ScalarValue {
    fn from(value: i32) -> Self {
        ScalarValue::Int64(value as i64)
    }
}

impl From<f64> for ScalarValue {
    fn from(value: f64) -> Self {
        ScalarValue::Float64(value)
    }
}

impl From<&str> for ScalarValue {
    fn from(value: &str) -> Self {
        ScalarValue::Utf8(value.to_string())
    }
}

impl From<String> for ScalarValue {
    fn from(value: String) -> Self {
        ScalarValue::Utf8(value)
    }
}

impl<T: Into<ScalarValue>> From<Option<T>> for ScalarValue {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => v.into(),
            None => ScalarValue::Null,
        }
    }
}
