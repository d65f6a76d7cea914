use std::sync::Arc;

use tidyframe_error::{ErrorKind, FrameError, Result};

use super::bitmap::Bitmap;
use super::datatype::DataType;
use super::scalar::ScalarValue;

/// Physical storage for an array.
///
/// Buffers are reference counted and never mutated once built, so cloning an
/// array (or a column, or a table) shares the values.
#[derive(Debug, Clone)]
pub enum ArrayData {
    Boolean(Arc<[bool]>),
    Int64(Arc<[i64]>),
    Float64(Arc<[f64]>),
    Utf8(Arc<[String]>),
    Any(Arc<[ScalarValue]>),
}

impl ArrayData {
    pub fn datatype(&self) -> DataType {
        match self {
            ArrayData::Boolean(_) => DataType::Boolean,
            ArrayData::Int64(_) => DataType::Int64,
            ArrayData::Float64(_) => DataType::Float64,
            ArrayData::Utf8(_) => DataType::Utf8,
            ArrayData::Any(_) => DataType::Any,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ArrayData::Boolean(v) => v.len(),
            ArrayData::Int64(v) => v.len(),
            ArrayData::Float64(v) => v.len(),
            ArrayData::Utf8(v) => v.len(),
            ArrayData::Any(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A typed, nullable, fixed-length sequence of values.
#[derive(Debug, Clone)]
pub struct Array {
    /// Validity mask. None means all values are valid.
    pub(crate) validity: Option<Arc<Bitmap>>,
    pub(crate) data: ArrayData,
}

impl Array {
    pub fn new(data: ArrayData) -> Self {
        Array {
            validity: None,
            data,
        }
    }

    /// Create an array with an explicit validity mask.
    pub fn try_new_with_validity(data: ArrayData, validity: Bitmap) -> Result<Self> {
        if validity.len() != data.len() {
            return Err(FrameError::length_mismatch(data.len(), validity.len())
                .with_field("reason", "validity length"));
        }
        Ok(Self::from_parts(data, Some(validity)))
    }

    /// Build from parts, dropping the mask if everything is valid.
    pub(crate) fn from_parts(data: ArrayData, validity: Option<Bitmap>) -> Self {
        let validity = match validity {
            Some(v) if !v.all_true() => Some(Arc::new(v)),
            _ => None,
        };
        Array { validity, data }
    }

    /// Create an array of `len` nulls of the given type.
    pub fn new_null(datatype: DataType, len: usize) -> Self {
        let data = match datatype {
            DataType::Boolean => ArrayData::Boolean(vec![false; len].into()),
            DataType::Int64 => ArrayData::Int64(vec![0; len].into()),
            DataType::Float64 => ArrayData::Float64(vec![0.0; len].into()),
            DataType::Utf8 => ArrayData::Utf8(vec![String::new(); len].into()),
            DataType::Any => ArrayData::Any(vec![ScalarValue::Null; len].into()),
        };
        Array {
            validity: Some(Arc::new(Bitmap::new_with_all_false(len))),
            data,
        }
    }

    /// Create an array by repeating a scalar `len` times.
    ///
    /// A null scalar produces a null array of `null_type`.
    pub fn repeat_scalar(value: &ScalarValue, null_type: DataType, len: usize) -> Self {
        match value {
            ScalarValue::Null => Self::new_null(null_type, len),
            ScalarValue::Boolean(v) => Self::new(ArrayData::Boolean(vec![*v; len].into())),
            ScalarValue::Int64(v) => Self::new(ArrayData::Int64(vec![*v; len].into())),
            ScalarValue::Float64(v) => Self::new(ArrayData::Float64(vec![*v; len].into())),
            ScalarValue::Utf8(v) => Self::new(ArrayData::Utf8(vec![v.clone(); len].into())),
        }
    }

    /// Build an array of a known type from scalars.
    ///
    /// Errors with `TypeMismatch` if a non-null value doesn't match the type.
    /// Integers are widened when building a Float64 array. Any accepts
    /// everything.
    pub fn try_from_scalars(
        datatype: DataType,
        values: impl IntoIterator<Item = ScalarValue>,
    ) -> Result<Self> {
        let values = values.into_iter();
        Ok(match datatype {
            DataType::Boolean => {
                let opts = values
                    .map(|v| v.try_as_bool())
                    .collect::<Result<Vec<_>>>()?;
                Array::from_iter(opts)
            }
            DataType::Int64 => {
                let opts = values
                    .map(|v| v.try_as_i64())
                    .collect::<Result<Vec<_>>>()?;
                Array::from_iter(opts)
            }
            DataType::Float64 => {
                let opts = values
                    .map(|v| v.try_as_f64())
                    .collect::<Result<Vec<_>>>()?;
                Array::from_iter(opts)
            }
            DataType::Utf8 => {
                let opts = values
                    .map(|v| match v {
                        ScalarValue::Null => Ok(None),
                        ScalarValue::Utf8(s) => Ok(Some(s)),
                        other => Err(FrameError::type_mismatch("Unexpected value kind")
                            .with_field("value", other)
                            .with_field("expected", DataType::Utf8)),
                    })
                    .collect::<Result<Vec<_>>>()?;
                Array::from_iter(opts)
            }
            DataType::Any => Self::any_from_scalars(values),
        })
    }

    /// Build an array, inferring its type from the values.
    ///
    /// If every non-null value has the same kind, that kind is used.
    /// Otherwise, or if every value is null, the result is `Any`.
    pub fn from_scalars_inferred(values: Vec<ScalarValue>) -> Self {
        let mut inferred: Option<DataType> = None;
        let mut mixed = false;
        for v in &values {
            match (v.datatype(), inferred) {
                (None, _) => (),
                (Some(dt), None) => inferred = Some(dt),
                (Some(dt), Some(prev)) if dt != prev => {
                    mixed = true;
                    break;
                }
                _ => (),
            }
        }

        match inferred {
            Some(datatype) if !mixed => match Self::try_from_scalars(datatype, values.clone()) {
                Ok(arr) => arr,
                // Unreachable given the kind check above, fall back to Any.
                Err(_) => Self::any_from_scalars(values),
            },
            _ => Self::any_from_scalars(values),
        }
    }

    fn any_from_scalars(values: impl IntoIterator<Item = ScalarValue>) -> Self {
        let values: Vec<ScalarValue> = values.into_iter().collect();
        let validity: Bitmap = values.iter().map(|v| !v.is_null()).collect();
        Self::from_parts(ArrayData::Any(values.into()), Some(validity))
    }

    pub fn datatype(&self) -> DataType {
        self.data.datatype()
    }

    pub fn data(&self) -> &ArrayData {
        &self.data
    }

    pub fn validity(&self) -> Option<&Bitmap> {
        self.validity.as_deref()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Check validity at `idx`. Assumes `idx` is in bounds.
    #[inline]
    pub fn is_valid(&self, idx: usize) -> bool {
        match &self.validity {
            Some(validity) => validity.value(idx),
            None => true,
        }
    }

    pub fn null_count(&self) -> usize {
        match &self.validity {
            Some(validity) => validity.len() - validity.count_trues(),
            None => 0,
        }
    }

    /// Get the value at `idx`, or null.
    pub fn get(&self, idx: usize) -> Result<ScalarValue> {
        if idx >= self.len() {
            return Err(
                FrameError::with_kind(ErrorKind::IndexOutOfRange, "Row index out of range")
                    .with_field("index", idx)
                    .with_field("len", self.len()),
            );
        }
        Ok(self.scalar_unchecked(idx))
    }

    /// Get the value at `idx` without bounds checking the row (still panics
    /// on out of bounds).
    pub(crate) fn scalar_unchecked(&self, idx: usize) -> ScalarValue {
        if !self.is_valid(idx) {
            return ScalarValue::Null;
        }
        match &self.data {
            ArrayData::Boolean(v) => ScalarValue::Boolean(v[idx]),
            ArrayData::Int64(v) => ScalarValue::Int64(v[idx]),
            ArrayData::Float64(v) => ScalarValue::Float64(v[idx]),
            ArrayData::Utf8(v) => ScalarValue::Utf8(v[idx].clone()),
            ArrayData::Any(v) => v[idx].clone(),
        }
    }

    /// Iterate over all values as scalars.
    pub fn iter_scalars(&self) -> impl ExactSizeIterator<Item = ScalarValue> + '_ {
        (0..self.len()).map(|idx| self.scalar_unchecked(idx))
    }

    /// Returns true if both arrays point to the same value buffer.
    pub fn shares_buffer_with(&self, other: &Array) -> bool {
        match (&self.data, &other.data) {
            (ArrayData::Boolean(a), ArrayData::Boolean(b)) => Arc::ptr_eq(a, b),
            (ArrayData::Int64(a), ArrayData::Int64(b)) => Arc::ptr_eq(a, b),
            (ArrayData::Float64(a), ArrayData::Float64(b)) => Arc::ptr_eq(a, b),
            (ArrayData::Utf8(a), ArrayData::Utf8(b)) => Arc::ptr_eq(a, b),
            (ArrayData::Any(a), ArrayData::Any(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Logical equality: same type, same length, same nulls, and equal values at
/// every valid position.
impl PartialEq for Array {
    fn eq(&self, other: &Self) -> bool {
        if self.datatype() != other.datatype() || self.len() != other.len() {
            return false;
        }
        (0..self.len()).all(|idx| {
            let valid = self.is_valid(idx);
            if valid != other.is_valid(idx) {
                return false;
            }
            if !valid {
                return true;
            }
            match (&self.data, &other.data) {
                (ArrayData::Boolean(a), ArrayData::Boolean(b)) => a[idx] == b[idx],
                (ArrayData::Int64(a), ArrayData::Int64(b)) => a[idx] == b[idx],
                (ArrayData::Float64(a), ArrayData::Float64(b)) => a[idx] == b[idx],
                (ArrayData::Utf8(a), ArrayData::Utf8(b)) => a[idx] == b[idx],
                (ArrayData::Any(a), ArrayData::Any(b)) => a[idx] == b[idx],
                _ => false,
            }
        })
    }
}

/// Split optional values into a value buffer and a validity mask.
fn unzip_options<T: Default>(iter: impl IntoIterator<Item = Option<T>>) -> (Vec<T>, Bitmap) {
    let iter = iter.into_iter();
    let mut values = Vec::with_capacity(iter.size_hint().0);
    let mut validity = Bitmap::with_capacity(iter.size_hint().0);
    for v in iter {
        match v {
            Some(v) => {
                values.push(v);
                validity.push(true);
            }
            None => {
                values.push(T::default());
                validity.push(false);
            }
        }
    }
    (values, validity)
}

macro_rules! impl_from_iter {
    ($native:ty, $variant:ident) => {
        impl FromIterator<$native> for Array {
            fn from_iter<T: IntoIterator<Item = $native>>(iter: T) -> Self {
                let values: Vec<$native> = iter.into_iter().collect();
                Array::new(ArrayData::$variant(values.into()))
            }
        }

        impl FromIterator<Option<$native>> for Array {
            fn from_iter<T: IntoIterator<Item = Option<$native>>>(iter: T) -> Self {
                let (values, validity) = unzip_options(iter);
                Array::from_parts(ArrayData::$variant(values.into()), Some(validity))
            }
        }
    };
}

impl_from_iter!(bool, Boolean);
impl_from_iter!(i64, Int64);
impl_from_iter!(f64, Float64);
impl_from_iter!(String, Utf8);

impl<'a> FromIterator<&'a str> for Array {
    fn from_iter<T: IntoIterator<Item = &'a str>>(iter: T) -> Self {
        iter.into_iter().map(|s| s.to_string()).collect()
    }
}

impl<'a> FromIterator<Option<&'a str>> for Array {
    fn from_iter<T: IntoIterator<Item = Option<&'a str>>>(iter: T) -> Self {
        iter.into_iter().map(|s| s.map(|s| s.to_string())).collect()
    }
}

impl FromIterator<ScalarValue> for Array {
    fn from_iter<T: IntoIterator<Item = ScalarValue>>(iter: T) -> Self {
        Array::from_scalars_inferred(iter.into_iter().collect())
    }
}
