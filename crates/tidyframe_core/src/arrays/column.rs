use std::sync::Arc;

use tidyframe_error::Result;

use super::array::Array;
use super::datatype::DataType;
use super::scalar::ScalarValue;

/// A named array.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    name: Arc<str>,
    array: Array,
}

impl Column {
    pub fn new(name: impl Into<Arc<str>>, array: Array) -> Self {
        Column {
            name: name.into(),
            array,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn array(&self) -> &Array {
        &self.array
    }

    pub fn into_array(self) -> Array {
        self.array
    }

    pub fn datatype(&self) -> DataType {
        self.array.datatype()
    }

    pub fn len(&self) -> usize {
        self.array.len()
    }

    pub fn is_empty(&self) -> bool {
        self.array.is_empty()
    }

    /// Get the value at `idx`, failing with `IndexOutOfRange` past the end.
    pub fn get(&self, idx: usize) -> Result<ScalarValue> {
        self.array.get(idx)
    }

    /// Same values under a different name. Doesn't copy the values.
    pub fn with_name(&self, name: impl Into<Arc<str>>) -> Column {
        Column {
            name: name.into(),
            array: self.array.clone(),
        }
    }
}

/// Shorthand for building a column from an iterator of values.
pub fn column<T>(name: &str, values: impl IntoIterator<Item = T>) -> Column
where
    Array: FromIterator<T>,
{
    Column::new(name, values.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use tidyframe_error::ErrorKind;

    use super::*;

    #[test]
    fn with_name_shares_values() {
        let col = column("age", [23_i64, 23, 12]);
        let renamed = col.with_name("years");
        assert_eq!("years", renamed.name());
        assert_eq!("age", col.name());
        assert!(renamed.array().shares_buffer_with(col.array()));
    }

    #[test]
    fn get_past_end() {
        let col = column("a", [Some(1.5), None]);
        assert_eq!(ScalarValue::Null, col.get(1).unwrap());
        assert_eq!(ErrorKind::IndexOutOfRange, col.get(2).unwrap_err().kind());
    }
}
