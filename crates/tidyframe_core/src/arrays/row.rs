use tidyframe_error::{FrameError, Result};

use super::scalar::ScalarValue;
use super::table::Table;

/// Read-only view of a single row of a table.
///
/// Handed to row-wise functions. Values are looked up by column name.
#[derive(Debug, Clone, Copy)]
pub struct RowContext<'a> {
    table: &'a Table,
    row: usize,
}

impl<'a> RowContext<'a> {
    pub(crate) fn new(table: &'a Table, row: usize) -> Self {
        RowContext { table, row }
    }

    /// Zero based position of this row in the table being evaluated.
    ///
    /// Inside a grouped mutate this is the position within the group.
    pub fn row_number(&self) -> usize {
        self.row
    }

    pub fn table(&self) -> &'a Table {
        self.table
    }

    /// Get the value of a column, or null.
    pub fn get(&self, column: &str) -> Result<ScalarValue> {
        self.table.column(column)?.array().get(self.row)
    }

    pub fn get_i64(&self, column: &str) -> Result<Option<i64>> {
        self.get(column)?
            .try_as_i64()
            .map_err(|e| with_column(e, column))
    }

    /// Get a numeric value as an f64. Integers are widened.
    pub fn get_f64(&self, column: &str) -> Result<Option<f64>> {
        self.get(column)?
            .try_as_f64()
            .map_err(|e| with_column(e, column))
    }

    pub fn get_str(&self, column: &str) -> Result<Option<String>> {
        match self.get(column)? {
            ScalarValue::Utf8(s) => Ok(Some(s)),
            ScalarValue::Null => Ok(None),
            other => Err(with_column(
                FrameError::type_mismatch("Expected a string value").with_field("value", other),
                column,
            )),
        }
    }

    pub fn get_bool(&self, column: &str) -> Result<Option<bool>> {
        self.get(column)?
            .try_as_bool()
            .map_err(|e| with_column(e, column))
    }
}

fn with_column(err: FrameError, column: &str) -> FrameError {
    err.with_field("column", column)
}

#[cfg(test)]
mod tests {
    use tidyframe_error::ErrorKind;

    use super::*;
    use crate::arrays::column::column;

    #[test]
    fn typed_getters() {
        let table = Table::try_new([
            column("name", [Some("Max"), None]),
            column("age", [23_i64, 12]),
            column("adult", [true, false]),
        ])
        .unwrap();

        let row = table.row(0).unwrap();
        assert_eq!(Some("Max".to_string()), row.get_str("name").unwrap());
        assert_eq!(Some(23), row.get_i64("age").unwrap());
        assert_eq!(Some(23.0), row.get_f64("age").unwrap());
        assert_eq!(Some(true), row.get_bool("adult").unwrap());
        assert_eq!(0, row.row_number());

        let row = table.row(1).unwrap();
        assert_eq!(None, row.get_str("name").unwrap());
        assert_eq!(1, row.row_number());
    }

    #[test]
    fn getter_errors() {
        let table = Table::try_new([column("age", [23_i64])]).unwrap();
        let row = table.row(0).unwrap();

        let err = row.get_str("age").unwrap_err();
        assert_eq!(ErrorKind::TypeMismatch, err.kind());
        assert_eq!(Some("age"), err.get_field("column"));

        let err = row.get("weight").unwrap_err();
        assert_eq!(ErrorKind::UnknownColumn, err.kind());

        let err = table.row(1).unwrap_err();
        assert_eq!(ErrorKind::IndexOutOfRange, err.kind());
    }
}
