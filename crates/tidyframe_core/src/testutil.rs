//! Test utilities.
//!
//! Note this this isn't behind a `#[cfg(test)]` flag since this should be
//! usable from integration tests.
//!
//! Should not be used outside of tests.

use crate::arrays::array::Array;
use crate::arrays::table::Table;

/// Asserts that two arrays are logically equal.
///
/// Values are compared with group key equality, so NaN equals NaN.
pub fn assert_arrays_eq(a: &Array, b: &Array) {
    assert_eq!(a.datatype(), b.datatype(), "data types differ");
    assert_eq!(a.len(), b.len(), "lengths differ");

    for (row_idx, (a_val, b_val)) in a.iter_scalars().zip(b.iter_scalars()).enumerate() {
        assert!(
            a_val.key_eq(&b_val),
            "values differ at row {row_idx}: {a_val} != {b_val}"
        );
    }
}

/// Asserts that two tables have the same column names, in the same order,
/// holding logically equal arrays.
pub fn assert_tables_eq(a: &Table, b: &Table) {
    assert_eq!(a.num_rows(), b.num_rows(), "num rows differ");
    assert_eq!(a.column_names(), b.column_names(), "column names differ");

    for (a_col, b_col) in a.columns().zip(b.columns()) {
        assert_arrays_eq(a_col.array(), b_col.array());
    }
}

/// Collect a column's values as strings, with nulls as "NULL".
pub fn column_strings(table: &Table, name: &str) -> Vec<String> {
    table
        .column(name)
        .unwrap()
        .array()
        .iter_scalars()
        .map(|v| v.to_string())
        .collect()
}
