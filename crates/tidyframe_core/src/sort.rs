//! Stable multi-key ordering of rows.
use std::cmp::Ordering;

use tidyframe_error::Result;
use tracing::debug;

use crate::arrays::array::{Array, ArrayData};
use crate::arrays::selection::SelectionVector;
use crate::arrays::table::Table;

/// A column to sort on and its direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub column: String,
    pub descending: bool,
}

pub fn asc(column: impl Into<String>) -> SortKey {
    SortKey {
        column: column.into(),
        descending: false,
    }
}

pub fn desc(column: impl Into<String>) -> SortKey {
    SortKey {
        column: column.into(),
        descending: true,
    }
}

impl From<&str> for SortKey {
    fn from(column: &str) -> Self {
        asc(column)
    }
}

impl From<String> for SortKey {
    fn from(column: String) -> Self {
        asc(column)
    }
}

/// Compare two valid rows of an array in ascending order.
fn compare_valid(array: &Array, a: usize, b: usize) -> Ordering {
    match array.data() {
        ArrayData::Boolean(v) => v[a].cmp(&v[b]),
        ArrayData::Int64(v) => v[a].cmp(&v[b]),
        ArrayData::Float64(v) => v[a].total_cmp(&v[b]),
        ArrayData::Utf8(v) => v[a].cmp(&v[b]),
        ArrayData::Any(v) => v[a].total_cmp(&v[b]),
    }
}

/// Compare two rows on one key. Nulls sort after every value in both
/// directions.
fn compare_rows(array: &Array, descending: bool, a: usize, b: usize) -> Ordering {
    match (array.is_valid(a), array.is_valid(b)) {
        (false, false) => Ordering::Equal,
        (false, true) => Ordering::Greater,
        (true, false) => Ordering::Less,
        (true, true) => {
            let ord = compare_valid(array, a, b);
            if descending { ord.reverse() } else { ord }
        }
    }
}

/// Compute the sorted permutation of a table's rows.
pub fn sort_indices(table: &Table, keys: &[SortKey]) -> Result<SelectionVector> {
    let arrays = keys
        .iter()
        .map(|key| Ok((table.column(&key.column)?.array(), key.descending)))
        .collect::<Result<Vec<_>>>()?;

    let mut indices: Vec<usize> = (0..table.num_rows()).collect();
    // `sort_by` is stable, ties keep their original order.
    indices.sort_by(|&a, &b| {
        arrays
            .iter()
            .map(|(array, descending)| compare_rows(array, *descending, a, b))
            .find(|ord| ord.is_ne())
            .unwrap_or(Ordering::Equal)
    });

    Ok(indices.into())
}

impl Table {
    /// Stable sort by one or more keys, ascending unless marked with `desc`.
    ///
    /// Nulls always sort last. Errors with `UnknownColumn` for a missing key.
    pub fn arrange<K>(&self, keys: impl IntoIterator<Item = K>) -> Result<Table>
    where
        K: Into<SortKey>,
    {
        let keys: Vec<SortKey> = keys.into_iter().map(Into::into).collect();
        let selection = sort_indices(self, &keys)?;
        debug!(num_rows = self.num_rows(), num_keys = keys.len(), "arrange");
        self.take(&selection)
    }
}

#[cfg(test)]
mod tests {
    use tidyframe_error::ErrorKind;

    use super::*;
    use crate::arrays::column::column;

    fn table() -> Table {
        Table::try_new([
            column("id", [0_i64, 1, 2, 3, 4]),
            column("age", [Some(23_i64), None, Some(12), Some(23), Some(40)]),
            column("name", ["b", "a", "c", "a", "b"]),
        ])
        .unwrap()
    }

    fn ids(table: &Table) -> Vec<i64> {
        table
            .column("id")
            .unwrap()
            .array()
            .iter_scalars()
            .map(|v| v.try_as_i64().unwrap().unwrap())
            .collect()
    }

    #[test]
    fn ascending_nulls_last() {
        assert_eq!(vec![2, 0, 3, 4, 1], ids(&table().arrange(["age"]).unwrap()));
    }

    #[test]
    fn descending_nulls_still_last() {
        assert_eq!(vec![4, 0, 3, 2, 1], ids(&table().arrange([desc("age")]).unwrap()));
    }

    #[test]
    fn multi_key() {
        let out = table().arrange([desc("age"), asc("name")]).unwrap();
        assert_eq!(vec![4, 3, 0, 2, 1], ids(&out));

        let out = table().arrange([asc("name"), desc("id")]).unwrap();
        assert_eq!(vec![3, 1, 4, 0, 2], ids(&out));
    }

    #[test]
    fn stable_on_ties() {
        // 0 and 3 share age 23 and keep their relative order.
        let once = table().arrange(["age"]).unwrap();
        let twice = once.arrange(["age"]).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn unknown_key() {
        let err = table().arrange(["nope"]).unwrap_err();
        assert_eq!(ErrorKind::UnknownColumn, err.kind());
    }

    #[test]
    fn float_nan_sorts_high() {
        let table = Table::try_new([column("v", [Some(f64::NAN), Some(1.0), None, Some(-1.0)])])
            .unwrap();
        let out = table.arrange(["v"]).unwrap();
        let vals: Vec<String> = out
            .column("v")
            .unwrap()
            .array()
            .iter_scalars()
            .map(|v| v.to_string())
            .collect();
        assert_eq!(vec!["-1", "1", "NaN", "NULL"], vals);
    }
}
