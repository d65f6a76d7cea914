//! Partitioning rows by key columns, and grouped summarize/mutate.
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use ahash::RandomState;
use hashbrown::HashMap;
use hashbrown::hash_map::Entry;
use rayon::prelude::*;
use tidyframe_error::{FrameError, Result};
use tracing::debug;

use crate::arrays::array::Array;
use crate::arrays::column::Column;
use crate::arrays::compute::concat::concat;
use crate::arrays::compute::take::take;
use crate::arrays::datatype::DataType;
use crate::arrays::scalar::{GroupKeyValue, ScalarValue};
use crate::arrays::selection::SelectionVector;
use crate::arrays::table::Table;
use crate::expr::{Datum, Expression, NamedExpr};
use crate::verbs::mutate_table;

/// Rows sharing one key tuple.
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    /// Values of the key columns, in key order.
    pub key: Vec<ScalarValue>,
    /// Row indices into the grouped table, ascending.
    pub rows: SelectionVector,
}

/// A table with a partition index over its key columns.
///
/// Partitions are in order of first appearance of their key when scanning
/// rows top to bottom. Every row belongs to exactly one partition.
#[derive(Debug, Clone)]
pub struct GroupedTable {
    table: Table,
    keys: Vec<String>,
    partitions: Arc<[Partition]>,
}

/// Owned key tuple, hashed and compared with group key semantics (null
/// equals null).
#[derive(Debug)]
struct GroupKey(Vec<ScalarValue>);

impl PartialEq for GroupKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.len() == other.0.len() && self.0.iter().zip(&other.0).all(|(a, b)| a.key_eq(b))
    }
}

impl Eq for GroupKey {}

impl Hash for GroupKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for v in &self.0 {
            GroupKeyValue(v).hash(state);
        }
    }
}

/// Scan rows in order, assigning each to the partition of its key tuple.
fn build_partitions(table: &Table, keys: &[String]) -> Result<Vec<Partition>> {
    let arrays = keys
        .iter()
        .map(|key| Ok(table.column(key)?.array()))
        .collect::<Result<Vec<_>>>()?;

    if arrays.is_empty() {
        return Ok(vec![Partition {
            key: Vec::new(),
            rows: SelectionVector::with_range(0..table.num_rows()),
        }]);
    }

    let mut partitions: Vec<Partition> = Vec::new();
    let mut index: HashMap<GroupKey, usize, RandomState> = HashMap::with_hasher(RandomState::new());

    for row in 0..table.num_rows() {
        let key = GroupKey(arrays.iter().map(|arr| arr.scalar_unchecked(row)).collect());
        match index.entry(key) {
            Entry::Occupied(ent) => partitions[*ent.get()].rows.push_location(row),
            Entry::Vacant(ent) => {
                let mut rows = SelectionVector::empty();
                rows.push_location(row);
                partitions.push(Partition {
                    key: ent.key().0.clone(),
                    rows,
                });
                ent.insert(partitions.len() - 1);
            }
        }
    }

    Ok(partitions)
}

/// Build an output column from one value per partition.
fn column_from_values(
    name: &str,
    datatype: Option<DataType>,
    values: Vec<ScalarValue>,
) -> Result<Column> {
    let array = match datatype {
        Some(datatype) => Array::try_from_scalars(datatype, values)?,
        None => Array::from_scalars_inferred(values),
    };
    Ok(Column::new(name, array))
}

impl GroupedTable {
    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn groups(&self) -> &[Partition] {
        &self.partitions
    }

    pub fn num_groups(&self) -> usize {
        self.partitions.len()
    }

    /// Drop the partition index.
    pub fn ungroup(self) -> Table {
        self.table
    }

    fn parallel(&self) -> bool {
        self.table.config().parallel_partitions(self.partitions.len())
    }

    /// Key columns with one row per group.
    fn key_columns(&self) -> Result<Vec<Column>> {
        self.keys
            .iter()
            .enumerate()
            .map(|(idx, key)| {
                let datatype = self.table.column_kind(key)?;
                let values = self.partitions.iter().map(|p| p.key[idx].clone());
                Ok(Column::new(key.as_str(), Array::try_from_scalars(datatype, values)?))
            })
            .collect()
    }

    /// Evaluate one expression for a single partition, expecting one value.
    fn summarize_partition(&self, partition: &Partition, expr: &Expression) -> Result<ScalarValue> {
        if let Expression::Aggregate(agg) = expr {
            // Reduce directly on the parent column, no need to copy the rows.
            let array = self.table.column(&agg.column)?.array();
            return agg.reduce(array, Some(partition.rows.as_slice()), self.table.config());
        }

        let sub = self.table.take(&partition.rows)?;
        match expr.evaluate(&sub)? {
            Datum::Scalar(v) => Ok(v),
            Datum::Array(arr) if arr.len() == 1 => arr.get(0),
            Datum::Array(arr) => Err(FrameError::length_mismatch(1, arr.len())
                .with_field("reason", "summarize expression must produce one value per group")),
        }
    }

    /// One row per group: the key columns followed by one column per
    /// expression, in request order.
    pub fn summarize(&self, exprs: impl IntoIterator<Item = NamedExpr>) -> Result<Table> {
        let exprs: Vec<NamedExpr> = exprs.into_iter().collect();

        let eval_partition = |partition: &Partition| {
            exprs
                .iter()
                .map(|named| self.summarize_partition(partition, &named.expr))
                .collect::<Result<Vec<_>>>()
        };

        let parallel = self.parallel();
        let rows: Vec<Vec<ScalarValue>> = if parallel {
            self.partitions.par_iter().map(eval_partition).collect::<Result<_>>()?
        } else {
            self.partitions.iter().map(eval_partition).collect::<Result<_>>()?
        };

        let mut columns = self.key_columns()?;
        for (idx, named) in exprs.iter().enumerate() {
            let values = rows.iter().map(|row| row[idx].clone()).collect();
            columns.push(column_from_values(
                &named.name,
                named.expr.datatype(&self.table)?,
                values,
            )?);
        }

        debug!(
            num_rows = self.table.num_rows(),
            num_groups = self.partitions.len(),
            parallel,
            "summarize"
        );

        let out = self.table.derive(columns)?;
        if out.num_columns() == 0 {
            // No keys and no expressions, still one row per group.
            return Ok(Table::with_num_rows(
                self.partitions.len(),
                self.table.config_arc().clone(),
            ));
        }
        Ok(out)
    }

    /// Number of rows per group, in a column named `n`.
    pub fn count(&self) -> Result<Table> {
        let mut columns = self.key_columns()?;
        let counts: Array = self
            .partitions
            .iter()
            .map(|p| p.rows.num_rows() as i64)
            .collect();
        columns.push(Column::new("n", counts));
        self.table.derive(columns)
    }

    /// Add or replace a column, evaluating `expr` separately within each
    /// group. Row order and count are unchanged.
    ///
    /// Row numbers and aggregates are local to each group.
    pub fn mutate(&self, name: &str, expr: impl Into<Expression>) -> Result<GroupedTable> {
        let expr = expr.into();
        let num_rows = self.table.num_rows();

        if self.partitions.is_empty() {
            let table = mutate_table(&self.table, name, &expr)?;
            return Ok(GroupedTable {
                table,
                keys: self.keys.clone(),
                partitions: self.partitions.clone(),
            });
        }

        let null_type = expr.datatype(&self.table)?.unwrap_or(DataType::Any);
        let eval_partition = |partition: &Partition| -> Result<Array> {
            let sub = self.table.take(&partition.rows)?;
            expr.evaluate(&sub)?
                .into_array(sub.num_rows(), null_type)
                .map_err(|e| e.with_field("column", name))
        };

        let parallel = self.parallel();
        let arrays: Vec<Array> = if parallel {
            self.partitions.par_iter().map(eval_partition).collect::<Result<_>>()?
        } else {
            self.partitions.iter().map(eval_partition).collect::<Result<_>>()?
        };

        // Results are in partition order, scatter them back to row order.
        let partition_order: SelectionVector = self
            .partitions
            .iter()
            .flat_map(|p| p.rows.iter_locations())
            .collect();
        let to_row_order = partition_order.invert().ok_or_else(|| {
            FrameError::new("Partitions don't cover every row exactly once")
                .with_field("num_rows", num_rows)
        })?;

        let combined = concat_partition_results(&arrays)?;
        let array = take(&combined, &to_row_order)?;

        debug!(
            num_rows,
            num_groups = self.partitions.len(),
            parallel,
            column = name,
            "grouped mutate"
        );

        let table = self.table.add_or_replace(Column::new(name, array))?;
        if self.keys.iter().any(|key| key == name) {
            // Key values changed, partitions need rebuilding.
            return table.group_by(self.keys.as_slice());
        }
        Ok(GroupedTable {
            table,
            keys: self.keys.clone(),
            partitions: self.partitions.clone(),
        })
    }
}

/// Concatenate per-partition results. Partitions may disagree on type when
/// results are inferred from values (e.g. one group is all null), in that
/// case the type is inferred over all values.
fn concat_partition_results(arrays: &[Array]) -> Result<Array> {
    let first = arrays.first().map(|arr| arr.datatype());
    if arrays.iter().all(|arr| Some(arr.datatype()) == first) {
        let refs: Vec<&Array> = arrays.iter().collect();
        return concat(&refs);
    }
    let values = arrays.iter().flat_map(|arr| arr.iter_scalars()).collect();
    Ok(Array::from_scalars_inferred(values))
}

impl Table {
    /// Partition rows by the distinct values of the key columns.
    ///
    /// Errors with `UnknownColumn` if a key doesn't exist. With no keys, all
    /// rows form a single group.
    pub fn group_by<S: AsRef<str>>(&self, keys: &[S]) -> Result<GroupedTable> {
        let keys: Vec<String> = keys.iter().map(|k| k.as_ref().to_string()).collect();
        let partitions = build_partitions(self, &keys)?;
        debug!(
            num_rows = self.num_rows(),
            num_groups = partitions.len(),
            keys = ?keys,
            "group_by"
        );
        Ok(GroupedTable {
            table: self.clone(),
            keys,
            partitions: partitions.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use tidyframe_error::ErrorKind;

    use super::*;
    use crate::aggregate::{count, first, mean, sum};
    use crate::arrays::column::column;
    use crate::config::ExecutionConfig;
    use crate::expr::{col, row_number, sub};
    use crate::testutil::assert_tables_eq;

    fn people() -> Table {
        Table::try_new([
            column("age", [23_i64, 23, 12]),
            column("weight", [55_i64, 88, 82]),
        ])
        .unwrap()
    }

    #[test]
    fn partitions_in_first_occurrence_order() {
        let grouped = people().group_by(&["age"]).unwrap();
        assert_eq!(
            vec![
                Partition {
                    key: vec![ScalarValue::Int64(23)],
                    rows: SelectionVector::from(vec![0, 1]),
                },
                Partition {
                    key: vec![ScalarValue::Int64(12)],
                    rows: SelectionVector::from(vec![2]),
                },
            ],
            grouped.groups()
        );
    }

    #[test]
    fn null_keys_group_together() {
        let table = Table::try_new([
            column("k", [None, Some("a"), None]),
            column("v", [1_i64, 2, 3]),
        ])
        .unwrap();
        let grouped = table.group_by(&["k"]).unwrap();
        assert_eq!(2, grouped.num_groups());
        assert_eq!(&[0, 2], grouped.groups()[0].rows.as_slice());
        assert_eq!(ScalarValue::Null, grouped.groups()[0].key[0]);
    }

    #[test]
    fn mean_weight_by_age() {
        let out = people()
            .group_by(&["age"])
            .unwrap()
            .summarize([mean("weight").remove_nulls(true).alias("mean_weight")])
            .unwrap();
        let expected = Table::try_new([
            column("age", [23_i64, 12]),
            column("mean_weight", [71.5, 82.0]),
        ])
        .unwrap();
        assert_tables_eq(&expected, &out);
    }

    #[test]
    fn summarize_composite_expression() {
        let out = people()
            .group_by(&["age"])
            .unwrap()
            .summarize([
                sub(sum("weight"), first("weight")).alias("rest"),
                count("weight").alias("n"),
            ])
            .unwrap();
        let expected = Table::try_new([
            column("age", [23_i64, 12]),
            column("rest", [88_i64, 0]),
            column("n", [2_i64, 1]),
        ])
        .unwrap();
        assert_tables_eq(&expected, &out);
    }

    #[test]
    fn summarize_non_scalar_rejected() {
        let err = people()
            .group_by(&["age"])
            .unwrap()
            .summarize([col("weight").alias("w")])
            .unwrap_err();
        assert_eq!(ErrorKind::LengthMismatch, err.kind());
    }

    #[test]
    fn all_null_group_keeps_type() {
        let table = Table::try_new([
            column("k", ["a", "b"]),
            column("v", [Some(1.0), None]),
        ])
        .unwrap();
        let out = table
            .group_by(&["k"])
            .unwrap()
            .summarize([mean("v").alias("m")])
            .unwrap();
        assert_eq!(DataType::Float64, out.column_kind("m").unwrap());
        assert_eq!(ScalarValue::Null, out.value(1, "m").unwrap());
    }

    #[test]
    fn grouped_mutate_is_group_local() {
        let table = Table::try_new([
            column("g", ["a", "b", "a", "b", "a"]),
            column("v", [1.0, 10.0, 3.0, 30.0, 5.0]),
        ])
        .unwrap();
        let out = table
            .group_by(&["g"])
            .unwrap()
            .mutate("centered", sub(col("v"), mean("v")))
            .unwrap()
            .mutate("pos", row_number())
            .unwrap()
            .ungroup();

        let expected = table
            .add_or_replace(column("centered", [-2.0, -10.0, 0.0, 10.0, 2.0]))
            .unwrap()
            .add_or_replace(column("pos", [0_i64, 0, 1, 1, 2]))
            .unwrap();
        assert_tables_eq(&expected, &out);
    }

    #[test]
    fn grouped_mutate_replacing_key_regroups() {
        let grouped = people()
            .group_by(&["age"])
            .unwrap()
            .mutate("age", crate::expr::lit(1))
            .unwrap();
        assert_eq!(1, grouped.num_groups());
    }

    #[test]
    fn count_per_group() {
        let out = people().group_by(&["age"]).unwrap().count().unwrap();
        let expected = Table::try_new([
            column("age", [23_i64, 12]),
            column("n", [2_i64, 1]),
        ])
        .unwrap();
        assert_tables_eq(&expected, &out);
    }

    #[test]
    fn unknown_key() {
        let err = people().group_by(&["nope"]).unwrap_err();
        assert_eq!(ErrorKind::UnknownColumn, err.kind());
    }

    #[test]
    fn ungroup_round_trip() {
        let table = people();
        assert_eq!(table, table.group_by(&["age"]).unwrap().ungroup());
    }

    #[test]
    fn parallel_partitions_match_sequential() {
        let keys: Vec<i64> = (0..500).map(|v| v % 37).collect();
        let values: Vec<i64> = (0..500).collect();
        let table = Table::try_new([column("k", keys), column("v", values)]).unwrap();

        let run = |config: ExecutionConfig| {
            let grouped = table.with_config(config).group_by(&["k"]).unwrap();
            let summary = grouped
                .summarize([sum("v").alias("s"), first("v").alias("f")])
                .unwrap();
            let mutated = grouped.mutate("pos", row_number()).unwrap().ungroup();
            (summary, mutated)
        };

        let sequential = run(ExecutionConfig::single_threaded());
        let parallel = run(ExecutionConfig {
            parallel: true,
            parallel_row_threshold: 1,
            parallel_partition_threshold: 1,
        });
        assert_tables_eq(&sequential.0, &parallel.0);
        assert_tables_eq(&sequential.1, &parallel.1);
    }
}
