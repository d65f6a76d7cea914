//! Row-wise evaluation of user functions.
use std::fmt;
use std::sync::Arc;

use rayon::prelude::*;
use tidyframe_error::Result;
use tracing::trace;

use crate::arrays::array::Array;
use crate::arrays::row::RowContext;
use crate::arrays::scalar::ScalarValue;
use crate::arrays::table::Table;

type RowFnInner = dyn Fn(&RowContext<'_>) -> Result<ScalarValue> + Send + Sync;

/// A function producing one value per row.
///
/// Called once for every row with an explicit context, there's no hidden
/// row counter. Calls may happen on multiple threads and in any order.
#[derive(Clone)]
pub struct RowFn(Arc<RowFnInner>);

impl RowFn {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&RowContext<'_>) -> Result<ScalarValue> + Send + Sync + 'static,
    {
        RowFn(Arc::new(f))
    }

    pub fn call(&self, row: &RowContext<'_>) -> Result<ScalarValue> {
        (self.0)(row)
    }

    /// Evaluate for every row of `table`, in row order.
    ///
    /// The output type is inferred from the produced values.
    pub fn evaluate(&self, table: &Table) -> Result<Array> {
        let values = self.evaluate_values(table)?;
        Ok(Array::from_scalars_inferred(values))
    }

    pub(crate) fn evaluate_values(&self, table: &Table) -> Result<Vec<ScalarValue>> {
        let num_rows = table.num_rows();
        if table.config().parallel_rows(num_rows) {
            trace!(num_rows, "parallel row-wise evaluation");
            (0..num_rows)
                .into_par_iter()
                .map(|row| self.call(&RowContext::new(table, row)))
                .collect()
        } else {
            table.rows().map(|row| self.call(&row)).collect()
        }
    }
}

impl fmt::Debug for RowFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RowFn(..)")
    }
}

type ValueFnInner = dyn Fn(ScalarValue) -> Result<ScalarValue> + Send + Sync;

/// A function over single non-null values. Nulls never reach it.
#[derive(Clone)]
pub struct ValueFn(Arc<ValueFnInner>);

impl ValueFn {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(ScalarValue) -> Result<ScalarValue> + Send + Sync + 'static,
    {
        ValueFn(Arc::new(f))
    }

    pub fn call(&self, value: ScalarValue) -> Result<ScalarValue> {
        (self.0)(value)
    }
}

impl fmt::Debug for ValueFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ValueFn(..)")
    }
}

#[cfg(test)]
mod tests {
    use tidyframe_error::ErrorKind;

    use super::*;
    use crate::arrays::column::column;
    use crate::config::ExecutionConfig;

    fn table() -> Table {
        Table::try_new([
            column("name", [Some("Max"), None, Some("Horst")]),
            column("age", [23_i64, 23, 12]),
        ])
        .unwrap()
    }

    #[test]
    fn row_numbers_and_lookup() {
        let f = RowFn::new(|row| {
            let name = row.get_str("name")?.unwrap_or_else(|| "?".to_string());
            Ok(format!("{}:{name}", row.row_number()).into())
        });
        assert_eq!(
            Array::from_iter(["0:Max", "1:?", "2:Horst"]),
            f.evaluate(&table()).unwrap()
        );
    }

    #[test]
    fn parallel_keeps_order() {
        let values: Vec<i64> = (0..5000).collect();
        let table = Table::try_new([column("v", values.clone())])
            .unwrap()
            .with_config(ExecutionConfig {
                parallel: true,
                parallel_row_threshold: 1,
                parallel_partition_threshold: 1,
            });
        let f = RowFn::new(|row| {
            assert_eq!(Some(row.row_number() as i64), row.get_i64("v")?);
            Ok((row.row_number() as i64 * 2).into())
        });
        let expected: Array = values.iter().map(|v| v * 2).collect();
        assert_eq!(expected, f.evaluate(&table).unwrap());
    }

    #[test]
    fn mixed_kinds_become_any() {
        let f = RowFn::new(|row| {
            Ok(if row.row_number() == 0 {
                ScalarValue::from(1)
            } else {
                ScalarValue::from("x")
            })
        });
        let got = f.evaluate(&table()).unwrap();
        assert_eq!(crate::arrays::datatype::DataType::Any, got.datatype());
    }

    #[test]
    fn errors_surface() {
        let f = RowFn::new(|row| Ok(row.get_i64("name")?.into()));
        let err = f.evaluate(&table()).unwrap_err();
        assert_eq!(ErrorKind::TypeMismatch, err.kind());
    }
}
