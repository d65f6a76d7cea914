use tidyframe_error::{FrameError, Result};

use super::Expression;
use super::row::RowFn;
use crate::arrays::array::Array;
use crate::arrays::datatype::DataType;
use crate::arrays::row::RowContext;
use crate::arrays::scalar::ScalarValue;
use crate::arrays::table::Table;

/// Input to `filter`.
///
/// Vectorized predicates are evaluated over whole columns, row-wise ones
/// once per row. Both must produce a boolean or null per row.
#[derive(Debug, Clone)]
pub enum Predicate {
    Vectorized(Expression),
    RowWise(RowFn),
}

impl Predicate {
    /// Row-wise predicate from a function returning a plain boolean.
    pub fn row_wise<F>(f: F) -> Self
    where
        F: Fn(&RowContext<'_>) -> Result<bool> + Send + Sync + 'static,
    {
        Predicate::RowWise(RowFn::new(move |row| f(row).map(ScalarValue::Boolean)))
    }

    /// Evaluate to a boolean mask with one entry per row of `table`.
    pub fn evaluate_mask(&self, table: &Table) -> Result<Array> {
        let mask = match self {
            Predicate::Vectorized(expr) => expr
                .evaluate(table)?
                .into_array(table.num_rows(), DataType::Boolean)?,
            Predicate::RowWise(f) => {
                Array::try_from_scalars(DataType::Boolean, f.evaluate_values(table)?)
                    .map_err(|e| e.with_field("reason", "row-wise predicate must return booleans"))?
            }
        };

        if mask.datatype() != DataType::Boolean {
            return Err(FrameError::type_mismatch("Predicate must produce booleans")
                .with_field("datatype", mask.datatype()));
        }
        if mask.len() != table.num_rows() {
            return Err(FrameError::length_mismatch(table.num_rows(), mask.len())
                .with_field("reason", "predicate mask"));
        }

        Ok(mask)
    }
}

impl From<Expression> for Predicate {
    fn from(expr: Expression) -> Self {
        Predicate::Vectorized(expr)
    }
}

impl From<RowFn> for Predicate {
    fn from(f: RowFn) -> Self {
        Predicate::RowWise(f)
    }
}

#[cfg(test)]
mod tests {
    use tidyframe_error::ErrorKind;

    use super::*;
    use crate::arrays::column::column;
    use crate::expr::{col, eq, gt, lit};

    fn table() -> Table {
        Table::try_new([column("age", [Some(23_i64), None, Some(12)])]).unwrap()
    }

    #[test]
    fn vectorized_mask_keeps_nulls() {
        let mask = Predicate::from(eq(col("age"), lit(23)))
            .evaluate_mask(&table())
            .unwrap();
        assert_eq!(Array::from_iter([Some(true), None, Some(false)]), mask);
    }

    #[test]
    fn scalar_predicate_broadcasts() {
        let mask = Predicate::from(lit(true)).evaluate_mask(&table()).unwrap();
        assert_eq!(Array::from_iter([true, true, true]), mask);
    }

    #[test]
    fn row_wise_mask() {
        let pred = Predicate::row_wise(|row| Ok(row.get_i64("age")?.is_some_and(|v| v > 20)));
        let mask = pred.evaluate_mask(&table()).unwrap();
        assert_eq!(Array::from_iter([true, false, false]), mask);
    }

    #[test]
    fn non_boolean_rejected() {
        let err = Predicate::from(col("age"))
            .evaluate_mask(&table())
            .unwrap_err();
        assert_eq!(ErrorKind::TypeMismatch, err.kind());

        let err = Predicate::RowWise(RowFn::new(|_| Ok(1.into())))
            .evaluate_mask(&table())
            .unwrap_err();
        assert_eq!(ErrorKind::TypeMismatch, err.kind());

        // Comparisons still type check.
        let err = Predicate::from(gt(col("age"), lit("a")))
            .evaluate_mask(&table())
            .unwrap_err();
        assert_eq!(ErrorKind::TypeMismatch, err.kind());
    }
}
