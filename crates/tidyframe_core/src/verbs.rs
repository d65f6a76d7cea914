//! Table verbs that don't warrant their own module.
use tidyframe_error::{ErrorKind, FrameError, Result};
use tracing::debug;

use crate::arrays::column::Column;
use crate::arrays::compute::take::mask_to_selection;
use crate::arrays::datatype::DataType;
use crate::arrays::selection::SelectionVector;
use crate::arrays::table::Table;
use crate::expr::predicate::Predicate;
use crate::expr::{Expression, NamedExpr};

/// Evaluate `expr` against `table` and add or replace column `name`.
pub(crate) fn mutate_table(table: &Table, name: &str, expr: &Expression) -> Result<Table> {
    let null_type = expr.datatype(table)?.unwrap_or(DataType::Any);
    let array = expr
        .evaluate(table)?
        .into_array(table.num_rows(), null_type)
        .map_err(|e| e.with_field("column", name))?;
    table.add_or_replace(Column::new(name, array))
}

impl Table {
    /// Keep rows where the predicate is exactly true. Null and false both
    /// drop the row.
    pub fn filter(&self, predicate: impl Into<Predicate>) -> Result<Table> {
        let mask = predicate.into().evaluate_mask(self)?;
        let selection = mask_to_selection(&mask)?;
        debug!(
            rows_in = self.num_rows(),
            rows_out = selection.num_rows(),
            "filter"
        );
        self.take(&selection)
    }

    /// Add a column computed from `expr`, or replace the column with the same
    /// name in place.
    ///
    /// The expression sees only the columns present on this table. A scalar
    /// result is broadcast to every row.
    pub fn mutate(&self, name: &str, expr: impl Into<Expression>) -> Result<Table> {
        let out = mutate_table(self, name, &expr.into())?;
        debug!(num_rows = self.num_rows(), column = name, "mutate");
        Ok(out)
    }

    /// Reduce the whole table to a single row.
    pub fn summarize(&self, exprs: impl IntoIterator<Item = NamedExpr>) -> Result<Table> {
        self.group_by::<&str>(&[])?.summarize(exprs)
    }

    /// Rows `offset..offset+len`, clamped to the end of the table.
    ///
    /// Errors with `IndexOutOfRange` if `offset` is past the end.
    pub fn slice(&self, offset: usize, len: usize) -> Result<Table> {
        if offset > self.num_rows() {
            return Err(FrameError::with_kind(
                ErrorKind::IndexOutOfRange,
                "Slice offset out of range",
            )
            .with_field("offset", offset)
            .with_field("num_rows", self.num_rows()));
        }
        let end = offset.saturating_add(len).min(self.num_rows());
        self.take(&SelectionVector::with_range(offset..end))
    }

    /// First `n` rows.
    pub fn head(&self, n: usize) -> Result<Table> {
        self.slice(0, n)
    }

    /// Last `n` rows.
    pub fn tail(&self, n: usize) -> Result<Table> {
        let n = n.min(self.num_rows());
        self.slice(self.num_rows() - n, n)
    }

    /// First row of each distinct key tuple, in order of first appearance.
    ///
    /// All columns are kept. With no keys, rows are compared on every
    /// column.
    pub fn distinct<S: AsRef<str>>(&self, keys: &[S]) -> Result<Table> {
        let grouped = if keys.is_empty() {
            self.group_by(self.column_names().as_slice())?
        } else {
            self.group_by(keys)?
        };
        let selection: SelectionVector = grouped
            .groups()
            .iter()
            .filter_map(|partition| partition.rows.get(0))
            .collect();
        debug!(
            rows_in = self.num_rows(),
            rows_out = selection.num_rows(),
            "distinct"
        );
        self.take(&selection)
    }

    /// Number of rows for each distinct key tuple, in a column named `n`.
    pub fn count<S: AsRef<str>>(&self, keys: &[S]) -> Result<Table> {
        self.group_by(keys)?.count()
    }
}
