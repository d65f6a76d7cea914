use std::sync::Arc;

use indexmap::IndexMap;
use tidyframe_error::{ErrorKind, FrameError, Result};

use super::column::Column;
use super::compute::take::take;
use super::datatype::DataType;
use super::row::RowContext;
use super::scalar::ScalarValue;
use super::schema::{Field, Schema};
use super::selection::SelectionVector;
use crate::config::ExecutionConfig;

/// An immutable, ordered collection of equal-length named columns.
///
/// Every operation returns a new table. Column buffers are shared between a
/// table and the tables derived from it wherever the values didn't change.
#[derive(Debug, Clone)]
pub struct Table {
    /// Columns keyed by name, in display order.
    columns: IndexMap<Arc<str>, Column>,
    /// Number of rows. Tracked separately so that a zero-column table has a
    /// well defined row count.
    num_rows: usize,
    config: Arc<ExecutionConfig>,
}

impl Table {
    /// A table with no columns and no rows.
    pub fn empty() -> Self {
        Table {
            columns: IndexMap::new(),
            num_rows: 0,
            config: Arc::new(ExecutionConfig::default()),
        }
    }

    /// Create a table from columns.
    ///
    /// Errors with `DuplicateColumnName` if a name repeats and with
    /// `LengthMismatch` if the columns aren't all the same length.
    pub fn try_new(columns: impl IntoIterator<Item = Column>) -> Result<Self> {
        Self::try_new_with_config(columns, Arc::new(ExecutionConfig::default()))
    }

    pub(crate) fn try_new_with_config(
        columns: impl IntoIterator<Item = Column>,
        config: Arc<ExecutionConfig>,
    ) -> Result<Self> {
        let mut map: IndexMap<Arc<str>, Column> = IndexMap::new();
        let mut num_rows = None;

        for col in columns {
            let len = *num_rows.get_or_insert(col.len());
            if col.len() != len {
                return Err(FrameError::length_mismatch(len, col.len())
                    .with_field("column", col.name()));
            }
            if map.contains_key(col.name()) {
                return Err(duplicate(col.name()));
            }
            map.insert(col.name().into(), col);
        }

        Ok(Table {
            columns: map,
            num_rows: num_rows.unwrap_or(0),
            config,
        })
    }

    /// Create a table with `num_rows` rows and no columns.
    pub(crate) fn with_num_rows(num_rows: usize, config: Arc<ExecutionConfig>) -> Self {
        Table {
            columns: IndexMap::new(),
            num_rows,
            config,
        }
    }

    /// Same data, executed with a different config.
    pub fn with_config(&self, config: ExecutionConfig) -> Table {
        Table {
            config: Arc::new(config),
            ..self.clone()
        }
    }

    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    pub(crate) fn config_arc(&self) -> &Arc<ExecutionConfig> {
        &self.config
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.keys().map(|k| k.as_ref()).collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    /// Get a column by name.
    pub fn column(&self, name: &str) -> Result<&Column> {
        self.columns
            .get(name)
            .ok_or_else(|| FrameError::unknown_column(name))
    }

    pub fn column_kind(&self, name: &str) -> Result<DataType> {
        Ok(self.column(name)?.datatype())
    }

    pub fn columns(&self) -> impl ExactSizeIterator<Item = &Column> {
        self.columns.values()
    }

    pub fn schema(&self) -> Schema {
        Schema::new(self.columns.values().map(|c| Field {
            name: c.name().to_string(),
            datatype: c.datatype(),
        }))
    }

    /// Get a single value.
    pub fn value(&self, row: usize, column: &str) -> Result<ScalarValue> {
        self.column(column)?.get(row)
    }

    /// Access a single row.
    pub fn row(&self, row: usize) -> Result<RowContext<'_>> {
        if row >= self.num_rows {
            return Err(
                FrameError::with_kind(ErrorKind::IndexOutOfRange, "Row index out of range")
                    .with_field("index", row)
                    .with_field("num_rows", self.num_rows),
            );
        }
        Ok(RowContext::new(self, row))
    }

    /// Iterate over all rows.
    pub fn rows(&self) -> impl ExactSizeIterator<Item = RowContext<'_>> {
        (0..self.num_rows).map(|row| RowContext::new(self, row))
    }

    /// Add a column, or replace the column with the same name in place.
    ///
    /// Errors with `LengthMismatch` if the table has rows and the new column's
    /// length differs from the row count. A table with no rows and no columns
    /// takes the new column's length.
    pub fn add_or_replace(&self, column: Column) -> Result<Table> {
        let adopts_len = self.columns.is_empty() && self.num_rows == 0;
        if !adopts_len && column.len() != self.num_rows {
            return Err(FrameError::length_mismatch(self.num_rows, column.len())
                .with_field("column", column.name()));
        }

        let num_rows = column.len();
        let mut columns = self.columns.clone();
        // IndexMap::insert keeps the position of an existing key.
        columns.insert(column.name().into(), column);

        Ok(Table {
            columns,
            num_rows,
            config: self.config.clone(),
        })
    }

    /// Create a table with exactly the given columns, in the given order.
    pub fn with_columns<S: AsRef<str>>(&self, names: &[S]) -> Result<Table> {
        let columns = names
            .iter()
            .map(|name| self.column(name.as_ref()).cloned())
            .collect::<Result<Vec<_>>>()?;

        let mut table = Self::try_new_with_config(columns, self.config.clone())?;
        table.num_rows = self.num_rows;
        Ok(table)
    }

    /// Replace columns wholesale, keeping the config. Used by verbs that
    /// rebuild every column.
    pub(crate) fn derive(&self, columns: impl IntoIterator<Item = Column>) -> Result<Table> {
        Self::try_new_with_config(columns, self.config.clone())
    }

    /// Pick out rows by index, in selection order.
    pub fn take(&self, selection: &SelectionVector) -> Result<Table> {
        if self.columns.is_empty() {
            if let Some(bad) = selection.iter_locations().find(|&idx| idx >= self.num_rows) {
                return Err(FrameError::with_kind(
                    ErrorKind::IndexOutOfRange,
                    "Selection index out of range",
                )
                .with_field("index", bad)
                .with_field("num_rows", self.num_rows));
            }
            return Ok(Self::with_num_rows(
                selection.num_rows(),
                self.config.clone(),
            ));
        }

        let columns = self
            .columns
            .values()
            .map(|col| Ok(Column::new(col.name(), take(col.array(), selection)?)))
            .collect::<Result<Vec<_>>>()?;

        self.derive(columns)
    }

    /// Rename a column, keeping its position.
    pub fn rename(&self, from: &str, to: &str) -> Result<Table> {
        let col = self.column(from)?;
        if from != to && self.has_column(to) {
            return Err(duplicate(to));
        }
        let renamed = col.with_name(to);
        let columns = self.columns.values().map(|c| {
            if c.name() == from {
                renamed.clone()
            } else {
                c.clone()
            }
        });
        self.derive(columns)
    }
}

fn duplicate(name: &str) -> FrameError {
    FrameError::with_kind(ErrorKind::DuplicateColumnName, "Duplicate column name")
        .with_field("column", name)
}

/// Tables are equal if they have the same columns (names, order, values).
/// The execution config isn't part of equality.
impl PartialEq for Table {
    fn eq(&self, other: &Self) -> bool {
        self.num_rows == other.num_rows
            && self.columns.len() == other.columns.len()
            && self
                .columns
                .values()
                .zip(other.columns.values())
                .all(|(a, b)| a == b)
    }
}
