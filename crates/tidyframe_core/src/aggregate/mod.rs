//! Named reducers over a column, optionally restricted to a partition.
pub mod state;

use std::fmt;

use rayon::prelude::*;
use tidyframe_error::{FrameError, Result};
use tracing::trace;

use self::state::{
    AggregateState,
    AvgState,
    CountState,
    DistinctCountState,
    FirstState,
    LastState,
    MaxState,
    MedianState,
    MinState,
    StddevSampState,
    SumF64State,
    SumI64State,
};
use crate::arrays::array::{Array, ArrayData};
use crate::arrays::datatype::DataType;
use crate::arrays::scalar::ScalarValue;
use crate::arrays::table::Table;
use crate::config::ExecutionConfig;
use crate::expr::{Expression, NamedExpr};

/// Number of rows handed to a single rayon task when a reduction fans out.
const PARALLEL_CHUNK_SIZE: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateFunction {
    Count,
    Sum,
    Mean,
    Min,
    Max,
    Median,
    /// Sample standard deviation.
    Sd,
    First,
    Last,
    NDistinct,
}

impl AggregateFunction {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Count => "count",
            Self::Sum => "sum",
            Self::Mean => "mean",
            Self::Min => "min",
            Self::Max => "max",
            Self::Median => "median",
            Self::Sd => "sd",
            Self::First => "first",
            Self::Last => "last",
            Self::NDistinct => "n_distinct",
        }
    }

    /// Reducers that always skip nulls, regardless of the remove nulls flag.
    const fn counts_non_null(&self) -> bool {
        matches!(self, Self::Count | Self::NDistinct)
    }

    /// Reducers whose result is independent of how rows are split up and
    /// merged back together. Floating point sums are excluded since their
    /// result depends on addition order.
    const fn merge_is_exact(&self, input: DataType) -> bool {
        match self {
            Self::Count | Self::NDistinct | Self::Min | Self::Max | Self::Median => true,
            Self::Sum => matches!(input, DataType::Int64),
            Self::Mean | Self::Sd | Self::First | Self::Last => false,
        }
    }

    /// Output type given the input column's type.
    ///
    /// Errors with `TypeMismatch` for numeric reducers on non-numeric input.
    pub fn return_type(&self, input: DataType) -> Result<DataType> {
        match self {
            Self::Count | Self::NDistinct => Ok(DataType::Int64),
            Self::First | Self::Last => Ok(input),
            Self::Sum | Self::Min | Self::Max if input.is_numeric() => Ok(input),
            Self::Mean | Self::Median | Self::Sd if input.is_numeric() => Ok(DataType::Float64),
            _ => Err(
                FrameError::type_mismatch("Aggregate requires a numeric column")
                    .with_field("aggregate", self.name())
                    .with_field("datatype", input),
            ),
        }
    }
}

impl fmt::Display for AggregateFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A reducer applied to a named column.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateExpr {
    pub function: AggregateFunction,
    pub column: String,
    /// Drop nulls before reducing. If false, any null input makes the result
    /// null. Ignored by `count` and `n_distinct`.
    pub remove_nulls: bool,
}

impl AggregateExpr {
    pub fn new(function: AggregateFunction, column: impl Into<String>) -> Self {
        AggregateExpr {
            function,
            column: column.into(),
            remove_nulls: false,
        }
    }

    pub fn remove_nulls(mut self, remove_nulls: bool) -> Self {
        self.remove_nulls = remove_nulls;
        self
    }

    pub fn alias(self, name: impl Into<String>) -> NamedExpr {
        Expression::from(self).alias(name)
    }

    pub fn return_type(&self, table: &Table) -> Result<DataType> {
        self.function.return_type(table.column_kind(&self.column)?)
    }

    /// Reduce the column over every row of `table`.
    pub fn evaluate(&self, table: &Table) -> Result<ScalarValue> {
        let column = table.column(&self.column)?;
        self.reduce(column.array(), None, table.config())
    }

    /// Reduce `array`, looking only at `rows` if provided.
    pub(crate) fn reduce(
        &self,
        array: &Array,
        rows: Option<&[usize]>,
        config: &ExecutionConfig,
    ) -> Result<ScalarValue> {
        let datatype = array.datatype();
        self.function.return_type(datatype)?;

        let all_rows: Vec<usize>;
        let rows = match rows {
            Some(rows) => rows,
            None => {
                all_rows = (0..array.len()).collect();
                &all_rows
            }
        };

        let valid: Vec<usize> = rows
            .iter()
            .copied()
            .filter(|&row| array.is_valid(row))
            .collect();

        if !self.function.counts_non_null() && !self.remove_nulls && valid.len() != rows.len() {
            return Ok(ScalarValue::Null);
        }

        let parallel =
            self.function.merge_is_exact(datatype) && config.parallel_rows(valid.len());
        if parallel {
            trace!(aggregate = %self.function, rows = valid.len(), "parallel reduction");
        }

        let valid = valid.as_slice();
        let value: ScalarValue = match (self.function, array.data()) {
            (AggregateFunction::Count, _) => {
                reduce_rows::<(), _, CountState, _>(valid, |_| (), parallel)?.into()
            }
            (AggregateFunction::NDistinct, _) => {
                reduce_rows::<_, _, DistinctCountState, _>(
                    valid,
                    |row| array.scalar_unchecked(row),
                    parallel,
                )?
                .into()
            }
            (AggregateFunction::First, _) => reduce_rows::<_, _, FirstState, _>(
                valid,
                |row| array.scalar_unchecked(row),
                false,
            )?
            .into(),
            (AggregateFunction::Last, _) => reduce_rows::<_, _, LastState, _>(
                valid,
                |row| array.scalar_unchecked(row),
                false,
            )?
            .into(),
            (AggregateFunction::Sum, ArrayData::Int64(v)) => {
                reduce_rows::<_, _, SumI64State, _>(valid, |row| v[row], parallel)?.into()
            }
            (AggregateFunction::Sum, ArrayData::Float64(v)) => {
                reduce_rows::<_, _, SumF64State, _>(valid, |row| v[row], parallel)?.into()
            }
            (AggregateFunction::Min, ArrayData::Int64(v)) => {
                reduce_rows::<_, _, MinState<i64>, _>(valid, |row| v[row], parallel)?.into()
            }
            (AggregateFunction::Min, ArrayData::Float64(v)) => {
                reduce_rows::<_, _, MinState<f64>, _>(valid, |row| v[row], parallel)?.into()
            }
            (AggregateFunction::Max, ArrayData::Int64(v)) => {
                reduce_rows::<_, _, MaxState<i64>, _>(valid, |row| v[row], parallel)?.into()
            }
            (AggregateFunction::Max, ArrayData::Float64(v)) => {
                reduce_rows::<_, _, MaxState<f64>, _>(valid, |row| v[row], parallel)?.into()
            }
            (AggregateFunction::Mean, data) => {
                reduce_f64::<AvgState>(data, valid, parallel)?.into()
            }
            (AggregateFunction::Median, data) => {
                reduce_f64::<MedianState>(data, valid, parallel)?.into()
            }
            (AggregateFunction::Sd, data) => {
                reduce_f64::<StddevSampState>(data, valid, parallel)?.into()
            }
            (function, data) => {
                return Err(FrameError::new("Unhandled aggregate input")
                    .with_field("aggregate", function)
                    .with_field("datatype", data.datatype()));
            }
        };

        Ok(value)
    }
}

/// Run a reducer producing an f64 over a numeric column, widening integers.
fn reduce_f64<S>(data: &ArrayData, rows: &[usize], parallel: bool) -> Result<Option<f64>>
where
    S: AggregateState<f64, f64> + Send,
{
    match data {
        ArrayData::Int64(v) => reduce_rows::<_, _, S, _>(rows, |row| v[row] as f64, parallel),
        ArrayData::Float64(v) => reduce_rows::<_, _, S, _>(rows, |row| v[row], parallel),
        other => Err(FrameError::type_mismatch("Expected a numeric column")
            .with_field("datatype", other.datatype())),
    }
}

fn reduce_rows<T, O, S, F>(rows: &[usize], value: F, parallel: bool) -> Result<Option<O>>
where
    S: AggregateState<T, O> + Send,
    F: Fn(usize) -> T + Sync,
{
    let state = if parallel {
        rows.par_chunks(PARALLEL_CHUNK_SIZE)
            .map(|chunk| update_state::<T, O, S, F>(chunk, &value))
            .try_reduce(S::default, |mut left, right| {
                left.merge(right)?;
                Ok(left)
            })?
    } else {
        update_state::<T, O, S, F>(rows, &value)?
    };
    state.finalize()
}

fn update_state<T, O, S, F>(rows: &[usize], value: &F) -> Result<S>
where
    S: AggregateState<T, O>,
    F: Fn(usize) -> T,
{
    let mut state = S::default();
    for &row in rows {
        state.update(value(row))?;
    }
    Ok(state)
}

pub fn count(column: impl Into<String>) -> AggregateExpr {
    AggregateExpr::new(AggregateFunction::Count, column)
}

pub fn sum(column: impl Into<String>) -> AggregateExpr {
    AggregateExpr::new(AggregateFunction::Sum, column)
}

pub fn mean(column: impl Into<String>) -> AggregateExpr {
    AggregateExpr::new(AggregateFunction::Mean, column)
}

pub fn min(column: impl Into<String>) -> AggregateExpr {
    AggregateExpr::new(AggregateFunction::Min, column)
}

pub fn max(column: impl Into<String>) -> AggregateExpr {
    AggregateExpr::new(AggregateFunction::Max, column)
}

pub fn median(column: impl Into<String>) -> AggregateExpr {
    AggregateExpr::new(AggregateFunction::Median, column)
}

pub fn sd(column: impl Into<String>) -> AggregateExpr {
    AggregateExpr::new(AggregateFunction::Sd, column)
}

pub fn first(column: impl Into<String>) -> AggregateExpr {
    AggregateExpr::new(AggregateFunction::First, column)
}

pub fn last(column: impl Into<String>) -> AggregateExpr {
    AggregateExpr::new(AggregateFunction::Last, column)
}

pub fn n_distinct(column: impl Into<String>) -> AggregateExpr {
    AggregateExpr::new(AggregateFunction::NDistinct, column)
}

#[cfg(test)]
mod tests {
    use tidyframe_error::ErrorKind;

    use super::*;
    use crate::arrays::column::column;

    fn table() -> Table {
        Table::try_new([
            column("age", [Some(23_i64), Some(23), None, Some(12)]),
            column("weight", [55.0, 88.0, 82.0, 70.0]),
            column("name", [Some("Max"), None, Some("Horst"), Some("Max")]),
        ])
        .unwrap()
    }

    #[test]
    fn null_policy() {
        let table = table();
        assert_eq!(ScalarValue::Null, mean("age").evaluate(&table).unwrap());
        assert_eq!(
            ScalarValue::Float64(58.0 / 3.0),
            mean("age").remove_nulls(true).evaluate(&table).unwrap()
        );
        assert_eq!(
            ScalarValue::Int64(58),
            sum("age").remove_nulls(true).evaluate(&table).unwrap()
        );
    }

    #[test]
    fn count_ignores_flag() {
        let table = table();
        assert_eq!(ScalarValue::Int64(3), count("age").evaluate(&table).unwrap());
        assert_eq!(
            ScalarValue::Int64(3),
            count("age").remove_nulls(true).evaluate(&table).unwrap()
        );
        assert_eq!(ScalarValue::Int64(2), n_distinct("name").evaluate(&table).unwrap());
    }

    #[test]
    fn empty_input() {
        let table = Table::try_new([column("x", Vec::<Option<i64>>::new())]).unwrap();
        assert_eq!(ScalarValue::Int64(0), count("x").evaluate(&table).unwrap());
        assert_eq!(ScalarValue::Null, sum("x").evaluate(&table).unwrap());
        assert_eq!(
            ScalarValue::Null,
            max("x").remove_nulls(true).evaluate(&table).unwrap()
        );

        let all_null = Table::try_new([column("x", [None::<f64>, None])]).unwrap();
        assert_eq!(
            ScalarValue::Null,
            mean("x").remove_nulls(true).evaluate(&all_null).unwrap()
        );
        assert_eq!(ScalarValue::Int64(0), count("x").evaluate(&all_null).unwrap());
    }

    #[test]
    fn numeric_only() {
        let err = mean("name").evaluate(&table()).unwrap_err();
        assert_eq!(ErrorKind::TypeMismatch, err.kind());

        // Type check happens even without any rows.
        let empty = Table::try_new([column("s", Vec::<String>::new())]).unwrap();
        let err = sum("s").evaluate(&empty).unwrap_err();
        assert_eq!(ErrorKind::TypeMismatch, err.kind());
    }

    #[test]
    fn first_last_with_nulls() {
        let table = table();
        assert_eq!(ScalarValue::Null, first("name").evaluate(&table).unwrap());
        assert_eq!(
            ScalarValue::from("Max"),
            last("name").remove_nulls(true).evaluate(&table).unwrap()
        );
    }

    #[test]
    fn return_types() {
        let table = table();
        assert_eq!(DataType::Int64, min("age").return_type(&table).unwrap());
        assert_eq!(DataType::Float64, median("age").return_type(&table).unwrap());
        assert_eq!(DataType::Utf8, first("name").return_type(&table).unwrap());
        assert_eq!(DataType::Int64, count("name").return_type(&table).unwrap());
    }

    #[test]
    fn partition_rows() {
        let table = table();
        let array = table.column("weight").unwrap().array();
        let got = max("weight")
            .reduce(array, Some(&[0_usize, 3][..]), table.config())
            .unwrap();
        assert_eq!(ScalarValue::Float64(70.0), got);
    }

    #[test]
    fn parallel_matches_sequential() {
        let values: Vec<Option<i64>> = (0..20_000)
            .map(|v| if v % 7 == 0 { None } else { Some(v % 1000) })
            .collect();
        let table = Table::try_new([column("x", values)]).unwrap();
        let parallel = table.with_config(ExecutionConfig {
            parallel: true,
            parallel_row_threshold: 1,
            parallel_partition_threshold: 1,
        });
        let sequential = table.with_config(ExecutionConfig::single_threaded());

        for agg in [
            count("x"),
            sum("x").remove_nulls(true),
            min("x").remove_nulls(true),
            max("x").remove_nulls(true),
            median("x").remove_nulls(true),
            n_distinct("x"),
            first("x").remove_nulls(true),
            last("x").remove_nulls(true),
        ] {
            assert_eq!(
                agg.evaluate(&sequential).unwrap(),
                agg.evaluate(&parallel).unwrap(),
                "{}",
                agg.function
            );
        }
    }
}
