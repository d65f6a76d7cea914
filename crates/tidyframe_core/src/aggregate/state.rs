//! Per-partition aggregate states.
use std::cmp::Ordering;
use std::fmt::Debug;
use std::hash::{Hash, Hasher};

use ahash::RandomState;
use hashbrown::HashSet;
use tidyframe_error::{ErrorKind, FrameError, Result};

use crate::arrays::scalar::{GroupKeyValue, ScalarValue};

/// State for a single partition's aggregate.
///
/// An example state for SUM would be a struct that keeps a running sum of
/// the values provided in `update`.
pub trait AggregateState<T, O>: Default + Debug {
    /// Merge other state into this state.
    ///
    /// `other` always covers rows that come after the rows seen by `self`.
    fn merge(&mut self, other: Self) -> Result<()>;

    /// Update this state with some input.
    fn update(&mut self, input: T) -> Result<()>;

    /// Produce a single value from the state, None for null.
    fn finalize(self) -> Result<Option<O>>;
}

#[derive(Debug, Default)]
pub struct CountState {
    count: i64,
}

impl<T> AggregateState<T, i64> for CountState {
    fn merge(&mut self, other: Self) -> Result<()> {
        self.count += other.count;
        Ok(())
    }

    fn update(&mut self, _input: T) -> Result<()> {
        self.count += 1;
        Ok(())
    }

    fn finalize(self) -> Result<Option<i64>> {
        Ok(Some(self.count))
    }
}

/// Integer sum. Accumulates in i128 so the result doesn't depend on the
/// order values are added in, overflow is checked once at the end.
#[derive(Debug, Default)]
pub struct SumI64State {
    sum: i128,
    valid: bool,
}

impl AggregateState<i64, i64> for SumI64State {
    fn merge(&mut self, other: Self) -> Result<()> {
        self.sum += other.sum;
        self.valid |= other.valid;
        Ok(())
    }

    fn update(&mut self, input: i64) -> Result<()> {
        self.sum += input as i128;
        self.valid = true;
        Ok(())
    }

    fn finalize(self) -> Result<Option<i64>> {
        if !self.valid {
            return Ok(None);
        }
        i64::try_from(self.sum).map(Some).map_err(|_| {
            FrameError::with_kind(ErrorKind::NumericOverflow, "Integer sum overflowed")
                .with_field("sum", self.sum)
        })
    }
}

#[derive(Debug, Default)]
pub struct SumF64State {
    sum: f64,
    valid: bool,
}

impl AggregateState<f64, f64> for SumF64State {
    fn merge(&mut self, other: Self) -> Result<()> {
        self.sum += other.sum;
        self.valid |= other.valid;
        Ok(())
    }

    fn update(&mut self, input: f64) -> Result<()> {
        self.sum += input;
        self.valid = true;
        Ok(())
    }

    fn finalize(self) -> Result<Option<f64>> {
        Ok(self.valid.then_some(self.sum))
    }
}

#[derive(Debug, Default)]
pub struct AvgState {
    sum: f64,
    count: i64,
}

impl AggregateState<f64, f64> for AvgState {
    fn merge(&mut self, other: Self) -> Result<()> {
        self.sum += other.sum;
        self.count += other.count;
        Ok(())
    }

    fn update(&mut self, input: f64) -> Result<()> {
        self.sum += input;
        self.count += 1;
        Ok(())
    }

    fn finalize(self) -> Result<Option<f64>> {
        if self.count == 0 {
            return Ok(None);
        }
        Ok(Some(self.sum / self.count as f64))
    }
}

/// Ordering used by min/max. Floats use the IEEE total order so that NaN has
/// a fixed place.
pub trait TotalOrd: Copy + Debug {
    fn total_order(&self, other: &Self) -> Ordering;
}

impl TotalOrd for i64 {
    fn total_order(&self, other: &Self) -> Ordering {
        self.cmp(other)
    }
}

impl TotalOrd for f64 {
    fn total_order(&self, other: &Self) -> Ordering {
        self.total_cmp(other)
    }
}

#[derive(Debug)]
pub struct MinState<T> {
    min: Option<T>,
}

impl<T> Default for MinState<T> {
    fn default() -> Self {
        MinState { min: None }
    }
}

impl<T: TotalOrd> AggregateState<T, T> for MinState<T> {
    fn merge(&mut self, other: Self) -> Result<()> {
        if let Some(v) = other.min {
            self.update(v)?;
        }
        Ok(())
    }

    fn update(&mut self, input: T) -> Result<()> {
        match self.min {
            Some(cur) if cur.total_order(&input).is_le() => (),
            _ => self.min = Some(input),
        }
        Ok(())
    }

    fn finalize(self) -> Result<Option<T>> {
        Ok(self.min)
    }
}

#[derive(Debug)]
pub struct MaxState<T> {
    max: Option<T>,
}

impl<T> Default for MaxState<T> {
    fn default() -> Self {
        MaxState { max: None }
    }
}

impl<T: TotalOrd> AggregateState<T, T> for MaxState<T> {
    fn merge(&mut self, other: Self) -> Result<()> {
        if let Some(v) = other.max {
            self.update(v)?;
        }
        Ok(())
    }

    fn update(&mut self, input: T) -> Result<()> {
        match self.max {
            Some(cur) if cur.total_order(&input).is_ge() => (),
            _ => self.max = Some(input),
        }
        Ok(())
    }

    fn finalize(self) -> Result<Option<T>> {
        Ok(self.max)
    }
}

#[derive(Debug, Default)]
pub struct MedianState {
    values: Vec<f64>,
}

impl AggregateState<f64, f64> for MedianState {
    fn merge(&mut self, mut other: Self) -> Result<()> {
        self.values.append(&mut other.values);
        Ok(())
    }

    fn update(&mut self, input: f64) -> Result<()> {
        self.values.push(input);
        Ok(())
    }

    fn finalize(mut self) -> Result<Option<f64>> {
        if self.values.is_empty() {
            return Ok(None);
        }
        self.values.sort_by(|a, b| a.total_cmp(b));
        let mid = self.values.len() / 2;
        if self.values.len() % 2 == 1 {
            Ok(Some(self.values[mid]))
        } else {
            Ok(Some((self.values[mid - 1] + self.values[mid]) / 2.0))
        }
    }
}

/// Sample standard deviation using Welford's online algorithm.
#[derive(Debug, Default)]
pub struct StddevSampState {
    count: i64,
    mean: f64,
    m2: f64,
}

impl AggregateState<f64, f64> for StddevSampState {
    fn merge(&mut self, other: Self) -> Result<()> {
        if self.count == 0 {
            *self = other;
            return Ok(());
        }
        if other.count == 0 {
            return Ok(());
        }

        let self_count = self.count as f64;
        let other_count = other.count as f64;
        let total_count = self_count + other_count;

        let delta = other.mean - self.mean;
        self.mean += delta * other_count / total_count;
        self.m2 += other.m2 + delta * delta * self_count * other_count / total_count;
        self.count += other.count;

        Ok(())
    }

    fn update(&mut self, input: f64) -> Result<()> {
        self.count += 1;
        let delta = input - self.mean;
        self.mean += delta / self.count as f64;
        let delta2 = input - self.mean;
        self.m2 += delta * delta2;

        Ok(())
    }

    fn finalize(self) -> Result<Option<f64>> {
        if self.count < 2 {
            return Ok(None);
        }
        Ok(Some((self.m2 / (self.count - 1) as f64).sqrt()))
    }
}

#[derive(Debug, Default)]
pub struct FirstState {
    value: Option<ScalarValue>,
}

impl AggregateState<ScalarValue, ScalarValue> for FirstState {
    fn merge(&mut self, other: Self) -> Result<()> {
        if self.value.is_none() {
            self.value = other.value;
        }
        Ok(())
    }

    fn update(&mut self, input: ScalarValue) -> Result<()> {
        if self.value.is_none() {
            self.value = Some(input);
        }
        Ok(())
    }

    fn finalize(self) -> Result<Option<ScalarValue>> {
        Ok(self.value)
    }
}

#[derive(Debug, Default)]
pub struct LastState {
    value: Option<ScalarValue>,
}

impl AggregateState<ScalarValue, ScalarValue> for LastState {
    fn merge(&mut self, other: Self) -> Result<()> {
        if other.value.is_some() {
            self.value = other.value;
        }
        Ok(())
    }

    fn update(&mut self, input: ScalarValue) -> Result<()> {
        self.value = Some(input);
        Ok(())
    }

    fn finalize(self) -> Result<Option<ScalarValue>> {
        Ok(self.value)
    }
}

/// Owned scalar hashed with group key semantics.
#[derive(Debug)]
struct DistinctValue(ScalarValue);

impl PartialEq for DistinctValue {
    fn eq(&self, other: &Self) -> bool {
        self.0.key_eq(&other.0)
    }
}

impl Eq for DistinctValue {}

impl Hash for DistinctValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        GroupKeyValue(&self.0).hash(state)
    }
}

#[derive(Debug)]
pub struct DistinctCountState {
    seen: HashSet<DistinctValue, RandomState>,
}

impl Default for DistinctCountState {
    fn default() -> Self {
        DistinctCountState {
            seen: HashSet::with_hasher(RandomState::new()),
        }
    }
}

impl AggregateState<ScalarValue, i64> for DistinctCountState {
    fn merge(&mut self, other: Self) -> Result<()> {
        self.seen.extend(other.seen);
        Ok(())
    }

    fn update(&mut self, input: ScalarValue) -> Result<()> {
        self.seen.insert(DistinctValue(input));
        Ok(())
    }

    fn finalize(self) -> Result<Option<i64>> {
        Ok(Some(self.seen.len() as i64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run<T, O, S: AggregateState<T, O>>(values: impl IntoIterator<Item = T>) -> Option<O> {
        let mut state = S::default();
        for v in values {
            state.update(v).unwrap();
        }
        state.finalize().unwrap()
    }

    /// Split input in two, feed each half to its own state, then merge.
    fn run_split<T, O, S: AggregateState<T, O>>(values: Vec<T>, at: usize) -> Option<O> {
        let mut values = values;
        let tail = values.split_off(at);
        let mut a = S::default();
        for v in values {
            a.update(v).unwrap();
        }
        let mut b = S::default();
        for v in tail {
            b.update(v).unwrap();
        }
        a.merge(b).unwrap();
        a.finalize().unwrap()
    }

    #[test]
    fn sum_i64_overflow_checked_at_end() {
        assert_eq!(
            Some(i64::MAX),
            run::<_, _, SumI64State>([i64::MAX, 1, -1])
        );

        let mut state = SumI64State::default();
        state.update(i64::MAX).unwrap();
        state.update(1).unwrap();
        let err = state.finalize().unwrap_err();
        assert_eq!(ErrorKind::NumericOverflow, err.kind());
    }

    #[test]
    fn empty_states_are_null() {
        assert_eq!(None, run::<i64, _, SumI64State>([]));
        assert_eq!(None, run::<f64, _, AvgState>([]));
        assert_eq!(None, run::<f64, _, MinState<f64>>([]));
        assert_eq!(None, run::<f64, _, MedianState>([]));
        assert_eq!(Some(0), run::<f64, _, CountState>([]));
    }

    #[test]
    fn median_even_and_odd() {
        assert_eq!(Some(2.0), run::<_, _, MedianState>([3.0, 1.0, 2.0]));
        assert_eq!(Some(2.5), run::<_, _, MedianState>([4.0, 1.0, 2.0, 3.0]));
    }

    #[test]
    fn stddev_merge_matches_sequential() {
        let values = vec![2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let seq = run::<_, _, StddevSampState>(values.clone()).unwrap();
        let split = run_split::<_, _, StddevSampState>(values, 3).unwrap();
        assert!((seq - split).abs() < 1e-12);
        assert!((seq - 2.138089935299395).abs() < 1e-12);

        assert_eq!(None, run::<_, _, StddevSampState>([1.0]));
    }

    #[test]
    fn first_last_merge_in_order() {
        let values: Vec<ScalarValue> = vec![1.into(), 2.into(), 3.into()];
        assert_eq!(
            Some(ScalarValue::Int64(1)),
            run_split::<_, _, FirstState>(values.clone(), 0)
        );
        assert_eq!(
            Some(ScalarValue::Int64(3)),
            run_split::<_, _, LastState>(values.clone(), 3)
        );
        assert_eq!(
            Some(ScalarValue::Int64(3)),
            run_split::<_, _, LastState>(values, 1)
        );
    }

    #[test]
    fn min_max_floats() {
        assert_eq!(Some(-1.5), run::<_, _, MinState<f64>>([3.0, -1.5, 2.0]));
        assert_eq!(Some(3.0), run_split::<_, _, MaxState<f64>>(vec![3.0, -1.5, 2.0], 1));
    }

    #[test]
    fn distinct_count_uses_key_equality() {
        let values: Vec<ScalarValue> = vec![
            0.0.into(),
            (-0.0).into(),
            1.into(),
            "a".into(),
            "a".into(),
        ];
        assert_eq!(Some(3), run::<_, _, DistinctCountState>(values));
    }
}
