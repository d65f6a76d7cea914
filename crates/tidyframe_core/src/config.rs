use std::str::FromStr;

use tracing::warn;

pub const ENV_PARALLEL: &str = "TIDYFRAME_PARALLEL";
pub const ENV_PARALLEL_ROW_THRESHOLD: &str = "TIDYFRAME_PARALLEL_ROW_THRESHOLD";
pub const ENV_PARALLEL_PARTITION_THRESHOLD: &str = "TIDYFRAME_PARALLEL_PARTITION_THRESHOLD";

/// Configuration for verb execution.
///
/// None of these settings change results, only how work is scheduled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionConfig {
    /// If work may be spread across the rayon thread pool.
    pub parallel: bool,
    /// Minimum number of rows before row-wise evaluation or a reduction over
    /// a single partition is split across threads.
    pub parallel_row_threshold: usize,
    /// Minimum number of partitions before grouped summarize/mutate evaluate
    /// partitions on separate threads.
    pub parallel_partition_threshold: usize,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        ExecutionConfig {
            parallel: true,
            parallel_row_threshold: 16 * 1024,
            parallel_partition_threshold: 64,
        }
    }
}

impl ExecutionConfig {
    /// A config that never uses more than the calling thread.
    pub fn single_threaded() -> Self {
        ExecutionConfig {
            parallel: false,
            ..Default::default()
        }
    }

    /// Defaults, overridden by any `TIDYFRAME_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(v) = parse_var(&lookup, ENV_PARALLEL) {
            config.parallel = v;
        }
        if let Some(v) = parse_var(&lookup, ENV_PARALLEL_ROW_THRESHOLD) {
            config.parallel_row_threshold = v;
        }
        if let Some(v) = parse_var(&lookup, ENV_PARALLEL_PARTITION_THRESHOLD) {
            config.parallel_partition_threshold = v;
        }
        config
    }

    pub(crate) fn parallel_rows(&self, num_rows: usize) -> bool {
        self.parallel && num_rows >= self.parallel_row_threshold
    }

    pub(crate) fn parallel_partitions(&self, num_partitions: usize) -> bool {
        self.parallel && num_partitions >= self.parallel_partition_threshold
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(%key, value = %raw, "ignoring invalid config value");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_overrides() {
        let config = ExecutionConfig::from_lookup(|key| match key {
            ENV_PARALLEL => Some("false".to_string()),
            ENV_PARALLEL_ROW_THRESHOLD => Some("10".to_string()),
            _ => None,
        });
        assert_eq!(
            ExecutionConfig {
                parallel: false,
                parallel_row_threshold: 10,
                parallel_partition_threshold: 64,
            },
            config
        );
    }

    #[test]
    fn invalid_values_ignored() {
        let config = ExecutionConfig::from_lookup(|key| match key {
            ENV_PARALLEL_PARTITION_THRESHOLD => Some("lots".to_string()),
            _ => None,
        });
        assert_eq!(ExecutionConfig::default(), config);
    }
}
