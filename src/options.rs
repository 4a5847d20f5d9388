//! Reader configuration.
//!
//! [`ReaderOptions`] is what callers pass in: every field is optional and
//! means "use the default" when unset. [`ResolvedOptions`] is what a reader
//! actually runs with once the session's row count is known.
//!
//! Options can be built in code, deserialized with Serde (camelCase keys, as
//! in the driver's JSON settings) or parsed from a connection property map:
//!
//! ```
//! use shardflow::ReaderOptions;
//! use std::collections::HashMap;
//!
//! let props = HashMap::from([
//!     ("splitSize".to_string(), "10000".to_string()),
//!     ("preloadSplitNum".to_string(), "-1".to_string()),
//!     ("threadNum".to_string(), "4".to_string()),
//! ]);
//! let opts = ReaderOptions::from_properties(&props).unwrap();
//! assert_eq!(opts.split_size, Some(10_000));
//! assert_eq!(opts.preload_split_num, None);
//! assert_eq!(opts.thread_num, Some(4));
//! ```

use crate::error::{ReaderError, Result};
use crate::planner::{clamp_record_count, split_count};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

/// Default bound on records buffered per shard queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 4096;

/// Caller-supplied reader settings.
///
/// `None` (or `0` for the sizing knobs) selects the default:
/// - `read_count`: read to the end of the session
/// - `split_size`: one shard covering everything
/// - `preload_split_num`: submit every shard immediately
/// - `thread_num`: `min(preload_split_num, 2 * available cores)`
/// - `queue_capacity`: [`DEFAULT_QUEUE_CAPACITY`]
/// - `fetch_timeout_ms`: wait indefinitely
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReaderOptions {
    pub offset: u64,
    #[serde(deserialize_with = "unset_if_negative")]
    pub read_count: Option<u64>,
    #[serde(deserialize_with = "unset_if_negative")]
    pub split_size: Option<u64>,
    #[serde(deserialize_with = "unset_if_negative")]
    pub preload_split_num: Option<usize>,
    #[serde(deserialize_with = "unset_if_negative")]
    pub thread_num: Option<usize>,
    #[serde(deserialize_with = "unset_if_negative")]
    pub queue_capacity: Option<usize>,
    #[serde(deserialize_with = "unset_if_negative")]
    pub fetch_timeout_ms: Option<u64>,
}

impl ReaderOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    #[must_use]
    pub fn with_read_count(mut self, count: u64) -> Self {
        self.read_count = Some(count);
        self
    }

    #[must_use]
    pub fn with_split_size(mut self, size: u64) -> Self {
        self.split_size = Some(size);
        self
    }

    #[must_use]
    pub fn with_preload_split_num(mut self, n: usize) -> Self {
        self.preload_split_num = Some(n);
        self
    }

    #[must_use]
    pub fn with_thread_num(mut self, n: usize) -> Self {
        self.thread_num = Some(n);
        self
    }

    #[must_use]
    pub fn with_queue_capacity(mut self, n: usize) -> Self {
        self.queue_capacity = Some(n);
        self
    }

    #[must_use]
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    /// Parse options from connection properties.
    ///
    /// Keys are accepted in camelCase (`splitSize`) or snake_case
    /// (`split_size`). Negative values mean "unset". Unknown keys are ignored
    /// so the full connection property map can be passed through.
    ///
    /// # Errors
    /// Returns [`ReaderError::InvalidOption`] for values that are not integers.
    pub fn from_properties(props: &HashMap<String, String>) -> Result<Self> {
        Ok(Self {
            offset: parse_prop::<u64>(props, "offset", "offset")?.unwrap_or(0),
            read_count: parse_prop(props, "readCount", "read_count")?,
            split_size: parse_prop(props, "splitSize", "split_size")?,
            preload_split_num: parse_prop(props, "preloadSplitNum", "preload_split_num")?,
            thread_num: parse_prop(props, "threadNum", "thread_num")?,
            queue_capacity: parse_prop(props, "queueCapacity", "queue_capacity")?,
            fetch_timeout_ms: parse_prop(props, "fetchTimeoutMs", "fetch_timeout_ms")?,
        })
    }

    /// Resolve the effective configuration against `available` rows.
    #[must_use]
    pub fn resolve(&self, available: u64) -> ResolvedOptions {
        let record_count = clamp_record_count(available, self.offset, self.read_count);
        let split_size = match self.split_size {
            Some(n) if n > 0 => n,
            _ => record_count,
        };
        let split_num = split_count(record_count, split_size);
        self.resolve_for(record_count, split_size, split_num)
    }

    pub(crate) fn resolve_for(
        &self,
        record_count: u64,
        split_size: u64,
        split_num: usize,
    ) -> ResolvedOptions {
        let preload_split_num = match self.preload_split_num {
            Some(n) if n > 0 => n,
            _ => split_num.max(1),
        };
        let thread_num = match self.thread_num {
            Some(n) if n > 0 => n,
            _ => preload_split_num.min(2 * num_cpus::get()).max(1),
        };
        ResolvedOptions {
            offset: self.offset,
            record_count,
            split_size,
            split_num,
            preload_split_num,
            thread_num,
            queue_capacity: self
                .queue_capacity
                .filter(|n| *n > 0)
                .unwrap_or(DEFAULT_QUEUE_CAPACITY),
            fetch_timeout: self.fetch_timeout_ms.filter(|ms| *ms > 0).map(Duration::from_millis),
        }
    }
}

/// Effective settings of a running reader.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedOptions {
    pub offset: u64,
    pub record_count: u64,
    pub split_size: u64,
    pub split_num: usize,
    pub preload_split_num: usize,
    pub thread_num: usize,
    pub queue_capacity: usize,
    pub fetch_timeout: Option<Duration>,
}

/// Deserialize an optional count where negative numbers mean "unset".
fn unset_if_negative<'de, D, T>(de: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: TryFrom<i64>,
{
    match Option::<i64>::deserialize(de)? {
        Some(n) if n >= 0 => T::try_from(n)
            .map(Some)
            .map_err(|_| D::Error::custom(format!("{n} is out of range"))),
        _ => Ok(None),
    }
}

fn parse_prop<T: FromStr>(
    props: &HashMap<String, String>,
    camel: &str,
    snake: &str,
) -> Result<Option<T>> {
    let Some(raw) = props.get(camel).or_else(|| props.get(snake)) else {
        return Ok(None);
    };
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    let n: i64 = raw
        .parse()
        .map_err(|_| ReaderError::invalid_option(camel, format!("expected an integer, got {raw:?}")))?;
    if n < 0 {
        return Ok(None);
    }
    n.to_string()
        .parse::<T>()
        .map(Some)
        .map_err(|_| ReaderError::invalid_option(camel, format!("{n} is out of range")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn negative_values_mean_unset() {
        let o = ReaderOptions::from_properties(&props(&[
            ("readCount", "-1"),
            ("preloadSplitNum", "-1"),
            ("threadNum", "-1"),
        ]))
        .unwrap();
        assert_eq!(o, ReaderOptions::default());
    }

    #[test]
    fn snake_case_keys_are_accepted() {
        let o = ReaderOptions::from_properties(&props(&[("split_size", "7"), ("offset", "3")]))
            .unwrap();
        assert_eq!(o.split_size, Some(7));
        assert_eq!(o.offset, 3);
    }

    #[test]
    fn garbage_is_rejected() {
        let err = ReaderOptions::from_properties(&props(&[("splitSize", "lots")])).unwrap_err();
        assert!(matches!(err, ReaderError::InvalidOption { ref key, .. } if key == "splitSize"));
    }

    #[test]
    fn resolve_scenario_from_design() {
        let r = ReaderOptions::new()
            .with_split_size(3)
            .with_preload_split_num(2)
            .with_thread_num(2)
            .resolve(10);
        assert_eq!(r.record_count, 10);
        assert_eq!(r.split_num, 4);
        assert_eq!(r.preload_split_num, 2);
        assert_eq!(r.thread_num, 2);
        assert_eq!(r.queue_capacity, DEFAULT_QUEUE_CAPACITY);
        assert_eq!(r.fetch_timeout, None);
    }

    #[test]
    fn unset_window_covers_all_shards() {
        let r = ReaderOptions::new().with_split_size(2).resolve(10);
        assert_eq!(r.split_num, 5);
        assert_eq!(r.preload_split_num, 5);
        assert!(r.thread_num >= 1 && r.thread_num <= 5);
    }

    #[test]
    fn read_count_is_clamped_past_offset() {
        let r = ReaderOptions::new()
            .with_offset(8)
            .with_read_count(100)
            .resolve(10);
        assert_eq!(r.record_count, 2);
        assert_eq!(r.split_size, 2);
        assert_eq!(r.split_num, 1);
    }

    #[test]
    fn deserializes_from_camel_case_json() {
        let o: ReaderOptions =
            serde_json::from_str(r#"{"splitSize": 100, "threadNum": 3, "fetchTimeoutMs": 250}"#)
                .unwrap();
        assert_eq!(o.split_size, Some(100));
        assert_eq!(o.thread_num, Some(3));
        let r = o.resolve(1000);
        assert_eq!(r.fetch_timeout, Some(Duration::from_millis(250)));

        let o: ReaderOptions =
            serde_json::from_str(r#"{"preloadSplitNum": -1, "threadNum": -1, "readCount": null}"#)
                .unwrap();
        assert_eq!(o, ReaderOptions::default());
    }

    #[test]
    fn json_rejects_non_integer_counts() {
        assert!(serde_json::from_str::<ReaderOptions>(r#"{"splitSize": "big"}"#).is_err());
    }
}
