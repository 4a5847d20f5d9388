//! Shard planning: splitting a row window into contiguous, index-addressed ranges.
//!
//! Planning never fails. Every input is normalized:
//! - a requested row count larger than what remains after `offset` is clamped,
//!   and an unset request means "read to the end";
//! - a split size of `0` (or unset) yields a single shard covering everything.
//!
//! Shard `i` covers rows `[offset + i * split_size, offset + i * split_size + count)`
//! where `count = min(split_size, record_count - i * split_size)`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A `[start, start + count)` window of rows owned by one shard.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShardRange {
    pub start: u64,
    pub count: u64,
}

impl ShardRange {
    #[must_use]
    pub const fn new(start: u64, count: u64) -> Self {
        Self { start, count }
    }

    /// Exclusive end row.
    #[must_use]
    pub const fn end(&self) -> u64 {
        self.start + self.count
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }
}

impl fmt::Display for ShardRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end())
    }
}

/// The ordered set of shard ranges for one reader.
///
/// Computed once; the number of shards is fixed for the lifetime of the reader.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardPlan {
    offset: u64,
    record_count: u64,
    split_size: u64,
    ranges: Vec<ShardRange>,
}

impl ShardPlan {
    /// Build a plan from explicit ranges.
    ///
    /// The ranges are consumed in the order given. Zero-count ranges are legal and
    /// contribute no records. `split_size` reports the largest range.
    #[must_use]
    pub fn from_ranges(ranges: Vec<ShardRange>) -> Self {
        let offset = ranges.first().map_or(0, |r| r.start);
        let record_count = ranges.iter().map(|r| r.count).sum();
        let split_size = ranges.iter().map(|r| r.count).max().unwrap_or(0);
        Self {
            offset,
            record_count,
            split_size,
            ranges,
        }
    }

    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Total rows covered by all shards.
    #[must_use]
    pub fn record_count(&self) -> u64 {
        self.record_count
    }

    /// Effective split size.
    #[must_use]
    pub fn split_size(&self) -> u64 {
        self.split_size
    }

    /// Number of shards (`splitNum`).
    #[must_use]
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    #[must_use]
    pub fn ranges(&self) -> &[ShardRange] {
        &self.ranges
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<ShardRange> {
        self.ranges.get(index).copied()
    }
}

/// Clamp a requested row count against what the session has available past `offset`.
///
/// `None` means "read to the end".
#[must_use]
pub fn clamp_record_count(available: u64, offset: u64, requested: Option<u64>) -> u64 {
    let remaining = available.saturating_sub(offset);
    requested.map_or(remaining, |n| n.min(remaining))
}

/// Number of shards needed to cover `record_count` rows in chunks of `split_size`.
#[must_use]
pub fn split_count(record_count: u64, split_size: u64) -> usize {
    if record_count == 0 || split_size == 0 {
        return 0;
    }
    record_count.div_ceil(split_size) as usize
}

/// Plan the shards for `record_count` rows starting at `offset`.
///
/// A `split_size` of `0` means one shard covering everything.
#[must_use]
pub fn plan(offset: u64, record_count: u64, split_size: u64) -> ShardPlan {
    let split_size = if split_size == 0 {
        record_count
    } else {
        split_size
    };
    let shards = split_count(record_count, split_size);
    let ranges = (0..shards as u64)
        .map(|i| {
            let consumed = i * split_size;
            ShardRange::new(offset + consumed, split_size.min(record_count - consumed))
        })
        .collect();
    ShardPlan {
        offset,
        record_count,
        split_size,
        ranges,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uneven_tail_shard() {
        let p = plan(0, 10, 3);
        assert_eq!(p.len(), 4);
        let counts: Vec<u64> = p.ranges().iter().map(|r| r.count).collect();
        assert_eq!(counts, vec![3, 3, 3, 1]);
        assert_eq!(p.get(3), Some(ShardRange::new(9, 1)));
    }

    #[test]
    fn offset_shifts_every_range() {
        let p = plan(100, 7, 4);
        assert_eq!(
            p.ranges(),
            &[ShardRange::new(100, 4), ShardRange::new(104, 3)]
        );
        assert_eq!(p.offset(), 100);
    }

    #[test]
    fn zero_split_size_is_one_shard() {
        let p = plan(5, 42, 0);
        assert_eq!(p.len(), 1);
        assert_eq!(p.split_size(), 42);
        assert_eq!(p.get(0), Some(ShardRange::new(5, 42)));
    }

    #[test]
    fn empty_window_has_no_shards() {
        assert!(plan(0, 0, 0).is_empty());
        assert!(plan(0, 0, 8).is_empty());
    }

    #[test]
    fn clamp_truncates_and_reads_to_end() {
        assert_eq!(clamp_record_count(100, 90, Some(50)), 10);
        assert_eq!(clamp_record_count(100, 90, None), 10);
        assert_eq!(clamp_record_count(100, 0, Some(3)), 3);
        assert_eq!(clamp_record_count(100, 150, None), 0);
    }

    #[test]
    fn explicit_ranges_keep_order() {
        let p = ShardPlan::from_ranges(vec![
            ShardRange::new(0, 2),
            ShardRange::new(2, 0),
            ShardRange::new(2, 5),
        ]);
        assert_eq!(p.len(), 3);
        assert_eq!(p.record_count(), 7);
        assert_eq!(p.split_size(), 5);
        assert!(p.get(1).is_some_and(|r| r.is_empty()));
    }
}
