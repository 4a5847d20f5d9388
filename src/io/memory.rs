//! In-memory range source.

use crate::source::{RangeSource, RecordReader};
use anyhow::{Result, bail};
use std::sync::Arc;

/// Rows held in memory and served by index.
///
/// Cloning the source is cheap; all clones share the same rows.
#[derive(Clone, Debug)]
pub struct VecSource<T> {
    rows: Arc<Vec<T>>,
}

impl<T> VecSource<T> {
    #[must_use]
    pub fn new(rows: Vec<T>) -> Self {
        Self {
            rows: Arc::new(rows),
        }
    }

    #[must_use]
    pub fn rows(&self) -> &[T] {
        &self.rows
    }
}

impl<T> From<Vec<T>> for VecSource<T> {
    fn from(rows: Vec<T>) -> Self {
        Self::new(rows)
    }
}

impl<T> RangeSource for VecSource<T>
where
    T: Clone + Send + Sync + 'static,
{
    type Record = T;
    type Reader = VecRangeReader<T>;

    fn record_count(&self) -> Result<u64> {
        Ok(self.rows.len() as u64)
    }

    fn open_range(&self, start: u64, count: u64) -> Result<Self::Reader> {
        let len = self.rows.len() as u64;
        if start > len {
            bail!("range start {start} is past the end of {len} rows");
        }
        let end = start.saturating_add(count).min(len);
        Ok(VecRangeReader {
            rows: Arc::clone(&self.rows),
            next: start as usize,
            end: end as usize,
        })
    }
}

/// Sequential reader over a slice of a [`VecSource`].
pub struct VecRangeReader<T> {
    rows: Arc<Vec<T>>,
    next: usize,
    end: usize,
}

impl<T: Clone> RecordReader for VecRangeReader<T> {
    type Record = T;

    fn read(&mut self) -> Result<Option<T>> {
        if self.next >= self.end {
            return Ok(None);
        }
        let row = self.rows[self.next].clone();
        self.next += 1;
        Ok(Some(row))
    }
}
