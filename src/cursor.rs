//! Forward-only result-set cursor.
//!
//! [`ForwardCursor`] is the row-at-a-time surface a query client exposes on
//! top of a [`ShardedReader`]: a `max_rows` cap, a 1-based row number, a
//! closed flag, and progress logging for long scans. Statements that return
//! no row stream are served through [`ForwardCursor::info`] instead.

use crate::error::{ReaderError, Result};
use crate::options::ReaderOptions;
use crate::reader::ShardedReader;
use crate::source::RangeSource;
use std::time::Instant;
use tracing::info;

/// Rows between two progress lines.
const PROGRESS_EVERY: u64 = 100_000;

enum Rows<S: RangeSource> {
    Sharded(ShardedReader<S>),
    Info(Option<S::Record>),
}

/// A forward-only cursor over a row stream.
pub struct ForwardCursor<S: RangeSource> {
    rows: Rows<S>,
    row: Option<S::Record>,
    fetched: u64,
    max_rows: Option<u64>,
    started: Instant,
    closed: bool,
    finished: bool,
}

impl<S: RangeSource> ForwardCursor<S> {
    /// Open a cursor that reads `source` through a [`ShardedReader`].
    ///
    /// A positive `max_rows` caps the rows returned. The cap is folded into
    /// the read count, so rows past it are never downloaded.
    ///
    /// # Errors
    /// Same as [`ShardedReader::open`].
    pub fn open(source: S, options: &ReaderOptions, max_rows: u64) -> Result<Self> {
        let max_rows = (max_rows > 0).then_some(max_rows);
        let mut options = options.clone();
        if let Some(cap) = max_rows {
            options.read_count = Some(options.read_count.map_or(cap, |n| n.min(cap)));
        }
        let reader = ShardedReader::open(source, &options)?;
        Ok(Self::from_rows(Rows::Sharded(reader), max_rows))
    }

    /// A cursor holding exactly one informational row.
    #[must_use]
    pub fn info(record: S::Record) -> Self {
        Self::from_rows(Rows::Info(Some(record)), None)
    }

    fn from_rows(rows: Rows<S>, max_rows: Option<u64>) -> Self {
        Self {
            rows,
            row: None,
            fetched: 0,
            max_rows,
            started: Instant::now(),
            closed: false,
            finished: false,
        }
    }

    /// Move to the next row. `Ok(false)` at the end of the stream.
    ///
    /// # Errors
    /// [`ReaderError::Closed`] after [`close`](Self::close); otherwise any
    /// failure of the underlying reader.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Result<bool> {
        if self.closed {
            return Err(ReaderError::Closed);
        }
        self.row = None;
        if self.max_rows.is_some_and(|cap| self.fetched >= cap) {
            self.finish();
            return Ok(false);
        }
        let row = match &mut self.rows {
            Rows::Sharded(reader) => {
                if reader.advance()? {
                    reader.take_current()
                } else {
                    None
                }
            }
            Rows::Info(slot) => slot.take(),
        };
        let Some(row) = row else {
            self.finish();
            return Ok(false);
        };
        self.row = Some(row);
        self.fetched += 1;
        if self.fetched % PROGRESS_EVERY == 0 {
            let secs = self.started.elapsed().as_secs_f64();
            let rate = if secs > 0.0 { self.fetched as f64 / secs } else { 0.0 };
            info!(rows = self.fetched, rows_per_sec = rate as u64, "fetch progress");
        }
        Ok(true)
    }

    /// The row [`next`](Self::next) positioned the cursor on.
    ///
    /// # Errors
    /// [`ReaderError::NoRow`] before the first row, at the end of the stream
    /// and after close.
    pub fn row(&self) -> Result<&S::Record> {
        self.row.as_ref().ok_or(ReaderError::NoRow(self.fetched))
    }

    /// 1-based number of the current row; 0 before the first.
    #[must_use]
    pub fn row_number(&self) -> u64 {
        self.fetched
    }

    #[must_use]
    pub fn max_rows(&self) -> Option<u64> {
        self.max_rows
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// The reader behind this cursor; `None` for an info cursor.
    #[must_use]
    pub fn reader(&self) -> Option<&ShardedReader<S>> {
        match &self.rows {
            Rows::Sharded(reader) => Some(reader),
            Rows::Info(_) => None,
        }
    }

    /// Release the reader. Idempotent.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.row = None;
        match &mut self.rows {
            Rows::Sharded(reader) => reader.close(),
            Rows::Info(slot) => *slot = None,
        }
        info!(rows = self.fetched, "result set closed");
    }

    fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        info!(
            rows = self.fetched,
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            "fetched all rows"
        );
    }
}

impl<S: RangeSource> Drop for ForwardCursor<S> {
    fn drop(&mut self) {
        self.close();
    }
}
