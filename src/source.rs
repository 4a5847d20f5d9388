//! Traits for the remote range-read session the reader is built on.
//!
//! A [`RangeSource`] is an already-open session over an append-only result. It
//! knows how many rows it holds and can open a sequential [`RecordReader`]
//! over any `[start, start + count)` window. Reads for the same window must
//! return rows in the same order every time.
//!
//! The source is shared by all shard workers, so it must be `Send + Sync`.
//! Readers are opened and drained on a single worker thread and need not be
//! `Send`.

use anyhow::Result;
use std::sync::Arc;

/// Sequential stream of records for one window.
pub trait RecordReader {
    type Record;

    /// Next record, or `None` once the window is exhausted.
    ///
    /// # Errors
    /// Returns an error on I/O or decoding failure. The reader is not used
    /// again after an error.
    fn read(&mut self) -> Result<Option<Self::Record>>;

    /// Release any resource held by the reader.
    ///
    /// Called exactly once by the shard worker, on success and failure alike.
    ///
    /// # Errors
    /// Failures to release are reported but do not affect delivered rows.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// A range-addressable record session.
pub trait RangeSource: Send + Sync + 'static {
    type Record: Send + 'static;
    type Reader: RecordReader<Record = Self::Record>;

    /// Total number of rows available in the session.
    ///
    /// # Errors
    /// Returns an error if the session cannot be queried.
    fn record_count(&self) -> Result<u64>;

    /// Open a sequential reader over `count` rows starting at `start`.
    ///
    /// # Errors
    /// Returns an error if the window cannot be opened (network or service
    /// failure).
    fn open_range(&self, start: u64, count: u64) -> Result<Self::Reader>;
}

impl<S: RangeSource> RangeSource for Arc<S> {
    type Record = S::Record;
    type Reader = S::Reader;

    fn record_count(&self) -> Result<u64> {
        (**self).record_count()
    }

    fn open_range(&self, start: u64, count: u64) -> Result<Self::Reader> {
        (**self).open_range(start, count)
    }
}

/// Drains `reader` into a vector. Used for sequential reference reads.
///
/// # Errors
/// Propagates the first read error.
pub fn read_all<R: RecordReader>(mut reader: R) -> Result<Vec<R::Record>> {
    let mut out = Vec::new();
    let drained = (|| -> Result<()> {
        while let Some(rec) = reader.read()? {
            out.push(rec);
        }
        Ok(())
    })();
    let closed = reader.close();
    drained?;
    closed?;
    Ok(out)
}
