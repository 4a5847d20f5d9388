//! JSON Lines (JSONL) range source.
//!
//! A record is one non-empty line holding a JSON document. Empty and
//! whitespace-only lines are skipped and do not count as rows, so row `n`
//! is the `n`-th non-empty line.
//!
//! Rows are counted once when the source is opened. Range readers stream the
//! file lazily: they skip to their first row and then parse one line per
//! [`read`](RecordReader::read).
//!
//! **Compression**: gzip, zstd, bzip2 and xz files are decoded transparently
//! (see [`compression`](crate::io::compression)).

use crate::io::compression::open_decoded;
use crate::source::{RangeSource, RecordReader};
use anyhow::{Context, Result, bail};
use serde::de::DeserializeOwned;
use std::io::{BufRead, BufReader, Lines, Read};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

/// A JSONL file served as a range-addressable session.
#[derive(Debug)]
pub struct JsonlSource<T> {
    path: PathBuf,
    records: u64,
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonlSource<T> {
    /// Open `path` and count its rows.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or read.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let rdr = BufReader::new(open_decoded(&path)?);
        let mut records = 0u64;
        for (i, line) in rdr.lines().enumerate() {
            let line = line.with_context(|| format!("read line {} in {}", i + 1, path.display()))?;
            if !line.trim().is_empty() {
                records += 1;
            }
        }
        Ok(Self {
            path,
            records,
            _marker: PhantomData,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl<T> RangeSource for JsonlSource<T>
where
    T: DeserializeOwned + Send + 'static,
{
    type Record = T;
    type Reader = JsonlRangeReader<T>;

    fn record_count(&self) -> Result<u64> {
        Ok(self.records)
    }

    fn open_range(&self, start: u64, count: u64) -> Result<Self::Reader> {
        let lines = BufReader::new(open_decoded(&self.path)?).lines();
        let mut reader = JsonlRangeReader {
            lines,
            path: self.path.clone(),
            line_no: 0,
            remaining: count,
            _marker: PhantomData,
        };
        for skipped in 0..start {
            if reader.next_line()?.is_none() {
                bail!(
                    "{} ended after {skipped} rows, before range start {start}",
                    self.path.display()
                );
            }
        }
        Ok(reader)
    }
}

/// Streams one row window of a [`JsonlSource`].
pub struct JsonlRangeReader<T> {
    lines: Lines<BufReader<Box<dyn Read>>>,
    path: PathBuf,
    line_no: u64,
    remaining: u64,
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonlRangeReader<T> {
    /// Next non-empty line, with its 1-based line number.
    fn next_line(&mut self) -> Result<Option<(u64, String)>> {
        for line in self.lines.by_ref() {
            self.line_no += 1;
            let line = line
                .with_context(|| format!("read line {} in {}", self.line_no, self.path.display()))?;
            if !line.trim().is_empty() {
                return Ok(Some((self.line_no, line)));
            }
        }
        Ok(None)
    }
}

impl<T: DeserializeOwned> RecordReader for JsonlRangeReader<T> {
    type Record = T;

    fn read(&mut self) -> Result<Option<T>> {
        if self.remaining == 0 {
            return Ok(None);
        }
        let Some((line_no, line)) = self.next_line()? else {
            bail!(
                "{} ended with {} rows of the range still unread",
                self.path.display(),
                self.remaining
            );
        };
        self.remaining -= 1;
        let row = serde_json::from_str(&line)
            .with_context(|| format!("parse JSONL line {line_no} in {}", self.path.display()))?;
        Ok(Some(row))
    }
}
