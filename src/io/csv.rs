//! CSV range source.
//!
//! A record is one data row; the header row, when present, is not counted.
//! Rows are deserialized with Serde, so `T` maps columns by header name when
//! `has_headers` is set and by position otherwise.
//!
//! **Compression**: gzip, zstd, bzip2 and xz files are decoded transparently.

use crate::io::compression::open_decoded;
use crate::source::{RangeSource, RecordReader};
use anyhow::{Context, Result, bail};
use csv::{ByteRecord, DeserializeRecordsIntoIter, ReaderBuilder};
use serde::de::DeserializeOwned;
use std::io::Read;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

/// A CSV file served as a range-addressable session.
#[derive(Debug)]
pub struct CsvSource<T> {
    path: PathBuf,
    has_headers: bool,
    records: u64,
    _marker: PhantomData<fn() -> T>,
}

impl<T> CsvSource<T> {
    /// Open `path` and count its data rows.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or is not valid CSV.
    pub fn open(path: impl AsRef<Path>, has_headers: bool) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut rdr = ReaderBuilder::new()
            .has_headers(has_headers)
            .from_reader(open_decoded(&path)?);
        let mut scratch = ByteRecord::new();
        let mut records = 0u64;
        while rdr
            .read_byte_record(&mut scratch)
            .with_context(|| format!("read CSV row #{} in {}", records + 1, path.display()))?
        {
            records += 1;
        }
        Ok(Self {
            path,
            has_headers,
            records,
            _marker: PhantomData,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn has_headers(&self) -> bool {
        self.has_headers
    }
}

impl<T> RangeSource for CsvSource<T>
where
    T: DeserializeOwned + Send + 'static,
{
    type Record = T;
    type Reader = CsvRangeReader<T>;

    fn record_count(&self) -> Result<u64> {
        Ok(self.records)
    }

    fn open_range(&self, start: u64, count: u64) -> Result<Self::Reader> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(self.has_headers)
            .from_reader(open_decoded(&self.path)?);
        let mut scratch = ByteRecord::new();
        for skipped in 0..start {
            let more = rdr
                .read_byte_record(&mut scratch)
                .with_context(|| format!("skip CSV row #{} in {}", skipped + 1, self.path.display()))?;
            if !more {
                bail!(
                    "{} ended after {skipped} rows, before range start {start}",
                    self.path.display()
                );
            }
        }
        Ok(CsvRangeReader {
            rows: rdr.into_deserialize(),
            path: self.path.clone(),
            next_row: start,
            remaining: count,
        })
    }
}

/// Streams one row window of a [`CsvSource`].
pub struct CsvRangeReader<T> {
    rows: DeserializeRecordsIntoIter<Box<dyn Read>, T>,
    path: PathBuf,
    next_row: u64,
    remaining: u64,
}

impl<T: DeserializeOwned> RecordReader for CsvRangeReader<T> {
    type Record = T;

    fn read(&mut self) -> Result<Option<T>> {
        if self.remaining == 0 {
            return Ok(None);
        }
        let Some(row) = self.rows.next() else {
            bail!(
                "{} ended with {} rows of the range still unread",
                self.path.display(),
                self.remaining
            );
        };
        self.next_row += 1;
        self.remaining -= 1;
        let row = row.with_context(|| {
            format!("parse CSV row #{} in {}", self.next_row, self.path.display())
        })?;
        Ok(Some(row))
    }
}
