//! File fixtures for the file-backed sources.

use crate::io::compression::create_encoded;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;

/// A small typed row used by the file source tests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleRow {
    pub id: u64,
    pub name: String,
}

/// `n` rows with ids `0..n`.
#[must_use]
pub fn sample_rows(n: u64) -> Vec<SampleRow> {
    (0..n)
        .map(|id| SampleRow {
            id,
            name: format!("row-{id}"),
        })
        .collect()
}

/// Write `rows` as JSON Lines, compressed according to the extension of `path`.
///
/// # Errors
/// Returns an error if the file cannot be created or a row fails to serialize.
pub fn write_jsonl<T: Serialize>(path: impl AsRef<Path>, rows: &[T]) -> Result<()> {
    let path = path.as_ref();
    let mut w = create_encoded(path)?;
    for row in rows {
        serde_json::to_writer(&mut w, row).context("serialize JSONL row")?;
        w.write_all(b"\n")?;
    }
    w.flush().with_context(|| format!("flush {}", path.display()))
}

/// Write `rows` as CSV with a header row, compressed according to the
/// extension of `path`.
///
/// # Errors
/// Returns an error if the file cannot be created or a row fails to serialize.
#[cfg(feature = "io-csv")]
pub fn write_csv<T: Serialize>(path: impl AsRef<Path>, rows: &[T]) -> Result<()> {
    let path = path.as_ref();
    let mut w = csv::Writer::from_writer(create_encoded(path)?);
    for row in rows {
        w.serialize(row).context("serialize CSV row")?;
    }
    w.flush().with_context(|| format!("flush {}", path.display()))
}
