//! Runtime counters for a sharded reader.
//!
//! Worker threads bump the download-side counters; the consumer bumps the
//! delivery-side ones. Everything is atomic so a [`ReaderMetrics`] clone can be
//! inspected from any thread while the reader runs.
//!
//! ```
//! use shardflow::io::memory::VecSource;
//! use shardflow::{ReaderOptions, ShardedReader};
//!
//! # fn main() -> anyhow::Result<()> {
//! let source = VecSource::new((0..100u32).collect());
//! let mut reader = ShardedReader::open(source, &ReaderOptions::new().with_split_size(10))?;
//! while reader.advance()? {}
//!
//! let snapshot = reader.metrics().snapshot();
//! assert_eq!(snapshot["records_delivered"], 100);
//! assert_eq!(snapshot["shards_completed"], 10);
//! # Ok(())
//! # }
//! ```

use anyhow::{Context, Result};
use serde_json::{Value, json};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[derive(Default)]
struct Counters {
    shards_submitted: AtomicU64,
    shards_completed: AtomicU64,
    shards_failed: AtomicU64,
    records_downloaded: AtomicU64,
    records_delivered: AtomicU64,
    peak_in_flight: AtomicU64,
}

/// Shared, thread-safe reader statistics.
#[derive(Clone)]
pub struct ReaderMetrics {
    counters: Arc<Counters>,
    started: Instant,
    finished: Arc<Mutex<Option<Instant>>>,
}

impl Default for ReaderMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ReaderMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self {
            counters: Arc::new(Counters::default()),
            started: Instant::now(),
            finished: Arc::new(Mutex::new(None)),
        }
    }

    pub(crate) fn shard_submitted(&self, in_flight: usize) {
        self.counters.shards_submitted.fetch_add(1, Ordering::Relaxed);
        self.counters
            .peak_in_flight
            .fetch_max(in_flight as u64, Ordering::Relaxed);
    }

    pub(crate) fn shard_completed(&self) {
        self.counters.shards_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn shard_failed(&self) {
        self.counters.shards_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_downloaded(&self) {
        self.counters.records_downloaded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_delivered(&self) {
        self.counters.records_delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn finish(&self) {
        if let Ok(mut end) = self.finished.lock() {
            end.get_or_insert_with(Instant::now);
        }
    }

    #[must_use]
    pub fn shards_submitted(&self) -> u64 {
        self.counters.shards_submitted.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn shards_completed(&self) -> u64 {
        self.counters.shards_completed.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn shards_failed(&self) -> u64 {
        self.counters.shards_failed.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn records_downloaded(&self) -> u64 {
        self.counters.records_downloaded.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn records_delivered(&self) -> u64 {
        self.counters.records_delivered.load(Ordering::Relaxed)
    }

    /// Largest number of shards that were in flight at once.
    #[must_use]
    pub fn peak_in_flight(&self) -> u64 {
        self.counters.peak_in_flight.load(Ordering::Relaxed)
    }

    /// Time since the reader opened, or until it finished if it has.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        let end = self
            .finished
            .lock()
            .ok()
            .and_then(|e| *e)
            .unwrap_or_else(Instant::now);
        end.duration_since(self.started)
    }

    /// Point-in-time view of every counter as JSON.
    #[must_use]
    pub fn snapshot(&self) -> Value {
        json!({
            "shards_submitted": self.shards_submitted(),
            "shards_completed": self.shards_completed(),
            "shards_failed": self.shards_failed(),
            "records_downloaded": self.records_downloaded(),
            "records_delivered": self.records_delivered(),
            "peak_in_flight": self.peak_in_flight(),
            "elapsed_ms": self.elapsed().as_millis() as u64,
        })
    }

    /// Print the snapshot to stdout.
    pub fn print(&self) {
        println!("\n=== Reader Metrics ===");
        if let Value::Object(map) = self.snapshot() {
            for (name, value) in map {
                println!("{name}: {value}");
            }
        }
        println!("======================\n");
    }

    /// Save the snapshot to a JSON file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created or written.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut file = File::create(path).with_context(|| format!("create {}", path.display()))?;
        let body = serde_json::to_string_pretty(&self.snapshot())?;
        file.write_all(body.as_bytes())
            .with_context(|| format!("write {}", path.display()))?;
        Ok(())
    }
}
