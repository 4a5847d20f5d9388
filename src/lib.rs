//! # Shardflow
//!
//! An **ordered, concurrently prefetching reader** for large, append-only result
//! sets that live behind a range-read API.
//!
//! A query result is served by a session that can count its rows and open a
//! sequential reader over any `[start, start + count)` window. Reading it with
//! one stream is slow; reading it with many streams scrambles the order.
//! [`ShardedReader`] splits the requested window into fixed-size shards,
//! downloads a bounded number of them at once on a worker pool, and hands the
//! records back one at a time in exactly the order a single sequential scan
//! would produce.
//!
//! ## Key Features
//!
//! - **Order preserving** - shard `i` is always drained before shard `i + 1`
//! - **Bounded prefetch** - at most `preload_split_num` shards in flight, each
//!   buffering at most `queue_capacity` records
//! - **Fail fast** - the first download failure is latched and reported on
//!   every later call; there is no silent truncation
//! - **Interruptible** - a cloneable [`InterruptHandle`] and an optional fetch
//!   timeout unblock a waiting consumer
//! - **Result-set cursor** - [`ForwardCursor`] adds a row cap, row numbers and
//!   progress logging on top of the reader
//! - **File sources** - JSON Lines and CSV exports, optionally compressed
//!
//! ## Quick Start
//!
//! ```
//! use shardflow::io::memory::VecSource;
//! use shardflow::{ReaderOptions, ShardedReader};
//!
//! # fn main() -> anyhow::Result<()> {
//! let source = VecSource::new((0..1_000u64).collect());
//! let opts = ReaderOptions::new()
//!     .with_offset(100)
//!     .with_read_count(250)
//!     .with_split_size(64)
//!     .with_preload_split_num(3);
//!
//! let reader = ShardedReader::open(source, &opts)?;
//! let rows = reader.collect::<Result<Vec<_>, _>>()?;
//! assert_eq!(rows, (100..350).collect::<Vec<_>>());
//! # Ok(())
//! # }
//! ```
//!
//! ## Core Concepts
//!
//! ### Range source
//!
//! A [`RangeSource`] is the already-open session. It is shared by all workers
//! and must be `Send + Sync`. Each shard opens its own [`RecordReader`].
//!
//! ### Shard plan
//!
//! [`plan`] turns `offset`, `record_count` and `split_size` into a
//! [`ShardPlan`]. [`ShardedReader::with_plan`] accepts any explicit plan,
//! including zero-length ranges.
//!
//! ### Prefetch window
//!
//! The first `preload_split_num` shards are submitted when the reader opens.
//! Finishing shard `i` submits shard `i + preload_split_num`.
//!
//! ## Configuration
//!
//! [`ReaderOptions`] is built with `with_*` setters, deserialized from JSON
//! (camelCase keys) or parsed from connection properties with
//! [`ReaderOptions::from_properties`].
//!
//! ## Feature Flags
//!
//! - `io-jsonl` (default) - [`io::jsonl::JsonlSource`]
//! - `io-csv` (default) - [`io::csv::CsvSource`]
//! - `compression-gzip`, `compression-zstd`, `compression-bzip2`,
//!   `compression-xz` (default) - transparent decompression for file sources
//!
//! ## Module Overview
//!
//! - [`planner`] - shard ranges
//! - [`options`] - configuration
//! - [`reader`] - the ordered reader
//! - [`cursor`] - forward-only result-set cursor
//! - [`source`] - range source traits
//! - [`io`] - in-memory and file-backed sources
//! - [`metrics`] - counters and JSON snapshots
//! - [`testing`] - mock source, fixtures and assertions

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod cursor;
pub mod error;
pub mod io;
pub mod latch;
pub mod metrics;
pub mod options;
pub mod planner;
pub mod reader;
pub mod scheduler;
pub mod source;
pub mod testing;
mod worker;

pub use cursor::ForwardCursor;
pub use error::{InterruptReason, ReaderError, ShardFailure};
pub use latch::{ErrorLatch, InterruptHandle};
pub use metrics::ReaderMetrics;
pub use options::{DEFAULT_QUEUE_CAPACITY, ReaderOptions, ResolvedOptions};
pub use planner::{ShardPlan, ShardRange, clamp_record_count, plan, split_count};
pub use reader::{ShardState, ShardedReader};
pub use scheduler::ShardEvent;
pub use source::{RangeSource, RecordReader, read_all};
