//! Testing utilities for code built on [`ShardedReader`](crate::ShardedReader).
//!
//! - **Mock source**: [`MockSource`] logs opened and closed ranges and injects
//!   faults (open failure, read failure, a [`Gate`] that holds a read, slow rows)
//! - **Assertions**: drain a reader, check ordering and the prefetch window
//! - **Fixtures**: typed sample rows and JSONL / CSV file writers
//!
//! ```
//! use shardflow::testing::*;
//! use shardflow::{ReaderOptions, ShardedReader};
//!
//! # fn main() -> anyhow::Result<()> {
//! let source = MockSource::new(7);
//! let log = source.clone();
//! let opts = ReaderOptions::new().with_split_size(2).with_preload_split_num(2);
//! let mut reader = ShardedReader::open(source, &opts)?;
//! let rows = drain(&mut reader)?;
//! assert_sequential(&rows, 0);
//! assert_window_respected(reader.submission_trace(), 2);
//! assert_eq!(log.opened().len(), 4);
//! # Ok(())
//! # }
//! ```

pub mod assertions;
pub mod fixtures;
pub mod mock_source;

pub use assertions::*;
pub use fixtures::*;
pub use mock_source::*;
