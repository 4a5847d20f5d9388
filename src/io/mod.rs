//! Range sources backed by local data.
//!
//! The remote session a reader normally runs over is an external
//! collaborator. These implementations of [`RangeSource`](crate::RangeSource)
//! cover in-process data and exported result files, and are what the tests
//! and tools in this crate drive the reader with.

pub mod compression;
pub mod memory;

#[cfg_attr(docsrs, doc(cfg(feature = "io-jsonl")))]
#[cfg(feature = "io-jsonl")]
pub mod jsonl;

#[cfg_attr(docsrs, doc(cfg(feature = "io-csv")))]
#[cfg(feature = "io-csv")]
pub mod csv;
