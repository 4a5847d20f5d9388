//! Error types surfaced by the reader and the cursor.

use crate::planner::ShardRange;
use std::error::Error;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// The first failure observed while downloading a shard.
///
/// Open failures and mid-stream read failures are captured the same way; the
/// original cause stays reachable through [`Error::source`].
#[derive(Debug)]
pub struct ShardFailure {
    pub shard: usize,
    pub range: ShardRange,
    pub cause: anyhow::Error,
}

impl fmt::Display for ShardFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "shard {} covering rows {}: {:#}",
            self.shard, self.range, self.cause
        )
    }
}

impl Error for ShardFailure {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&*self.cause)
    }
}

/// Why a blocked dequeue gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptReason {
    /// The reader's interrupt handle was triggered.
    Cancelled,
    /// No record arrived within the configured fetch timeout.
    TimedOut(Duration),
    /// The shard worker went away without finishing its shard.
    Disconnected,
}

impl fmt::Display for InterruptReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cancelled => write!(f, "cancelled"),
            Self::TimedOut(d) => write!(f, "timed out after {} ms", d.as_millis()),
            Self::Disconnected => write!(f, "worker disconnected"),
        }
    }
}

/// Errors returned by [`ShardedReader`](crate::ShardedReader) and
/// [`ForwardCursor`](crate::ForwardCursor).
///
/// `Clone` so the latched failure can be handed back on every later call.
#[derive(Debug, Clone, Error)]
pub enum ReaderError {
    #[error("download failed: {0}")]
    Download(#[source] Arc<ShardFailure>),

    #[error("interrupted while waiting for shard {shard}: {reason}")]
    Interrupted {
        shard: usize,
        reason: InterruptReason,
    },

    #[error("failed to query the result session: {0}")]
    Session(String),

    #[error("failed to start the shard worker pool: {0}")]
    Pool(String),

    #[error("invalid reader option `{key}`: {message}")]
    InvalidOption { key: String, message: String },

    #[error("the result set has been closed")]
    Closed,

    #[error("no row at cursor, row={0}")]
    NoRow(u64),
}

impl ReaderError {
    pub(crate) fn download(shard: usize, range: ShardRange, cause: anyhow::Error) -> Self {
        Self::Download(Arc::new(ShardFailure { shard, range, cause }))
    }

    pub(crate) fn invalid_option(key: &str, message: impl Into<String>) -> Self {
        Self::InvalidOption {
            key: key.to_string(),
            message: message.into(),
        }
    }

    /// Index of the shard this error belongs to, if any.
    #[must_use]
    pub fn shard(&self) -> Option<usize> {
        match self {
            Self::Download(f) => Some(f.shard),
            Self::Interrupted { shard, .. } => Some(*shard),
            _ => None,
        }
    }

    /// Whether this error came from an interrupted wait.
    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Interrupted { .. })
    }
}

pub type Result<T> = std::result::Result<T, ReaderError>;
