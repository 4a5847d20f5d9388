//! Shared failure slot and cancellation flag.
//!
//! These are the only pieces of state, besides the per-shard queues, that
//! worker threads and the consumer touch concurrently.

use crate::error::ReaderError;
use crossbeam_channel::{Receiver, Sender, bounded};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

/// Write-once, read-many slot holding the first failure of any shard worker.
#[derive(Clone, Debug, Default)]
pub struct ErrorLatch {
    slot: Arc<OnceLock<ReaderError>>,
}

impl ErrorLatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `err` unless a failure is already latched.
    ///
    /// Returns `true` if this call won.
    pub fn latch(&self, err: ReaderError) -> bool {
        self.slot.set(err).is_ok()
    }

    /// The latched failure, if any.
    #[must_use]
    pub fn peek(&self) -> Option<ReaderError> {
        self.slot.get().cloned()
    }

    #[must_use]
    pub fn is_set(&self) -> bool {
        self.slot.get().is_some()
    }
}

/// Cooperative cancellation flag shared by the reader and its workers.
///
/// Besides the flag, cancelling drops the only sender of a signal channel,
/// so anyone blocked in `select!` on [`signal`](Self::signal) wakes at once.
#[derive(Clone, Debug)]
pub(crate) struct CancelToken {
    flag: Arc<AtomicBool>,
    trigger: Arc<Mutex<Option<Sender<()>>>>,
    signal: Receiver<()>,
}

impl Default for CancelToken {
    fn default() -> Self {
        let (trigger, signal) = bounded(0);
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            trigger: Arc::new(Mutex::new(Some(trigger))),
            signal,
        }
    }
}

impl CancelToken {
    pub(crate) fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
        self.trigger
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// Disconnects when the token is cancelled; never carries a message.
    pub(crate) fn signal(&self) -> &Receiver<()> {
        &self.signal
    }
}

/// Handle that interrupts a reader from another thread.
///
/// Interrupting stops all shard workers and makes the consumer's next (or
/// current, if blocked) `advance()` fail with
/// [`ReaderError::Interrupted`]. The interruption is fatal for the reader.
#[derive(Clone, Debug)]
pub struct InterruptHandle {
    token: CancelToken,
}

impl InterruptHandle {
    pub(crate) fn new(token: CancelToken) -> Self {
        Self { token }
    }

    pub fn interrupt(&self) {
        self.token.cancel();
    }

    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        self.token.is_cancelled()
    }
}
