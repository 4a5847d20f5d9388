//! Prefetch window bookkeeping.
//!
//! At most `window` shards may be in flight (submitted and not yet fully
//! consumed). The first `window` shards are submitted up front; finishing
//! shard `i` releases shard `i + window`. Submission order is therefore
//! strictly increasing and the stride is fixed.
//!
//! The scheduler is owned by the consumer thread and never locked.

use serde::Serialize;
use std::ops::Range;

/// One entry of the submission trace.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ShardEvent {
    Submitted(usize),
    Done(usize),
    Failed(usize),
}

#[derive(Debug)]
pub(crate) struct PrefetchScheduler {
    window: usize,
    split_num: usize,
    in_flight: usize,
    peak_in_flight: usize,
    trace: Vec<ShardEvent>,
}

impl PrefetchScheduler {
    pub(crate) fn new(window: usize, split_num: usize) -> Self {
        Self {
            window: window.max(1),
            split_num,
            in_flight: 0,
            peak_in_flight: 0,
            trace: Vec::new(),
        }
    }

    pub(crate) fn window(&self) -> usize {
        self.window
    }

    /// Shards to submit when the reader opens.
    pub(crate) fn initial(&self) -> Range<usize> {
        0..self.window.min(self.split_num)
    }

    /// The shard released by finishing `done`, if it exists.
    pub(crate) fn follow_up(&self, done: usize) -> Option<usize> {
        let next = done + self.window;
        (next < self.split_num).then_some(next)
    }

    /// Returns the in-flight count after the submission.
    pub(crate) fn on_submitted(&mut self, index: usize) -> usize {
        self.in_flight += 1;
        self.peak_in_flight = self.peak_in_flight.max(self.in_flight);
        self.trace.push(ShardEvent::Submitted(index));
        self.in_flight
    }

    pub(crate) fn on_done(&mut self, index: usize) {
        self.in_flight = self.in_flight.saturating_sub(1);
        self.trace.push(ShardEvent::Done(index));
    }

    pub(crate) fn on_failed(&mut self, index: usize) {
        self.in_flight = self.in_flight.saturating_sub(1);
        self.trace.push(ShardEvent::Failed(index));
    }

    pub(crate) fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub(crate) fn peak_in_flight(&self) -> usize {
        self.peak_in_flight
    }

    pub(crate) fn trace(&self) -> &[ShardEvent] {
        &self.trace
    }
}
