//! The ordered assembler: a forward-only cursor over concurrently downloaded shards.
//!
//! [`ShardedReader`] turns one range-addressable [`RangeSource`] into a
//! record-at-a-time sequence. Shards are downloaded in parallel by a
//! bounded worker pool, but records come out in exactly the order a single
//! sequential scan of `[offset, offset + record_count)` would produce.
//!
//! ```
//! use shardflow::io::memory::VecSource;
//! use shardflow::{ReaderOptions, ShardedReader};
//!
//! # fn main() -> anyhow::Result<()> {
//! let source = VecSource::new((0..10u32).collect());
//! let opts = ReaderOptions::new()
//!     .with_split_size(3)
//!     .with_preload_split_num(2)
//!     .with_thread_num(2);
//! let mut reader = ShardedReader::open(source, &opts)?;
//! assert_eq!(reader.split_num(), 4);
//!
//! let mut seen = Vec::new();
//! while reader.advance()? {
//!     seen.push(*reader.current().unwrap());
//! }
//! assert_eq!(seen, (0..10).collect::<Vec<_>>());
//! assert!(reader.peak_in_flight() <= 2);
//! # Ok(())
//! # }
//! ```
//!
//! # Failure model
//! There is no retry. The first failure of any shard worker is latched and
//! every later [`advance`](ShardedReader::advance) fails with it, even if
//! records of earlier shards are still buffered. An interrupted or timed-out
//! wait is latched the same way.
//!
//! # Threading
//! The reader itself is driven by one consumer thread. Only the per-shard
//! queues and the error latch are shared with workers.

use crate::error::{InterruptReason, ReaderError, Result};
use crate::latch::{CancelToken, ErrorLatch, InterruptHandle};
use crate::metrics::ReaderMetrics;
use crate::options::{ReaderOptions, ResolvedOptions};
use crate::planner::{ShardPlan, ShardRange, plan};
use crate::scheduler::{PrefetchScheduler, ShardEvent};
use crate::source::RangeSource;
use crate::worker::{ShardItem, ShardWorkerPool};
use crossbeam_channel::{Receiver, after, never, select};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Lifecycle of a single shard, as seen by the consumer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShardState {
    Pending,
    Submitted,
    Draining,
    Done,
    Failed,
}

struct Shard<R> {
    range: ShardRange,
    state: ShardState,
    queue: Option<Receiver<ShardItem<R>>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Active,
    Exhausted,
    Closed,
}

/// Ordered, concurrently prefetching reader over a [`RangeSource`].
pub struct ShardedReader<S: RangeSource> {
    shards: Vec<Shard<S::Record>>,
    scheduler: PrefetchScheduler,
    pool: Option<ShardWorkerPool<S>>,
    latch: ErrorLatch,
    cancel: CancelToken,
    metrics: ReaderMetrics,
    options: ResolvedOptions,
    current_split: usize,
    current: Option<S::Record>,
    phase: Phase,
    error_yielded: bool,
}

impl<S: RangeSource> ShardedReader<S> {
    /// Open a reader over `source` and submit the initial prefetch window.
    ///
    /// # Errors
    /// Fails if the session's row count cannot be queried or the worker pool
    /// cannot be started. Download failures surface later, from
    /// [`advance`](Self::advance).
    pub fn open(source: S, options: &ReaderOptions) -> Result<Self> {
        let available = source
            .record_count()
            .map_err(|e| ReaderError::Session(format!("{e:#}")))?;
        let resolved = options.resolve(available);
        let shard_plan = plan(resolved.offset, resolved.record_count, resolved.split_size);
        Self::start(Arc::new(source), shard_plan, resolved)
    }

    /// Open a reader that drains an explicit list of ranges in order.
    ///
    /// `options` supplies the window, thread count, queue capacity and
    /// timeout; its offset, read count and split size are taken from `plan`.
    ///
    /// # Errors
    /// Fails if the worker pool cannot be started.
    pub fn with_plan(source: S, plan: ShardPlan, options: &ReaderOptions) -> Result<Self> {
        let mut resolved = options.resolve_for(plan.record_count(), plan.split_size(), plan.len());
        resolved.offset = plan.offset();
        Self::start(Arc::new(source), plan, resolved)
    }

    fn start(source: Arc<S>, plan: ShardPlan, options: ResolvedOptions) -> Result<Self> {
        let latch = ErrorLatch::new();
        let cancel = CancelToken::default();
        let metrics = ReaderMetrics::new();
        let pool = if plan.is_empty() {
            None
        } else {
            Some(ShardWorkerPool::new(
                source,
                options.thread_num,
                options.queue_capacity,
                latch.clone(),
                cancel.clone(),
                metrics.clone(),
            )?)
        };
        let shards = plan
            .ranges()
            .iter()
            .map(|&range| Shard {
                range,
                state: ShardState::Pending,
                queue: None,
            })
            .collect();
        let scheduler = PrefetchScheduler::new(options.preload_split_num, plan.len());

        info!(
            offset = options.offset,
            record_count = options.record_count,
            split_size = options.split_size,
            split_num = options.split_num,
            preload_split_num = options.preload_split_num,
            thread_num = options.thread_num,
            "opened sharded reader"
        );

        let mut reader = Self {
            shards,
            scheduler,
            pool,
            latch,
            cancel,
            metrics,
            options,
            current_split: 0,
            current: None,
            phase: Phase::Active,
            error_yielded: false,
        };
        for index in reader.scheduler.initial() {
            reader.submit(index);
        }
        Ok(reader)
    }

    /// Move to the next record.
    ///
    /// Returns `Ok(true)` when a record is available through
    /// [`current`](Self::current), `Ok(false)` once the sequence is exhausted
    /// (and on every call after that).
    ///
    /// # Errors
    /// Returns the latched failure if any shard failed or the wait was
    /// interrupted, and [`ReaderError::Closed`] after [`close`](Self::close).
    pub fn advance(&mut self) -> Result<bool> {
        match self.phase {
            Phase::Closed => return Err(ReaderError::Closed),
            Phase::Exhausted => return Ok(false),
            Phase::Active => {}
        }
        loop {
            self.check_error()?;
            if self.current_split >= self.shards.len() {
                self.exhaust();
                return Ok(false);
            }
            let index = self.current_split;
            match self.dequeue(index)? {
                ShardItem::Record(record) => {
                    self.current = Some(record);
                    self.metrics.record_delivered();
                    return Ok(true);
                }
                ShardItem::End => self.finish_shard(index),
                ShardItem::Aborted => {
                    return Err(self.fail_shard(index, InterruptReason::Disconnected));
                }
            }
        }
    }

    /// The record the last successful [`advance`](Self::advance) moved to.
    ///
    /// `None` before the first advance, after exhaustion or after the
    /// record was taken.
    #[must_use]
    pub fn current(&self) -> Option<&S::Record> {
        self.current.as_ref()
    }

    /// Take ownership of the current record.
    pub fn take_current(&mut self) -> Option<S::Record> {
        self.current.take()
    }

    /// Stop all workers and release every queue.
    ///
    /// Safe to call from any state and more than once. Range readers held by
    /// workers are closed as those workers notice the cancellation.
    pub fn close(&mut self) {
        if self.phase == Phase::Closed {
            return;
        }
        let was_exhausted = self.phase == Phase::Exhausted;
        self.phase = Phase::Closed;
        self.cancel.cancel();
        for shard in &mut self.shards {
            shard.queue = None;
        }
        self.pool = None;
        self.current = None;
        self.metrics.finish();
        info!(
            current_split = self.current_split,
            split_num = self.shards.len(),
            records = self.metrics.records_delivered(),
            exhausted = was_exhausted,
            "closed sharded reader"
        );
    }

    /// A handle that can interrupt this reader from another thread.
    #[must_use]
    pub fn interrupt_handle(&self) -> InterruptHandle {
        InterruptHandle::new(self.cancel.clone())
    }

    fn check_error(&mut self) -> Result<()> {
        if self.cancel.is_cancelled() {
            self.latch.latch(ReaderError::Interrupted {
                shard: self.current_split,
                reason: InterruptReason::Cancelled,
            });
        }
        match self.latch.peek() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn submit(&mut self, index: usize) {
        let Some(pool) = self.pool.as_ref() else {
            return;
        };
        let shard = &mut self.shards[index];
        if shard.state != ShardState::Pending {
            return;
        }
        shard.queue = Some(pool.submit(index, shard.range));
        shard.state = ShardState::Submitted;
        let in_flight = self.scheduler.on_submitted(index);
        self.metrics.shard_submitted(in_flight);
        debug!(shard = index, range = %shard.range, in_flight, "submitted shard");
    }

    fn dequeue(&mut self, index: usize) -> Result<ShardItem<S::Record>> {
        if self.shards[index].state == ShardState::Pending {
            self.submit(index);
        }
        let shard = &mut self.shards[index];
        if shard.state == ShardState::Submitted {
            shard.state = ShardState::Draining;
        }
        let waited = match shard.queue.as_ref() {
            Some(queue) => wait_for(queue, &self.cancel, self.options.fetch_timeout),
            None => Err(InterruptReason::Disconnected),
        };
        waited.map_err(|reason| self.fail_shard(index, reason))
    }

    fn finish_shard(&mut self, index: usize) {
        let shard = &mut self.shards[index];
        shard.state = ShardState::Done;
        shard.queue = None;
        self.scheduler.on_done(index);
        self.metrics.shard_completed();
        debug!(shard = index, "shard drained");
        if let Some(next) = self.scheduler.follow_up(index) {
            self.submit(next);
        }
        self.current_split += 1;
    }

    /// Mark shard `index` failed and return the error the caller should see.
    fn fail_shard(&mut self, index: usize, reason: InterruptReason) -> ReaderError {
        let shard = &mut self.shards[index];
        if shard.state != ShardState::Failed {
            shard.state = ShardState::Failed;
            shard.queue = None;
            self.scheduler.on_failed(index);
        }
        let interrupted = ReaderError::Interrupted {
            shard: index,
            reason,
        };
        self.latch.latch(interrupted.clone());
        self.cancel.cancel();
        let err = self.latch.peek().unwrap_or(interrupted);
        warn!(shard = index, error = %err, "reader failed");
        err
    }

    fn exhaust(&mut self) {
        self.current = None;
        self.phase = Phase::Exhausted;
        self.metrics.finish();
        debug!(
            records = self.metrics.records_delivered(),
            split_num = self.shards.len(),
            "sharded reader exhausted"
        );
    }

    #[must_use]
    pub fn offset(&self) -> u64 {
        self.options.offset
    }

    /// Rows this reader will deliver in total.
    #[must_use]
    pub fn record_count(&self) -> u64 {
        self.options.record_count
    }

    #[must_use]
    pub fn split_size(&self) -> u64 {
        self.options.split_size
    }

    #[must_use]
    pub fn split_num(&self) -> usize {
        self.shards.len()
    }

    #[must_use]
    pub fn preload_split_num(&self) -> usize {
        self.scheduler.window()
    }

    /// Worker threads actually running; the configured count when the plan
    /// is empty and no pool was started.
    #[must_use]
    pub fn thread_num(&self) -> usize {
        self.pool
            .as_ref()
            .map_or(self.options.thread_num, ShardWorkerPool::threads)
    }

    #[must_use]
    pub fn queue_capacity(&self) -> usize {
        self.options.queue_capacity
    }

    /// Index of the shard currently being drained; equals
    /// [`split_num`](Self::split_num) once exhausted.
    #[must_use]
    pub fn current_split(&self) -> usize {
        self.current_split
    }

    #[must_use]
    pub fn shard_state(&self, index: usize) -> Option<ShardState> {
        self.shards.get(index).map(|s| s.state)
    }

    /// Shards currently submitted or draining.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.scheduler.in_flight()
    }

    #[must_use]
    pub fn peak_in_flight(&self) -> usize {
        self.scheduler.peak_in_flight()
    }

    /// Every submission and completion, in the order the consumer saw them.
    #[must_use]
    pub fn submission_trace(&self) -> &[ShardEvent] {
        self.scheduler.trace()
    }

    #[must_use]
    pub fn metrics(&self) -> &ReaderMetrics {
        &self.metrics
    }

    #[must_use]
    pub fn options(&self) -> &ResolvedOptions {
        &self.options
    }

    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.phase == Phase::Exhausted
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.phase == Phase::Closed
    }
}

/// Block on `queue` until an item arrives, the reader is interrupted or the
/// fetch timeout runs out. A disconnected queue reads as `Aborted`.
fn wait_for<R>(
    queue: &Receiver<ShardItem<R>>,
    cancel: &CancelToken,
    timeout: Option<Duration>,
) -> std::result::Result<ShardItem<R>, InterruptReason> {
    if cancel.is_cancelled() {
        return Err(InterruptReason::Cancelled);
    }
    let deadline = timeout.map_or_else(never, after);
    select! {
        recv(queue) -> item => Ok(item.unwrap_or(ShardItem::Aborted)),
        recv(cancel.signal()) -> _ => Err(InterruptReason::Cancelled),
        recv(deadline) -> _ => Err(InterruptReason::TimedOut(timeout.unwrap_or_default())),
    }
}

impl<S: RangeSource> Iterator for ShardedReader<S> {
    type Item = Result<S::Record>;

    /// Yields records in order; a failure is yielded once, then the iterator ends.
    fn next(&mut self) -> Option<Self::Item> {
        if self.error_yielded {
            return None;
        }
        match self.advance() {
            Ok(true) => self.current.take().map(Ok),
            Ok(false) => None,
            Err(err) => {
                self.error_yielded = true;
                Some(Err(err))
            }
        }
    }
}

impl<S: RangeSource> Drop for ShardedReader<S> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::memory::VecSource;

    fn reader(n: u32, opts: &ReaderOptions) -> ShardedReader<VecSource<u32>> {
        ShardedReader::open(VecSource::new((0..n).collect()), opts).unwrap()
    }

    #[test]
    fn empty_session_is_immediately_exhausted() {
        let mut r = reader(0, &ReaderOptions::new());
        assert_eq!(r.split_num(), 0);
        assert!(!r.advance().unwrap());
        assert!(r.is_exhausted());
        assert!(r.submission_trace().is_empty());
    }

    #[test]
    fn states_progress_in_order() {
        let mut r = reader(4, &ReaderOptions::new().with_split_size(2).with_preload_split_num(1));
        assert_eq!(r.shard_state(0), Some(ShardState::Submitted));
        assert_eq!(r.shard_state(1), Some(ShardState::Pending));
        assert!(r.advance().unwrap());
        assert_eq!(r.shard_state(0), Some(ShardState::Draining));
        assert!(r.advance().unwrap());
        assert!(r.advance().unwrap());
        assert_eq!(r.shard_state(0), Some(ShardState::Done));
        assert_eq!(r.current_split(), 1);
        assert_eq!(r.current(), Some(&2));
    }

    #[test]
    fn take_current_moves_record_out() {
        let mut r = reader(2, &ReaderOptions::new());
        assert!(r.advance().unwrap());
        assert_eq!(r.take_current(), Some(0));
        assert_eq!(r.current(), None);
    }

    #[test]
    fn closed_reader_refuses_to_advance() {
        let mut r = reader(10, &ReaderOptions::new().with_split_size(2));
        assert!(r.advance().unwrap());
        r.close();
        r.close();
        assert!(matches!(r.advance(), Err(ReaderError::Closed)));
        assert!(r.is_closed());
    }

    #[test]
    fn wait_for_reports_timeout() {
        let (_tx, rx) = crossbeam_channel::bounded::<ShardItem<u32>>(1);
        let got = wait_for(&rx, &CancelToken::default(), Some(Duration::from_millis(20)));
        assert_eq!(
            got.err(),
            Some(InterruptReason::TimedOut(Duration::from_millis(20)))
        );
    }

    #[test]
    fn wait_for_sees_cancellation() {
        let (_tx, rx) = crossbeam_channel::bounded::<ShardItem<u32>>(1);
        let cancel = CancelToken::default();
        cancel.cancel();
        assert_eq!(wait_for(&rx, &cancel, None).err(), Some(InterruptReason::Cancelled));
    }
}
