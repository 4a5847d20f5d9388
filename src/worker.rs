//! Shard worker pool.
//!
//! Each submitted shard becomes one job on a fixed-size `rayon` pool. A job
//! opens a range reader over its shard, pushes every record into the shard's
//! bounded queue and finishes with [`ShardItem::End`]. On failure it latches
//! the error and makes a best-effort, non-blocking push of
//! [`ShardItem::Aborted`].
//!
//! Jobs are only ever spawned from the consumer thread, which is outside the
//! pool, so they start in submission order. The lowest unfinished shard
//! therefore always holds a worker thread and full queues of later shards
//! cannot starve it.

use crate::error::{ReaderError, Result};
use crate::latch::{CancelToken, ErrorLatch};
use crate::metrics::ReaderMetrics;
use crate::planner::ShardRange;
use crate::source::{RangeSource, RecordReader};
use anyhow::{Context, anyhow};
use crossbeam_channel::{Receiver, Sender, bounded};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// What flows through a shard queue.
#[derive(Debug)]
pub(crate) enum ShardItem<R> {
    Record(R),
    /// The shard was read to exhaustion.
    End,
    /// The worker failed; the cause is in the error latch.
    Aborted,
}

/// How a shard job ended without an error.
#[derive(Debug, PartialEq, Eq)]
enum Outcome {
    Completed,
    Cancelled,
    /// The consumer dropped the queue (reader closed).
    Abandoned,
}

pub(crate) struct ShardWorkerPool<S: RangeSource> {
    pool: rayon::ThreadPool,
    source: Arc<S>,
    latch: ErrorLatch,
    cancel: CancelToken,
    metrics: ReaderMetrics,
    queue_capacity: usize,
}

impl<S: RangeSource> ShardWorkerPool<S> {
    pub(crate) fn new(
        source: Arc<S>,
        threads: usize,
        queue_capacity: usize,
        latch: ErrorLatch,
        cancel: CancelToken,
        metrics: ReaderMetrics,
    ) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads.max(1))
            .thread_name(|i| format!("shard-worker-{i}"))
            .build()
            .map_err(|e| ReaderError::Pool(e.to_string()))?;
        Ok(Self {
            pool,
            source,
            latch,
            cancel,
            metrics,
            queue_capacity: queue_capacity.max(1),
        })
    }

    pub(crate) fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Queue the download of shard `index` and hand back its output queue.
    pub(crate) fn submit(&self, index: usize, range: ShardRange) -> Receiver<ShardItem<S::Record>> {
        let (tx, rx) = bounded(self.queue_capacity);
        let source = Arc::clone(&self.source);
        let latch = self.latch.clone();
        let cancel = self.cancel.clone();
        let metrics = self.metrics.clone();
        self.pool.spawn(move || {
            let job = panic::catch_unwind(AssertUnwindSafe(|| {
                run_shard(source.as_ref(), index, range, &tx, &latch, &cancel, &metrics);
            }));
            if let Err(payload) = job {
                let cause = anyhow!("shard worker panicked: {}", panic_message(payload.as_ref()));
                fail_shard(index, range, cause, &tx, &latch, &metrics);
            }
        });
        rx
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        *s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic payload"
    }
}

fn fail_shard<R>(
    index: usize,
    range: ShardRange,
    cause: anyhow::Error,
    tx: &Sender<ShardItem<R>>,
    latch: &ErrorLatch,
    metrics: &ReaderMetrics,
) {
    metrics.shard_failed();
    warn!(shard = index, %range, error = %format!("{cause:#}"), "shard download failed");
    latch.latch(ReaderError::download(index, range, cause));
    let _ = tx.try_send(ShardItem::Aborted);
}

/// Closes the wrapped reader when dropped, whatever path the job took.
struct CloseOnDrop<R: RecordReader> {
    reader: R,
    closed: bool,
}

impl<R: RecordReader> CloseOnDrop<R> {
    fn new(reader: R) -> Self {
        Self {
            reader,
            closed: false,
        }
    }

    fn read(&mut self) -> anyhow::Result<Option<R::Record>> {
        self.reader.read()
    }

    fn close(&mut self) -> anyhow::Result<()> {
        self.closed = true;
        self.reader.close()
    }
}

impl<R: RecordReader> Drop for CloseOnDrop<R> {
    fn drop(&mut self) {
        if !self.closed
            && let Err(e) = self.reader.close()
        {
            trace!(error = %e, "ignoring close failure of abandoned range reader");
        }
    }
}

fn run_shard<S: RangeSource>(
    source: &S,
    index: usize,
    range: ShardRange,
    tx: &Sender<ShardItem<S::Record>>,
    latch: &ErrorLatch,
    cancel: &CancelToken,
    metrics: &ReaderMetrics,
) {
    if cancel.is_cancelled() {
        trace!(shard = index, "skipping shard of a cancelled reader");
        return;
    }
    match fetch_shard(source, index, range, tx, cancel, metrics) {
        Ok(Outcome::Completed) => {
            // The consumer may already be gone; nothing left to do either way.
            let _ = tx.send(ShardItem::End);
            debug!(shard = index, %range, "shard downloaded");
        }
        Ok(outcome) => {
            trace!(shard = index, ?outcome, "shard download stopped early");
        }
        Err(cause) => fail_shard(index, range, cause, tx, latch, metrics),
    }
}

fn fetch_shard<S: RangeSource>(
    source: &S,
    index: usize,
    range: ShardRange,
    tx: &Sender<ShardItem<S::Record>>,
    cancel: &CancelToken,
    metrics: &ReaderMetrics,
) -> anyhow::Result<Outcome> {
    let reader = source
        .open_range(range.start, range.count)
        .with_context(|| format!("open range reader for shard {index} at {range}"))?;
    let mut reader = CloseOnDrop::new(reader);
    let mut rows = 0u64;
    while let Some(record) = reader
        .read()
        .with_context(|| format!("read row {} of shard {index}", range.start + rows))?
    {
        if cancel.is_cancelled() {
            return Ok(Outcome::Cancelled);
        }
        if tx.send(ShardItem::Record(record)).is_err() {
            return Ok(Outcome::Abandoned);
        }
        rows += 1;
        metrics.record_downloaded();
    }
    // Every row is already queued; a failed release must not void them.
    if let Err(e) = reader.close() {
        warn!(shard = index, %range, error = %format!("{e:#}"), "failed to close range reader");
    }
    Ok(Outcome::Completed)
}
