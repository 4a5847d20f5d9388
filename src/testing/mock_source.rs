//! A scripted [`RangeSource`] for exercising the reader.
//!
//! [`MockSource`] serves row indices (`record = absolute row number`) and keeps
//! a log of every range it opened and closed. Faults are configured with the
//! `with_*` builders before the source is handed to a reader; clones share the
//! same log, so keep one clone around to inspect it afterwards.

use crate::planner::ShardRange;
use crate::source::{RangeSource, RecordReader};
use anyhow::{Result, bail};
use std::collections::HashSet;
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// Upper bound on how long a gated read waits for [`Gate::release`].
const GATE_LIMIT: Duration = Duration::from_secs(10);

/// Holds a read until released from the test thread.
#[derive(Clone, Debug, Default)]
pub struct Gate {
    state: Arc<(Mutex<bool>, Condvar)>,
}

impl Gate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Let every waiting and future read through.
    pub fn release(&self) {
        let (open, cvar) = &*self.state;
        *open.lock().expect("gate lock poisoned") = true;
        cvar.notify_all();
    }

    #[must_use]
    pub fn is_released(&self) -> bool {
        *self.state.0.lock().expect("gate lock poisoned")
    }

    fn wait(&self) {
        let (open, cvar) = &*self.state;
        let deadline = Instant::now() + GATE_LIMIT;
        let mut released = open.lock().expect("gate lock poisoned");
        while !*released {
            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() {
                return;
            }
            released = cvar.wait_timeout(released, left).expect("gate lock poisoned").0;
        }
    }
}

#[derive(Debug, Default)]
struct Faults {
    count_error: bool,
    open_failures: HashSet<u64>,
    read_failure: Option<u64>,
    close_failure: bool,
    gate: Option<(u64, Gate)>,
    row_delay: Option<Duration>,
}

#[derive(Debug, Default)]
struct Log {
    opened: Vec<ShardRange>,
    closed: Vec<ShardRange>,
}

/// Fault-injecting in-memory session of `total` rows.
#[derive(Clone, Debug)]
pub struct MockSource {
    total: u64,
    faults: Arc<Faults>,
    log: Arc<Mutex<Log>>,
}

impl MockSource {
    #[must_use]
    pub fn new(total: u64) -> Self {
        Self {
            total,
            faults: Arc::new(Faults::default()),
            log: Arc::new(Mutex::new(Log::default())),
        }
    }

    fn faults_mut(&mut self) -> &mut Faults {
        Arc::get_mut(&mut self.faults).expect("configure faults before cloning the source")
    }

    /// `record_count` fails.
    #[must_use]
    pub fn with_count_error(mut self) -> Self {
        self.faults_mut().count_error = true;
        self
    }

    /// Opening the range that starts at `start` fails.
    #[must_use]
    pub fn with_open_failure(mut self, start: u64) -> Self {
        self.faults_mut().open_failures.insert(start);
        self
    }

    /// Reading absolute row `row` fails.
    #[must_use]
    pub fn with_read_failure(mut self, row: u64) -> Self {
        self.faults_mut().read_failure = Some(row);
        self
    }

    /// Closing any range reader fails. The close is still logged.
    #[must_use]
    pub fn with_close_failure(mut self) -> Self {
        self.faults_mut().close_failure = true;
        self
    }

    /// Reading absolute row `row` blocks until `gate` is released.
    #[must_use]
    pub fn with_gate(mut self, row: u64, gate: Gate) -> Self {
        self.faults_mut().gate = Some((row, gate));
        self
    }

    /// Every row takes `delay` to read.
    #[must_use]
    pub fn with_row_delay(mut self, delay: Duration) -> Self {
        self.faults_mut().row_delay = Some(delay);
        self
    }

    /// Ranges in the order they were opened.
    #[must_use]
    pub fn opened(&self) -> Vec<ShardRange> {
        self.log.lock().expect("log lock poisoned").opened.clone()
    }

    /// Ranges in the order their readers were closed.
    #[must_use]
    pub fn closed(&self) -> Vec<ShardRange> {
        self.log.lock().expect("log lock poisoned").closed.clone()
    }

    /// Whether every opened range has been closed again.
    #[must_use]
    pub fn all_closed(&self) -> bool {
        let log = self.log.lock().expect("log lock poisoned");
        let mut opened = log.opened.iter().map(|r| (r.start, r.count)).collect::<Vec<_>>();
        let mut closed = log.closed.iter().map(|r| (r.start, r.count)).collect::<Vec<_>>();
        opened.sort_unstable();
        closed.sort_unstable();
        opened == closed
    }
}

impl RangeSource for MockSource {
    type Record = u64;
    type Reader = MockReader;

    fn record_count(&self) -> Result<u64> {
        if self.faults.count_error {
            bail!("session is not available");
        }
        Ok(self.total)
    }

    fn open_range(&self, start: u64, count: u64) -> Result<MockReader> {
        let range = ShardRange::new(start, count);
        if self.faults.open_failures.contains(&start) {
            bail!("injected open failure for {range}");
        }
        if start > self.total {
            bail!("range {range} starts past {} rows", self.total);
        }
        self.log.lock().expect("log lock poisoned").opened.push(range);
        Ok(MockReader {
            range,
            next: start,
            end: range.end().min(self.total),
            faults: Arc::clone(&self.faults),
            log: Arc::clone(&self.log),
        })
    }
}

/// Reader handed out by [`MockSource`].
pub struct MockReader {
    range: ShardRange,
    next: u64,
    end: u64,
    faults: Arc<Faults>,
    log: Arc<Mutex<Log>>,
}

impl RecordReader for MockReader {
    type Record = u64;

    fn read(&mut self) -> Result<Option<u64>> {
        if self.next >= self.end {
            return Ok(None);
        }
        let row = self.next;
        if let Some((at, gate)) = &self.faults.gate
            && *at == row
        {
            gate.wait();
        }
        if self.faults.read_failure == Some(row) {
            bail!("injected read failure at row {row}");
        }
        if let Some(delay) = self.faults.row_delay {
            thread::sleep(delay);
        }
        self.next += 1;
        Ok(Some(row))
    }

    fn close(&mut self) -> Result<()> {
        self.log.lock().expect("log lock poisoned").closed.push(self.range);
        if self.faults.close_failure {
            bail!("injected close failure for {}", self.range);
        }
        Ok(())
    }
}
