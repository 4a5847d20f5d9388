//! Drain helpers and assertions over reader output.

use crate::error::ReaderError;
use crate::reader::ShardedReader;
use crate::scheduler::ShardEvent;
use crate::source::RangeSource;
use std::fmt::Debug;
use std::thread;
use std::time::{Duration, Instant};

/// Advance `reader` to the end, collecting every record.
///
/// # Errors
/// Returns the first error `advance` reports.
pub fn drain<S: RangeSource>(reader: &mut ShardedReader<S>) -> Result<Vec<S::Record>, ReaderError> {
    let mut out = Vec::new();
    while reader.advance()? {
        out.extend(reader.take_current());
    }
    Ok(out)
}

/// Like [`drain`], but keeps the records delivered before a failure.
pub fn drain_until_error<S: RangeSource>(
    reader: &mut ShardedReader<S>,
) -> (Vec<S::Record>, Option<ReaderError>) {
    let mut out = Vec::new();
    loop {
        match reader.advance() {
            Ok(true) => out.extend(reader.take_current()),
            Ok(false) => return (out, None),
            Err(err) => return (out, Some(err)),
        }
    }
}

/// Poll `cond` until it holds or `timeout` runs out. Returns the last result.
pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if cond() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(5));
    }
}

/// Assert `rows` is exactly `start, start + 1, ...`.
///
/// # Panics
/// Panics at the first row out of sequence.
pub fn assert_sequential<T>(rows: &[T], start: u64)
where
    T: Copy + Debug + Into<u64>,
{
    for (i, row) in rows.iter().enumerate() {
        let expected = start + i as u64;
        assert_eq!(
            (*row).into(),
            expected,
            "row {i} out of sequence: expected {expected}, got {row:?}"
        );
    }
}

/// Replay a submission trace and assert the in-flight count never exceeded
/// `window`, and that shards were submitted in increasing order.
///
/// # Panics
/// Panics on the first event that breaks either rule.
pub fn assert_window_respected(trace: &[ShardEvent], window: usize) {
    let mut in_flight = 0usize;
    let mut last_submitted: Option<usize> = None;
    for (step, event) in trace.iter().enumerate() {
        match *event {
            ShardEvent::Submitted(i) => {
                in_flight += 1;
                assert!(
                    in_flight <= window,
                    "step {step}: {in_flight} shards in flight exceeds window {window}: {trace:?}"
                );
                assert!(
                    last_submitted.is_none_or(|prev| i > prev),
                    "step {step}: shard {i} submitted out of order: {trace:?}"
                );
                last_submitted = Some(i);
            }
            ShardEvent::Done(_) | ShardEvent::Failed(_) => {
                in_flight = in_flight.saturating_sub(1);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_replay_accepts_fixed_stride() {
        use ShardEvent::{Done, Submitted};
        let trace = [Submitted(0), Submitted(1), Done(0), Submitted(2), Done(1), Done(2)];
        assert_window_respected(&trace, 2);
    }

    #[test]
    #[should_panic(expected = "exceeds window")]
    fn window_replay_rejects_overflow() {
        use ShardEvent::Submitted;
        assert_window_respected(&[Submitted(0), Submitted(1)], 1);
    }

    #[test]
    fn wait_until_gives_up() {
        assert!(!wait_until(Duration::from_millis(10), || false));
        assert!(wait_until(Duration::from_millis(10), || true));
    }
}
