//! Exhaustion, close, interrupt and fetch timeout.

mod common;

use anyhow::Result;
use mark_flaky_tests::flaky;
use shardflow::testing::{Gate, MockSource, drain, wait_until};
use shardflow::{InterruptReason, ReaderError, ReaderOptions, ShardedReader};
use std::thread;
use std::time::Duration;

#[test]
fn exhaustion_is_idempotent() -> Result<()> {
    let mut reader = ShardedReader::open(MockSource::new(4), &common::scenario_options())?;
    assert_eq!(drain(&mut reader)?.len(), 4);
    for _ in 0..5 {
        assert!(!reader.advance()?);
        assert!(reader.current().is_none());
    }
    assert!(reader.is_exhausted());
    assert_eq!(reader.current_split(), reader.split_num());
    Ok(())
}

#[test]
fn close_mid_stream_releases_every_range() -> Result<()> {
    let _log = common::init_tracing();
    let source = MockSource::new(1_000);
    let log = source.clone();
    let opts = ReaderOptions::new()
        .with_split_size(100)
        .with_preload_split_num(4)
        .with_thread_num(4)
        .with_queue_capacity(8);
    let mut reader = ShardedReader::open(source, &opts)?;
    for _ in 0..150 {
        assert!(reader.advance()?);
    }
    reader.close();
    assert!(reader.is_closed());
    assert!(matches!(reader.advance(), Err(ReaderError::Closed)));
    assert!(wait_until(Duration::from_secs(5), || log.all_closed()));
    assert!(log.opened().len() <= 6);
    Ok(())
}

#[test]
fn dropping_the_reader_closes_it() -> Result<()> {
    let source = MockSource::new(500);
    let log = source.clone();
    let opts = ReaderOptions::new()
        .with_split_size(50)
        .with_preload_split_num(3)
        .with_queue_capacity(4);
    {
        let mut reader = ShardedReader::open(source, &opts)?;
        assert!(reader.advance()?);
    }
    assert!(wait_until(Duration::from_secs(5), || log.all_closed()));
    Ok(())
}

#[test]
fn close_before_reading_is_fine() -> Result<()> {
    let mut reader = ShardedReader::open(MockSource::new(10), &common::scenario_options())?;
    reader.close();
    reader.close();
    assert!(matches!(reader.advance(), Err(ReaderError::Closed)));
    Ok(())
}

#[flaky]
#[test]
fn interrupt_unblocks_a_waiting_consumer() -> Result<()> {
    let gate = Gate::new();
    let source = MockSource::new(10).with_gate(0, gate.clone());
    let opts = ReaderOptions::new().with_split_size(5).with_preload_split_num(1);
    let mut reader = ShardedReader::open(source, &opts)?;
    let handle = reader.interrupt_handle();

    let interrupter = thread::spawn(move || {
        thread::sleep(Duration::from_millis(100));
        handle.interrupt();
    });
    let err = reader.advance().unwrap_err();
    interrupter.join().expect("interrupter panicked");
    gate.release();

    assert!(matches!(
        err,
        ReaderError::Interrupted {
            shard: 0,
            reason: InterruptReason::Cancelled
        }
    ));
    assert!(err.is_interrupted());
    assert!(reader.advance().unwrap_err().is_interrupted());
    Ok(())
}

#[flaky]
#[test]
fn fetch_timeout_is_latched() -> Result<()> {
    let gate = Gate::new();
    let source = MockSource::new(10).with_gate(3, gate.clone());
    let opts = ReaderOptions::new()
        .with_split_size(5)
        .with_preload_split_num(1)
        .with_fetch_timeout(Duration::from_millis(80));
    let mut reader = ShardedReader::open(source, &opts)?;
    for _ in 0..3 {
        assert!(reader.advance()?);
    }
    let err = reader.advance().unwrap_err();
    gate.release();
    assert!(matches!(
        err,
        ReaderError::Interrupted {
            reason: InterruptReason::TimedOut(_),
            ..
        }
    ));
    assert!(reader.advance().is_err());
    Ok(())
}

#[test]
fn interrupt_after_exhaustion_changes_nothing() -> Result<()> {
    let mut reader = ShardedReader::open(MockSource::new(3), &ReaderOptions::new())?;
    let handle = reader.interrupt_handle();
    assert_eq!(drain(&mut reader)?, vec![0, 1, 2]);
    handle.interrupt();
    assert!(!reader.advance()?);
    Ok(())
}
