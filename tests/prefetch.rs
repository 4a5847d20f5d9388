//! The prefetch window bounds in-flight shards and submits in order.

mod common;

use anyhow::Result;
use shardflow::testing::{MockSource, assert_window_respected, drain};
use shardflow::{ReaderOptions, ShardEvent, ShardState, ShardedReader};

#[test]
fn worked_example_trace() -> Result<()> {
    let mut reader = ShardedReader::open(MockSource::new(10), &common::scenario_options())?;
    assert_eq!(
        reader.submission_trace(),
        &[ShardEvent::Submitted(0), ShardEvent::Submitted(1)]
    );
    assert_eq!(reader.shard_state(2), Some(ShardState::Pending));

    drain(&mut reader)?;
    use ShardEvent::{Done, Submitted};
    assert_eq!(
        reader.submission_trace(),
        &[
            Submitted(0),
            Submitted(1),
            Done(0),
            Submitted(2),
            Done(1),
            Submitted(3),
            Done(2),
            Done(3),
        ]
    );
    assert_eq!(reader.peak_in_flight(), 2);
    Ok(())
}

#[test]
fn window_is_never_exceeded() -> Result<()> {
    for window in [1, 2, 3, 5, 16] {
        let opts = ReaderOptions::new()
            .with_split_size(4)
            .with_preload_split_num(window)
            .with_thread_num(3);
        let mut reader = ShardedReader::open(MockSource::new(61), &opts)?;
        drain(&mut reader)?;
        assert_window_respected(reader.submission_trace(), window);
        assert!(reader.peak_in_flight() <= window);
        assert_eq!(reader.metrics().peak_in_flight(), reader.peak_in_flight() as u64);
    }
    Ok(())
}

#[test]
fn unset_window_submits_every_shard_up_front() -> Result<()> {
    let opts = ReaderOptions::new().with_split_size(2);
    let reader = ShardedReader::open(MockSource::new(10), &opts)?;
    assert_eq!(reader.split_num(), 5);
    assert_eq!(reader.preload_split_num(), 5);
    assert_eq!(reader.in_flight(), 5);
    for i in 0..5 {
        assert_ne!(reader.shard_state(i), Some(ShardState::Pending), "shard {i}");
    }
    Ok(())
}

#[test]
fn zero_window_submits_every_shard_up_front() -> Result<()> {
    let opts = ReaderOptions::new().with_split_size(2).with_preload_split_num(0);
    let mut reader = ShardedReader::open(MockSource::new(10), &opts)?;
    assert_eq!(reader.split_num(), 5);
    assert_eq!(reader.preload_split_num(), 5);
    assert_eq!(
        reader.submission_trace(),
        &(0..5).map(ShardEvent::Submitted).collect::<Vec<_>>()[..]
    );
    assert_eq!(drain(&mut reader)?, (0..10).collect::<Vec<u64>>());
    Ok(())
}

#[test]
fn thread_count_defaults_to_the_window() -> Result<()> {
    let opts = ReaderOptions::new().with_split_size(2).with_preload_split_num(1);
    let reader = ShardedReader::open(MockSource::new(10), &opts)?;
    assert_eq!(reader.thread_num(), 1);
    Ok(())
}

#[test]
fn ranges_are_opened_in_submission_order_with_one_thread() -> Result<()> {
    let source = MockSource::new(9);
    let log = source.clone();
    let opts = ReaderOptions::new()
        .with_split_size(3)
        .with_preload_split_num(3)
        .with_thread_num(1);
    let mut reader = ShardedReader::open(source, &opts)?;
    drain(&mut reader)?;
    let starts = log.opened().iter().map(|r| r.start).collect::<Vec<_>>();
    assert_eq!(starts, vec![0, 3, 6]);
    Ok(())
}
