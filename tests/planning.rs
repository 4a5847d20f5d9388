//! Shard planning, count clamping and explicit plans.

mod common;

use anyhow::Result;
use shardflow::testing::{MockSource, drain};
use shardflow::{ReaderOptions, ShardPlan, ShardRange, ShardState, ShardedReader, plan};

#[test]
fn requested_count_is_clamped_to_available_rows() -> Result<()> {
    let opts = ReaderOptions::new()
        .with_offset(8)
        .with_read_count(1_000)
        .with_split_size(3);
    let mut reader = ShardedReader::open(MockSource::new(10), &opts)?;
    assert_eq!(reader.record_count(), 2);
    assert_eq!(reader.split_num(), 1);
    assert_eq!(drain(&mut reader)?, vec![8, 9]);
    Ok(())
}

#[test]
fn offset_past_end_reads_nothing() -> Result<()> {
    let source = MockSource::new(10);
    let log = source.clone();
    let mut reader = ShardedReader::open(source, &ReaderOptions::new().with_offset(25))?;
    assert_eq!(reader.record_count(), 0);
    assert_eq!(reader.split_num(), 0);
    assert!(!reader.advance()?);
    assert!(log.opened().is_empty());
    Ok(())
}

#[test]
fn unset_split_size_means_one_shard() -> Result<()> {
    let mut reader = ShardedReader::open(MockSource::new(17), &ReaderOptions::new())?;
    assert_eq!(reader.split_num(), 1);
    assert_eq!(reader.split_size(), 17);
    assert_eq!(drain(&mut reader)?.len(), 17);
    Ok(())
}

#[test]
fn last_shard_carries_the_remainder() {
    let p = plan(0, 10, 3);
    assert_eq!(p.len(), 4);
    assert_eq!(p.get(3), Some(ShardRange::new(9, 1)));
    let total: u64 = p.ranges().iter().map(|r| r.count).sum();
    assert_eq!(total, 10);
}

#[test]
fn zero_length_shards_are_skipped() -> Result<()> {
    let _log = common::init_tracing();
    let source = MockSource::new(10);
    let log = source.clone();
    let shard_plan = ShardPlan::from_ranges(vec![
        ShardRange::new(0, 3),
        ShardRange::new(3, 0),
        ShardRange::new(3, 3),
        ShardRange::new(6, 0),
        ShardRange::new(6, 4),
    ]);
    let opts = ReaderOptions::new().with_preload_split_num(2).with_thread_num(2);
    let mut reader = ShardedReader::with_plan(source, shard_plan, &opts)?;
    assert_eq!(reader.split_num(), 5);
    assert_eq!(reader.record_count(), 10);

    let rows = drain(&mut reader)?;
    assert_eq!(rows, (0..10).collect::<Vec<u64>>());
    for i in 0..5 {
        assert_eq!(reader.shard_state(i), Some(ShardState::Done), "shard {i}");
    }
    assert_eq!(log.opened().len(), 5);
    Ok(())
}

#[test]
fn explicit_plan_may_revisit_rows() -> Result<()> {
    let shard_plan = ShardPlan::from_ranges(vec![ShardRange::new(4, 2), ShardRange::new(0, 2)]);
    let mut reader = ShardedReader::with_plan(MockSource::new(10), shard_plan, &ReaderOptions::new())?;
    assert_eq!(drain(&mut reader)?, vec![4, 5, 0, 1]);
    Ok(())
}
