//! Reader metrics and their JSON snapshot.

use anyhow::Result;
use shardflow::testing::{MockSource, drain};
use shardflow::{ReaderOptions, ShardedReader};

#[test]
fn counters_match_a_full_read() -> Result<()> {
    let opts = ReaderOptions::new().with_split_size(4).with_preload_split_num(2);
    let mut reader = ShardedReader::open(MockSource::new(18), &opts)?;
    drain(&mut reader)?;

    let m = reader.metrics();
    assert_eq!(m.shards_submitted(), 5);
    assert_eq!(m.shards_completed(), 5);
    assert_eq!(m.shards_failed(), 0);
    assert_eq!(m.records_downloaded(), 18);
    assert_eq!(m.records_delivered(), 18);
    assert!(m.peak_in_flight() <= 2);
    Ok(())
}

#[test]
fn snapshot_is_saved_as_json() -> Result<()> {
    let mut reader = ShardedReader::open(MockSource::new(3), &ReaderOptions::new())?;
    drain(&mut reader)?;

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("metrics.json");
    reader.metrics().save_to_file(&path)?;
    let saved: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
    assert_eq!(saved["records_delivered"], 3);
    assert_eq!(saved["shards_completed"], 1);
    Ok(())
}
