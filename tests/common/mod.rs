//! Shared helpers for the integration tests.
#![allow(dead_code)]

use shardflow::ReaderOptions;
use tracing_subscriber::{EnvFilter, filter::LevelFilter, fmt, prelude::*};

/// Install a thread-local subscriber that honours `RUST_LOG` and writes
/// through the test harness.
pub fn init_tracing() -> tracing::subscriber::DefaultGuard {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy();
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_test_writer())
        .set_default()
}

/// Options for the worked example: split 3, window 2, 2 threads.
pub fn scenario_options() -> ReaderOptions {
    ReaderOptions::new()
        .with_split_size(3)
        .with_preload_split_num(2)
        .with_thread_num(2)
}
