//! Shared fixtures for unit tests: temp-dir backed caches and stream helpers.

use std::path::Path;
use std::time::Duration;

use futures::Stream;
use futures::StreamExt;
use serde_json::json;

use crate::LogBatch;
use crate::LogCache;
use crate::LogConfig;
use crate::Operation;
use crate::PatchlogConfig;
use crate::Result;
use crate::StorageConfig;

/// Long enough that no store closes during a test unless the test advances
/// the (paused) clock on purpose.
pub(crate) const TEST_IDLE_TIMEOUT_MS: u64 = 60_000;

pub(crate) fn test_log_config() -> LogConfig {
    LogConfig {
        idle_timeout_in_ms: TEST_IDLE_TIMEOUT_MS,
        catchup_buffer_size: 64,
        output_buffer_size: 16,
        tail_idle_timeout_in_ms: 0,
        replay_batch_size: 4,
        sync_on_write: false,
    }
}

pub(crate) fn test_config(dir: &Path) -> PatchlogConfig {
    PatchlogConfig {
        storage: StorageConfig {
            data_dir: dir.to_path_buf(),
            ..StorageConfig::default()
        },
        log: test_log_config(),
        ..PatchlogConfig::default()
    }
}

pub(crate) fn test_cache(dir: &Path) -> LogCache {
    LogCache::from_config(&test_config(dir))
}

/// `n` primitive adds at `/k0`, `/k1`, ...
pub(crate) fn numbered_adds(
    start: usize,
    n: usize,
) -> Vec<Operation> {
    (start..start + n)
        .map(|i| Operation::add(format!("/k{i}"), json!(i)))
        .collect()
}

/// Next stream item, failing the test if nothing arrives within a second.
pub(crate) async fn next_within<S, T>(stream: &mut S) -> Option<T>
where
    S: Stream<Item = T> + Unpin,
{
    tokio::time::timeout(Duration::from_secs(1), stream.next())
        .await
        .expect("stream produced nothing in time")
}

/// Pulls batches until `count` operations have been seen.
pub(crate) async fn collect_ops<S>(
    stream: &mut S,
    count: usize,
) -> Vec<Operation>
where
    S: Stream<Item = Result<LogBatch>> + Unpin,
{
    let mut ops = Vec::new();
    while ops.len() < count {
        let batch = next_within(stream)
            .await
            .expect("stream ended early")
            .expect("read failed");
        ops.extend(batch.ops);
    }
    ops
}
