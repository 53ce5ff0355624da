#![allow(dead_code)]

use std::path::Path;
use std::time::Duration;

use futures::StreamExt;
use patchlog::ChangeFeed;
use patchlog::FeedLine;
use patchlog::LogConfig;
use patchlog::PatchlogConfig;
use patchlog::StorageConfig;

pub fn config_in(dir: &Path) -> PatchlogConfig {
    PatchlogConfig {
        storage: StorageConfig {
            data_dir: dir.to_path_buf(),
            ..StorageConfig::default()
        },
        log: LogConfig {
            sync_on_write: false,
            ..LogConfig::default()
        },
        ..PatchlogConfig::default()
    }
    .validate()
    .expect("valid test config")
}

pub async fn next_feed_line(feed: &mut ChangeFeed) -> Option<FeedLine> {
    let line = tokio::time::timeout(Duration::from_secs(2), feed.next())
        .await
        .expect("feed produced nothing in time")?;
    Some(FeedLine::parse(&line.expect("feed failed")).expect("feed line parses"))
}
