use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Log store lifecycle and tailing parameters
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LogConfig {
    /// Inactivity (no `read`/`write`) after which a log store closes its
    /// write handle, ends its tails and leaves the cache
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_in_ms: u64,

    /// Operations a tail may hold while it is still replaying from disk.
    /// A tail that would exceed it is evicted.
    #[serde(default = "default_catchup_buffer_size")]
    pub catchup_buffer_size: usize,

    /// Batches queued to a live tail before it counts as a slow consumer
    #[serde(default = "default_output_buffer_size")]
    pub output_buffer_size: usize,

    /// Ends a caught-up tail after this long without writes. 0 disables it.
    #[serde(default)]
    pub tail_idle_timeout_in_ms: u64,

    /// Maximum operations per batch emitted during disk replay
    #[serde(default = "default_replay_batch_size")]
    pub replay_batch_size: usize,

    /// fsync the log file after every append
    #[serde(default = "default_sync_on_write")]
    pub sync_on_write: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            idle_timeout_in_ms: default_idle_timeout(),
            catchup_buffer_size: default_catchup_buffer_size(),
            output_buffer_size: default_output_buffer_size(),
            tail_idle_timeout_in_ms: 0,
            replay_batch_size: default_replay_batch_size(),
            sync_on_write: default_sync_on_write(),
        }
    }
}

impl LogConfig {
    pub fn validate(&self) -> Result<()> {
        if self.idle_timeout_in_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "idle_timeout_in_ms must be greater than 0".into(),
            )));
        }

        if self.catchup_buffer_size == 0 {
            return Err(Error::Config(ConfigError::Message(
                "catchup_buffer_size must be > 0".into(),
            )));
        }

        if self.output_buffer_size == 0 {
            return Err(Error::Config(ConfigError::Message(
                "output_buffer_size must be > 0".into(),
            )));
        }

        if self.replay_batch_size == 0 {
            return Err(Error::Config(ConfigError::Message(
                "replay_batch_size must be > 0".into(),
            )));
        }

        if self.tail_idle_timeout_in_ms != 0 && self.tail_idle_timeout_in_ms >= self.idle_timeout_in_ms {
            return Err(Error::Config(ConfigError::Message(format!(
                "tail_idle_timeout {}ms should be less than idle_timeout {}ms",
                self.tail_idle_timeout_in_ms, self.idle_timeout_in_ms
            ))));
        }

        Ok(())
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_in_ms)
    }

    pub fn tail_idle_timeout(&self) -> Option<Duration> {
        (self.tail_idle_timeout_in_ms > 0).then(|| Duration::from_millis(self.tail_idle_timeout_in_ms))
    }
}

// in ms
fn default_idle_timeout() -> u64 {
    10_000
}
fn default_catchup_buffer_size() -> usize {
    256
}
fn default_output_buffer_size() -> usize {
    128
}
fn default_replay_batch_size() -> usize {
    128
}
fn default_sync_on_write() -> bool {
    true
}
