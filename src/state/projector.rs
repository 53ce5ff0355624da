use parking_lot::RwLock;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use tracing::debug;
use tracing::info;
use tracing::instrument;
use tracing::warn;

use super::ChangeFeed;
use crate::patch::apply_invertible;
use crate::patch::apply_patch;
use crate::patch::compact;
use crate::patch::get_value;
use crate::patch::parse_path;
use crate::patch::ApplyMode;
use crate::Error;
use crate::LogCache;
use crate::Operation;
use crate::Result;
use crate::StateConfig;

/// Returned by [`StateProjector::apply`]: the document version after the
/// patch was durably logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Applied {
    pub v: u64,
}

struct Projection {
    document: Value,
    /// Operations in the log that produced `document`
    version: u64,
}

/// In-memory document rebuilt from, and kept in step with, one operation log.
///
/// Reads are served from memory. Every accepted patch is logged in its
/// invertible form before it becomes visible.
pub struct StateProjector {
    name: String,
    logs: LogCache,
    config: StateConfig,
    projection: RwLock<Projection>,
    /// Serializes `apply`; true when memory may be out of step with the log
    apply_lock: tokio::sync::Mutex<bool>,
}

impl std::fmt::Debug for StateProjector {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("StateProjector")
            .field("name", &self.name)
            .field("version", &self.version())
            .finish()
    }
}

impl StateProjector {
    /// Replays the whole log of `name` into a fresh document.
    #[instrument(skip(logs, config))]
    pub async fn open(
        name: &str,
        logs: LogCache,
        config: StateConfig,
    ) -> Result<Self> {
        let projection = load(&logs, name, &config).await?;
        info!(name, version = projection.version, "State loaded");
        Ok(Self {
            name: name.to_string(),
            logs,
            config,
            projection: RwLock::new(projection),
            apply_lock: tokio::sync::Mutex::new(false),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of operations durably logged for this document.
    pub fn version(&self) -> u64 {
        self.projection.read().version
    }

    /// Deep copy of the value at `path`; `/` is the whole document.
    pub fn get(
        &self,
        path: &str,
    ) -> Result<Value> {
        let projection = self.projection.read();
        Ok(get_value(&projection.document, path)?.clone())
    }

    /// Checks `patch` against the current document, logs its invertible form
    /// and then makes it visible.
    ///
    /// Nothing changes in memory unless the log write succeeds. A failed
    /// write schedules a reload from the log before the next patch.
    #[instrument(skip(self, patch), fields(name = %self.name, len = patch.len()))]
    pub async fn apply(
        &self,
        patch: &[Operation],
    ) -> Result<Applied> {
        let mut needs_reload = self.apply_lock.lock().await;
        if *needs_reload {
            self.replace_projection().await?;
            *needs_reload = false;
        }

        let invertible = {
            let projection = self.projection.read();
            apply_invertible(patch, &projection.document)?
        };

        if let Err(e) = self.logs.write(&self.name, &invertible.ops).await {
            warn!("Patch not logged, reloading before next apply: {:?}", e);
            *needs_reload = true;
            return Err(e);
        }

        let mut projection = self.projection.write();
        projection.document = invertible.document;
        projection.version += invertible.ops.len() as u64;
        debug!(version = projection.version, logged = invertible.ops.len(), "applied");
        Ok(Applied { v: projection.version })
    }

    /// Rebuilds the document from the log, discarding in-memory state.
    #[instrument(skip(self), fields(name = %self.name))]
    pub async fn reload(&self) -> Result<u64> {
        let mut needs_reload = self.apply_lock.lock().await;
        let version = self.replace_projection().await?;
        *needs_reload = false;
        Ok(version)
    }

    /// Follows the log from `offset`, yielding operations under `prefix`
    /// and a version marker after every logged batch.
    ///
    /// An empty `prefix` or `/` matches every path.
    pub async fn changes(
        &self,
        prefix: &str,
        offset: u64,
    ) -> Result<ChangeFeed> {
        if !prefix.is_empty() {
            parse_path(prefix)?;
        }
        let batches = self.logs.read(&self.name, offset, true).await?;
        debug!(name = %self.name, prefix, offset, "Change feed attached");
        Ok(ChangeFeed::new(batches, prefix))
    }

    async fn replace_projection(&self) -> Result<u64> {
        let fresh = load(&self.logs, &self.name, &self.config).await?;
        let version = fresh.version;
        *self.projection.write() = fresh;
        info!(name = %self.name, version, "State reloaded from log");
        Ok(version)
    }
}

async fn load(
    logs: &LogCache,
    name: &str,
    config: &StateConfig,
) -> Result<Projection> {
    let ops = logs.read(name, 0, false).await?.collect_ops().await?;
    let version = ops.len() as u64;
    let ops = if config.compact_on_load {
        let compacted = compact(ops);
        debug!(name, version, kept = compacted.len(), "compacted log for load");
        compacted
    } else {
        ops
    };

    let mut document = Value::Object(Map::new());
    apply_patch(&mut document, &ops, ApplyMode::Replay)
        .map_err(|e| Error::Fatal(format!("log of {name:?} does not replay: {e}")))?;
    Ok(Projection { document, version })
}
