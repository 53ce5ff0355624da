use std::sync::Arc;

use dashmap::DashMap;
use tracing::info;

use super::StateProjector;
use crate::LogCache;
use crate::PatchlogConfig;
use crate::Result;
use crate::StateConfig;

/// Hands out one [`StateProjector`] per document name.
///
/// Owns the [`LogCache`] its projectors write through. Clones share both.
#[derive(Clone)]
pub struct StateRegistry {
    logs: LogCache,
    config: StateConfig,
    states: Arc<DashMap<String, Arc<StateProjector>>>,
}

impl StateRegistry {
    pub fn new(config: &PatchlogConfig) -> Self {
        Self::with_cache(LogCache::from_config(config), config.state.clone())
    }

    pub fn with_cache(
        logs: LogCache,
        config: StateConfig,
    ) -> Self {
        Self {
            logs,
            config,
            states: Arc::new(DashMap::new()),
        }
    }

    pub fn logs(&self) -> &LogCache {
        &self.logs
    }

    /// The projector for `name`, loading it from its log on first use.
    pub async fn open(
        &self,
        name: &str,
    ) -> Result<Arc<StateProjector>> {
        if let Some(state) = self.states.get(name) {
            return Ok(state.value().clone());
        }

        let loaded = Arc::new(StateProjector::open(name, self.logs.clone(), self.config.clone()).await?);
        // A concurrent open may have won; everyone keeps the first one stored
        let state = self.states.entry(name.to_string()).or_insert(loaded).value().clone();
        Ok(state)
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Drops every projector and closes the underlying logs.
    pub async fn close_all(&self) {
        let count = self.states.len();
        self.states.clear();
        self.logs.close_all().await;
        info!(states = count, "State registry closed");
    }
}
