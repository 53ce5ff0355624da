use serde::Deserialize;
use serde::Serialize;

use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct StateConfig {
    /// Compact the replayed log before building the in-memory document.
    /// Only affects load time; the log on disk is never rewritten.
    #[serde(default)]
    pub compact_on_load: bool,
}

impl StateConfig {
    pub fn validate(&self) -> Result<()> {
        Ok(())
    }
}
