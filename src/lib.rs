//! A JSON document store persisted as an append-only log of JSON-Patch
//! operations.
//!
//! Each named document is backed by one newline-delimited JSON file.
//! [`StateProjector`] rebuilds the document from its log at open, serves
//! point reads from memory, logs every accepted patch in invertible form
//! through a [`LogCache`], and exposes prefix-filtered [`ChangeFeed`]s that
//! replay history and then follow live writes.
//!
//! ```ignore
//! let config = PatchlogConfig::new()?.validate()?;
//! let states = StateRegistry::new(&config);
//! let doc = states.open("settings").await?;
//! doc.apply(&[Operation::add("/theme", json!({"dark": true}))]).await?;
//! let mut feed = doc.changes("/theme", 0).await?;
//! ```

mod config;
mod constants;
mod errors;
mod metrics;
pub mod patch;
mod state;
mod storage;

pub use config::*;
pub use errors::*;
pub use metrics::*;
pub use patch::Operation;
pub use state::*;
pub use storage::*;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub(crate) mod test_utils;
