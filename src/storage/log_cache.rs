use std::path::PathBuf;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;
use tracing::instrument;

use super::LogStore;
use super::LogStream;
use crate::constants::MAX_REOPEN_ATTEMPTS;
use crate::LogConfig;
use crate::Operation;
use crate::PatchlogConfig;
use crate::Result;
use crate::StorageConfig;
use crate::SystemError;

/// Registry of open log stores, keyed by document name.
///
/// Stores leave the cache on their own when their idle timer fires; the next
/// access opens a fresh one on the same file. Clones share the registry.
#[derive(Clone)]
pub struct LogCache {
    inner: Arc<LogCacheInner>,
}

struct LogCacheInner {
    storage: StorageConfig,
    log: LogConfig,
    stores: DashMap<String, LogStore>,
}

impl LogCache {
    pub fn new(
        storage: StorageConfig,
        log: LogConfig,
    ) -> Self {
        Self {
            inner: Arc::new(LogCacheInner {
                storage,
                log,
                stores: DashMap::new(),
            }),
        }
    }

    pub fn from_config(config: &PatchlogConfig) -> Self {
        Self::new(config.storage.clone(), config.log.clone())
    }

    /// File backing the document `name`.
    pub fn log_path(
        &self,
        name: &str,
    ) -> Result<PathBuf> {
        validate_name(name)?;
        Ok(self
            .inner
            .storage
            .data_dir
            .join(format!("{}{}", name, self.inner.storage.log_file_suffix)))
    }

    /// Returns the open store for `name`, opening it if needed.
    pub async fn open(
        &self,
        name: &str,
    ) -> Result<LogStore> {
        if let Some(store) = self.inner.stores.get(name) {
            return Ok(store.value().clone());
        }

        let path = self.log_path(name)?;
        let store = LogStore::open(name, path, self.inner.log.clone()).await?;
        let cache = Arc::downgrade(&self.inner);
        let key = name.to_string();
        store.on_close(move |id| {
            if let Some(cache) = cache.upgrade() {
                cache.stores.remove_if(&key, |_, s| s.id() == id);
            }
        });

        // Another caller may have opened the same name while we were scanning
        let (winner, loser) = match self.inner.stores.entry(name.to_string()) {
            Entry::Occupied(existing) => (existing.get().clone(), Some(store)),
            Entry::Vacant(slot) => {
                slot.insert(store.clone());
                (store, None)
            }
        };
        if let Some(loser) = loser {
            debug!(name, "Lost open race, closing duplicate store");
            loser.close().await;
        }
        Ok(winner)
    }

    /// Appends `ops` to the log of `name`. A store that closes between
    /// lookup and append is replaced transparently.
    #[instrument(skip(self, ops), fields(len = ops.len()))]
    pub async fn write(
        &self,
        name: &str,
        ops: &[Operation],
    ) -> Result<()> {
        let mut attempt = 1;
        loop {
            let store = self.open(name).await?;
            match store.write(ops).await {
                Err(e) if e.is_log_closed() && attempt < MAX_REOPEN_ATTEMPTS => {
                    debug!(name, attempt, "Store closed under writer, reopening");
                    self.evict(name, &store);
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    /// Reads the log of `name`; see [`LogStore::read`].
    #[instrument(skip(self))]
    pub async fn read(
        &self,
        name: &str,
        offset: u64,
        follow: bool,
    ) -> Result<LogStream> {
        let mut attempt = 1;
        loop {
            let store = self.open(name).await?;
            match store.read(offset, follow).await {
                Err(e) if e.is_log_closed() && attempt < MAX_REOPEN_ATTEMPTS => {
                    debug!(name, attempt, "Store closed under reader, reopening");
                    self.evict(name, &store);
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner.stores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.stores.is_empty()
    }

    pub fn contains(
        &self,
        name: &str,
    ) -> bool {
        self.inner.stores.contains_key(name)
    }

    /// Closes every open store. Their tails end cleanly.
    pub async fn close_all(&self) {
        let stores: Vec<LogStore> = self.inner.stores.iter().map(|s| s.value().clone()).collect();
        for store in stores {
            store.close().await;
        }
        self.inner.stores.clear();
    }

    fn evict(
        &self,
        name: &str,
        store: &LogStore,
    ) {
        self.inner.stores.remove_if(name, |_, s| s.id() == store.id());
    }
}

/// Names become file names inside `data_dir`.
fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.contains(&['/', '\\', '\0'][..]) || name.contains("..") {
        return Err(SystemError::InvalidName(name.to_string()).into());
    }
    Ok(())
}
