use std::fmt;
use std::path::Path;
use std::path::PathBuf;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Weak;

use parking_lot::Mutex;
use tokio::fs;
use tokio::fs::File;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::time::sleep_until;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::instrument;
use tracing::trace;
use tracing::warn;

use super::disk;
use super::disk::LogEnd;
use super::log_stream::TailGuard;
use super::tail;
use super::tail::TailSlot;
use super::tail::TailTask;
use super::LogBatch;
use super::LogStream;
use crate::Error;
use crate::LogConfig;
use crate::Operation;
use crate::Result;
use crate::StorageError;
use crate::ACTIVE_TAILS_METRIC;
use crate::LOG_STORES_CLOSED_METRIC;
use crate::OPS_APPENDED_METRIC;

static NEXT_STORE_ID: AtomicU64 = AtomicU64::new(1);

type CloseHook = Box<dyn FnOnce(u64) + Send>;

/// Append-only operation log for one document.
///
/// Cheap to clone; all clones share one file handle, one idle timer and one
/// set of tails. Once closed (idle timeout or [`close`](Self::close)) a
/// store rejects further calls with `LogClosed` and a fresh store must be
/// opened on the same file.
#[derive(Clone)]
pub struct LogStore {
    inner: Arc<LogStoreInner>,
}

pub(crate) struct LogStoreInner {
    id: u64,
    name: String,
    path: PathBuf,
    config: LogConfig,

    // Serializes appends against each other, against read snapshots and
    // against closure
    writer: tokio::sync::Mutex<Writer>,
    tails: Mutex<Vec<Arc<TailSlot>>>,
    next_tail_id: AtomicU64,

    // --- Idle timer ---
    deadline: Mutex<Instant>,
    shutdown: CancellationToken,
    on_close: Mutex<Option<CloseHook>>,
}

struct Writer {
    file: Option<File>,
    end: LogEnd,
    closed: bool,
}

impl fmt::Debug for LogStore {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("LogStore")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("path", &self.inner.path)
            .finish()
    }
}

impl LogStore {
    /// Opens the log at `path`, repairing a truncated trailing line, and
    /// starts its idle timer. The file itself is created on first write.
    pub async fn open(
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        config: LogConfig,
    ) -> Result<Self> {
        let name = name.into();
        let path = path.into();
        let end = disk::scan_log(&path).await?;

        let inner = Arc::new(LogStoreInner {
            id: NEXT_STORE_ID.fetch_add(1, Ordering::Relaxed),
            name,
            path,
            deadline: Mutex::new(Instant::now() + config.idle_timeout()),
            config,
            writer: tokio::sync::Mutex::new(Writer {
                file: None,
                end,
                closed: false,
            }),
            tails: Mutex::new(Vec::new()),
            next_tail_id: AtomicU64::new(1),
            shutdown: CancellationToken::new(),
            on_close: Mutex::new(None),
        });

        tokio::spawn(LogStoreInner::run_idle_timer(
            Arc::downgrade(&inner),
            inner.shutdown.clone(),
        ));

        info!(name = %inner.name, entries = end.entries, "Log store opened");
        Ok(Self { inner })
    }

    /// Identifies this instance; a reopened store on the same file gets a new id.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Number of entries durably appended so far.
    pub async fn len(&self) -> u64 {
        self.inner.writer.lock().await.end.entries
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn is_closed(&self) -> bool {
        self.inner.writer.lock().await.closed
    }

    /// Registers a callback run once, with this store's id, when it closes.
    pub(crate) fn on_close(
        &self,
        hook: impl FnOnce(u64) + Send + 'static,
    ) {
        *self.inner.on_close.lock() = Some(Box::new(hook));
    }

    /// Appends `ops` as one write, then forwards them to every attached tail.
    ///
    /// Nothing is forwarded and the idle timer is left alone if the append
    /// fails.
    #[instrument(skip(self, ops), fields(name = %self.inner.name, len = ops.len()))]
    pub async fn write(
        &self,
        ops: &[Operation],
    ) -> Result<()> {
        if ops.is_empty() {
            return Ok(());
        }

        let mut buf = String::new();
        for op in ops {
            buf.push_str(&op.to_line().map_err(StorageError::Serialization)?);
            buf.push('\n');
        }

        let mut writer = self.inner.writer.lock().await;
        if writer.closed {
            return Err(self.inner.closed_error());
        }

        if let Err(e) = self.inner.append(&mut writer, buf.as_bytes()).await {
            error!("Append failed: {:?}", e);
            writer.file = None;
            if let Err(repair) = disk::truncate(&self.inner.path, writer.end.bytes).await {
                error!("Failed to cut back partial append: {:?}", repair);
            }
            return Err(e);
        }

        let offset = writer.end.entries;
        writer.end.entries += ops.len() as u64;
        writer.end.bytes += buf.len() as u64;
        self.inner.touch();
        OPS_APPENDED_METRIC
            .with_label_values(&[&self.inner.name])
            .inc_by(ops.len() as u64);
        trace!(offset, "appended");

        // Still under the writer lock: tails see batches in log order
        self.inner.fan_out(&LogBatch {
            offset,
            ops: ops.to_vec(),
        });
        Ok(())
    }

    /// Streams every entry with index >= `offset`.
    ///
    /// Without `follow` the stream ends at the current end of the log. With
    /// `follow` it continues with subsequent writes until the consumer drops
    /// it, the store closes, or the tail is evicted.
    #[instrument(skip(self), fields(name = %self.inner.name))]
    pub async fn read(
        &self,
        offset: u64,
        follow: bool,
    ) -> Result<LogStream> {
        let writer = self.inner.writer.lock().await;
        if writer.closed {
            return Err(self.inner.closed_error());
        }
        let end = writer.end;
        self.inner.touch();

        let (tx, rx) = mpsc::channel(self.inner.config.output_buffer_size);
        let slot = follow.then(|| {
            let id = self.inner.next_tail_id.fetch_add(1, Ordering::Relaxed);
            let slot = Arc::new(TailSlot::new(
                id,
                &self.inner.name,
                offset,
                self.inner.config.catchup_buffer_size,
            ));
            self.inner.tails.lock().push(slot.clone());
            ACTIVE_TAILS_METRIC.inc();
            debug!(tail_id = id, offset, "Tail attached");
            slot
        });
        drop(writer);

        let task = TailTask {
            path: self.inner.path.clone(),
            offset,
            end,
            batch_size: self.inner.config.replay_batch_size,
            tail_idle: self.inner.config.tail_idle_timeout(),
            store: Arc::downgrade(&self.inner),
        };
        tokio::spawn(tail::drive(task, slot.clone(), tx));

        let guard = slot.map(|slot| TailGuard {
            slot,
            store: Arc::downgrade(&self.inner),
        });
        Ok(LogStream::new(rx, guard))
    }

    /// Closes the write handle and ends every attached tail. Idempotent.
    pub async fn close(&self) {
        self.inner.close().await;
    }
}

impl LogStoreInner {
    fn touch(&self) {
        *self.deadline.lock() = Instant::now() + self.config.idle_timeout();
    }

    fn closed_error(&self) -> Error {
        StorageError::LogClosed {
            name: self.name.clone(),
        }
        .into()
    }

    async fn append(
        &self,
        writer: &mut Writer,
        bytes: &[u8],
    ) -> Result<()> {
        if writer.file.is_none() {
            writer.file = Some(self.open_for_append().await?);
        }
        let Some(file) = writer.file.as_mut() else {
            return Err(Error::Fatal(format!("no write handle for {:?}", self.name)));
        };

        file.write_all(bytes).await?;
        file.flush().await?;
        if self.config.sync_on_write {
            file.sync_data().await?;
        }
        Ok(())
    }

    async fn open_for_append(&self) -> Result<File> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| StorageError::PathError {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| StorageError::PathError {
                path: self.path.clone(),
                source: e,
            })?;
        debug!(name = %self.name, path = %self.path.display(), "Opened log for append");
        Ok(file)
    }

    fn fan_out(
        &self,
        batch: &LogBatch,
    ) {
        let mut tails = self.tails.lock();
        let before = tails.len();
        tails.retain(|slot| slot.offer(batch));
        let removed = before - tails.len();
        if removed > 0 {
            ACTIVE_TAILS_METRIC.sub(removed as i64);
        }
    }

    pub(crate) fn remove_tail(
        &self,
        tail_id: u64,
    ) {
        let mut tails = self.tails.lock();
        if let Some(pos) = tails.iter().position(|slot| slot.id() == tail_id) {
            tails.swap_remove(pos);
            ACTIVE_TAILS_METRIC.dec();
            trace!(name = %self.name, tail_id, "Tail detached");
        }
    }

    async fn close(&self) {
        let mut writer = self.writer.lock().await;
        if writer.closed {
            return;
        }
        writer.closed = true;
        if let Some(mut file) = writer.file.take() {
            if let Err(e) = file.flush().await {
                warn!(name = %self.name, "Flush on close failed: {:?}", e);
            }
        }
        // Evict from the cache before releasing the lock so no caller can
        // reach this instance through the cache after it rejects writes.
        let hook = self.on_close.lock().take();
        if let Some(hook) = hook {
            hook(self.id);
        }
        drop(writer);

        self.shutdown.cancel();
        let tails = std::mem::take(&mut *self.tails.lock());
        ACTIVE_TAILS_METRIC.sub(tails.len() as i64);
        for slot in &tails {
            slot.detach();
        }
        LOG_STORES_CLOSED_METRIC.inc();
        info!(name = %self.name, tails = tails.len(), "Log store closed");
    }

    async fn run_idle_timer(
        this: Weak<Self>,
        shutdown: CancellationToken,
    ) {
        loop {
            let Some(store) = this.upgrade() else {
                return;
            };
            let deadline = *store.deadline.lock();
            drop(store);

            tokio::select! {
                _ = shutdown.cancelled() => return,
                _ = sleep_until(deadline) => {}
            }
            let Some(store) = this.upgrade() else {
                return;
            };
            let expired = *store.deadline.lock() <= Instant::now();
            if expired {
                debug!(name = %store.name, "Idle timeout reached");
                store.close().await;
                return;
            }
        }
    }
}
