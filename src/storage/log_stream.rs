use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::Weak;
use std::task::Context;
use std::task::Poll;

use futures::stream;
use futures::Stream;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use super::log_store::LogStoreInner;
use super::tail::TailSlot;
use crate::Operation;
use crate::Result;

/// A run of consecutive log entries. `offset` is the index of `ops[0]`.
#[derive(Debug, Clone, PartialEq)]
pub struct LogBatch {
    pub offset: u64,
    pub ops: Vec<Operation>,
}

impl LogBatch {
    /// Offset just past the last operation of the batch.
    pub fn end(&self) -> u64 {
        self.offset + self.ops.len() as u64
    }

    /// The part of the batch at or after `from`, if any.
    pub(crate) fn since(
        &self,
        from: u64,
    ) -> Option<LogBatch> {
        if self.end() <= from {
            return None;
        }
        if self.offset >= from {
            return Some(self.clone());
        }
        let skip = (from - self.offset) as usize;
        Some(LogBatch {
            offset: from,
            ops: self.ops[skip..].to_vec(),
        })
    }
}

pub(crate) type BatchSender = mpsc::Sender<Result<LogBatch>>;

/// Live sequence returned by [`LogStore::read`](super::LogStore::read).
///
/// For follow reads, dropping the stream detaches the tail from its store.
pub struct LogStream {
    rx: ReceiverStream<Result<LogBatch>>,
    guard: Option<TailGuard>,
}

impl fmt::Debug for LogStream {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("LogStream")
            .field("tail", &self.guard.as_ref().map(|g| g.slot.id()))
            .finish()
    }
}

impl LogStream {
    pub(crate) fn new(
        rx: mpsc::Receiver<Result<LogBatch>>,
        guard: Option<TailGuard>,
    ) -> Self {
        Self {
            rx: ReceiverStream::new(rx),
            guard,
        }
    }

    /// Flattens batches into single operations.
    pub fn into_ops(self) -> impl Stream<Item = Result<Operation>> + Send + Unpin {
        self.flat_map(|batch| {
            let items: Vec<Result<Operation>> = match batch {
                Ok(batch) => batch.ops.into_iter().map(Ok).collect(),
                Err(e) => vec![Err(e)],
            };
            stream::iter(items)
        })
    }

    /// Drains a non-follow read into memory.
    pub async fn collect_ops(self) -> Result<Vec<Operation>> {
        let mut ops = Vec::new();
        let mut batches = self;
        while let Some(batch) = batches.next().await {
            ops.extend(batch?.ops);
        }
        Ok(ops)
    }
}

impl Stream for LogStream {
    type Item = Result<LogBatch>;

    fn poll_next(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.rx).poll_next(cx)
    }
}

/// Detaches a follow read from its store when the consumer goes away.
pub(crate) struct TailGuard {
    pub(crate) slot: Arc<TailSlot>,
    pub(crate) store: Weak<LogStoreInner>,
}

impl Drop for TailGuard {
    fn drop(&mut self) {
        self.slot.close();
        if let Some(store) = self.store.upgrade() {
            store.remove_tail(self.slot.id());
        }
    }
}
