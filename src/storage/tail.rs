//! Tail multiplexer: per-reader state for follow reads.
//!
//! A tail is registered on its store before disk replay begins. Writes that
//! land while it is still replaying are parked in a bounded catch-up buffer;
//! once replay reaches the end snapshot the buffer is drained and the tail
//! switches to receiving writes directly through its output channel.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Weak;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::sleep_until;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::trace;
use tracing::warn;

use super::disk;
use super::disk::LogEnd;
use super::log_store::LogStoreInner;
use super::log_stream::BatchSender;
use super::LogBatch;
use crate::constants::EVICT_REASON_CATCHUP_OVERFLOW;
use crate::constants::EVICT_REASON_SLOW_CONSUMER;
use crate::constants::EVICT_REASON_TAIL_IDLE;
use crate::TAIL_EVICTIONS_METRIC;

enum TailState {
    /// Disk replay still running; writes are parked here
    CatchingUp {
        buffer: VecDeque<LogBatch>,
        len: usize,
    },
    /// Writes go straight to the consumer
    Live { sink: BatchSender, last_write: Instant },
    /// Store closed during catch-up: drain what was parked, then end
    Detached { buffer: VecDeque<LogBatch> },
    Closed,
}

/// Outcome of one step of draining the catch-up buffer.
pub(crate) enum Drain {
    Batch(LogBatch),
    Live,
    End,
}

pub(crate) struct TailSlot {
    id: u64,
    name: String,
    /// First offset the consumer asked for
    from: u64,
    capacity: usize,
    state: Mutex<TailState>,
    cancel: CancellationToken,
}

impl TailSlot {
    pub(crate) fn new(
        id: u64,
        name: &str,
        from: u64,
        capacity: usize,
    ) -> Self {
        Self {
            id,
            name: name.to_string(),
            from,
            capacity,
            state: Mutex::new(TailState::CatchingUp {
                buffer: VecDeque::new(),
                len: 0,
            }),
            cancel: CancellationToken::new(),
        }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    /// Hands a freshly appended batch to this tail.
    ///
    /// Returns false once the tail should leave the store's attachment set.
    /// Never blocks: a live consumer with a full channel is evicted.
    pub(crate) fn offer(
        &self,
        batch: &LogBatch,
    ) -> bool {
        let mut state = self.state.lock();
        match &mut *state {
            TailState::CatchingUp { buffer, len } => {
                if *len + batch.ops.len() > self.capacity {
                    *state = TailState::Closed;
                    self.evict(EVICT_REASON_CATCHUP_OVERFLOW);
                    return false;
                }
                *len += batch.ops.len();
                buffer.push_back(batch.clone());
                true
            }
            TailState::Live { sink, last_write } => {
                let Some(batch) = batch.since(self.from) else {
                    return true;
                };
                match sink.try_send(Ok(batch)) {
                    Ok(()) => {
                        *last_write = Instant::now();
                        true
                    }
                    Err(TrySendError::Full(_)) => {
                        *state = TailState::Closed;
                        self.evict(EVICT_REASON_SLOW_CONSUMER);
                        false
                    }
                    Err(TrySendError::Closed(_)) => {
                        *state = TailState::Closed;
                        self.cancel.cancel();
                        false
                    }
                }
            }
            TailState::Detached { .. } | TailState::Closed => false,
        }
    }

    /// Takes the next parked batch, or, when none is left, moves `tx` into
    /// the slot and turns the tail live. Both happen under one lock so no
    /// write can slip between the last parked batch and the first live one.
    pub(crate) fn next_or_live(
        &self,
        tx: &mut Option<BatchSender>,
    ) -> Drain {
        let mut state = self.state.lock();
        match &mut *state {
            TailState::CatchingUp { buffer, len } => match buffer.pop_front() {
                Some(batch) => {
                    *len -= batch.ops.len();
                    Drain::Batch(batch)
                }
                None => match tx.take() {
                    Some(sink) => {
                        *state = TailState::Live {
                            sink,
                            last_write: Instant::now(),
                        };
                        Drain::Live
                    }
                    None => Drain::End,
                },
            },
            TailState::Detached { buffer } => match buffer.pop_front() {
                Some(batch) => Drain::Batch(batch),
                None => {
                    *state = TailState::Closed;
                    Drain::End
                }
            },
            TailState::Live { .. } | TailState::Closed => Drain::End,
        }
    }

    /// Ends the tail because its store closed. Parked writes are durable and
    /// still get delivered.
    pub(crate) fn detach(&self) {
        let mut state = self.state.lock();
        let next = match std::mem::replace(&mut *state, TailState::Closed) {
            TailState::CatchingUp { buffer, .. } => TailState::Detached { buffer },
            TailState::Detached { buffer } => TailState::Detached { buffer },
            TailState::Live { .. } | TailState::Closed => {
                self.cancel.cancel();
                TailState::Closed
            }
        };
        *state = next;
    }

    /// Ends the tail on behalf of its consumer.
    pub(crate) fn close(&self) {
        *self.state.lock() = TailState::Closed;
        self.cancel.cancel();
    }

    /// Ends a live tail that has seen no writes for `idle`.
    fn expire_if_idle(
        &self,
        idle: Duration,
    ) -> bool {
        let mut state = self.state.lock();
        let expired = matches!(&*state, TailState::Live { last_write, .. } if last_write.elapsed() >= idle);
        if expired {
            *state = TailState::Closed;
            self.evict(EVICT_REASON_TAIL_IDLE);
        }
        expired
    }

    fn last_write(&self) -> Option<Instant> {
        match &*self.state.lock() {
            TailState::Live { last_write, .. } => Some(*last_write),
            _ => None,
        }
    }

    fn evict(
        &self,
        reason: &'static str,
    ) {
        self.cancel.cancel();
        TAIL_EVICTIONS_METRIC.with_label_values(&[&self.name, reason]).inc();
        warn!(name = %self.name, tail_id = self.id, reason, "Tail evicted");
    }
}

/// Everything a tail driver needs besides its slot.
pub(crate) struct TailTask {
    pub(crate) path: PathBuf,
    pub(crate) offset: u64,
    pub(crate) end: LogEnd,
    pub(crate) batch_size: usize,
    pub(crate) tail_idle: Option<Duration>,
    pub(crate) store: Weak<LogStoreInner>,
}

/// Feeds one read: disk replay up to `end`, then (for follow reads) the
/// catch-up buffer, then live writes until the tail ends.
pub(crate) async fn drive(
    task: TailTask,
    slot: Option<Arc<TailSlot>>,
    tx: BatchSender,
) {
    match disk::replay(&task.path, task.offset, task.end, task.batch_size, &tx).await {
        Ok(true) => {}
        Ok(false) => {
            if let Some(slot) = &slot {
                slot.close();
            }
            return;
        }
        Err(e) => {
            warn!(path = %task.path.display(), "Log replay failed: {:?}", e);
            if let Some(slot) = &slot {
                slot.close();
            }
            let _ = tx.send(Err(e)).await;
            return;
        }
    }

    let Some(slot) = slot else {
        return;
    };

    let mut tx = Some(tx);
    loop {
        match slot.next_or_live(&mut tx) {
            Drain::Batch(batch) => {
                let Some(batch) = batch.since(slot.from) else {
                    continue;
                };
                let Some(sink) = tx.as_ref() else {
                    return;
                };
                if sink.send(Ok(batch)).await.is_err() {
                    slot.close();
                    return;
                }
            }
            Drain::Live => break,
            Drain::End => {
                trace!(tail_id = slot.id, "tail ended during catch-up");
                return;
            }
        }
    }
    debug!(name = %slot.name, tail_id = slot.id, "Tail caught up, now live");

    let Some(idle) = task.tail_idle else {
        slot.cancel.cancelled().await;
        return;
    };
    loop {
        let Some(last_write) = slot.last_write() else {
            return;
        };
        tokio::select! {
            _ = slot.cancel.cancelled() => return,
            _ = sleep_until(last_write + idle) => {
                if slot.expire_if_idle(idle) {
                    if let Some(store) = task.store.upgrade() {
                        store.remove_tail(slot.id);
                    }
                    return;
                }
            }
        }
    }
}
