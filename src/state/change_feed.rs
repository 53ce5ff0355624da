use std::collections::VecDeque;
use std::pin::Pin;
use std::task::ready;
use std::task::Context;
use std::task::Poll;

use futures::Stream;
use serde::Deserialize;
use serde::Serialize;

use crate::patch::path_starts_with;
use crate::LogBatch;
use crate::LogStream;
use crate::Operation;
use crate::Result;
use crate::StorageError;

/// `{"v": N}`: everything before offset `N` has been delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionMarker {
    pub v: u64,
}

/// One parsed line of a change feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeedLine {
    Op(Operation),
    Marker(VersionMarker),
}

impl FeedLine {
    pub fn parse(line: &str) -> serde_json::Result<Self> {
        serde_json::from_str(line.trim_end())
    }
}

/// Newline-terminated JSON lines: operations under a path prefix, each
/// logged batch followed by a [`VersionMarker`].
///
/// Resuming with `changes(prefix, v)` after the last marker seen continues
/// exactly where this feed left off. Ends when the underlying tail ends.
pub struct ChangeFeed {
    batches: LogStream,
    prefix: String,
    pending: VecDeque<String>,
}

impl ChangeFeed {
    pub(crate) fn new(
        batches: LogStream,
        prefix: &str,
    ) -> Self {
        Self {
            batches,
            prefix: prefix.to_string(),
            pending: VecDeque::new(),
        }
    }

    fn render(
        &mut self,
        batch: &LogBatch,
    ) -> Result<()> {
        for op in batch.ops.iter().filter(|op| path_starts_with(op.path(), &self.prefix)) {
            self.pending.push_back(line(op)?);
        }
        self.pending.push_back(line(&VersionMarker { v: batch.end() })?);
        Ok(())
    }
}

fn line<T: Serialize>(value: &T) -> Result<String> {
    let mut line = serde_json::to_string(value).map_err(StorageError::Serialization)?;
    line.push('\n');
    Ok(line)
}

impl Stream for ChangeFeed {
    type Item = Result<String>;

    fn poll_next(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        loop {
            if let Some(line) = this.pending.pop_front() {
                return Poll::Ready(Some(Ok(line)));
            }
            match ready!(Pin::new(&mut this.batches).poll_next(cx)) {
                Some(Ok(batch)) => {
                    if let Err(e) = this.render(&batch) {
                        return Poll::Ready(Some(Err(e)));
                    }
                }
                Some(Err(e)) => return Poll::Ready(Some(Err(e))),
                None => return Poll::Ready(None),
            }
        }
    }
}
