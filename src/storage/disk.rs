//! On-disk log format: newline-delimited JSON, one operation per line.

use std::io::ErrorKind;
use std::path::Path;

use tokio::fs::File;
use tokio::fs::OpenOptions;
use tokio::io::AsyncBufReadExt;
use tokio::io::AsyncReadExt;
use tokio::io::BufReader;
use tracing::debug;
use tracing::warn;

use super::log_stream::BatchSender;
use super::LogBatch;
use crate::Operation;
use crate::Result;
use crate::StorageError;

/// Position of the end of the log: byte length and entry count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct LogEnd {
    pub(crate) bytes: u64,
    pub(crate) entries: u64,
}

/// Counts the entries of the log at `path` and truncates an unterminated
/// trailing fragment left by a crash mid-append.
///
/// A missing file is an empty log.
pub(crate) async fn scan_log(path: &Path) -> Result<LogEnd> {
    let file = match File::open(path).await {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(LogEnd::default()),
        Err(e) => {
            return Err(StorageError::PathError {
                path: path.to_path_buf(),
                source: e,
            }
            .into())
        }
    };

    let mut reader = BufReader::new(file);
    let mut line = Vec::new();
    let mut end = LogEnd::default();
    let mut total = 0u64;
    loop {
        line.clear();
        let n = reader.read_until(b'\n', &mut line).await?;
        if n == 0 {
            break;
        }
        total += n as u64;
        if line.last() != Some(&b'\n') {
            break;
        }
        end.bytes = total;
        if !is_blank(&line) {
            end.entries += 1;
        }
    }

    if total > end.bytes {
        warn!(
            path = %path.display(),
            discarded_bytes = total - end.bytes,
            "Discarding unterminated trailing log fragment"
        );
        truncate(path, end.bytes).await?;
    }

    debug!(path = %path.display(), entries = end.entries, bytes = end.bytes, "scanned log");
    Ok(end)
}

/// Streams the entries with index >= `offset` among the first `end` bytes of
/// the log into `tx`, in batches of at most `batch_size`.
///
/// Entries before `offset` are read but not parsed. Returns `Ok(false)` if
/// the receiver went away.
pub(crate) async fn replay(
    path: &Path,
    offset: u64,
    end: LogEnd,
    batch_size: usize,
    tx: &BatchSender,
) -> Result<bool> {
    if end.entries <= offset {
        return Ok(true);
    }
    let file = File::open(path).await.map_err(|e| StorageError::PathError {
        path: path.to_path_buf(),
        source: e,
    })?;
    let mut reader = BufReader::new(file.take(end.bytes));

    let mut line = String::new();
    let mut index = 0u64;
    let mut batch = LogBatch {
        offset,
        ops: Vec::with_capacity(batch_size),
    };
    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            break;
        }
        if line.trim().is_empty() {
            continue;
        }
        let current = index;
        index += 1;
        if current < offset {
            continue;
        }
        let op: Operation = serde_json::from_str(line.trim_end())
            .map_err(|source| StorageError::CorruptEntry { offset: current, source })?;
        batch.ops.push(op);

        if batch.ops.len() >= batch_size {
            let next = LogBatch {
                offset: index,
                ops: Vec::with_capacity(batch_size),
            };
            if tx.send(Ok(std::mem::replace(&mut batch, next))).await.is_err() {
                return Ok(false);
            }
        }
    }

    if !batch.ops.is_empty() && tx.send(Ok(batch)).await.is_err() {
        return Ok(false);
    }
    Ok(true)
}

/// Cuts the log back to `len` bytes, dropping whatever a failed append left.
pub(crate) async fn truncate(
    path: &Path,
    len: u64,
) -> Result<()> {
    let file = OpenOptions::new()
        .write(true)
        .open(path)
        .await
        .map_err(|e| StorageError::PathError {
            path: path.to_path_buf(),
            source: e,
        })?;
    file.set_len(len).await?;
    file.sync_all().await?;
    Ok(())
}

fn is_blank(line: &[u8]) -> bool {
    line.iter().all(|b| b.is_ascii_whitespace())
}
