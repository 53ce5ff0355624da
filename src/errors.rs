//! Patch Log Error Hierarchy
//!
//! Defines the error types for the patch-log document store, split by layer:
//! infrastructure (storage, naming), configuration, and the patch algebra that
//! callers interact with directly.

use std::path::PathBuf;

use config::ConfigError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Infrastructure-level failures (storage, serialization, naming)
    #[error(transparent)]
    System(#[from] SystemError),

    /// Configuration loading and validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Patch application failures surfaced to the caller
    #[error(transparent)]
    Patch(#[from] PatchError),

    /// Unrecoverable failures for the affected document
    #[error("Fatal error: {0}")]
    Fatal(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SystemError {
    #[error("Storage operation failed: {0}")]
    Storage(#[from] StorageError),

    /// Document names map onto file names and must stay inside the data dir
    #[error("Invalid document name: {0:?}")]
    InvalidName(String),
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Disk I/O failures during append or replay
    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error("Error occurred at path: {path}")]
    PathError {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Operation (de)serialization failures
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    /// A newline-terminated log entry that does not parse as an operation
    #[error("Corrupt log entry at offset {offset}")]
    CorruptEntry {
        offset: u64,
        #[source]
        source: serde_json::Error,
    },

    /// The store was closed by its idle timer (or explicitly) before the call ran
    #[error("Log store for {name:?} is closed")]
    LogClosed { name: String },
}

/// Errors raised by the patch algebra. These are caller mistakes or conflicts
/// and are never retried.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PatchError {
    #[error("Key '{key}' in path '{path}' does not exist.")]
    NotFound { path: String, key: String },

    #[error("Invalid patch operation: {0}")]
    InvalidPatchOperation(String),

    #[error("Test failed at path '{path}'")]
    TestFailed { path: String },
}

impl PatchError {
    pub(crate) fn not_found(
        path: &str,
        key: &str,
    ) -> Self {
        PatchError::NotFound {
            path: path.to_string(),
            key: key.to_string(),
        }
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        PatchError::InvalidPatchOperation(msg.into())
    }
}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Error::System(SystemError::Storage(e))
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        StorageError::IoError(e).into()
    }
}

impl Error {
    /// True for errors caused by the request itself (bad path, failed test,
    /// missing key) rather than by the store.
    pub fn is_user_error(&self) -> bool {
        matches!(self, Error::Patch(_) | Error::System(SystemError::InvalidName(_)))
    }

    pub(crate) fn is_log_closed(&self) -> bool {
        matches!(
            self,
            Error::System(SystemError::Storage(StorageError::LogClosed { .. }))
        )
    }
}
