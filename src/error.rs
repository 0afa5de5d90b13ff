use std::path::PathBuf;

use thiserror::Error;

/// Failures of the on-disk image blob store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The payload exceeded the configured size threshold while large images
    /// are being skipped. Nothing was written.
    #[error("payload of {size} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge { size: u64, limit: u64 },

    #[error("blob I/O failed for {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    pub fn is_too_large(&self) -> bool {
        matches!(self, StoreError::PayloadTooLarge { .. })
    }
}

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("invalid settings payload: {0}")]
    Settings(#[from] serde_json::Error),

    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Top-level error returned while opening the clipboard history.
#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot prepare data directory {}: {source}", path.display())]
    DataDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no data directory available on this platform")]
    NoDataDir,

    #[error(transparent)]
    History(#[from] HistoryError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
