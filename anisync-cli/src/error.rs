use anisync_db::StoreError;
use anisync_lib::{FetchError, ServicesError, SettingsError, SyncError};
use thiserror::Error;

/// Errors that can occur during CLI command execution.
#[derive(Debug, Error)]
pub(crate) enum CliError {
    /// I/O error
    #[error("{0}")]
    Io(#[from] std::io::Error),

    /// Startup wiring failed
    #[error("{0}")]
    Services(#[from] ServicesError),

    /// Database operation failed
    #[error("Database error: {0}")]
    Database(#[from] StoreError),

    /// Sync session or intent failed
    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    /// Settings could not be read or written
    #[error("Config error: {0}")]
    Config(#[from] SettingsError),

    /// Image download or cache failure
    #[error("Image error: {0}")]
    Image(#[from] FetchError),

    /// Runtime creation or async error
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// Catch-all for other errors
    #[error("{0}")]
    Other(String),
}

impl CliError {
    pub(crate) fn runtime(msg: impl Into<String>) -> Self {
        Self::Runtime(msg.into())
    }

    pub(crate) fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}
