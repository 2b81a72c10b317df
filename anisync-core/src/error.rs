use thiserror::Error;

/// Errors raised when parsing model values from their stored or wire form.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("Unknown release status: {0}")]
    UnknownStatus(String),

    #[error("Unknown sync state: {0}")]
    UnknownSyncState(String),

    #[error("Unknown view mode: {0}")]
    UnknownViewMode(i32),
}
