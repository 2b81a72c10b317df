use std::fmt;

use anisync_client::ApiError;
use anisync_db::StoreError;
use thiserror::Error;

/// Failure category reported to observers in `failed(kind)` notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncErrorKind {
    /// Transport-level failure, retried with backoff.
    Network,
    /// Server fault, retried with backoff.
    RemoteUnavailable,
    /// Payload shape mismatch, needs a client update.
    Protocol,
    /// Local I/O or constraint failure.
    Storage,
    /// Credentials rejected, sync suspended until resolved.
    Auth,
    /// The session was cancelled at a phase boundary.
    Cancelled,
}

impl SyncErrorKind {
    /// Transient kinds are retried under backoff.
    pub fn is_transient(self) -> bool {
        matches!(self, Self::Network | Self::RemoteUnavailable)
    }
}

impl fmt::Display for SyncErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Network => "network",
            Self::RemoteUnavailable => "remote-unavailable",
            Self::Protocol => "protocol",
            Self::Storage => "storage",
            Self::Auth => "auth",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Errors that end a sync session or an intent.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Remote unavailable: {0}")]
    RemoteUnavailable(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("Credentials rejected: {0}")]
    Auth(String),

    #[error("Sync cancelled")]
    Cancelled,
}

impl SyncError {
    pub fn kind(&self) -> SyncErrorKind {
        match self {
            Self::Network(_) => SyncErrorKind::Network,
            Self::RemoteUnavailable(_) => SyncErrorKind::RemoteUnavailable,
            Self::Protocol(_) => SyncErrorKind::Protocol,
            Self::Storage(_) => SyncErrorKind::Storage,
            Self::Auth(_) => SyncErrorKind::Auth,
            Self::Cancelled => SyncErrorKind::Cancelled,
        }
    }

    /// Map a blocking-task join failure (panic or runtime shutdown).
    pub(crate) fn join(e: tokio::task::JoinError) -> Self {
        Self::Storage(StoreError::Task(e.to_string()))
    }
}

impl From<ApiError> for SyncError {
    fn from(e: ApiError) -> Self {
        match e {
            ApiError::Network(msg) => Self::Network(msg),
            e @ ApiError::RemoteUnavailable { .. } => Self::RemoteUnavailable(e.to_string()),
            ApiError::Protocol(msg) => Self::Protocol(msg),
            e @ ApiError::Auth { .. } => Self::Auth(e.to_string()),
        }
    }
}

/// Image fetch failure, shared by every caller waiting on the same URL.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("Download failed: {0}")]
    Remote(#[from] ApiError),

    #[error("Cache I/O error: {0}")]
    Io(String),

    #[error("Fetch task aborted")]
    Aborted,
}

/// Errors reading or writing application settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Unknown setting: {0}")]
    UnknownKey(String),

    #[error("Setting '{0}' is read-only")]
    ReadOnly(String),

    #[error("Invalid value '{value}' for '{key}': {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Could not serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Settings lock poisoned")]
    Poisoned,
}

impl SettingsError {
    pub(crate) fn invalid(key: &str, value: &str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// Errors wiring the application together at startup.
#[derive(Debug, Error)]
pub enum ServicesError {
    #[error("Could not open library database: {0}")]
    Store(#[from] StoreError),

    #[error("Could not create API client: {0}")]
    Client(#[from] ApiError),

    #[error("Could not open image cache: {0}")]
    Images(#[from] FetchError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_errors_map_onto_taxonomy() {
        let cases = [
            (ApiError::network("reset"), SyncErrorKind::Network),
            (ApiError::from_status(503, ""), SyncErrorKind::RemoteUnavailable),
            (ApiError::protocol("bad"), SyncErrorKind::Protocol),
            (ApiError::from_status(401, ""), SyncErrorKind::Auth),
        ];
        for (api, kind) in cases {
            assert_eq!(SyncError::from(api).kind(), kind);
        }
    }

    #[test]
    fn only_network_and_remote_are_transient() {
        assert!(SyncErrorKind::Network.is_transient());
        assert!(SyncErrorKind::RemoteUnavailable.is_transient());
        assert!(!SyncErrorKind::Protocol.is_transient());
        assert!(!SyncErrorKind::Auth.is_transient());
        assert!(!SyncErrorKind::Storage.is_transient());
    }
}
