/// Errors from the content API.
///
/// Clone-able so one failed fetch can be handed to every waiter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Remote unavailable (HTTP {status}): {message}")]
    RemoteUnavailable { status: u16, message: String },

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Credentials rejected (HTTP {status})")]
    Auth { status: u16 },
}

impl ApiError {
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Transport and server faults may succeed later; payload and
    /// credential problems will not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::RemoteUnavailable { .. })
    }

    /// Classify a non-success HTTP status.
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = snippet(body);
        match status {
            401 | 403 => Self::Auth { status },
            429 | 500..=599 => Self::RemoteUnavailable { status, message },
            _ => Self::Protocol(format!("unexpected HTTP {status}: {message}")),
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            return Self::Protocol(e.to_string());
        }
        if let Some(status) = e.status() {
            return Self::from_status(status.as_u16(), "");
        }
        Self::Network(e.to_string())
    }
}

/// First 200 characters of a response body, for error messages.
pub(crate) fn snippet(text: &str) -> String {
    text.chars().take(200).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert_eq!(ApiError::from_status(401, ""), ApiError::Auth { status: 401 });
        assert_eq!(ApiError::from_status(403, ""), ApiError::Auth { status: 403 });
        assert!(matches!(
            ApiError::from_status(503, "busy"),
            ApiError::RemoteUnavailable { status: 503, .. }
        ));
        assert!(matches!(
            ApiError::from_status(429, ""),
            ApiError::RemoteUnavailable { status: 429, .. }
        ));
        assert!(matches!(ApiError::from_status(404, ""), ApiError::Protocol(_)));
    }

    #[test]
    fn only_transient_errors_retry() {
        assert!(ApiError::network("reset").is_retryable());
        assert!(ApiError::from_status(502, "").is_retryable());
        assert!(!ApiError::protocol("bad json").is_retryable());
        assert!(!ApiError::from_status(401, "").is_retryable());
    }

    #[test]
    fn snippet_is_bounded() {
        let long = "x".repeat(1_000);
        assert_eq!(snippet(&long).len(), 200);
    }
}
