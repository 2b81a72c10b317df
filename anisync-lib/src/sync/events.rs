//! Session lifecycle notifications and their payload types.

use std::fmt;
use std::time::Duration;

use crate::error::SyncErrorKind;

/// State of the engine's session state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncPhase {
    Idle,
    Fetching,
    Diffing,
    Applying,
    Flushing,
    /// A session failed; the engine returns to `Idle` once the failure is
    /// recorded and the backoff timer is scheduled.
    Error,
}

impl SyncPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Fetching => "fetching",
            Self::Diffing => "diffing",
            Self::Applying => "applying",
            Self::Flushing => "flushing",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a session was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncReason {
    Periodic,
    Manual,
    AppForeground,
}

impl SyncReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Periodic => "periodic",
            Self::Manual => "manual",
            Self::AppForeground => "app-foreground",
        }
    }

    /// Manual requests bypass the backoff timer and the metered-network
    /// restriction.
    pub fn is_user_initiated(self) -> bool {
        matches!(self, Self::Manual)
    }
}

impl fmt::Display for SyncReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connectivity as reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum NetworkState {
    #[default]
    Wifi,
    Metered,
    Offline,
}

/// Totals for one completed session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSummary {
    pub pages: usize,
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub history_flushed: usize,
    pub favorites_flushed: usize,
    /// Entries the server rejected; they stay pending.
    pub rejected: usize,
    pub duration: Duration,
}

impl SessionSummary {
    /// Releases written to the store this session.
    pub fn written(&self) -> usize {
        self.inserted + self.updated
    }
}

/// Notification broadcast to observers.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    Started { reason: SyncReason },
    Phase(SyncPhase),
    /// Releases processed so far this session.
    Progress { count: usize },
    Completed(SessionSummary),
    Failed { kind: SyncErrorKind, message: String },
    /// The next automatic attempt will happen after `delay`.
    RetryScheduled { delay: Duration },
}

impl SyncEvent {
    /// Whether this event ends a session.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed(_) | Self::Failed { .. })
    }
}
