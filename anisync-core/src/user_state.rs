use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::release::ReleaseId;

/// Whether a locally generated record has been acknowledged upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    Pending,
    Synced,
}

impl SyncState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Synced => "synced",
        }
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncState {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "synced" => Ok(Self::Synced),
            _ => Err(ModelError::UnknownSyncState(s.to_string())),
        }
    }
}

/// Watch progress for one episode of a release.
///
/// There is at most one entry per (release, episode); later writes replace
/// the position and bump `revision`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub release_id: ReleaseId,
    pub episode: u32,
    pub position_secs: u32,
    /// Device clock, unix milliseconds.
    pub watched_at: i64,
    pub sync_state: SyncState,
    /// Incremented on every local edit.
    pub revision: i64,
}

/// Favorite membership for a release.
///
/// `favorite == false` rows are pending removals that have not been
/// acknowledged yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FavoriteEntry {
    pub release_id: ReleaseId,
    pub favorite: bool,
    /// Device clock, unix milliseconds.
    pub changed_at: i64,
    pub sync_state: SyncState,
    pub revision: i64,
}
