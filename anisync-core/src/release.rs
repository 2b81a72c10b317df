use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Server-assigned release identifier. Always positive.
pub type ReleaseId = i64;

/// Airing status of a release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseStatus {
    Ongoing,
    Finished,
    Announced,
}

impl ReleaseStatus {
    pub fn all() -> &'static [ReleaseStatus] {
        &[Self::Ongoing, Self::Finished, Self::Announced]
    }

    /// Stable lowercase name used in the database and on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ongoing => "ongoing",
            Self::Finished => "finished",
            Self::Announced => "announced",
        }
    }
}

impl fmt::Display for ReleaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReleaseStatus {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ongoing" | "airing" | "in progress" => Ok(Self::Ongoing),
            "finished" | "completed" | "complete" => Ok(Self::Finished),
            "announced" | "announce" | "upcoming" => Ok(Self::Announced),
            _ => Err(ModelError::UnknownStatus(s.to_string())),
        }
    }
}

/// A catalog item as it appears in list pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    pub id: ReleaseId,
    pub title: String,
    pub status: ReleaseStatus,
    /// Episodes known so far.
    pub episode_count: u32,
    /// Poster path, relative to the media base path.
    pub poster: Option<String>,
    /// Last modification on the server, unix seconds.
    pub updated_at: i64,
}

impl Release {
    /// True when this copy is strictly newer than a stored timestamp.
    pub fn is_newer_than(&self, stored_updated_at: i64) -> bool {
        self.updated_at > stored_updated_at
    }
}

/// A release with the fields only the details endpoint returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseDetails {
    pub release: Release,
    pub description: Option<String>,
    pub genres: Vec<String>,
    pub year: Option<u16>,
}

#[cfg(test)]
#[path = "tests/release_tests.rs"]
mod tests;
