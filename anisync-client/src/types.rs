//! Wire types for the content API and their conversion into the model.

use std::collections::BTreeMap;

use anisync_core::{FavoriteEntry, HistoryEntry, Release, ReleaseDetails, ReleaseId};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// One page of the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogPage {
    pub releases: Vec<Release>,
    /// Continuation cursor; `None` means the server has nothing further.
    pub next: Option<String>,
}

/// Server verdict for one uploaded history entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryAck {
    pub release_id: ReleaseId,
    pub episode: u32,
    pub accepted: bool,
}

/// Server verdict for one uploaded favorite change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteAck {
    pub release_id: ReleaseId,
    pub accepted: bool,
}

/// A client-side analytics event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsEvent {
    pub name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
    /// Device clock, unix milliseconds.
    pub recorded_at: i64,
}

impl AnalyticsEvent {
    pub fn new(name: impl Into<String>, recorded_at: i64) -> Self {
        Self {
            name: name.into(),
            properties: BTreeMap::new(),
            recorded_at,
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.properties.insert(key.into(), value.to_string());
        self
    }
}

// ── Response DTOs ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub(crate) struct PageResponse {
    #[serde(default)]
    pub items: Vec<ReleaseDto>,
    #[serde(default)]
    pub next: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ReleaseDto {
    pub id: ReleaseId,
    pub title: String,
    pub status: String,
    #[serde(default)]
    pub episode_count: u32,
    #[serde(default)]
    pub poster: Option<String>,
    pub updated_at: i64,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub year: Option<u16>,
}

impl TryFrom<ReleaseDto> for Release {
    type Error = ApiError;

    fn try_from(dto: ReleaseDto) -> Result<Self, Self::Error> {
        if dto.id <= 0 {
            return Err(ApiError::protocol(format!("invalid release id {}", dto.id)));
        }
        let status = dto
            .status
            .parse()
            .map_err(|e| ApiError::protocol(format!("release {}: {e}", dto.id)))?;
        Ok(Release {
            id: dto.id,
            title: dto.title,
            status,
            episode_count: dto.episode_count,
            poster: dto.poster.filter(|p| !p.is_empty()),
            updated_at: dto.updated_at,
        })
    }
}

impl TryFrom<ReleaseDto> for ReleaseDetails {
    type Error = ApiError;

    fn try_from(mut dto: ReleaseDto) -> Result<Self, Self::Error> {
        let description = dto.description.take().filter(|d| !d.trim().is_empty());
        let genres = std::mem::take(&mut dto.genres);
        let year = dto.year;
        Ok(ReleaseDetails {
            release: dto.try_into()?,
            description,
            genres,
            year,
        })
    }
}

impl TryFrom<PageResponse> for CatalogPage {
    type Error = ApiError;

    fn try_from(resp: PageResponse) -> Result<Self, Self::Error> {
        let releases = resp
            .items
            .into_iter()
            .map(Release::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(CatalogPage {
            releases,
            next: resp.next.filter(|n| !n.is_empty()),
        })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct HistoryAckResponse {
    #[serde(default)]
    pub results: Vec<HistoryAck>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FavoriteAckResponse {
    #[serde(default)]
    pub results: Vec<FavoriteAck>,
}

// ── Request DTOs ────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct HistoryUpload {
    pub release_id: ReleaseId,
    pub episode: u32,
    pub position: u32,
    pub watched_at: i64,
}

impl From<&HistoryEntry> for HistoryUpload {
    fn from(entry: &HistoryEntry) -> Self {
        Self {
            release_id: entry.release_id,
            episode: entry.episode,
            position: entry.position_secs,
            watched_at: entry.watched_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct FavoriteUpload {
    pub release_id: ReleaseId,
    pub favorite: bool,
    pub changed_at: i64,
}

impl From<&FavoriteEntry> for FavoriteUpload {
    fn from(entry: &FavoriteEntry) -> Self {
        Self {
            release_id: entry.release_id,
            favorite: entry.favorite,
            changed_at: entry.changed_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct AnalyticsUpload<'a> {
    pub events: &'a [AnalyticsEvent],
}

/// Decode a JSON body, reporting failures as protocol errors.
pub(crate) fn decode<T: serde::de::DeserializeOwned>(text: &str, what: &str) -> Result<T, ApiError> {
    serde_json::from_str(text).map_err(|e| {
        ApiError::protocol(format!(
            "Failed to parse {what}: {e}. Response: {}",
            crate::error::snippet(text)
        ))
    })
}
