//! Object-safe seams between the remote API and the rest of the app.
//!
//! The engine, image cache and analytics batcher only see these traits, so
//! tests drive them with in-process fakes instead of a network.

use anisync_core::{FavoriteEntry, HistoryEntry, ReleaseDetails, ReleaseId};
use futures::future::BoxFuture;

use crate::error::ApiError;
use crate::types::{AnalyticsEvent, CatalogPage, FavoriteAck, HistoryAck};

/// Catalog reads and user-state uploads.
pub trait CatalogApi: Send + Sync {
    /// Fetch one page starting at `cursor` (`None` for the beginning).
    fn fetch_page<'a>(
        &'a self,
        cursor: Option<&'a str>,
        page_size: usize,
    ) -> BoxFuture<'a, Result<CatalogPage, ApiError>>;

    /// Fetch a release with detail-only fields.
    fn fetch_details(&self, id: ReleaseId) -> BoxFuture<'_, Result<ReleaseDetails, ApiError>>;

    /// Upload history entries. Returns one verdict per entry the server saw.
    fn push_history<'a>(
        &'a self,
        entries: &'a [HistoryEntry],
    ) -> BoxFuture<'a, Result<Vec<HistoryAck>, ApiError>>;

    /// Upload favorite changes. Returns one verdict per entry the server saw.
    fn push_favorites<'a>(
        &'a self,
        entries: &'a [FavoriteEntry],
    ) -> BoxFuture<'a, Result<Vec<FavoriteAck>, ApiError>>;
}

/// Raw media download by absolute URL.
pub trait MediaSource: Send + Sync {
    fn fetch_media<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Vec<u8>, ApiError>>;
}

/// Analytics ingestion. `Ok` means the batch was acknowledged.
pub trait AnalyticsSink: Send + Sync {
    fn send_events<'a>(&'a self, events: &'a [AnalyticsEvent])
    -> BoxFuture<'a, Result<(), ApiError>>;
}
