//! In-process fakes for the remote API.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anisync_client::{
    AnalyticsEvent, AnalyticsSink, ApiError, CatalogApi, CatalogPage, FavoriteAck, HistoryAck,
    MediaSource,
};
use anisync_core::{FavoriteEntry, HistoryEntry, Release, ReleaseDetails, ReleaseId, ReleaseStatus};
use futures::FutureExt;
use futures::future::BoxFuture;

pub fn release(id: ReleaseId, updated_at: i64) -> Release {
    Release {
        id,
        title: format!("Release {id}"),
        status: ReleaseStatus::Ongoing,
        episode_count: 12,
        poster: Some(format!("/posters/{id}.jpg")),
        updated_at,
    }
}

pub fn releases(ids: std::ops::RangeInclusive<ReleaseId>, updated_at: i64) -> Vec<Release> {
    ids.map(|id| release(id, updated_at)).collect()
}

type Hook = Box<dyn Fn() + Send + Sync>;

/// Catalog served from a cursor → page map. Unknown cursors yield an empty
/// final page.
#[derive(Default)]
pub struct FakeCatalog {
    pages: Mutex<HashMap<Option<String>, CatalogPage>>,
    failures: Mutex<VecDeque<ApiError>>,
    fetches: Mutex<Vec<Option<String>>>,
    fetch_delay: Mutex<Option<Duration>>,
    history_uploads: Mutex<Vec<Vec<HistoryEntry>>>,
    favorite_uploads: Mutex<Vec<Vec<FavoriteEntry>>>,
    rejected_history: Mutex<HashSet<(ReleaseId, u32)>>,
    on_push_history: Mutex<Option<Hook>>,
    details: Mutex<HashMap<ReleaseId, ReleaseDetails>>,
}

impl FakeCatalog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_page(&self, cursor: Option<&str>, releases: Vec<Release>, next: Option<&str>) {
        self.pages.lock().unwrap().insert(
            cursor.map(str::to_string),
            CatalogPage {
                releases,
                next: next.map(str::to_string),
            },
        );
    }

    /// Two pages of 50 releases: `None → "p2" → "p3"`, then empty.
    pub fn with_two_pages() -> Arc<Self> {
        let catalog = Self::new();
        catalog.set_page(None, releases(1..=50, 1_000), Some("p2"));
        catalog.set_page(Some("p2"), releases(51..=100, 1_000), Some("p3"));
        catalog
    }

    pub fn fail_next(&self, error: ApiError) {
        self.failures.lock().unwrap().push_back(error);
    }

    pub fn set_fetch_delay(&self, delay: Duration) {
        *self.fetch_delay.lock().unwrap() = Some(delay);
    }

    pub fn reject_history(&self, release_id: ReleaseId, episode: u32) {
        self.rejected_history
            .lock()
            .unwrap()
            .insert((release_id, episode));
    }

    /// Run `hook` while a history upload is in flight.
    pub fn on_push_history(&self, hook: impl Fn() + Send + Sync + 'static) {
        *self.on_push_history.lock().unwrap() = Some(Box::new(hook));
    }

    pub fn set_details(&self, details: ReleaseDetails) {
        self.details
            .lock()
            .unwrap()
            .insert(details.release.id, details);
    }

    pub fn fetches(&self) -> Vec<Option<String>> {
        self.fetches.lock().unwrap().clone()
    }

    pub fn clear_fetches(&self) {
        self.fetches.lock().unwrap().clear();
    }

    pub fn history_uploads(&self) -> Vec<Vec<HistoryEntry>> {
        self.history_uploads.lock().unwrap().clone()
    }

    pub fn favorite_uploads(&self) -> Vec<Vec<FavoriteEntry>> {
        self.favorite_uploads.lock().unwrap().clone()
    }
}

impl CatalogApi for FakeCatalog {
    fn fetch_page<'a>(
        &'a self,
        cursor: Option<&'a str>,
        _page_size: usize,
    ) -> BoxFuture<'a, Result<CatalogPage, ApiError>> {
        async move {
            self.fetches
                .lock()
                .unwrap()
                .push(cursor.map(str::to_string));
            let delay = *self.fetch_delay.lock().unwrap();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            if let Some(error) = self.failures.lock().unwrap().pop_front() {
                return Err(error);
            }
            let page = self
                .pages
                .lock()
                .unwrap()
                .get(&cursor.map(str::to_string))
                .cloned();
            Ok(page.unwrap_or(CatalogPage {
                releases: Vec::new(),
                next: None,
            }))
        }
        .boxed()
    }

    fn fetch_details(&self, id: ReleaseId) -> BoxFuture<'_, Result<ReleaseDetails, ApiError>> {
        async move {
            self.details
                .lock()
                .unwrap()
                .get(&id)
                .cloned()
                .ok_or_else(|| ApiError::from_status(404, "not found"))
        }
        .boxed()
    }

    fn push_history<'a>(
        &'a self,
        entries: &'a [HistoryEntry],
    ) -> BoxFuture<'a, Result<Vec<HistoryAck>, ApiError>> {
        async move {
            if let Some(hook) = self.on_push_history.lock().unwrap().as_ref() {
                hook();
            }
            self.history_uploads.lock().unwrap().push(entries.to_vec());
            let rejected = self.rejected_history.lock().unwrap();
            Ok(entries
                .iter()
                .map(|e| HistoryAck {
                    release_id: e.release_id,
                    episode: e.episode,
                    accepted: !rejected.contains(&(e.release_id, e.episode)),
                })
                .collect())
        }
        .boxed()
    }

    fn push_favorites<'a>(
        &'a self,
        entries: &'a [FavoriteEntry],
    ) -> BoxFuture<'a, Result<Vec<FavoriteAck>, ApiError>> {
        async move {
            self.favorite_uploads.lock().unwrap().push(entries.to_vec());
            Ok(entries
                .iter()
                .map(|e| FavoriteAck {
                    release_id: e.release_id,
                    accepted: true,
                })
                .collect())
        }
        .boxed()
    }
}

/// Media source returning `size` bytes per URL, counting downloads.
pub struct FakeMedia {
    pub size: usize,
    pub delay: Option<Duration>,
    fetches: AtomicUsize,
    sizes: Mutex<HashMap<String, usize>>,
    failing: Mutex<HashSet<String>>,
}

impl FakeMedia {
    pub fn new(size: usize) -> Arc<Self> {
        Arc::new(Self::with_delay(size, None))
    }

    pub fn with_delay(size: usize, delay: Option<Duration>) -> Self {
        Self {
            size,
            delay,
            fetches: AtomicUsize::new(0),
            sizes: Mutex::new(HashMap::new()),
            failing: Mutex::new(HashSet::new()),
        }
    }

    pub fn set_size(&self, url: &str, size: usize) {
        self.sizes.lock().unwrap().insert(url.to_string(), size);
    }

    pub fn fail(&self, url: &str) {
        self.failing.lock().unwrap().insert(url.to_string());
    }

    pub fn heal(&self, url: &str) {
        self.failing.lock().unwrap().remove(url);
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl MediaSource for FakeMedia {
    fn fetch_media<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Vec<u8>, ApiError>> {
        async move {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.failing.lock().unwrap().contains(url) {
                return Err(ApiError::from_status(503, "unavailable"));
            }
            let size = self
                .sizes
                .lock()
                .unwrap()
                .get(url)
                .copied()
                .unwrap_or(self.size);
            Ok(vec![url.len() as u8; size])
        }
        .boxed()
    }
}

/// Analytics sink that keeps every acknowledged batch.
#[derive(Default)]
pub struct FakeSink {
    batches: Mutex<Vec<Vec<AnalyticsEvent>>>,
}

impl FakeSink {
    pub fn names(&self) -> Vec<String> {
        self.batches
            .lock()
            .unwrap()
            .iter()
            .flatten()
            .map(|e| e.name.clone())
            .collect()
    }
}

impl AnalyticsSink for FakeSink {
    fn send_events<'a>(
        &'a self,
        events: &'a [AnalyticsEvent],
    ) -> BoxFuture<'a, Result<(), ApiError>> {
        async move {
            self.batches.lock().unwrap().push(events.to_vec());
            Ok(())
        }
        .boxed()
    }
}
