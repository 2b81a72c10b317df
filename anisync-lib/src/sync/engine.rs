//! The synchronization engine.
//!
//! One session at a time walks `Idle → Fetching → Diffing → Applying →
//! Flushing → Idle`. Catalog pages are fetched from the persisted cursor;
//! the next page is downloaded while the current one is written. Pending
//! history and favorites are uploaded at the end. Failures put the engine
//! in `Error`, schedule a backoff delay and return it to `Idle`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use anisync_client::{AnalyticsEvent, ApiError, CatalogApi, CatalogPage};
use anisync_core::{Release, ReleaseDetails, ReleaseId, media_url};
use anisync_db::{LocalStore, StoreError};
use futures::future::RemoteHandle;
use futures::{FutureExt, StreamExt};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::analytics::AnalyticsBatcher;
use crate::backoff::{Backoff, BackoffPolicy};
use crate::error::{SyncError, SyncErrorKind};
use crate::image_cache::ImageCache;
use crate::settings::ApplicationSettings;

use super::diff::{ClassifiedPage, classify_page};
use super::events::{NetworkState, SessionSummary, SyncEvent, SyncPhase, SyncReason};

const EVENT_CAPACITY: usize = 256;
const PREWARM_CONCURRENCY: usize = 4;

/// Tunables for the engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Releases requested per catalog page.
    pub page_size: usize,
    /// Delay schedule between fetch retries inside one session.
    pub retry_policy: BackoffPolicy,
    /// Fetch retries per page before the session fails.
    pub max_retries: u32,
    /// Delay schedule between failed sessions.
    pub session_policy: BackoffPolicy,
    /// Time between periodic sessions.
    pub interval: Duration,
    /// Skip automatic sessions on metered networks.
    pub wifi_only: bool,
    /// Base path poster URLs are resolved against.
    pub media_base: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            page_size: 50,
            retry_policy: BackoffPolicy::new(Duration::from_secs(1), Duration::from_secs(30)),
            max_retries: 3,
            session_policy: BackoffPolicy::default(),
            interval: Duration::from_secs(1800),
            wifi_only: false,
            media_base: anisync_core::DEFAULT_MEDIA_BASE.to_string(),
        }
    }
}

impl EngineConfig {
    pub fn from_settings(settings: &ApplicationSettings) -> Self {
        Self {
            interval: settings.sync_interval(),
            wifi_only: settings.wifi_only(),
            media_base: settings.media_base(),
            ..Self::default()
        }
    }
}

/// Outcome of [`SyncEngine::request_sync`].
#[derive(Debug)]
pub enum SyncRequest {
    /// A session was started; the handle resolves when it ends.
    Started(JoinHandle<Result<SessionSummary, SyncError>>),
    /// Another session is running.
    AlreadyActive,
    /// Credentials were rejected earlier; see [`SyncEngine::resume_after_auth`].
    Suspended,
    Offline,
    /// Automatic sessions are disabled on metered networks.
    MeteredRestricted,
    /// The backoff timer has not expired yet.
    Deferred { remaining: Duration },
}

impl SyncRequest {
    pub fn is_started(&self) -> bool {
        matches!(self, Self::Started(_))
    }
}

struct EngineState {
    phase: SyncPhase,
    active: bool,
    suspended: bool,
    network: NetworkState,
    backoff: Backoff,
    next_attempt_at: Option<Instant>,
    last_summary: Option<SessionSummary>,
    last_failure: Option<(SyncErrorKind, String)>,
}

struct EngineInner {
    store: Arc<LocalStore>,
    api: Arc<dyn CatalogApi>,
    images: Option<ImageCache>,
    analytics: Option<Arc<AnalyticsBatcher>>,
    config: EngineConfig,
    events: broadcast::Sender<SyncEvent>,
    state: Mutex<EngineState>,
    cancel: AtomicBool,
}

/// Builder for [`SyncEngine`].
pub struct SyncEngineBuilder {
    store: Arc<LocalStore>,
    api: Arc<dyn CatalogApi>,
    images: Option<ImageCache>,
    analytics: Option<Arc<AnalyticsBatcher>>,
    config: EngineConfig,
}

impl SyncEngineBuilder {
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Pre-warm favorite posters into `images` after successful sessions.
    pub fn image_cache(mut self, images: ImageCache) -> Self {
        self.images = Some(images);
        self
    }

    /// Record session events in `analytics` and flush it after successful
    /// sessions.
    pub fn analytics(mut self, analytics: Arc<AnalyticsBatcher>) -> Self {
        self.analytics = Some(analytics);
        self
    }

    pub fn build(self) -> SyncEngine {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let backoff = Backoff::new(self.config.session_policy);
        SyncEngine {
            inner: Arc::new(EngineInner {
                store: self.store,
                api: self.api,
                images: self.images,
                analytics: self.analytics,
                config: self.config,
                events,
                state: Mutex::new(EngineState {
                    phase: SyncPhase::Idle,
                    active: false,
                    suspended: false,
                    network: NetworkState::default(),
                    backoff,
                    next_attempt_at: None,
                    last_summary: None,
                    last_failure: None,
                }),
                cancel: AtomicBool::new(false),
            }),
        }
    }
}

/// Handle to the synchronization engine. Cheap to clone.
#[derive(Clone)]
pub struct SyncEngine {
    inner: Arc<EngineInner>,
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("phase", &self.phase())
            .finish()
    }
}

impl SyncEngine {
    pub fn builder(store: Arc<LocalStore>, api: Arc<dyn CatalogApi>) -> SyncEngineBuilder {
        SyncEngineBuilder {
            store,
            api,
            images: None,
            analytics: None,
            config: EngineConfig::default(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &Arc<LocalStore> {
        &self.inner.store
    }

    /// Subscribe to session notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.inner.events.subscribe()
    }

    pub fn phase(&self) -> SyncPhase {
        self.inner.lock().phase
    }

    pub fn is_active(&self) -> bool {
        self.inner.lock().active
    }

    pub fn is_suspended(&self) -> bool {
        self.inner.lock().suspended
    }

    pub fn network(&self) -> NetworkState {
        self.inner.lock().network
    }

    pub fn last_summary(&self) -> Option<SessionSummary> {
        self.inner.lock().last_summary.clone()
    }

    pub fn last_failure(&self) -> Option<(SyncErrorKind, String)> {
        self.inner.lock().last_failure.clone()
    }

    /// Consecutive failed sessions since the last success.
    pub fn consecutive_failures(&self) -> u32 {
        self.inner.lock().backoff.failures()
    }

    /// Time left on the backoff timer, if one is running.
    pub fn next_attempt_in(&self) -> Option<Duration> {
        let state = self.inner.lock();
        state
            .next_attempt_at
            .map(|at| at.saturating_duration_since(Instant::now()))
    }

    /// Start a session unless one is running or policy forbids it.
    ///
    /// Manual requests bypass the backoff timer and the metered-network
    /// restriction but never the single-session guard. Must be called from
    /// within a tokio runtime.
    pub fn request_sync(&self, reason: SyncReason) -> SyncRequest {
        {
            let mut state = self.inner.lock();
            if state.active {
                log::debug!("Sync ({}) ignored: session already active", reason);
                return SyncRequest::AlreadyActive;
            }
            if state.suspended {
                return SyncRequest::Suspended;
            }
            match state.network {
                NetworkState::Offline => return SyncRequest::Offline,
                NetworkState::Metered
                    if self.inner.config.wifi_only && !reason.is_user_initiated() =>
                {
                    return SyncRequest::MeteredRestricted;
                }
                _ => {}
            }
            if !reason.is_user_initiated() {
                if let Some(at) = state.next_attempt_at {
                    let now = Instant::now();
                    if now < at {
                        return SyncRequest::Deferred {
                            remaining: at - now,
                        };
                    }
                }
            }
            state.active = true;
            state.next_attempt_at = None;
        }
        self.inner.cancel.store(false, Ordering::SeqCst);

        log::info!("Starting sync ({})", reason);
        let inner = Arc::clone(&self.inner);
        SyncRequest::Started(tokio::spawn(inner.run_session(reason)))
    }

    /// Ask the running session to stop at its next phase boundary.
    ///
    /// A store transaction in progress always finishes first.
    pub fn cancel(&self) {
        if self.is_active() {
            log::debug!("Sync cancellation requested");
            self.inner.cancel.store(true, Ordering::SeqCst);
        }
    }

    pub fn set_network(&self, network: NetworkState) {
        let mut state = self.inner.lock();
        if state.network != network {
            log::debug!("Network changed: {:?} -> {:?}", state.network, network);
            state.network = network;
        }
    }

    /// Lift the suspension caused by rejected credentials.
    pub fn resume_after_auth(&self) {
        let mut state = self.inner.lock();
        if state.suspended {
            log::info!("Sync resumed after re-authentication");
            state.suspended = false;
            state.next_attempt_at = None;
        }
    }

    // ── Intents ─────────────────────────────────────────────────────────────

    /// Store a watch position. The entry is uploaded by the next session.
    /// Returns the entry's new revision.
    pub async fn record_watched(
        &self,
        release_id: ReleaseId,
        episode: u32,
        position_secs: u32,
    ) -> Result<i64, SyncError> {
        let store = Arc::clone(&self.inner.store);
        let watched_at = now_millis();
        let revision = tokio::task::spawn_blocking(move || {
            store.record_watched(release_id, episode, position_secs, watched_at)
        })
        .await
        .map_err(SyncError::join)??;
        log::debug!(
            "Recorded release {} episode {} at {}s (revision {})",
            release_id,
            episode,
            position_secs,
            revision
        );
        Ok(revision)
    }

    /// Flip favorite membership. Returns whether the release is now a
    /// favorite.
    pub async fn toggle_favorite(&self, release_id: ReleaseId) -> Result<bool, SyncError> {
        let store = Arc::clone(&self.inner.store);
        let changed_at = now_millis();
        let favorite =
            tokio::task::spawn_blocking(move || store.toggle_favorite(release_id, changed_at))
                .await
                .map_err(SyncError::join)??;
        Ok(favorite)
    }

    /// Fetch detail-only fields for a release and persist them.
    pub async fn fetch_details(&self, id: ReleaseId) -> Result<ReleaseDetails, SyncError> {
        let details = match self.inner.api.fetch_details(id).await {
            Ok(details) => details,
            Err(e) => {
                if matches!(e, ApiError::Auth { .. }) {
                    self.inner.lock().suspended = true;
                }
                return Err(e.into());
            }
        };
        let store = Arc::clone(&self.inner.store);
        let stored = details.clone();
        tokio::task::spawn_blocking(move || -> Result<(), StoreError> {
            store.upsert_release(&stored.release)?;
            store.store_details(&stored, now_millis())
        })
        .await
        .map_err(SyncError::join)??;
        Ok(details)
    }
}

impl EngineInner {
    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn emit(&self, event: SyncEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn set_phase(&self, phase: SyncPhase) {
        let changed = {
            let mut state = self.lock();
            let changed = state.phase != phase;
            state.phase = phase;
            changed
        };
        if changed {
            log::debug!("Sync phase: {}", phase);
            self.emit(SyncEvent::Phase(phase));
        }
    }

    fn check_cancel(&self) -> Result<(), SyncError> {
        if self.cancel.load(Ordering::SeqCst) {
            Err(SyncError::Cancelled)
        } else {
            Ok(())
        }
    }

    fn record_analytics(&self, event: AnalyticsEvent) {
        if let Some(analytics) = &self.analytics {
            analytics.record(event);
        }
    }

    async fn run_session(self: Arc<Self>, reason: SyncReason) -> Result<SessionSummary, SyncError> {
        let started = Instant::now();
        self.emit(SyncEvent::Started { reason });

        let result = self.run_phases().await;
        match result {
            Ok(mut summary) => {
                summary.duration = started.elapsed();
                self.finish_success(reason, &summary).await;
                Ok(summary)
            }
            Err(e) => {
                self.finish_failure(reason, &e);
                Err(e)
            }
        }
    }

    async fn run_phases(self: &Arc<Self>) -> Result<SessionSummary, SyncError> {
        let mut summary = SessionSummary::default();
        self.fetch_and_apply(&mut summary).await?;
        self.check_cancel()?;
        self.flush_user_state(&mut summary).await?;
        Ok(summary)
    }

    /// Page through the catalog from the stored cursor.
    ///
    /// Stops on an empty page, a page without a continuation, or a page with
    /// nothing newer than what is stored. The next page is fetched while the
    /// current one is applied; if the apply fails the prefetched page is
    /// discarded.
    async fn fetch_and_apply(self: &Arc<Self>, summary: &mut SessionSummary) -> Result<(), SyncError> {
        let store = Arc::clone(&self.store);
        let cursor = tokio::task::spawn_blocking(move || store.cursor())
            .await
            .map_err(SyncError::join)??;
        log::debug!("Fetching catalog from cursor {:?}", cursor);

        self.set_phase(SyncPhase::Fetching);
        let mut pending = self.spawn_fetch(cursor);
        let mut processed = 0;

        loop {
            let page = pending.await?;
            self.check_cancel()?;
            if page.releases.is_empty() {
                log::debug!("Empty page, catalog is up to date");
                break;
            }
            let count = page.releases.len();

            self.set_phase(SyncPhase::Diffing);
            let classified = self.classify(page.releases).await?;
            summary.inserted += classified.inserted;
            summary.updated += classified.updated;
            summary.unchanged += classified.unchanged;
            self.check_cancel()?;

            let more = page.next.is_some() && !classified.is_all_unchanged();
            // Dropping the handle cancels the prefetch.
            let prefetch = if more {
                Some(self.spawn_fetch(page.next.clone()))
            } else {
                None
            };

            self.set_phase(SyncPhase::Applying);
            let commit = self.apply(classified, page.next).await?;
            summary.pages += 1;
            processed += count;
            log::debug!(
                "Applied page {} ({} written, {} releases so far)",
                summary.pages,
                commit,
                processed
            );
            self.emit(SyncEvent::Progress { count: processed });

            match prefetch {
                Some(next) => {
                    self.check_cancel()?;
                    self.set_phase(SyncPhase::Fetching);
                    pending = next;
                }
                None => break,
            }
        }
        Ok(())
    }

    fn spawn_fetch(self: &Arc<Self>, cursor: Option<String>) -> RemoteHandle<Result<CatalogPage, SyncError>> {
        let inner = Arc::clone(self);
        let (task, handle) = async move { inner.fetch_with_retry(cursor).await }.remote_handle();
        tokio::spawn(task);
        handle
    }

    /// Fetch one page, retrying transient failures with backoff.
    async fn fetch_with_retry(&self, cursor: Option<String>) -> Result<CatalogPage, SyncError> {
        let mut backoff = Backoff::new(self.config.retry_policy);
        loop {
            match self
                .api
                .fetch_page(cursor.as_deref(), self.config.page_size)
                .await
            {
                Ok(page) => return Ok(page),
                Err(e) if e.is_retryable() && backoff.failures() < self.config.max_retries => {
                    let delay = backoff.record_failure();
                    let delay = backoff.jittered(delay);
                    log::debug!(
                        "Page fetch failed ({}), retry {}/{} in {:?}",
                        e,
                        backoff.failures(),
                        self.config.max_retries,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    self.check_cancel()?;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn classify(&self, releases: Vec<Release>) -> Result<ClassifiedPage, SyncError> {
        let store = Arc::clone(&self.store);
        let classified = tokio::task::spawn_blocking(move || -> Result<ClassifiedPage, StoreError> {
            let ids: Vec<ReleaseId> = releases.iter().map(|r| r.id).collect();
            let stored = store.release_timestamps(&ids)?;
            Ok(classify_page(releases, &stored))
        })
        .await
        .map_err(SyncError::join)??;
        Ok(classified)
    }

    /// Write the changed releases and the page's continuation together.
    async fn apply(&self, page: ClassifiedPage, next: Option<String>) -> Result<usize, SyncError> {
        let store = Arc::clone(&self.store);
        let commit = tokio::task::spawn_blocking(move || {
            store.apply_page(&page.changed, next.as_deref())
        })
        .await
        .map_err(SyncError::join)??;
        Ok(commit.written)
    }

    /// Upload pending history and favorites.
    ///
    /// Only entries the server accepted are marked synced, and only if they
    /// were not edited again while the upload was in flight.
    async fn flush_user_state(&self, summary: &mut SessionSummary) -> Result<(), SyncError> {
        self.set_phase(SyncPhase::Flushing);
        let store = Arc::clone(&self.store);
        let (history, favorites) = tokio::task::spawn_blocking(move || -> Result<_, StoreError> {
            Ok((store.pending_history()?, store.pending_favorites()?))
        })
        .await
        .map_err(SyncError::join)??;

        if !history.is_empty() {
            let acks = self.api.push_history(&history).await?;
            let accepted: HashMap<(ReleaseId, u32), bool> = acks
                .iter()
                .map(|a| ((a.release_id, a.episode), a.accepted))
                .collect();
            let store = Arc::clone(&self.store);
            let (flushed, rejected) = tokio::task::spawn_blocking(move || -> Result<_, StoreError> {
                let mut flushed = 0;
                let mut rejected = 0;
                for entry in &history {
                    let key = (entry.release_id, entry.episode);
                    if accepted.get(&key).copied().unwrap_or(false) {
                        store.mark_history_synced(entry.release_id, entry.episode, entry.revision)?;
                        flushed += 1;
                    } else {
                        rejected += 1;
                    }
                }
                Ok((flushed, rejected))
            })
            .await
            .map_err(SyncError::join)??;
            if rejected > 0 {
                log::warn!("{} history entr(ies) not accepted, will retry", rejected);
            }
            summary.history_flushed += flushed;
            summary.rejected += rejected;
        }

        if !favorites.is_empty() {
            let acks = self.api.push_favorites(&favorites).await?;
            let accepted: HashMap<ReleaseId, bool> =
                acks.iter().map(|a| (a.release_id, a.accepted)).collect();
            let store = Arc::clone(&self.store);
            let (flushed, rejected) = tokio::task::spawn_blocking(move || -> Result<_, StoreError> {
                let mut flushed = 0;
                let mut rejected = 0;
                for entry in &favorites {
                    if accepted.get(&entry.release_id).copied().unwrap_or(false) {
                        store.mark_favorite_synced(entry.release_id, entry.revision)?;
                        flushed += 1;
                    } else {
                        rejected += 1;
                    }
                }
                Ok((flushed, rejected))
            })
            .await
            .map_err(SyncError::join)??;
            if rejected > 0 {
                log::warn!("{} favorite change(s) not accepted, will retry", rejected);
            }
            summary.favorites_flushed += flushed;
            summary.rejected += rejected;
        }
        Ok(())
    }

    /// Close a successful session, then run the best-effort follow-ups.
    ///
    /// The engine is back to `Idle` before the analytics flush and poster
    /// pre-warm start, so neither holds the session guard.
    async fn finish_success(&self, reason: SyncReason, summary: &SessionSummary) {
        let store = Arc::clone(&self.store);
        let at = now_millis();
        match tokio::task::spawn_blocking(move || store.set_last_success_at(at)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => log::warn!("Could not record sync time: {}", e),
            Err(e) => log::warn!("Could not record sync time: {}", e),
        }

        {
            let mut state = self.lock();
            state.backoff.record_success();
            state.next_attempt_at = None;
            state.last_summary = Some(summary.clone());
            state.last_failure = None;
            state.phase = SyncPhase::Idle;
            state.active = false;
        }
        log::info!(
            "Sync finished: {} page(s), {} inserted, {} updated, {} history and {} favorite(s) uploaded in {:.1?}",
            summary.pages,
            summary.inserted,
            summary.updated,
            summary.history_flushed,
            summary.favorites_flushed,
            summary.duration
        );
        self.emit(SyncEvent::Phase(SyncPhase::Idle));
        self.emit(SyncEvent::Completed(summary.clone()));

        self.record_analytics(
            AnalyticsEvent::new("sync_completed", at)
                .with_property("reason", reason)
                .with_property("pages", summary.pages)
                .with_property("written", summary.written()),
        );
        if let Some(analytics) = &self.analytics {
            if let Err(e) = analytics.flush().await {
                log::debug!("Analytics flush after sync failed: {}", e);
            }
        }
        self.prewarm_posters().await;
    }

    fn finish_failure(&self, reason: SyncReason, error: &SyncError) {
        let kind = error.kind();
        let message = error.to_string();
        self.set_phase(SyncPhase::Error);

        let delay = {
            let mut state = self.lock();
            state.last_failure = Some((kind, message.clone()));
            match kind {
                SyncErrorKind::Cancelled => None,
                SyncErrorKind::Auth => {
                    state.suspended = true;
                    None
                }
                _ => {
                    let delay = state.backoff.record_failure();
                    let delay = state.backoff.jittered(delay);
                    state.next_attempt_at = Some(Instant::now() + delay);
                    Some(delay)
                }
            }
        };

        match kind {
            SyncErrorKind::Cancelled => log::info!("Sync cancelled"),
            SyncErrorKind::Auth => log::warn!("Sync suspended, credentials rejected: {}", message),
            _ => log::warn!("Sync failed ({}): {}", kind, message),
        }
        self.record_analytics(
            AnalyticsEvent::new("sync_failed", now_millis())
                .with_property("reason", reason)
                .with_property("kind", kind),
        );

        self.emit(SyncEvent::Failed { kind, message });
        if let Some(delay) = delay {
            self.emit(SyncEvent::RetryScheduled { delay });
        }
        {
            let mut state = self.lock();
            state.phase = SyncPhase::Idle;
            state.active = false;
        }
        self.emit(SyncEvent::Phase(SyncPhase::Idle));
    }

    /// Download posters of favorited releases into the image cache.
    async fn prewarm_posters(&self) {
        let Some(images) = &self.images else {
            return;
        };
        let store = Arc::clone(&self.store);
        let releases = match tokio::task::spawn_blocking(move || store.favorite_releases()).await {
            Ok(Ok(releases)) => releases,
            Ok(Err(e)) => {
                log::warn!("Poster pre-warm skipped: {}", e);
                return;
            }
            Err(e) => {
                log::warn!("Poster pre-warm skipped: {}", e);
                return;
            }
        };
        let urls: Vec<String> = releases
            .iter()
            .filter_map(|r| r.poster.as_deref())
            .map(|p| media_url(&self.config.media_base, p))
            .filter(|url| !images.contains(url))
            .collect();
        if urls.is_empty() {
            return;
        }

        let failures = futures::stream::iter(urls)
            .map(|url| async move {
                let result = images.get_or_fetch(&url).await;
                (url, result)
            })
            .buffer_unordered(PREWARM_CONCURRENCY)
            .filter_map(|(url, result)| async move { result.err().map(|e| (url, e)) })
            .collect::<Vec<_>>()
            .await;
        for (url, e) in &failures {
            log::warn!("Poster pre-warm failed for {}: {}", url, e);
        }
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
