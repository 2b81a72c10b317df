//! Thread-safe handle over the library database.
//!
//! Writers are serialized through one connection. File-backed stores also
//! keep a read-only connection so queries see the last committed snapshot
//! instead of waiting for an open write transaction. In-memory stores use
//! the writer connection for both.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use anisync_core::{FavoriteEntry, HistoryEntry, Release, ReleaseDetails, ReleaseId, ViewMode};
use rusqlite::Connection;

use crate::operations::{self, CURSOR_KEY, LAST_SUCCESS_KEY, StoreError};
use crate::queries::{self, StoreStats};
use crate::schema;

/// Result of applying one catalog page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageCommit {
    /// Rows actually written (stale or identical copies are skipped).
    pub written: usize,
}

/// Durable storage for releases, user state and sync bookkeeping.
pub struct LocalStore {
    writer: Mutex<Connection>,
    reader: Option<Mutex<Connection>>,
    path: Option<PathBuf>,
}

impl std::fmt::Debug for LocalStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalStore")
            .field("path", &self.path)
            .field("snapshot_reader", &self.reader.is_some())
            .finish()
    }
}

impl LocalStore {
    /// Open or create a store at `path`, creating parent directories.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let writer = schema::open_database(path)?;
        let reader = schema::open_reader(path)?;
        log::debug!("Opened library database at {}", path.display());
        Ok(Self {
            writer: Mutex::new(writer),
            reader: Some(Mutex::new(reader)),
            path: Some(path.to_path_buf()),
        })
    }

    /// Open an in-memory store. Useful for testing.
    pub fn open_memory() -> Result<Self, StoreError> {
        Ok(Self {
            writer: Mutex::new(schema::open_memory()?),
            reader: None,
            path: None,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn lock_writer(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.writer.lock().map_err(|_| StoreError::Poisoned)
    }

    fn read<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        match &self.reader {
            Some(reader) => {
                let conn = reader.lock().map_err(|_| StoreError::Poisoned)?;
                f(&*conn)
            }
            None => {
                let conn = self.lock_writer()?;
                f(&*conn)
            }
        }
    }

    fn write<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let conn = self.lock_writer()?;
        f(&*conn)
    }

    // ── Catalog ─────────────────────────────────────────────────────────────

    /// Write a page of releases and advance the cursor in one transaction.
    ///
    /// Any failure rolls the whole page back and leaves the cursor where it
    /// was. `cursor = None` keeps the stored cursor unchanged.
    pub fn apply_page(
        &self,
        releases: &[Release],
        cursor: Option<&str>,
    ) -> Result<PageCommit, StoreError> {
        let mut conn = self.lock_writer()?;
        let tx = conn.transaction()?;
        let mut written = 0;
        for release in releases {
            if operations::upsert_release(&tx, release)? {
                written += 1;
            }
        }
        if let Some(cursor) = cursor {
            operations::put_value(&tx, CURSOR_KEY, cursor)?;
        }
        tx.commit()?;
        Ok(PageCommit { written })
    }

    pub fn upsert_release(&self, release: &Release) -> Result<bool, StoreError> {
        self.write(|conn| operations::upsert_release(conn, release))
    }

    pub fn store_details(&self, details: &ReleaseDetails, fetched_at: i64) -> Result<(), StoreError> {
        let mut conn = self.lock_writer()?;
        let tx = conn.transaction()?;
        operations::store_release_details(&tx, details, fetched_at)?;
        tx.commit()?;
        Ok(())
    }

    pub fn release(&self, id: ReleaseId) -> Result<Option<Release>, StoreError> {
        self.read(|conn| queries::get_release(conn, id))
    }

    pub fn release_details(&self, id: ReleaseId) -> Result<Option<ReleaseDetails>, StoreError> {
        self.read(|conn| queries::get_release_details(conn, id))
    }

    pub fn release_timestamps(
        &self,
        ids: &[ReleaseId],
    ) -> Result<HashMap<ReleaseId, i64>, StoreError> {
        self.read(|conn| queries::release_timestamps(conn, ids))
    }

    pub fn releases_updated_since(
        &self,
        since: i64,
        limit: usize,
    ) -> Result<Vec<Release>, StoreError> {
        self.read(|conn| queries::releases_updated_since(conn, since, limit))
    }

    pub fn releases_for_view(
        &self,
        mode: ViewMode,
        limit: usize,
    ) -> Result<Vec<Release>, StoreError> {
        self.read(|conn| queries::releases_for_view(conn, mode, limit))
    }

    pub fn favorite_releases(&self) -> Result<Vec<Release>, StoreError> {
        self.read(queries::favorite_releases)
    }

    // ── Sync bookkeeping ────────────────────────────────────────────────────

    /// The last committed catalog cursor, if any page was ever applied.
    pub fn cursor(&self) -> Result<Option<String>, StoreError> {
        self.read(|conn| operations::get_value(conn, CURSOR_KEY))
    }

    pub fn reset_cursor(&self) -> Result<bool, StoreError> {
        self.write(|conn| operations::delete_value(conn, CURSOR_KEY))
    }

    pub fn last_success_at(&self) -> Result<Option<i64>, StoreError> {
        let value = self.read(|conn| operations::get_value(conn, LAST_SUCCESS_KEY))?;
        Ok(value.and_then(|v| v.parse().ok()))
    }

    pub fn set_last_success_at(&self, at: i64) -> Result<(), StoreError> {
        self.write(|conn| operations::put_value(conn, LAST_SUCCESS_KEY, &at.to_string()))
    }

    pub fn value(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.read(|conn| operations::get_value(conn, key))
    }

    pub fn put_value(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.write(|conn| operations::put_value(conn, key, value))
    }

    // ── History ─────────────────────────────────────────────────────────────

    pub fn record_watched(
        &self,
        release_id: ReleaseId,
        episode: u32,
        position_secs: u32,
        watched_at: i64,
    ) -> Result<i64, StoreError> {
        self.write(|conn| {
            operations::record_watched(conn, release_id, episode, position_secs, watched_at)
        })
    }

    pub fn history(&self, limit: usize) -> Result<Vec<HistoryEntry>, StoreError> {
        self.read(|conn| queries::history(conn, limit))
    }

    pub fn history_for_release(&self, release_id: ReleaseId) -> Result<Vec<HistoryEntry>, StoreError> {
        self.read(|conn| queries::history_for_release(conn, release_id))
    }

    pub fn history_entry(
        &self,
        release_id: ReleaseId,
        episode: u32,
    ) -> Result<Option<HistoryEntry>, StoreError> {
        self.read(|conn| queries::get_history_entry(conn, release_id, episode))
    }

    pub fn pending_history(&self) -> Result<Vec<HistoryEntry>, StoreError> {
        self.read(queries::pending_history)
    }

    pub fn mark_history_synced(
        &self,
        release_id: ReleaseId,
        episode: u32,
        revision: i64,
    ) -> Result<bool, StoreError> {
        self.write(|conn| operations::mark_history_synced(conn, release_id, episode, revision))
    }

    // ── Favorites ───────────────────────────────────────────────────────────

    pub fn toggle_favorite(&self, release_id: ReleaseId, changed_at: i64) -> Result<bool, StoreError> {
        let mut conn = self.lock_writer()?;
        let tx = conn.transaction()?;
        let favorite = operations::toggle_favorite(&tx, release_id, changed_at)?;
        tx.commit()?;
        Ok(favorite)
    }

    pub fn set_favorite(
        &self,
        release_id: ReleaseId,
        favorite: bool,
        changed_at: i64,
    ) -> Result<i64, StoreError> {
        self.write(|conn| operations::set_favorite(conn, release_id, favorite, changed_at))
    }

    pub fn is_favorite(&self, release_id: ReleaseId) -> Result<bool, StoreError> {
        self.read(|conn| queries::is_favorite(conn, release_id))
    }

    pub fn favorites(&self) -> Result<Vec<FavoriteEntry>, StoreError> {
        self.read(queries::favorites)
    }

    pub fn pending_favorites(&self) -> Result<Vec<FavoriteEntry>, StoreError> {
        self.read(queries::pending_favorites)
    }

    pub fn mark_favorite_synced(&self, release_id: ReleaseId, revision: i64) -> Result<bool, StoreError> {
        self.write(|conn| operations::mark_favorite_synced(conn, release_id, revision))
    }

    pub fn stats(&self) -> Result<StoreStats, StoreError> {
        self.read(queries::store_stats)
    }
}
