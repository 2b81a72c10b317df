//! Write operations for releases, history, favorites and key/value options.
//!
//! Every function takes a `&Connection` so callers can run it directly or
//! inside a `Transaction` (which derefs to `Connection`).

use anisync_core::{ModelError, Release, ReleaseDetails, ReleaseId};
use rusqlite::{Connection, OptionalExtension, params};
use thiserror::Error;

use crate::schema::SchemaError;

/// Key of the persisted catalog cursor in the `kv` table.
pub const CURSOR_KEY: &str = "sync.cursor";

/// Key of the last fully successful session time in the `kv` table.
pub const LAST_SUCCESS_KEY: &str = "sync.lastSuccessAt";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),
    #[error("Constraint violation: {0}")]
    Constraint(String),
    #[error("Corrupt stored value: {0}")]
    Model(#[from] ModelError),
    #[error("Store lock poisoned")]
    Poisoned,
    #[error("Blocking task failed: {0}")]
    Task(String),
}

impl StoreError {
    pub fn constraint(msg: impl Into<String>) -> Self {
        Self::Constraint(msg.into())
    }
}

fn check_release_id(id: ReleaseId) -> Result<(), StoreError> {
    if id <= 0 {
        return Err(StoreError::constraint(format!("invalid release id {id}")));
    }
    Ok(())
}

// ── Release Operations ──────────────────────────────────────────────────────

/// Insert or update a release.
///
/// An existing row is only overwritten when the incoming `updated_at` is
/// strictly newer, so replaying an old page never rolls a release back.
/// Returns true if a row was written.
pub fn upsert_release(conn: &Connection, release: &Release) -> Result<bool, StoreError> {
    check_release_id(release.id)?;
    if release.title.trim().is_empty() {
        return Err(StoreError::constraint(format!(
            "release {} has an empty title",
            release.id
        )));
    }
    let changed = conn.execute(
        "INSERT INTO releases (id, title, status, episode_count, poster, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(id) DO UPDATE SET
             title = excluded.title,
             status = excluded.status,
             episode_count = excluded.episode_count,
             poster = excluded.poster,
             updated_at = excluded.updated_at,
             stored_at = datetime('now')
         WHERE excluded.updated_at > releases.updated_at",
        params![
            release.id,
            release.title,
            release.status.as_str(),
            release.episode_count,
            release.poster,
            release.updated_at,
        ],
    )?;
    Ok(changed > 0)
}

/// Store the detail-only fields of a release.
///
/// The list-level columns are upserted first under the usual monotonic
/// rule; details always replace what was stored before.
pub fn store_release_details(
    conn: &Connection,
    details: &ReleaseDetails,
    fetched_at: i64,
) -> Result<(), StoreError> {
    upsert_release(conn, &details.release)?;
    conn.execute(
        "UPDATE releases SET description = ?2, genres = ?3, year = ?4, details_fetched_at = ?5
         WHERE id = ?1",
        params![
            details.release.id,
            details.description,
            details.genres.join("\n"),
            details.year,
            fetched_at,
        ],
    )?;
    Ok(())
}

// ── History Operations ──────────────────────────────────────────────────────

/// Record watch progress for an episode.
///
/// Overwrites the position of an existing (release, episode) row, marks it
/// pending and bumps its revision. Returns the new revision.
pub fn record_watched(
    conn: &Connection,
    release_id: ReleaseId,
    episode: u32,
    position_secs: u32,
    watched_at: i64,
) -> Result<i64, StoreError> {
    check_release_id(release_id)?;
    if episode == 0 {
        return Err(StoreError::constraint("episode numbers start at 1"));
    }
    let revision = conn.query_row(
        "INSERT INTO history (release_id, episode, position_secs, watched_at, sync_state, revision)
         VALUES (?1, ?2, ?3, ?4, 'pending', 1)
         ON CONFLICT(release_id, episode) DO UPDATE SET
             position_secs = excluded.position_secs,
             watched_at = excluded.watched_at,
             sync_state = 'pending',
             revision = history.revision + 1
         RETURNING revision",
        params![release_id, episode, position_secs, watched_at],
        |row| row.get(0),
    )?;
    Ok(revision)
}

/// Mark a history row synced if it still has the revision that was uploaded.
///
/// Returns false when the row was edited since (it stays pending).
pub fn mark_history_synced(
    conn: &Connection,
    release_id: ReleaseId,
    episode: u32,
    revision: i64,
) -> Result<bool, StoreError> {
    let changed = conn.execute(
        "UPDATE history SET sync_state = 'synced'
         WHERE release_id = ?1 AND episode = ?2 AND revision = ?3",
        params![release_id, episode, revision],
    )?;
    Ok(changed > 0)
}

// ── Favorite Operations ─────────────────────────────────────────────────────

/// Set favorite membership for a release. Returns the new revision.
pub fn set_favorite(
    conn: &Connection,
    release_id: ReleaseId,
    favorite: bool,
    changed_at: i64,
) -> Result<i64, StoreError> {
    check_release_id(release_id)?;
    let revision = conn.query_row(
        "INSERT INTO favorites (release_id, favorite, changed_at, sync_state, revision)
         VALUES (?1, ?2, ?3, 'pending', 1)
         ON CONFLICT(release_id) DO UPDATE SET
             favorite = excluded.favorite,
             changed_at = excluded.changed_at,
             sync_state = 'pending',
             revision = favorites.revision + 1
         RETURNING revision",
        params![release_id, favorite, changed_at],
        |row| row.get(0),
    )?;
    Ok(revision)
}

/// Flip favorite membership. Returns the new membership.
pub fn toggle_favorite(
    conn: &Connection,
    release_id: ReleaseId,
    changed_at: i64,
) -> Result<bool, StoreError> {
    let current: Option<bool> = conn
        .query_row(
            "SELECT favorite FROM favorites WHERE release_id = ?1",
            params![release_id],
            |row| row.get(0),
        )
        .optional()?;
    let next = !current.unwrap_or(false);
    set_favorite(conn, release_id, next, changed_at)?;
    Ok(next)
}

/// Acknowledge an uploaded favorite change.
///
/// Confirmed removals are deleted outright. Returns false when the row was
/// edited after the upload started.
pub fn mark_favorite_synced(
    conn: &Connection,
    release_id: ReleaseId,
    revision: i64,
) -> Result<bool, StoreError> {
    let deleted = conn.execute(
        "DELETE FROM favorites WHERE release_id = ?1 AND revision = ?2 AND favorite = 0",
        params![release_id, revision],
    )?;
    if deleted > 0 {
        return Ok(true);
    }
    let changed = conn.execute(
        "UPDATE favorites SET sync_state = 'synced'
         WHERE release_id = ?1 AND revision = ?2",
        params![release_id, revision],
    )?;
    Ok(changed > 0)
}

// ── Key/Value Operations ────────────────────────────────────────────────────

/// Insert or replace a named value.
pub fn put_value(conn: &Connection, key: &str, value: &str) -> Result<(), StoreError> {
    if key.is_empty() {
        return Err(StoreError::constraint("empty option name"));
    }
    conn.execute(
        "INSERT INTO kv (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = datetime('now')",
        params![key, value],
    )?;
    Ok(())
}

/// Read a named value.
pub fn get_value(conn: &Connection, key: &str) -> Result<Option<String>, StoreError> {
    conn.query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
        row.get(0)
    })
    .optional()
    .map_err(Into::into)
}

/// Remove a named value. Returns true if it existed.
pub fn delete_value(conn: &Connection, key: &str) -> Result<bool, StoreError> {
    let changed = conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
    Ok(changed > 0)
}
