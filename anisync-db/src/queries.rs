//! Read queries for the library database.

use std::collections::HashMap;

use anisync_core::{FavoriteEntry, HistoryEntry, Release, ReleaseDetails, ReleaseId, ViewMode};
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};

use crate::operations::StoreError;

const RELEASE_COLUMNS: &str = "id, title, status, episode_count, poster, updated_at";

// ── Release Lookups ─────────────────────────────────────────────────────────

/// Find a release by id.
pub fn get_release(conn: &Connection, id: ReleaseId) -> Result<Option<Release>, StoreError> {
    let sql = format!("SELECT {RELEASE_COLUMNS} FROM releases WHERE id = ?1");
    let release = conn
        .query_row(&sql, params![id], |row| Ok(raw_release(row)))
        .optional()?;
    release.map(RawRelease::into_release).transpose()
}

/// Find a release with its detail fields, if details have been fetched.
pub fn get_release_details(
    conn: &Connection,
    id: ReleaseId,
) -> Result<Option<ReleaseDetails>, StoreError> {
    let sql = format!(
        "SELECT {RELEASE_COLUMNS}, description, genres, year
         FROM releases WHERE id = ?1 AND details_fetched_at IS NOT NULL"
    );
    let row = conn
        .query_row(&sql, params![id], |row| {
            Ok((
                raw_release(row),
                row.get::<_, Option<String>>(6)?,
                row.get::<_, Option<String>>(7)?,
                row.get::<_, Option<u16>>(8)?,
            ))
        })
        .optional()?;

    let Some((raw, description, genres, year)) = row else {
        return Ok(None);
    };
    let genres = genres
        .map(|g| {
            g.split('\n')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    Ok(Some(ReleaseDetails {
        release: raw.into_release()?,
        description,
        genres,
        year,
    }))
}

/// Stored `updated_at` for each of the given ids that exists locally.
pub fn release_timestamps(
    conn: &Connection,
    ids: &[ReleaseId],
) -> Result<HashMap<ReleaseId, i64>, StoreError> {
    let mut out = HashMap::with_capacity(ids.len());
    // Stay well under SQLITE_MAX_VARIABLE_NUMBER.
    for chunk in ids.chunks(500) {
        let placeholders = vec!["?"; chunk.len()].join(", ");
        let sql = format!("SELECT id, updated_at FROM releases WHERE id IN ({placeholders})");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(chunk.iter()), |row| {
            Ok((row.get::<_, ReleaseId>(0)?, row.get::<_, i64>(1)?))
        })?;
        for row in rows {
            let (id, ts) = row?;
            out.insert(id, ts);
        }
    }
    Ok(out)
}

/// Releases modified after `since`, oldest first. Ties break on id.
pub fn releases_updated_since(
    conn: &Connection,
    since: i64,
    limit: usize,
) -> Result<Vec<Release>, StoreError> {
    let sql = format!(
        "SELECT {RELEASE_COLUMNS} FROM releases
         WHERE updated_at > ?1 ORDER BY updated_at ASC, id ASC LIMIT ?2"
    );
    collect_releases(conn, &sql, params![since, limit as i64])
}

/// Most recently updated releases first.
pub fn recently_updated(conn: &Connection, limit: usize) -> Result<Vec<Release>, StoreError> {
    let sql = format!(
        "SELECT {RELEASE_COLUMNS} FROM releases ORDER BY updated_at DESC, id DESC LIMIT ?1"
    );
    collect_releases(conn, &sql, params![limit as i64])
}

/// Releases with watch history, most recently watched first.
pub fn watched_releases(conn: &Connection, limit: usize) -> Result<Vec<Release>, StoreError> {
    let sql = "SELECT r.id, r.title, r.status, r.episode_count, r.poster, r.updated_at
         FROM releases r
         JOIN (SELECT release_id, MAX(watched_at) AS last_watched
               FROM history GROUP BY release_id) h ON h.release_id = r.id
         ORDER BY h.last_watched DESC, r.id DESC LIMIT ?1";
    collect_releases(conn, sql, params![limit as i64])
}

/// Releases backing a UI list mode.
pub fn releases_for_view(
    conn: &Connection,
    mode: ViewMode,
    limit: usize,
) -> Result<Vec<Release>, StoreError> {
    match mode {
        ViewMode::ReleaseCard => recently_updated(conn, limit),
        ViewMode::WatchedReleaseCard => watched_releases(conn, limit),
    }
}

/// Releases currently marked as favorite.
pub fn favorite_releases(conn: &Connection) -> Result<Vec<Release>, StoreError> {
    let sql = "SELECT r.id, r.title, r.status, r.episode_count, r.poster, r.updated_at
         FROM releases r JOIN favorites f ON f.release_id = r.id
         WHERE f.favorite = 1 ORDER BY f.changed_at DESC";
    collect_releases(conn, sql, params![])
}

// ── History Lookups ─────────────────────────────────────────────────────────

/// Watch history, most recent first.
pub fn history(conn: &Connection, limit: usize) -> Result<Vec<HistoryEntry>, StoreError> {
    collect_history(
        conn,
        "SELECT release_id, episode, position_secs, watched_at, sync_state, revision
         FROM history ORDER BY watched_at DESC LIMIT ?1",
        params![limit as i64],
    )
}

/// History entries for one release, by episode.
pub fn history_for_release(
    conn: &Connection,
    release_id: ReleaseId,
) -> Result<Vec<HistoryEntry>, StoreError> {
    collect_history(
        conn,
        "SELECT release_id, episode, position_secs, watched_at, sync_state, revision
         FROM history WHERE release_id = ?1 ORDER BY episode",
        params![release_id],
    )
}

/// Find a single history entry.
pub fn get_history_entry(
    conn: &Connection,
    release_id: ReleaseId,
    episode: u32,
) -> Result<Option<HistoryEntry>, StoreError> {
    let mut entries = collect_history(
        conn,
        "SELECT release_id, episode, position_secs, watched_at, sync_state, revision
         FROM history WHERE release_id = ?1 AND episode = ?2",
        params![release_id, episode],
    )?;
    Ok(entries.pop())
}

/// History entries not yet acknowledged upstream, oldest first.
pub fn pending_history(conn: &Connection) -> Result<Vec<HistoryEntry>, StoreError> {
    collect_history(
        conn,
        "SELECT release_id, episode, position_secs, watched_at, sync_state, revision
         FROM history WHERE sync_state = 'pending' ORDER BY watched_at ASC",
        params![],
    )
}

// ── Favorite Lookups ────────────────────────────────────────────────────────

/// Current favorites (removals excluded), most recent first.
pub fn favorites(conn: &Connection) -> Result<Vec<FavoriteEntry>, StoreError> {
    collect_favorites(
        conn,
        "SELECT release_id, favorite, changed_at, sync_state, revision
         FROM favorites WHERE favorite = 1 ORDER BY changed_at DESC",
    )
}

/// Favorite changes (additions and removals) not yet acknowledged.
pub fn pending_favorites(conn: &Connection) -> Result<Vec<FavoriteEntry>, StoreError> {
    collect_favorites(
        conn,
        "SELECT release_id, favorite, changed_at, sync_state, revision
         FROM favorites WHERE sync_state = 'pending' ORDER BY changed_at ASC",
    )
}

/// Whether a release is currently a favorite.
pub fn is_favorite(conn: &Connection, release_id: ReleaseId) -> Result<bool, StoreError> {
    let favorite: Option<bool> = conn
        .query_row(
            "SELECT favorite FROM favorites WHERE release_id = ?1",
            params![release_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(favorite.unwrap_or(false))
}

// ── Statistics ──────────────────────────────────────────────────────────────

/// Row counts for display.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub releases: i64,
    pub history: i64,
    pub pending_history: i64,
    pub favorites: i64,
    pub pending_favorites: i64,
}

pub fn store_stats(conn: &Connection) -> Result<StoreStats, StoreError> {
    let count = |sql: &str| -> Result<i64, StoreError> {
        conn.query_row(sql, [], |row| row.get(0)).map_err(Into::into)
    };

    Ok(StoreStats {
        releases: count("SELECT COUNT(*) FROM releases")?,
        history: count("SELECT COUNT(*) FROM history")?,
        pending_history: count("SELECT COUNT(*) FROM history WHERE sync_state = 'pending'")?,
        favorites: count("SELECT COUNT(*) FROM favorites WHERE favorite = 1")?,
        pending_favorites: count("SELECT COUNT(*) FROM favorites WHERE sync_state = 'pending'")?,
    })
}

// ── Row Mapping ─────────────────────────────────────────────────────────────

/// Release columns before enum parsing, so a bad status surfaces as a
/// `StoreError::Model` instead of a generic SQLite conversion error.
struct RawRelease {
    id: rusqlite::Result<ReleaseId>,
    title: rusqlite::Result<String>,
    status: rusqlite::Result<String>,
    episode_count: rusqlite::Result<u32>,
    poster: rusqlite::Result<Option<String>>,
    updated_at: rusqlite::Result<i64>,
}

fn raw_release(row: &Row) -> RawRelease {
    RawRelease {
        id: row.get(0),
        title: row.get(1),
        status: row.get(2),
        episode_count: row.get(3),
        poster: row.get(4),
        updated_at: row.get(5),
    }
}

impl RawRelease {
    fn into_release(self) -> Result<Release, StoreError> {
        Ok(Release {
            id: self.id?,
            title: self.title?,
            status: self.status?.parse()?,
            episode_count: self.episode_count?,
            poster: self.poster?,
            updated_at: self.updated_at?,
        })
    }
}

fn collect_releases<P: rusqlite::Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> Result<Vec<Release>, StoreError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, |row| Ok(raw_release(row)))?;
    let mut releases = Vec::new();
    for raw in rows {
        releases.push(raw?.into_release()?);
    }
    Ok(releases)
}

fn collect_history<P: rusqlite::Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> Result<Vec<HistoryEntry>, StoreError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, |row| {
        Ok((
            row.get::<_, ReleaseId>(0)?,
            row.get::<_, u32>(1)?,
            row.get::<_, u32>(2)?,
            row.get::<_, i64>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, i64>(5)?,
        ))
    })?;
    let mut entries = Vec::new();
    for row in rows {
        let (release_id, episode, position_secs, watched_at, state, revision) = row?;
        entries.push(HistoryEntry {
            release_id,
            episode,
            position_secs,
            watched_at,
            sync_state: state.parse()?,
            revision,
        });
    }
    Ok(entries)
}

fn collect_favorites(conn: &Connection, sql: &str) -> Result<Vec<FavoriteEntry>, StoreError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, ReleaseId>(0)?,
            row.get::<_, bool>(1)?,
            row.get::<_, i64>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, i64>(4)?,
        ))
    })?;
    let mut entries = Vec::new();
    for row in rows {
        let (release_id, favorite, changed_at, state, revision) = row?;
        entries.push(FavoriteEntry {
            release_id,
            favorite,
            changed_at,
            sync_state: state.parse()?,
            revision,
        });
    }
    Ok(entries)
}
