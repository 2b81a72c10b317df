//! SQLite schema creation and migration.

use std::path::Path;
use std::time::Duration;

use rusqlite::{Connection, OpenFlags};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Migration error: expected version {expected}, found {found}")]
    VersionMismatch { expected: i32, found: i32 },
}

/// Current schema version. Increment when adding migrations.
pub const CURRENT_VERSION: i32 = 2;

/// How long a connection waits on a locked database before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Create all tables and indexes if they don't exist.
///
/// Idempotent, safe to call on an existing database.
pub fn create_schema(conn: &Connection) -> Result<(), SchemaError> {
    conn.execute_batch(SCHEMA_SQL)?;
    set_schema_version(conn, CURRENT_VERSION)?;
    Ok(())
}

/// Open or create a library database at the given path.
pub fn open_database(path: &Path) -> Result<Connection, SchemaError> {
    let conn = Connection::open(path)?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

    let version = get_schema_version(&conn)?;
    if version == 0 {
        create_schema(&conn)?;
    } else if version < CURRENT_VERSION {
        migrate(&conn, version)?;
    } else if version > CURRENT_VERSION {
        return Err(SchemaError::VersionMismatch {
            expected: CURRENT_VERSION,
            found: version,
        });
    }

    Ok(conn)
}

/// Open a read-only connection to an existing database.
///
/// With WAL enabled on the writer, this connection sees the last committed
/// snapshot and never waits for an open write transaction.
pub fn open_reader(path: &Path) -> Result<Connection, SchemaError> {
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    Ok(conn)
}

/// Open an in-memory database with the full schema. Useful for testing.
pub fn open_memory() -> Result<Connection, SchemaError> {
    let conn = Connection::open_in_memory()?;
    create_schema(&conn)?;
    Ok(conn)
}

/// Get the current schema version, or 0 if no schema exists.
pub fn get_schema_version(conn: &Connection) -> Result<i32, SchemaError> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
        [],
        |row| row.get(0),
    )?;

    if !exists {
        return Ok(0);
    }

    let version: i32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )?;
    Ok(version)
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<(), SchemaError> {
    conn.execute(
        "INSERT INTO schema_version (version) VALUES (?1)",
        [version],
    )?;
    Ok(())
}

/// Run migrations from `from_version` up to `CURRENT_VERSION`.
fn migrate(conn: &Connection, from_version: i32) -> Result<(), SchemaError> {
    let mut version = from_version;
    while version < CURRENT_VERSION {
        if version == 1 {
            // Details columns, filled by the on-demand details fetch.
            conn.execute_batch(
                "ALTER TABLE releases ADD COLUMN description TEXT;
                 ALTER TABLE releases ADD COLUMN genres TEXT;
                 ALTER TABLE releases ADD COLUMN year INTEGER;
                 ALTER TABLE releases ADD COLUMN details_fetched_at INTEGER;",
            )?;
        }
        version += 1;
        set_schema_version(conn, version)?;
        log::debug!("Migrated library schema to version {}", version);
    }

    Ok(())
}

const SCHEMA_SQL: &str = r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER NOT NULL,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Catalog releases mirrored from the content API
CREATE TABLE IF NOT EXISTS releases (
    id INTEGER PRIMARY KEY CHECK (id > 0),
    title TEXT NOT NULL,
    status TEXT NOT NULL,
    episode_count INTEGER NOT NULL DEFAULT 0,
    poster TEXT,
    updated_at INTEGER NOT NULL,
    description TEXT,
    genres TEXT,
    year INTEGER,
    details_fetched_at INTEGER,
    stored_at TEXT NOT NULL DEFAULT (datetime('now'))
);
CREATE INDEX IF NOT EXISTS idx_releases_updated ON releases(updated_at, id);

-- Watch progress, one row per (release, episode)
CREATE TABLE IF NOT EXISTS history (
    release_id INTEGER NOT NULL CHECK (release_id > 0),
    episode INTEGER NOT NULL CHECK (episode > 0),
    position_secs INTEGER NOT NULL CHECK (position_secs >= 0),
    watched_at INTEGER NOT NULL,
    sync_state TEXT NOT NULL DEFAULT 'pending',
    revision INTEGER NOT NULL DEFAULT 1,
    PRIMARY KEY (release_id, episode)
);
CREATE INDEX IF NOT EXISTS idx_history_watched ON history(watched_at);
CREATE INDEX IF NOT EXISTS idx_history_pending ON history(sync_state) WHERE sync_state = 'pending';

-- Favorite membership; favorite = 0 rows are unacknowledged removals
CREATE TABLE IF NOT EXISTS favorites (
    release_id INTEGER PRIMARY KEY CHECK (release_id > 0),
    favorite BOOLEAN NOT NULL,
    changed_at INTEGER NOT NULL,
    sync_state TEXT NOT NULL DEFAULT 'pending',
    revision INTEGER NOT NULL DEFAULT 1
);
CREATE INDEX IF NOT EXISTS idx_favorites_pending ON favorites(sync_state) WHERE sync_state = 'pending';

-- Named options and sync bookkeeping (cursor, last success)
CREATE TABLE IF NOT EXISTS kv (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;
