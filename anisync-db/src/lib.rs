//! SQLite persistence layer for the local library.
//!
//! Provides schema creation, write operations and query APIs backed by
//! SQLite (via rusqlite with bundled feature), plus [`LocalStore`], the
//! shared handle the rest of the application goes through.

pub mod operations;
pub mod queries;
pub mod schema;
pub mod store;

pub use operations::{
    CURSOR_KEY, LAST_SUCCESS_KEY, StoreError, delete_value, get_value, mark_favorite_synced,
    mark_history_synced, put_value, record_watched, set_favorite, store_release_details,
    toggle_favorite, upsert_release,
};
pub use queries::{
    StoreStats, favorite_releases, favorites, get_history_entry, get_release,
    get_release_details, history, history_for_release, is_favorite, pending_favorites,
    pending_history, recently_updated, release_timestamps, releases_for_view,
    releases_updated_since, store_stats, watched_releases,
};
pub use schema::{SchemaError, open_database, open_memory};
pub use store::{LocalStore, PageCommit};
