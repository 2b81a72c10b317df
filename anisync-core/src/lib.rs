//! Core data model for the anisync catalog client.
//!
//! Types shared by the store, the remote client and the synchronization
//! engine. Nothing in here does I/O.

pub mod error;
pub mod release;
pub mod user_state;
pub mod view;

pub use error::ModelError;
pub use release::{Release, ReleaseDetails, ReleaseId, ReleaseStatus};
pub use user_state::{FavoriteEntry, HistoryEntry, SyncState};
pub use view::ViewMode;

/// Default base path of the content API.
pub const DEFAULT_API_BASE: &str = "https://anilibriasmartservice.azurewebsites.net";

/// Default base path for posters and other media.
pub const DEFAULT_MEDIA_BASE: &str = "https://static.wwnd.space";

/// Application version shown to the UI layer.
pub const APPLICATION_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Join a media path onto a base path.
///
/// Absolute URLs are returned unchanged so callers can pass whatever the
/// API handed them.
pub fn media_url(base: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
