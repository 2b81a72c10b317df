//! Typed client for the remote content API.
//!
//! [`ApiClient`] talks HTTP; the traits in [`api`] are what the rest of the
//! application depends on.

pub mod api;
pub mod client;
pub mod error;
pub mod types;

pub use api::{AnalyticsSink, CatalogApi, MediaSource};
pub use client::ApiClient;
pub use error::ApiError;
pub use types::{AnalyticsEvent, CatalogPage, FavoriteAck, HistoryAck};
