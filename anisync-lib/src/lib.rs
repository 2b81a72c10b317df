//! Application layer of the anisync client.
//!
//! Settings, the image cache, analytics batching and the synchronization
//! engine, plus [`Services`], which wires them to the store and the remote
//! client.

pub mod analytics;
pub mod async_util;
pub mod backoff;
pub mod error;
pub mod image_cache;
pub mod services;
pub mod settings;
pub mod sync;

pub use analytics::AnalyticsBatcher;
pub use backoff::{Backoff, BackoffPolicy};
pub use error::{FetchError, ServicesError, SettingsError, SyncError, SyncErrorKind};
pub use image_cache::{CacheStats, ImageCache, ImageCacheConfig};
pub use services::{ServicePaths, Services};
pub use settings::{ApplicationSettings, SettingKey, SettingValue};
pub use sync::{
    EngineConfig, NetworkState, SchedulerHandle, SessionSummary, SyncEngine, SyncEvent, SyncPhase,
    SyncReason, SyncRequest,
};
