//! Explicit construction of the application's services.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anisync_client::ApiClient;
use anisync_db::LocalStore;

use crate::analytics::AnalyticsBatcher;
use crate::error::ServicesError;
use crate::image_cache::{ImageCache, ImageCacheConfig};
use crate::settings::{self, ApplicationSettings};
use crate::sync::{EngineConfig, SyncEngine};

/// Where on disk the services keep their data.
#[derive(Debug, Clone)]
pub struct ServicePaths {
    pub database: PathBuf,
    pub image_dir: PathBuf,
}

impl Default for ServicePaths {
    fn default() -> Self {
        Self {
            database: settings::default_database_path(),
            image_dir: settings::default_image_cache_dir(),
        }
    }
}

/// Every long-lived service, wired together once at process start.
///
/// Frontends hold this (or clones of the handles inside it) and talk to the
/// engine through its intents and event channel.
pub struct Services {
    pub settings: Arc<ApplicationSettings>,
    pub store: Arc<LocalStore>,
    pub client: Arc<ApiClient>,
    pub images: ImageCache,
    pub analytics: Arc<AnalyticsBatcher>,
    pub engine: SyncEngine,
}

impl Services {
    pub fn build(settings: ApplicationSettings, paths: ServicePaths) -> Result<Self, ServicesError> {
        let settings = Arc::new(settings);
        let store = Arc::new(LocalStore::open(&paths.database)?);
        let client = Arc::new(ApiClient::new(settings.api_base())?);
        log::debug!("API base: {}", client.base_url());

        let images = ImageCache::open(
            ImageCacheConfig::new(&paths.image_dir, settings.image_budget_bytes()),
            client.clone(),
        )?;
        let analytics = Arc::new(AnalyticsBatcher::new(client.clone()));
        let engine = SyncEngine::builder(Arc::clone(&store), client.clone())
            .config(EngineConfig::from_settings(&settings))
            .image_cache(images.clone())
            .analytics(Arc::clone(&analytics))
            .build();

        Ok(Self {
            settings,
            store,
            client,
            images,
            analytics,
            engine,
        })
    }

    /// Stop a running session and flush what is buffered.
    pub async fn shutdown(&self) {
        self.engine.cancel();
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while self.engine.is_active() && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        if let Err(e) = self.analytics.flush().await {
            log::debug!("Analytics flush at shutdown failed: {}", e);
        }
        self.images.save_index().await;
    }
}
