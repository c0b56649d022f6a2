//! tabdeck dashboard.
//!
//! The concrete stores, reducers and caches of the new tab dashboard, and
//! [`Dashboard`], which wires them to a persistence medium.

pub mod caches;
pub mod config;
pub mod daytime;
pub mod error;
pub mod images;
pub mod models;
pub mod quotes;
pub mod rotation;
pub mod shortcuts;
pub mod stores;
pub mod telemetry;
pub mod todo;

use std::sync::Arc;

use tabdeck_core::{ConfigurationError, NotificationCenter};
use tabdeck_storage::{AsyncCache, LmdbMedium, Namespace, PersistenceMedium};
use tabdeck_sync::{FromStorage, StorageBinding, StoreManagerRegistry};
use tokio::task::JoinHandle;

pub use config::DashboardConfig;
pub use error::{DashboardError, DashboardResult};

use crate::images::{ImageRepository, PhotoFetcher};
use crate::models::{ImageModel, QuoteModel, SettingsModel};
use crate::quotes::QuoteRepository;
use crate::rotation::{spawn_image_rotation, until_next_period, ImageRotation};
use crate::shortcuts::{attach_shortcuts, ShortcutReducer};
use crate::stores::DashboardStores;
use crate::todo::{attach_to_do, ToDoReducer};

/// Composition root: one namespace, one manager registry, the stores and
/// the caches over a single medium.
pub struct Dashboard {
    namespace: Arc<Namespace>,
    registry: Arc<StoreManagerRegistry>,
    notifications: Arc<NotificationCenter>,
    stores: DashboardStores,
    quote_cache: Arc<AsyncCache<QuoteModel>>,
    image_cache: Arc<AsyncCache<ImageModel>>,
    watcher: JoinHandle<()>,
}

impl Dashboard {
    /// Open the LMDB medium under `config.data_dir` and build everything on
    /// it. Must run inside a tokio runtime.
    pub fn open(config: &DashboardConfig) -> DashboardResult<Self> {
        config.validate()?;
        let medium = LmdbMedium::open(&config.data_dir, config.map_size_mb)?;
        tracing::info!(path = %config.data_dir.display(), "Opened medium");
        Self::with_medium(config, Arc::new(medium))
    }

    /// Build on an already open medium.
    pub fn with_medium(config: &DashboardConfig, medium: Arc<dyn PersistenceMedium>) -> DashboardResult<Self> {
        let namespace = Namespace::with_prefix(medium, config.namespace.clone());
        let notifications = Arc::new(NotificationCenter::new());
        let registry = Arc::new(StoreManagerRegistry::new(notifications.clone()));
        let stores = DashboardStores::create(&namespace)?;

        let quote_cache = caches::quote_cache(&namespace, config.quote_cache_ttl())?;
        quote_cache.set_source(Arc::new(QuoteRepository::new(&config.quotes_dir)));
        let image_cache = caches::image_cache(&namespace, config.image_cache_ttl())?;

        let watcher = namespace.spawn_watcher(config.watch_interval());
        tracing::info!(namespace = %config.namespace, "Dashboard ready");

        Ok(Self {
            namespace,
            registry,
            notifications,
            stores,
            quote_cache: Arc::new(quote_cache),
            image_cache: Arc::new(image_cache),
            watcher,
        })
    }

    pub fn namespace(&self) -> &Arc<Namespace> {
        &self.namespace
    }

    pub fn registry(&self) -> &Arc<StoreManagerRegistry> {
        &self.registry
    }

    /// Write failures and other user-facing messages.
    pub fn notifications(&self) -> &Arc<NotificationCenter> {
        &self.notifications
    }

    pub fn stores(&self) -> &DashboardStores {
        &self.stores
    }

    pub fn quote_cache(&self) -> &Arc<AsyncCache<QuoteModel>> {
        &self.quote_cache
    }

    pub fn image_cache(&self) -> &Arc<AsyncCache<ImageModel>> {
        &self.image_cache
    }

    /// Editable view of the settings.
    pub fn settings(&self) -> Result<StorageBinding<SettingsModel>, ConfigurationError> {
        StorageBinding::attach(&self.registry, Arc::clone(&self.stores.settings))
    }

    /// Read-only view of the settings.
    pub fn settings_view(&self) -> Result<FromStorage<SettingsModel>, ConfigurationError> {
        FromStorage::attach(&self.registry, Arc::clone(&self.stores.settings))
    }

    pub fn to_do(&self) -> Result<ToDoReducer, ConfigurationError> {
        attach_to_do(&self.registry, Arc::clone(&self.stores.to_do))
    }

    pub fn shortcuts(&self) -> Result<ShortcutReducer, ConfigurationError> {
        attach_shortcuts(&self.registry, Arc::clone(&self.stores.shortcuts))
    }

    /// Plug in the transport for background images.
    pub fn set_photo_fetcher(&self, fetcher: Arc<dyn PhotoFetcher>) {
        self.image_cache.set_source(Arc::new(ImageRepository::new(fetcher)));
    }

    /// Rotate the background image at every day-period boundary.
    pub fn start_image_rotation(&self) -> ImageRotation {
        spawn_image_rotation(Arc::clone(&self.image_cache), until_next_period)
    }
}

impl Drop for Dashboard {
    fn drop(&mut self) {
        self.watcher.abort();
    }
}

impl std::fmt::Debug for Dashboard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dashboard")
            .field("namespace", &self.namespace)
            .field("registry", &self.registry)
            .field("stores", &self.stores)
            .finish()
    }
}
