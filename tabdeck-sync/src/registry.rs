//! Reference-counted store manager registry.
//!
//! Consumers of the same store share one manager. The first registration
//! creates and initializes it, later ones bump a counter, and the last
//! unregistration destroys it. Stores are identified by their `Arc`
//! allocation; the registry keeps the store alive while an entry exists,
//! so an identity cannot be reused under it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use once_cell::sync::Lazy;
use tabdeck_core::{ConfigurationError, NotificationCenter, Notifier};
use tabdeck_storage::{StorageInterface, StoredValue};

use crate::manager::{RegisteredManager, StoreManager};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct StoreId(usize);

impl StoreId {
    fn of<T: StoredValue>(storage: &Arc<dyn StorageInterface<T>>) -> Self {
        Self(Arc::as_ptr(storage) as *const () as usize)
    }
}

struct Entry {
    manager: Arc<dyn RegisteredManager>,
    instance_count: usize,
}

pub struct StoreManagerRegistry {
    managers: Mutex<HashMap<StoreId, Entry>>,
    notifier: Arc<dyn Notifier>,
}

static GLOBAL_REGISTRY: Lazy<Arc<StoreManagerRegistry>> =
    Lazy::new(|| Arc::new(StoreManagerRegistry::new(NotificationCenter::global())));

impl StoreManagerRegistry {
    /// A registry whose managers report write failures to `notifier`.
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self {
            managers: Mutex::new(HashMap::new()),
            notifier,
        }
    }

    /// The process-wide registry, reporting to the global notification center.
    pub fn global() -> Arc<StoreManagerRegistry> {
        Arc::clone(&GLOBAL_REGISTRY)
    }

    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.notifier
    }

    /// Get the manager for `storage`, creating and initializing it on first
    /// use. Must run inside a tokio runtime.
    pub fn register<T: StoredValue>(
        &self,
        storage: Arc<dyn StorageInterface<T>>,
    ) -> Result<Arc<StoreManager<T>>, ConfigurationError> {
        let id = StoreId::of(&storage);
        let mut managers = self.lock();

        if let Some(entry) = managers.get_mut(&id) {
            let manager = Arc::clone(&entry.manager)
                .into_any()
                .downcast::<StoreManager<T>>()
                .map_err(|_| ConfigurationError::ManagerTypeMismatch {
                    key: storage.key().to_string(),
                })?;
            entry.instance_count += 1;
            tracing::trace!(key = %storage.key(), instances = entry.instance_count, "Reusing store manager");
            return Ok(manager);
        }

        let manager = StoreManager::new(storage, Arc::clone(&self.notifier));
        manager.init()?;
        managers.insert(
            id,
            Entry {
                manager: Arc::clone(&manager) as Arc<dyn RegisteredManager>,
                instance_count: 1,
            },
        );
        tracing::debug!(key = %manager.key(), "Created store manager");
        Ok(manager)
    }

    /// Release one registration. The last one destroys the manager, which
    /// fails if its subscribers were not detached first.
    pub fn unregister<T: StoredValue>(
        &self,
        storage: &Arc<dyn StorageInterface<T>>,
    ) -> Result<(), ConfigurationError> {
        let id = StoreId::of(storage);
        let released = {
            let mut managers = self.lock();
            let Some(entry) = managers.get_mut(&id) else {
                return Ok(());
            };

            entry.instance_count -= 1;
            if entry.instance_count > 0 {
                return Ok(());
            }
            managers.remove(&id).map(|entry| entry.manager)
        };

        match released {
            Some(manager) => {
                tracing::debug!(key = %manager.key(), "Releasing store manager");
                manager.destroy()
            }
            None => Ok(()),
        }
    }

    /// Live registrations for `storage`; zero when it has no manager.
    pub fn instance_count<T: StoredValue>(&self, storage: &Arc<dyn StorageInterface<T>>) -> usize {
        self.lock()
            .get(&StoreId::of(storage))
            .map(|entry| entry.instance_count)
            .unwrap_or(0)
    }

    /// Number of live managers.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<StoreId, Entry>> {
        self.managers.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl std::fmt::Debug for StoreManagerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreManagerRegistry")
            .field("managers", &self.len())
            .finish()
    }
}
