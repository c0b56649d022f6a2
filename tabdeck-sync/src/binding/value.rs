//! Value binder: one consumer's view of a store manager.

use std::fmt;
use std::sync::{Arc, Mutex};

use tabdeck_core::{subscriber, ConfigurationError, PubSub, PubSubEvent, Subscriber, TabdeckError};
use tabdeck_storage::{StorageInterface, StoredValue};

use super::lock;
use crate::manager::{StoreManager, StoreManagerEvent};
use crate::registry::StoreManagerRegistry;
use crate::write::PendingWrite;

/// What a binding currently shows.
#[derive(Debug, Clone, PartialEq)]
pub struct BindingView<T> {
    pub data: Option<T>,
    pub is_initialized: bool,
    pub error: Option<TabdeckError>,
    pub payload_index: u64,
}

impl<T> Default for BindingView<T> {
    fn default() -> Self {
        Self {
            data: None,
            is_initialized: false,
            error: None,
            payload_index: 0,
        }
    }
}

/// Binds one consumer to the shared manager of a store.
///
/// Registers with the registry on attach and releases on drop. Manager
/// events are folded into a [`BindingView`]; events whose payload index
/// the binding has already seen are skipped, so `updates()` fires only for
/// genuinely new states.
pub struct StorageBinding<T: StoredValue> {
    registry: Arc<StoreManagerRegistry>,
    storage: Arc<dyn StorageInterface<T>>,
    manager: Arc<StoreManager<T>>,
    view: Arc<Mutex<BindingView<T>>>,
    updates: Arc<PubSub<BindingView<T>>>,
    on_event: Subscriber<StoreManagerEvent<T>>,
}

impl<T: StoredValue> StorageBinding<T> {
    pub fn attach(
        registry: &Arc<StoreManagerRegistry>,
        storage: Arc<dyn StorageInterface<T>>,
    ) -> Result<Self, ConfigurationError> {
        let manager = registry.register(Arc::clone(&storage))?;
        let view = Arc::new(Mutex::new(BindingView::default()));
        let updates = Arc::new(PubSub::new());

        let on_event = {
            let view = Arc::clone(&view);
            let updates = Arc::clone(&updates);
            subscriber(move |event: &StoreManagerEvent<T>| {
                let next = {
                    let mut view = lock(&view);
                    if event.payload_index <= view.payload_index {
                        return;
                    }
                    *view = BindingView {
                        data: event.data.clone(),
                        is_initialized: event.is_initialized,
                        error: event.error.clone(),
                        payload_index: event.payload_index,
                    };
                    view.clone()
                };
                updates.publish(&next);
            })
        };

        if let Err(e) = manager.data_event().subscribe(Arc::clone(&on_event)) {
            let _ = registry.unregister(&storage);
            return Err(e);
        }

        Ok(Self {
            registry: Arc::clone(registry),
            storage,
            manager,
            view,
            updates,
            on_event,
        })
    }

    pub fn view(&self) -> BindingView<T> {
        lock(&self.view).clone()
    }

    pub fn data(&self) -> Option<T> {
        lock(&self.view).data.clone()
    }

    pub fn is_initialized(&self) -> bool {
        lock(&self.view).is_initialized
    }

    pub fn error(&self) -> Option<TabdeckError> {
        lock(&self.view).error.clone()
    }

    /// Write through the shared manager.
    pub fn set_data(&self, data: T) -> Result<PendingWrite, ConfigurationError> {
        self.manager.set_data(data)
    }

    /// Fires each time the view changes.
    pub fn updates(&self) -> &dyn PubSubEvent<BindingView<T>> {
        self.updates.event()
    }

    pub fn manager(&self) -> &Arc<StoreManager<T>> {
        &self.manager
    }
}

impl<T: StoredValue> Drop for StorageBinding<T> {
    fn drop(&mut self) {
        self.manager.data_event().unsubscribe(&self.on_event);
        if let Err(e) = self.registry.unregister(&self.storage) {
            tracing::error!(key = %self.storage.key(), error = %e, "Failed to release store manager");
        }
    }
}

impl<T: StoredValue> fmt::Debug for StorageBinding<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let view = lock(&self.view);
        f.debug_struct("StorageBinding")
            .field("key", &self.storage.key())
            .field("is_initialized", &view.is_initialized)
            .field("payload_index", &view.payload_index)
            .finish()
    }
}
