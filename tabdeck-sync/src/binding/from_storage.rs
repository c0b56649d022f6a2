//! Read-only binder.

use std::sync::Arc;

use tabdeck_core::{ConfigurationError, PubSubEvent, TabdeckError};
use tabdeck_storage::{StorageInterface, StoredValue};

use super::value::{BindingView, StorageBinding};
use crate::registry::StoreManagerRegistry;

/// A [`StorageBinding`] without the setter, for consumers that only display
/// a store.
#[derive(Debug)]
pub struct FromStorage<T: StoredValue> {
    binding: StorageBinding<T>,
}

impl<T: StoredValue> FromStorage<T> {
    pub fn attach(
        registry: &Arc<StoreManagerRegistry>,
        storage: Arc<dyn StorageInterface<T>>,
    ) -> Result<Self, ConfigurationError> {
        Ok(Self {
            binding: StorageBinding::attach(registry, storage)?,
        })
    }

    pub fn data(&self) -> Option<T> {
        self.binding.data()
    }

    pub fn is_initialized(&self) -> bool {
        self.binding.is_initialized()
    }

    pub fn error(&self) -> Option<TabdeckError> {
        self.binding.error()
    }

    pub fn updates(&self) -> &dyn PubSubEvent<BindingView<T>> {
        self.binding.updates()
    }

    /// Resolve once the underlying manager is initialized.
    pub async fn initialized(&self) {
        self.binding.manager().initialized().await
    }
}
