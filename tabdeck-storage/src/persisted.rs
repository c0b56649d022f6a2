//! Keyed persistent store.
//!
//! [`StorageInterface`] is the seam the sync layer and the async cache talk
//! to. [`PersistedStorage`] is the implementation over a [`Namespace`]: it
//! stores one JSON value per key and publishes on two events.
//!
//! - `change_event` fires for local writes and external changes.
//! - `outside_change_event` fires for external changes only.
//!
//! Removal publishes nothing; it shows up on the next `get_item`.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tabdeck_core::{ConfigurationError, PubSub, PubSubEvent, StorageError, TabdeckResult};

use crate::namespace::{ExternalListener, Namespace};

/// Values a store can hold: a JSON round trip must reproduce them.
pub trait StoredValue: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {}

impl<T> StoredValue for T where T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {}

/// Async key-value slot holding one value of type `T`.
#[async_trait]
pub trait StorageInterface<T: StoredValue>: Send + Sync {
    /// Un-namespaced key.
    fn key(&self) -> &str;

    /// Returned by `get_item` when the key is absent.
    fn default_value(&self) -> Option<&T>;

    /// Local and external changes.
    fn change_event(&self) -> &dyn PubSubEvent<T>;

    /// External changes only.
    fn outside_change_event(&self) -> &dyn PubSubEvent<T>;

    /// Read the value. Absent keys resolve to the default, or fail with
    /// `StorageError::NotFound` when there is none.
    async fn get_item(&self) -> TabdeckResult<T>;

    /// Write the value, then publish it on `change_event`.
    async fn set_item(&self, data: T) -> TabdeckResult<()>;

    /// Delete the value without publishing.
    async fn remove_item(&self) -> TabdeckResult<()>;
}

pub struct PersistedStorage<T: StoredValue> {
    key: String,
    storage_key: String,
    default_value: Option<T>,
    namespace: Arc<Namespace>,
    change: Arc<PubSub<T>>,
    outside_change: Arc<PubSub<T>>,
}

impl<T: StoredValue> PersistedStorage<T> {
    /// Create the store for `key`, claiming it in `namespace`.
    ///
    /// Fails with `KeyTaken` if another store already owns the key.
    pub fn new(
        namespace: &Arc<Namespace>,
        key: impl Into<String>,
        default_value: Option<T>,
    ) -> Result<Arc<Self>, ConfigurationError> {
        let key = key.into();
        let change = Arc::new(PubSub::new());
        let outside_change = Arc::new(PubSub::new());

        let listener = external_listener(
            namespace.storage_key(&key),
            default_value.clone(),
            Arc::clone(&change),
            Arc::clone(&outside_change),
        );
        let storage_key = namespace.register(&key, listener)?;

        Ok(Arc::new(Self {
            key,
            storage_key,
            default_value,
            namespace: Arc::clone(namespace),
            change,
            outside_change,
        }))
    }

    /// The key as stored in the medium.
    pub fn storage_key(&self) -> &str {
        &self.storage_key
    }

    fn not_found(&self) -> StorageError {
        StorageError::NotFound {
            key: self.key.clone(),
        }
    }
}

fn external_listener<T: StoredValue>(
    storage_key: String,
    default_value: Option<T>,
    change: Arc<PubSub<T>>,
    outside_change: Arc<PubSub<T>>,
) -> ExternalListener {
    Arc::new(move |raw: Option<&str>| {
        let value = match raw.filter(|raw| !raw.is_empty()) {
            Some(raw) => match serde_json::from_str::<T>(raw) {
                Ok(value) => Some(value),
                Err(e) => {
                    tracing::warn!(key = %storage_key, error = %e, "Dropping unparsable external value");
                    return;
                }
            },
            None => default_value.clone(),
        };

        // Removed with no default: nothing meaningful to publish.
        let Some(value) = value else {
            return;
        };

        outside_change.publish(&value);
        change.publish(&value);
    })
}

#[async_trait]
impl<T: StoredValue> StorageInterface<T> for PersistedStorage<T> {
    fn key(&self) -> &str {
        &self.key
    }

    fn default_value(&self) -> Option<&T> {
        self.default_value.as_ref()
    }

    fn change_event(&self) -> &dyn PubSubEvent<T> {
        self.change.event()
    }

    fn outside_change_event(&self) -> &dyn PubSubEvent<T> {
        self.outside_change.event()
    }

    async fn get_item(&self) -> TabdeckResult<T> {
        let raw = self.namespace.medium().get(&self.storage_key)?;

        match raw.filter(|raw| !raw.is_empty()) {
            Some(raw) => serde_json::from_str(&raw).map_err(|e| {
                StorageError::Serialization {
                    key: self.key.clone(),
                    reason: e.to_string(),
                }
                .into()
            }),
            None => match &self.default_value {
                Some(default) => Ok(default.clone()),
                None => Err(self.not_found().into()),
            },
        }
    }

    async fn set_item(&self, data: T) -> TabdeckResult<()> {
        let raw = serde_json::to_string(&data).map_err(|e| StorageError::Serialization {
            key: self.key.clone(),
            reason: e.to_string(),
        })?;

        self.namespace.write_local(&self.storage_key, Some(&raw))?;

        self.change.publish(&data);
        Ok(())
    }

    async fn remove_item(&self) -> TabdeckResult<()> {
        self.namespace.write_local(&self.storage_key, None)?;
        Ok(())
    }
}

impl<T: StoredValue> fmt::Debug for PersistedStorage<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistedStorage")
            .field("key", &self.key)
            .field("storage_key", &self.storage_key)
            .field("has_default", &self.default_value.is_some())
            .finish()
    }
}
