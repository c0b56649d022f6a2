//! Store namespace: key registry and external-change dispatch.
//!
//! A [`Namespace`] is created once by the composition root and shared by
//! `Arc` with every store that lives in it. It owns:
//!
//! - the key prefix (`ps` unless told otherwise),
//! - the persistence medium,
//! - the set of taken keys (a key stays taken for the namespace's lifetime),
//! - the listener table used to route external changes to their store.
//!
//! External changes enter through [`Namespace::dispatch_external_change`].
//! Media that are shared between processes (LMDB) have no push channel, so
//! [`Namespace::poll_external_changes`] diffs the medium against the last
//! value this process observed and dispatches the difference. Local writes
//! go through [`Namespace::write_local`], which keeps polls away from the
//! key while the write is in flight, so they never echo.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use tabdeck_core::{ConfigurationError, StorageError};
use tokio::task::JoinHandle;

use crate::medium::PersistenceMedium;

/// Prefix used when none is given.
pub const DEFAULT_PREFIX: &str = "ps";

/// A modification made to the medium by another execution context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalChange {
    /// Namespaced key, e.g. `ps:settings`.
    pub key: String,
    /// Serialized new value; `None` means the key was removed.
    pub new_value: Option<String>,
}

impl ExternalChange {
    pub fn updated(key: impl Into<String>, new_value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            new_value: Some(new_value.into()),
        }
    }

    pub fn removed(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            new_value: None,
        }
    }
}

/// Callback a store registers to hear about external changes to its key.
pub type ExternalListener = Arc<dyn Fn(Option<&str>) + Send + Sync>;

struct Registration {
    listener: ExternalListener,
    last_seen: Option<String>,
    /// Local writes to this key that have not finished yet.
    local_writes: usize,
}

#[derive(Default)]
struct Registry {
    taken: HashSet<String>,
    listeners: HashMap<String, Registration>,
}

pub struct Namespace {
    prefix: String,
    medium: Arc<dyn PersistenceMedium>,
    registry: Mutex<Registry>,
}

impl Namespace {
    pub fn new(medium: Arc<dyn PersistenceMedium>) -> Arc<Self> {
        Self::with_prefix(medium, DEFAULT_PREFIX)
    }

    pub fn with_prefix(medium: Arc<dyn PersistenceMedium>, prefix: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            prefix: prefix.into(),
            medium,
            registry: Mutex::new(Registry::default()),
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn medium(&self) -> &Arc<dyn PersistenceMedium> {
        &self.medium
    }

    /// The key as stored in the medium.
    pub fn storage_key(&self, key: &str) -> String {
        format!("{}:{}", self.prefix, key)
    }

    pub fn is_taken(&self, key: &str) -> bool {
        self.lock().taken.contains(key)
    }

    /// Claim `key` and route external changes for it to `listener`.
    ///
    /// Returns the namespaced key. The value currently in the medium becomes
    /// the baseline for polling, so pre-existing data is not reported as a
    /// change.
    pub fn register(&self, key: &str, listener: ExternalListener) -> Result<String, ConfigurationError> {
        let storage_key = self.storage_key(key);
        let baseline = match self.medium.get(&storage_key) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key = %storage_key, error = %e, "Could not read baseline value");
                None
            }
        };

        let mut registry = self.lock();
        if !registry.taken.insert(key.to_string()) {
            return Err(ConfigurationError::KeyTaken {
                key: key.to_string(),
            });
        }
        registry.listeners.insert(
            storage_key.clone(),
            Registration {
                listener,
                last_seen: baseline,
                local_writes: 0,
            },
        );

        tracing::debug!(key = %storage_key, "Registered store");
        Ok(storage_key)
    }

    /// Write `value` (or remove the key, with `None`) as this process.
    ///
    /// Polls skip the key until the write has finished and the new value
    /// is recorded as seen, so the write is never reported as external.
    pub fn write_local(&self, storage_key: &str, value: Option<&str>) -> Result<(), StorageError> {
        if let Some(registration) = self.lock().listeners.get_mut(storage_key) {
            registration.local_writes += 1;
        }

        let result = match value {
            Some(value) => self.medium.set(storage_key, value),
            None => self.medium.remove(storage_key),
        };

        if let Some(registration) = self.lock().listeners.get_mut(storage_key) {
            registration.local_writes = registration.local_writes.saturating_sub(1);
            if result.is_ok() {
                registration.last_seen = value.map(str::to_string);
            }
        }
        result
    }

    /// Route an external change to the store that owns its key.
    ///
    /// Returns `false` when no store in this namespace owns the key.
    pub fn dispatch_external_change(&self, change: ExternalChange) -> bool {
        let listener = {
            let mut registry = self.lock();
            match registry.listeners.get_mut(&change.key) {
                Some(registration) => {
                    registration.last_seen = change.new_value.clone();
                    Arc::clone(&registration.listener)
                }
                None => {
                    tracing::trace!(key = %change.key, "Ignoring external change for unknown key");
                    return false;
                }
            }
        };

        tracing::debug!(key = %change.key, removed = change.new_value.is_none(), "Dispatching external change");
        listener(change.new_value.as_deref());
        true
    }

    /// Compare every registered key against the medium and dispatch the
    /// ones that changed since this process last saw them.
    ///
    /// Keys with a local write in flight are left for the next poll.
    /// Returns the number of dispatched changes.
    pub fn poll_external_changes(&self) -> Result<usize, StorageError> {
        let known: Vec<(String, Option<String>)> = self
            .lock()
            .listeners
            .iter()
            .filter(|(_, registration)| registration.local_writes == 0)
            .map(|(key, registration)| (key.clone(), registration.last_seen.clone()))
            .collect();

        let mut changes = Vec::new();
        for (key, last_seen) in known {
            let current = self.medium.get(&key)?;
            if current == last_seen {
                continue;
            }

            // A local write may have started or finished since the snapshot.
            let mut registry = self.lock();
            let Some(registration) = registry.listeners.get_mut(&key) else {
                continue;
            };
            if registration.local_writes > 0 || registration.last_seen != last_seen {
                continue;
            }
            registration.last_seen = current.clone();
            changes.push((Arc::clone(&registration.listener), key, current));
        }

        let count = changes.len();
        for (listener, key, current) in changes {
            tracing::debug!(key = %key, removed = current.is_none(), "Dispatching polled change");
            listener(current.as_deref());
        }
        Ok(count)
    }

    /// Poll for external changes every `interval` until the namespace is
    /// dropped.
    pub fn spawn_watcher(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let namespace: Weak<Namespace> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(namespace) = namespace.upgrade() else {
                    break;
                };
                if let Err(e) = namespace.poll_external_changes() {
                    tracing::warn!(error = %e, "External change poll failed");
                }
            }
            tracing::debug!("Namespace dropped, watcher stopped");
        })
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl std::fmt::Debug for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let registry = self.lock();
        f.debug_struct("Namespace")
            .field("prefix", &self.prefix)
            .field("taken", &registry.taken.len())
            .finish()
    }
}
