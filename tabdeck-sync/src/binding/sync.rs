//! Lightweight binder that keeps caller-owned data in step with a store.
//!
//! Unlike the other binders it does not go through a store manager. It
//! loads the store once, listens to the store's change event, and pushes
//! local data back when it differs from what was last loaded or sent.
//! Equality is by content (`PartialEq`).

use std::fmt;
use std::sync::{Arc, Mutex};

use tabdeck_core::{subscriber, Notification, Notifier, Subscriber};
use tabdeck_storage::{StorageInterface, StoredValue};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::lock;

struct SyncState<T> {
    last_synced: T,
    is_initialized: bool,
    /// A change event arrived first; the initial load must not apply.
    ignore_initial_load: bool,
}

type OnSync<T> = dyn Fn(&T) + Send + Sync;

pub struct SyncWithStorage<T: StoredValue + PartialEq> {
    storage: Arc<dyn StorageInterface<T>>,
    notifier: Arc<dyn Notifier>,
    state: Arc<Mutex<SyncState<T>>>,
    on_change: Subscriber<T>,
    load_done: watch::Receiver<bool>,
}

impl<T: StoredValue + PartialEq> SyncWithStorage<T> {
    /// Start syncing. `on_sync` receives every value that should replace
    /// the caller's data. Must run inside a tokio runtime.
    pub fn start<F>(
        storage: Arc<dyn StorageInterface<T>>,
        local_data: T,
        on_sync: F,
        notifier: Arc<dyn Notifier>,
    ) -> Self
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let on_sync: Arc<OnSync<T>> = Arc::new(on_sync);
        let state = Arc::new(Mutex::new(SyncState {
            last_synced: local_data,
            is_initialized: false,
            ignore_initial_load: false,
        }));

        let on_change = {
            let state = Arc::clone(&state);
            let on_sync = Arc::clone(&on_sync);
            subscriber(move |data: &T| {
                {
                    let mut state = lock(&state);
                    if state.last_synced == *data {
                        return;
                    }
                    state.last_synced = data.clone();
                    state.is_initialized = true;
                    state.ignore_initial_load = true;
                }
                on_sync(data);
            })
        };
        // A fresh closure cannot already be subscribed.
        let _ = storage.change_event().subscribe(Arc::clone(&on_change));

        let (load_tx, load_done) = watch::channel(false);
        tokio::spawn(load_initial_data(
            Arc::clone(&storage),
            Arc::clone(&state),
            on_sync,
            Arc::clone(&notifier),
            load_tx,
        ));

        Self {
            storage,
            notifier,
            state,
            on_change,
            load_done,
        }
    }

    pub fn is_initialized(&self) -> bool {
        lock(&self.state).is_initialized
    }

    /// Resolve once the initial load has finished.
    pub async fn settled(&self) {
        let mut rx = self.load_done.clone();
        let _ = rx.wait_for(|done| *done).await;
    }

    /// Offer the caller's current data. It is written only when the binder
    /// is initialized and the data differs from the last synced value.
    pub fn push_local(&self, local_data: T) -> Option<JoinHandle<()>> {
        {
            let mut state = lock(&self.state);
            if !state.is_initialized || state.last_synced == local_data {
                return None;
            }
            state.last_synced = local_data.clone();
        }

        let storage = Arc::clone(&self.storage);
        let notifier = Arc::clone(&self.notifier);
        Some(tokio::spawn(async move {
            if let Err(e) = storage.set_item(local_data).await {
                tracing::error!(key = %storage.key(), error = %e, "Could not save data");
                notifier.notify(Notification::error(format!(
                    "Could not save data to {} storage, error: {}. Data will be lost on page reloading.",
                    storage.key(),
                    e
                )));
            }
        }))
    }
}

async fn load_initial_data<T: StoredValue + PartialEq>(
    storage: Arc<dyn StorageInterface<T>>,
    state: Arc<Mutex<SyncState<T>>>,
    on_sync: Arc<OnSync<T>>,
    notifier: Arc<dyn Notifier>,
    done: watch::Sender<bool>,
) {
    let result = storage.get_item().await;

    let synced = {
        let mut state = lock(&state);
        if state.ignore_initial_load {
            None
        } else {
            match result {
                Ok(data) => {
                    state.last_synced = data.clone();
                    state.is_initialized = true;
                    Some(data)
                }
                Err(e) if e.is_not_found() => {
                    state.is_initialized = true;
                    None
                }
                Err(e) => {
                    tracing::error!(key = %storage.key(), error = %e, "Could not load initial data");
                    notifier.notify(Notification::error(format!(
                        "Could not load initial data from {} storage, error: {}",
                        storage.key(),
                        e
                    )));
                    None
                }
            }
        }
    };

    if let Some(data) = synced {
        on_sync(&data);
    }
    done.send_replace(true);
}

impl<T: StoredValue + PartialEq> Drop for SyncWithStorage<T> {
    fn drop(&mut self) {
        self.storage.change_event().unsubscribe(&self.on_change);
    }
}

impl<T: StoredValue + PartialEq> fmt::Debug for SyncWithStorage<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncWithStorage")
            .field("key", &self.storage.key())
            .field("is_initialized", &self.is_initialized())
            .finish()
    }
}
