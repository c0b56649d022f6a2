//! Store manager.
//!
//! One [`StoreManager`] sits between a keyed store and every consumer of
//! that store. It keeps a single view of `{data, error, is_initialized,
//! payload_index}` and republishes it whenever it changes.
//!
//! # Initial load vs change events
//!
//! `init` subscribes to the store's change event and spawns one `get_item`
//! call. The two race:
//!
//! - A change event always wins. It overwrites data, clears the error,
//!   marks the manager initialized and bumps the payload index, whether or
//!   not the initial load has completed.
//! - The initial load checks `is_initialized` after it resumes and drops
//!   its result if a change event got there first.
//! - A `NotFound` load initializes the manager with no data and no error.
//!   Any other failure is recorded as the manager's error.
//!
//! Once initialized, a manager never goes back.
//!
//! # Writes
//!
//! `set_data` queues the value for a per-manager writer task, which
//! applies writes one at a time in call order. The store publishes the
//! written value on its change event, which comes back here tagged with
//! the write's sequence number. Only changes published while the writer
//! is polling its own `set_item` get the tag; a change dispatched from
//! elsewhere in the meantime stays untagged. Failed writes are reported to
//! the notifier.

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use tabdeck_core::{
    subscriber, ConfigurationError, Notification, Notifier, PubSub, PubSubEvent, Subscriber,
    TabdeckError, TabdeckResult,
};
use tabdeck_storage::{StorageInterface, StoredValue};
use tokio::sync::{mpsc, oneshot, watch};

use crate::write::PendingWrite;

/// Snapshot published by a [`StoreManager`].
#[derive(Debug, Clone, PartialEq)]
pub struct StoreManagerEvent<T> {
    pub data: Option<T>,
    pub error: Option<TabdeckError>,
    pub is_initialized: bool,
    /// Strictly increases with every published change.
    pub payload_index: u64,
    /// Set when the change came from this manager's own write.
    pub write_seq: Option<u64>,
}

struct ManagerState<T> {
    data: Option<T>,
    error: Option<TabdeckError>,
    is_initialized: bool,
    payload_index: u64,
    write_seq: Option<u64>,
}

impl<T: Clone> ManagerState<T> {
    fn event(&self) -> StoreManagerEvent<T> {
        StoreManagerEvent {
            data: self.data.clone(),
            error: self.error.clone(),
            is_initialized: self.is_initialized,
            payload_index: self.payload_index,
            write_seq: self.write_seq,
        }
    }
}

struct WriteRequest<T> {
    seq: u64,
    data: T,
    done: oneshot::Sender<TabdeckResult<()>>,
}

/// Write sequence numbers count up from here.
const FIRST_SEQ: u64 = 0;

static NEXT_MANAGER_ID: AtomicU64 = AtomicU64::new(1);

tokio::task_local! {
    /// `(manager id, write seq)` of the write the current task is applying.
    static APPLYING_WRITE: (u64, u64);
}

pub struct StoreManager<T: StoredValue> {
    id: u64,
    storage: Arc<dyn StorageInterface<T>>,
    notifier: Arc<dyn Notifier>,
    state: Mutex<ManagerState<T>>,
    hub: PubSub<StoreManagerEvent<T>>,
    change_subscriber: Mutex<Option<Subscriber<T>>>,
    writes: mpsc::UnboundedSender<WriteRequest<T>>,
    write_queue: Mutex<Option<mpsc::UnboundedReceiver<WriteRequest<T>>>>,
    next_write_seq: AtomicU64,
    initialized: watch::Sender<bool>,
    load_done: watch::Sender<bool>,
}

impl<T: StoredValue> StoreManager<T> {
    /// Create an idle manager. Nothing happens until [`StoreManager::init`].
    pub fn new(storage: Arc<dyn StorageInterface<T>>, notifier: Arc<dyn Notifier>) -> Arc<Self> {
        let (writes, write_queue) = mpsc::unbounded_channel();
        Arc::new(Self {
            id: NEXT_MANAGER_ID.fetch_add(1, Ordering::Relaxed),
            storage,
            notifier,
            state: Mutex::new(ManagerState {
                data: None,
                error: None,
                is_initialized: false,
                payload_index: 0,
                write_seq: None,
            }),
            hub: PubSub::new(),
            change_subscriber: Mutex::new(None),
            writes,
            write_queue: Mutex::new(Some(write_queue)),
            next_write_seq: AtomicU64::new(FIRST_SEQ),
            initialized: watch::channel(false).0,
            load_done: watch::channel(false).0,
        })
    }

    /// Subscribe to the store and start the initial load.
    ///
    /// Must run inside a tokio runtime. Calling it twice is a no-op.
    pub fn init(self: &Arc<Self>) -> Result<(), ConfigurationError> {
        let Some(write_queue) = lock(&self.write_queue).take() else {
            return Ok(());
        };

        let weak: Weak<Self> = Arc::downgrade(self);
        let on_change = subscriber(move |data: &T| {
            if let Some(manager) = weak.upgrade() {
                manager.handle_storage_change(data.clone());
            }
        });
        self.storage.change_event().subscribe(Arc::clone(&on_change))?;
        *lock(&self.change_subscriber) = Some(on_change);

        tokio::spawn(run_writer(
            self.id,
            Arc::clone(&self.storage),
            Arc::clone(&self.notifier),
            write_queue,
        ));

        let manager = Arc::clone(self);
        tokio::spawn(async move {
            manager.load_initial_data().await;
            manager.load_done.send_replace(true);
        });

        tracing::debug!(key = %self.key(), "Store manager initialized");
        Ok(())
    }

    /// Detach from the store.
    ///
    /// Fails if consumers are still subscribed to this manager.
    pub fn destroy(&self) -> Result<(), ConfigurationError> {
        if let Some(on_change) = lock(&self.change_subscriber).take() {
            self.storage.change_event().unsubscribe(&on_change);
        }

        let count = self.hub.subscriber_count();
        if count > 0 {
            return Err(ConfigurationError::OrphanSubscribers {
                key: self.key().to_string(),
                count,
            });
        }

        tracing::debug!(key = %self.key(), "Store manager destroyed");
        Ok(())
    }

    pub fn key(&self) -> &str {
        self.storage.key()
    }

    pub fn storage(&self) -> &Arc<dyn StorageInterface<T>> {
        &self.storage
    }

    /// Subscribe/unsubscribe facade. A subscriber added after
    /// initialization immediately receives the current event.
    ///
    /// Events are published after the state lock is released. When changes
    /// land on several threads at once, a subscriber may see a lower
    /// `payload_index` after a higher one; drop events whose index is not
    /// above the last one seen.
    pub fn data_event(&self) -> &dyn PubSubEvent<StoreManagerEvent<T>> {
        self
    }

    pub fn current_event(&self) -> StoreManagerEvent<T> {
        self.lock_state().event()
    }

    pub fn data(&self) -> Option<T> {
        self.lock_state().data.clone()
    }

    pub fn error(&self) -> Option<TabdeckError> {
        self.lock_state().error.clone()
    }

    pub fn is_initialized(&self) -> bool {
        self.lock_state().is_initialized
    }

    pub fn payload_index(&self) -> u64 {
        self.lock_state().payload_index
    }

    pub fn subscriber_count(&self) -> usize {
        self.hub.subscriber_count()
    }

    /// Resolve once the manager is initialized, by load or by change event.
    pub async fn initialized(&self) {
        let mut rx = self.initialized.subscribe();
        let _ = rx.wait_for(|initialized| *initialized).await;
    }

    /// Resolve once the initial load has finished, whether or not its
    /// result was used.
    pub async fn settled(&self) {
        let mut rx = self.load_done.subscribe();
        let _ = rx.wait_for(|done| *done).await;
    }

    /// Queue `data` for writing.
    ///
    /// Fails if the manager is not initialized. Write failures are not
    /// returned here; they go to the notifier.
    pub fn set_data(&self, data: T) -> Result<PendingWrite, ConfigurationError> {
        if !self.is_initialized() {
            return Err(ConfigurationError::NotInitialized {
                key: self.key().to_string(),
            });
        }

        let seq = self.next_write_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let (done, done_rx) = oneshot::channel();
        if let Err(mpsc::error::SendError(request)) = self.writes.send(WriteRequest { seq, data, done }) {
            // Writer gone (manager never initialized through `init`).
            let _ = request.done.send(Ok(()));
            tracing::warn!(key = %self.key(), seq, "Write dropped, writer is not running");
        }

        Ok(PendingWrite::new(seq, self.key().to_string(), done_rx))
    }

    fn handle_storage_change(&self, data: T) {
        let write_seq = APPLYING_WRITE
            .try_with(|&(manager, seq)| (manager == self.id).then_some(seq))
            .ok()
            .flatten();

        let event = {
            let mut state = self.lock_state();
            state.is_initialized = true;
            state.error = None;
            state.data = Some(data);
            state.payload_index += 1;
            state.write_seq = write_seq;
            state.event()
        };

        tracing::trace!(key = %self.key(), payload_index = event.payload_index, ?write_seq, "Store changed");
        self.initialized.send_replace(true);
        self.hub.publish(&event);
    }

    async fn load_initial_data(&self) {
        let result = self.storage.get_item().await;

        let event = {
            let mut state = self.lock_state();
            if state.is_initialized {
                tracing::debug!(key = %self.key(), "Initial load superseded by a change event");
                return;
            }

            state.is_initialized = true;
            state.write_seq = None;
            match result {
                Ok(data) => state.data = Some(data),
                Err(e) if e.is_not_found() => {
                    tracing::debug!(key = %self.key(), "Nothing stored yet");
                }
                Err(e) => {
                    tracing::warn!(key = %self.key(), error = %e, "Initial load failed");
                    state.error = Some(e);
                }
            }
            state.payload_index += 1;
            state.event()
        };

        self.initialized.send_replace(true);
        self.hub.publish(&event);
    }

    fn lock_state(&self) -> MutexGuard<'_, ManagerState<T>> {
        lock(&self.state)
    }
}

impl<T: StoredValue> PubSubEvent<StoreManagerEvent<T>> for StoreManager<T> {
    fn subscribe(&self, subscriber: Subscriber<StoreManagerEvent<T>>) -> Result<(), ConfigurationError> {
        self.hub.subscribe(Arc::clone(&subscriber))?;

        let current = {
            let state = self.lock_state();
            state.is_initialized.then(|| state.event())
        };
        if let Some(event) = current {
            subscriber(&event);
        }
        Ok(())
    }

    fn unsubscribe(&self, subscriber: &Subscriber<StoreManagerEvent<T>>) {
        self.hub.unsubscribe(subscriber);
    }
}

impl<T: StoredValue> fmt::Debug for StoreManager<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock_state();
        f.debug_struct("StoreManager")
            .field("key", &self.key())
            .field("is_initialized", &state.is_initialized)
            .field("payload_index", &state.payload_index)
            .field("subscribers", &self.hub.subscriber_count())
            .finish()
    }
}

/// Type-erased view the registry keeps of a manager.
pub(crate) trait RegisteredManager: Send + Sync {
    fn key(&self) -> &str;
    fn destroy(&self) -> Result<(), ConfigurationError>;
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: StoredValue> RegisteredManager for StoreManager<T> {
    fn key(&self) -> &str {
        StoreManager::key(self)
    }

    fn destroy(&self) -> Result<(), ConfigurationError> {
        StoreManager::destroy(self)
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

async fn run_writer<T: StoredValue>(
    manager: u64,
    storage: Arc<dyn StorageInterface<T>>,
    notifier: Arc<dyn Notifier>,
    mut queue: mpsc::UnboundedReceiver<WriteRequest<T>>,
) {
    while let Some(WriteRequest { seq, data, done }) = queue.recv().await {
        let result = APPLYING_WRITE.scope((manager, seq), storage.set_item(data)).await;

        if let Err(e) = &result {
            tracing::error!(key = %storage.key(), seq, error = %e, "Could not save data");
            notifier.notify(Notification::error(format!(
                "Could not save data to {} storage, error: {}. Data will be lost on page reloading.",
                storage.key(),
                e
            )));
        }
        let _ = done.send(result);
    }
}

fn lock<V>(mutex: &Mutex<V>) -> MutexGuard<'_, V> {
    mutex.lock().unwrap_or_else(|p| p.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use tabdeck_core::{NotificationCenter, StorageError};
    use tabdeck_storage::{InMemoryMedium, Namespace, PersistedStorage, PersistenceMedium};

    fn setup(
        default_value: Option<i32>,
    ) -> (Arc<InMemoryMedium>, Arc<NotificationCenter>, Arc<StoreManager<i32>>) {
        let medium = Arc::new(InMemoryMedium::new());
        let ns = Namespace::new(medium.clone());
        let store = PersistedStorage::new(&ns, "n", default_value).unwrap();
        let center = Arc::new(NotificationCenter::new());
        let manager = StoreManager::<i32>::new(store, center.clone());
        (medium, center, manager)
    }

    #[tokio::test]
    async fn test_initial_load_publishes_data() {
        let (medium, _, manager) = setup(None);
        medium.set("ps:n", "5").unwrap();

        manager.init().unwrap();
        manager.settled().await;

        let event = manager.current_event();
        assert!(event.is_initialized);
        assert_eq!(event.data, Some(5));
        assert_eq!(event.error, None);
        assert_eq!(event.payload_index, 1);
    }

    #[tokio::test]
    async fn test_not_found_initializes_silently() {
        let (_, _, manager) = setup(None);

        manager.init().unwrap();
        manager.settled().await;

        assert!(manager.is_initialized());
        assert_eq!(manager.data(), None);
        assert_eq!(manager.error(), None);
    }

    #[tokio::test]
    async fn test_load_failure_is_recorded() {
        let (medium, _, manager) = setup(None);
        medium.set("ps:n", "not a number").unwrap();

        manager.init().unwrap();
        manager.settled().await;

        assert!(manager.is_initialized());
        assert!(matches!(
            manager.error(),
            Some(TabdeckError::Storage(StorageError::Serialization { .. }))
        ));
    }

    #[tokio::test]
    async fn test_set_data_before_init_fails() {
        let (_, _, manager) = setup(Some(0));

        let err = manager.set_data(1).unwrap_err();

        assert_eq!(
            err.to_string(),
            "Cannot set data to the n storage until it is not initialized"
        );
    }

    #[tokio::test]
    async fn test_set_data_round_trips_with_write_seq() {
        let (medium, _, manager) = setup(Some(0));
        manager.init().unwrap();
        manager.settled().await;

        let pending = manager.set_data(7).unwrap();
        let seq = pending.seq();
        pending.wait().await.unwrap();

        let event = manager.current_event();
        assert_eq!(event.data, Some(7));
        assert_eq!(event.write_seq, Some(seq));
        assert_eq!(event.payload_index, 2);
        assert_eq!(medium.get("ps:n").unwrap().as_deref(), Some("7"));
    }

    #[tokio::test]
    async fn test_late_subscriber_gets_current_event_once() {
        let (_, _, manager) = setup(Some(3));
        manager.init().unwrap();
        manager.settled().await;

        let calls = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&calls);
        let sub = subscriber(move |event: &StoreManagerEvent<i32>| {
            assert_eq!(event.data, Some(3));
            c.fetch_add(1, Ordering::SeqCst);
        });
        manager.data_event().subscribe(Arc::clone(&sub)).unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        manager.data_event().unsubscribe(&sub);
    }

    #[tokio::test]
    async fn test_destroy_with_subscribers_fails() {
        let (_, _, manager) = setup(None);
        manager.init().unwrap();
        let sub = subscriber(|_: &StoreManagerEvent<i32>| {});
        manager.data_event().subscribe(Arc::clone(&sub)).unwrap();

        let err = manager.destroy().unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::OrphanSubscribers {
                key: "n".into(),
                count: 1
            }
        );

        manager.data_event().unsubscribe(&sub);
        assert!(manager.destroy().is_ok());
    }

    #[tokio::test]
    async fn test_destroy_detaches_from_store() {
        let (_, _, manager) = setup(Some(0));
        manager.init().unwrap();
        manager.settled().await;
        let storage = Arc::clone(manager.storage());

        manager.destroy().unwrap();
        storage.set_item(9).await.unwrap();

        assert_eq!(manager.payload_index(), 1);
    }
}
