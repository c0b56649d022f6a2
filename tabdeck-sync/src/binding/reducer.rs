//! Reducer binder.
//!
//! Layers a reducer over a store manager. Two kinds of input reach the
//! reducer:
//!
//! - [`StorageAction::Local`]: an action dispatched by the consumer. The
//!   new state is persisted through the manager.
//! - [`StorageAction::Hydrate`]: new data published by the manager. It
//!   replaces the state and is never written back.
//!
//! Writes made by this binder come back from the manager tagged with their
//! write sequence number. Those echoes are recognised by sequence number
//! and do not hydrate, so an older echo can never clobber a newer local
//! state.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, Mutex};

use tabdeck_core::{
    subscriber, ConfigurationError, PubSub, PubSubEvent, Subscriber, TabdeckError,
};
use tabdeck_storage::{StorageInterface, StoredValue};

use super::lock;
use crate::manager::{StoreManager, StoreManagerEvent};
use crate::registry::StoreManagerRegistry;
use crate::write::PendingWrite;

/// Input to the wrapped reducer.
#[derive(Debug, Clone, PartialEq)]
pub enum StorageAction<T, A> {
    /// Replace the state with data from the store.
    Hydrate(Option<T>),
    /// A consumer action.
    Local(A),
}

/// Where the current state came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadMarker {
    /// Hydrated from (or echoed by) the manager event with this index.
    Observed(u64),
    /// Produced by a local action and not yet confirmed by the store.
    PendingLocalWrite,
}

/// What a reducer binding currently shows.
#[derive(Debug, Clone, PartialEq)]
pub struct ReducerView<T> {
    pub state: Option<T>,
    pub is_initialized: bool,
    pub error: Option<TabdeckError>,
    pub marker: PayloadMarker,
}

type ReducerFn<T, A> = dyn Fn(Option<T>, A) -> Option<T> + Send + Sync;

struct ReducerCore<T> {
    state: Option<T>,
    is_initialized: bool,
    error: Option<TabdeckError>,
    marker: PayloadMarker,
    last_payload_index: u64,
    /// Writes sent by this binder whose echo has not arrived yet.
    unconfirmed_writes: BTreeSet<u64>,
}

impl<T: Clone> ReducerCore<T> {
    fn view(&self) -> ReducerView<T> {
        ReducerView {
            state: self.state.clone(),
            is_initialized: self.is_initialized,
            error: self.error.clone(),
            marker: self.marker,
        }
    }
}

fn apply<T, A>(reducer: &ReducerFn<T, A>, state: Option<T>, action: StorageAction<T, A>) -> Option<T> {
    match action {
        StorageAction::Hydrate(data) => data,
        StorageAction::Local(action) => reducer(state, action),
    }
}

pub struct StorageReducer<T: StoredValue, A: Send + 'static> {
    registry: Arc<StoreManagerRegistry>,
    storage: Arc<dyn StorageInterface<T>>,
    manager: Arc<StoreManager<T>>,
    reducer: Arc<ReducerFn<T, A>>,
    core: Arc<Mutex<ReducerCore<T>>>,
    updates: Arc<PubSub<ReducerView<T>>>,
    on_event: Subscriber<StoreManagerEvent<T>>,
}

impl<T: StoredValue, A: Send + 'static> StorageReducer<T, A> {
    pub fn attach<R>(
        registry: &Arc<StoreManagerRegistry>,
        storage: Arc<dyn StorageInterface<T>>,
        reducer: R,
    ) -> Result<Self, ConfigurationError>
    where
        R: Fn(Option<T>, A) -> Option<T> + Send + Sync + 'static,
    {
        let manager = registry.register(Arc::clone(&storage))?;
        let reducer: Arc<ReducerFn<T, A>> = Arc::new(reducer);
        let core = Arc::new(Mutex::new(ReducerCore {
            state: None,
            is_initialized: false,
            error: None,
            marker: PayloadMarker::Observed(0),
            last_payload_index: 0,
            unconfirmed_writes: BTreeSet::new(),
        }));
        let updates = Arc::new(PubSub::new());

        let on_event = {
            let core = Arc::clone(&core);
            let updates = Arc::clone(&updates);
            let reducer = Arc::clone(&reducer);
            subscriber(move |event: &StoreManagerEvent<T>| {
                if let Some(view) = handle_event(&core, reducer.as_ref(), event) {
                    updates.publish(&view);
                }
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
            reducer,
            core,
            updates,
            on_event,
        })
    }

    /// Run `action` through the reducer and persist the result.
    ///
    /// Fails before initialization. Returns the queued write, or `None`
    /// when the reducer produced no state.
    pub fn dispatch(&self, action: A) -> Result<Option<PendingWrite>, ConfigurationError> {
        let (pending, view) = {
            let mut core = lock(&self.core);
            if !core.is_initialized {
                return Err(ConfigurationError::DispatchBeforeInit {
                    key: self.storage.key().to_string(),
                });
            }

            core.marker = PayloadMarker::PendingLocalWrite;
            let previous = core.state.take();
            core.state = apply(self.reducer.as_ref(), previous, StorageAction::Local(action));

            // The write is queued under the lock so its echo cannot be
            // handled before the sequence number is recorded.
            let pending = match core.state.clone() {
                Some(state) => {
                    let pending = self.manager.set_data(state)?;
                    core.unconfirmed_writes.insert(pending.seq());
                    Some(pending)
                }
                None => None,
            };
            (pending, core.view())
        };

        self.updates.publish(&view);
        Ok(pending)
    }

    pub fn view(&self) -> ReducerView<T> {
        lock(&self.core).view()
    }

    pub fn state(&self) -> Option<T> {
        lock(&self.core).state.clone()
    }

    pub fn is_initialized(&self) -> bool {
        lock(&self.core).is_initialized
    }

    pub fn error(&self) -> Option<TabdeckError> {
        lock(&self.core).error.clone()
    }

    pub fn marker(&self) -> PayloadMarker {
        lock(&self.core).marker
    }

    pub fn updates(&self) -> &dyn PubSubEvent<ReducerView<T>> {
        self.updates.event()
    }

    pub fn manager(&self) -> &Arc<StoreManager<T>> {
        &self.manager
    }
}

fn handle_event<T: StoredValue, A>(
    core: &Mutex<ReducerCore<T>>,
    reducer: &ReducerFn<T, A>,
    event: &StoreManagerEvent<T>,
) -> Option<ReducerView<T>> {
    let mut core = lock(core);
    if event.payload_index <= core.last_payload_index {
        return None;
    }
    core.last_payload_index = event.payload_index;
    core.is_initialized = event.is_initialized;
    core.error = event.error.clone();

    if let Some(seq) = event.write_seq {
        if core.unconfirmed_writes.contains(&seq) {
            // Writes are applied in order, so anything older is settled too.
            core.unconfirmed_writes.retain(|pending| *pending > seq);
            if core.unconfirmed_writes.is_empty() {
                core.marker = PayloadMarker::Observed(event.payload_index);
            }
            return Some(core.view());
        }
    }

    // Someone else's data replaced ours; echoes still to come carry what
    // the store ends up holding and must hydrate.
    core.unconfirmed_writes.clear();
    let previous = core.state.take();
    core.state = apply(reducer, previous, StorageAction::Hydrate(event.data.clone()));
    core.marker = PayloadMarker::Observed(event.payload_index);
    Some(core.view())
}

impl<T: StoredValue, A: Send + 'static> Drop for StorageReducer<T, A> {
    fn drop(&mut self) {
        self.manager.data_event().unsubscribe(&self.on_event);
        if let Err(e) = self.registry.unregister(&self.storage) {
            tracing::error!(key = %self.storage.key(), error = %e, "Failed to release store manager");
        }
    }
}

impl<T: StoredValue, A: Send + 'static> fmt::Debug for StorageReducer<T, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let core = lock(&self.core);
        f.debug_struct("StorageReducer")
            .field("key", &self.storage.key())
            .field("is_initialized", &core.is_initialized)
            .field("marker", &core.marker)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabdeck_core::NotificationCenter;
    use tabdeck_storage::{
        ExternalChange, InMemoryMedium, Namespace, PersistedStorage, PersistenceMedium,
    };

    #[derive(Debug)]
    enum CounterAction {
        Add(i64),
        Reset,
    }

    fn counter(state: Option<i64>, action: CounterAction) -> Option<i64> {
        let state = state?;
        Some(match action {
            CounterAction::Add(n) => state + n,
            CounterAction::Reset => 0,
        })
    }

    fn setup(
        default_value: Option<i64>,
    ) -> (Arc<InMemoryMedium>, Arc<Namespace>, Arc<StoreManagerRegistry>, Arc<dyn StorageInterface<i64>>) {
        let medium = Arc::new(InMemoryMedium::new());
        let ns = Namespace::new(medium.clone());
        let store: Arc<dyn StorageInterface<i64>> =
            PersistedStorage::new(&ns, "counter", default_value).unwrap();
        let registry = Arc::new(StoreManagerRegistry::new(Arc::new(NotificationCenter::new())));
        (medium, ns, registry, store)
    }

    #[tokio::test]
    async fn test_dispatch_before_init_fails() {
        let (_, _, registry, store) = setup(Some(0));
        let binder = StorageReducer::attach(&registry, store, counter).unwrap();

        // The initial load has not run yet on this single-threaded runtime.
        let err = binder.dispatch(CounterAction::Add(1)).unwrap_err();

        assert_eq!(err, ConfigurationError::DispatchBeforeInit { key: "counter".into() });
        assert_eq!(err.to_string(), "Cannot dispatch data before initialization (re. counter)");
    }

    #[tokio::test]
    async fn test_hydrates_then_persists_local_actions() {
        let (medium, _, registry, store) = setup(Some(10));
        let binder = StorageReducer::attach(&registry, store, counter).unwrap();
        binder.manager().settled().await;
        assert_eq!(binder.state(), Some(10));

        let pending = binder.dispatch(CounterAction::Add(5)).unwrap().unwrap();
        assert_eq!(binder.state(), Some(15));
        assert_eq!(binder.marker(), PayloadMarker::PendingLocalWrite);

        pending.wait().await.unwrap();
        assert_eq!(medium.get("ps:counter").unwrap().as_deref(), Some("15"));
        assert_eq!(binder.state(), Some(15));
        assert_eq!(binder.marker(), PayloadMarker::Observed(2));
    }

    #[tokio::test]
    async fn test_stale_echo_does_not_clobber_newer_local_state() {
        let (_, _, registry, store) = setup(Some(0));
        let binder = StorageReducer::attach(&registry, store, counter).unwrap();
        binder.manager().settled().await;

        let first = binder.dispatch(CounterAction::Add(1)).unwrap().unwrap();
        let second = binder.dispatch(CounterAction::Add(1)).unwrap().unwrap();
        assert_eq!(binder.state(), Some(2));

        // The echo of the first write carries the older value.
        first.wait().await.unwrap();
        assert_eq!(binder.state(), Some(2));

        second.wait().await.unwrap();
        assert_eq!(binder.state(), Some(2));
        assert!(matches!(binder.marker(), PayloadMarker::Observed(_)));
    }

    #[tokio::test]
    async fn test_external_change_hydrates() {
        let (_, ns, registry, store) = setup(Some(0));
        let binder = StorageReducer::attach(&registry, store, counter).unwrap();
        binder.manager().settled().await;

        ns.dispatch_external_change(ExternalChange::updated("ps:counter", "42"));
        assert_eq!(binder.state(), Some(42));

        binder.dispatch(CounterAction::Reset).unwrap();
        assert_eq!(binder.state(), Some(0));
    }

    #[tokio::test]
    async fn test_other_binder_writes_hydrate() {
        let (_, _, registry, store) = setup(Some(1));
        let a = StorageReducer::attach(&registry, Arc::clone(&store), counter).unwrap();
        let b = StorageReducer::attach(&registry, store, counter).unwrap();
        a.manager().settled().await;

        a.dispatch(CounterAction::Add(2)).unwrap().unwrap().wait().await.unwrap();

        assert_eq!(a.state(), Some(3));
        assert_eq!(b.state(), Some(3));
    }

    #[tokio::test]
    async fn test_reducer_on_absent_state_writes_nothing() {
        let (medium, _, registry, store) = setup(None);
        let binder = StorageReducer::attach(&registry, store, counter).unwrap();
        binder.manager().settled().await;
        assert!(binder.is_initialized());

        assert!(binder.dispatch(CounterAction::Add(1)).unwrap().is_none());
        assert_eq!(medium.get("ps:counter").unwrap(), None);
    }
}
