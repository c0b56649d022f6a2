//! tabdeck Test Utilities
//!
//! Shared test infrastructure for the tabdeck workspace:
//! - Test doubles: a medium that fails on demand, a store whose initial
//!   load is held until released, a scripted cache source
//! - Proptest generators for keys, TTLs and stored payloads
//! - Fixtures for common scenarios
//! - Assertions over tabdeck error variants

pub use tabdeck_core::{
    subscriber, CacheError, ConfigurationError, Notification, NotificationCenter,
    NotificationLevel, PubSub, PubSubEvent, StorageError, Subscriber, TabdeckError, TabdeckResult,
};
pub use tabdeck_storage::{
    DataSource, InMemoryMedium, Namespace, PersistedStorage, PersistenceMedium, SourceError,
    StorageInterface, StoredValue,
};

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::watch;
use uuid::Uuid;

fn lock<V>(mutex: &Mutex<V>) -> MutexGuard<'_, V> {
    mutex.lock().unwrap_or_else(|p| p.into_inner())
}

// ============================================================================
// TEST DOUBLES
// ============================================================================

/// In-memory medium whose operations can be switched to fail.
#[derive(Debug, Default)]
pub struct FlakyMedium {
    inner: InMemoryMedium,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    fail_removes: AtomicBool,
    writes: AtomicUsize,
}

impl FlakyMedium {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_removes(&self, fail: bool) {
        self.fail_removes.store(fail, Ordering::SeqCst);
    }

    /// Successful writes so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl PersistenceMedium for FlakyMedium {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StorageError::ReadFailed {
                key: key.to_string(),
                reason: "injected read failure".to_string(),
            });
        }
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::WriteFailed {
                key: key.to_string(),
                reason: "quota exceeded".to_string(),
            });
        }
        self.inner.set(key, value)?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        if self.fail_removes.load(Ordering::SeqCst) {
            return Err(StorageError::RemoveFailed {
                key: key.to_string(),
                reason: "injected remove failure".to_string(),
            });
        }
        self.inner.remove(key)
    }
}

/// Store whose `get_item` blocks until [`GatedStorage::release`].
///
/// Lets a test fire change events while the initial load of a manager or
/// binder is still pending. Writes can be held the same way with
/// [`GatedStorage::hold_writes`].
pub struct GatedStorage<T: StoredValue> {
    key: String,
    default_value: Option<T>,
    value: Mutex<Option<T>>,
    gate: watch::Sender<bool>,
    write_gate: watch::Sender<bool>,
    held_writes: AtomicUsize,
    change: PubSub<T>,
    outside_change: PubSub<T>,
    loads: AtomicUsize,
}

impl<T: StoredValue> GatedStorage<T> {
    /// `stored` is what the held load resolves to once released.
    pub fn new(key: impl Into<String>, stored: Option<T>) -> Arc<Self> {
        Arc::new(Self {
            key: key.into(),
            default_value: None,
            value: Mutex::new(stored),
            gate: watch::channel(false).0,
            write_gate: watch::channel(true).0,
            held_writes: AtomicUsize::new(0),
            change: PubSub::new(),
            outside_change: PubSub::new(),
            loads: AtomicUsize::new(0),
        })
    }

    /// Let every pending and future `get_item` through.
    pub fn release(&self) {
        self.gate.send_replace(true);
    }

    /// Park every following `set_item` until [`GatedStorage::release_writes`].
    pub fn hold_writes(&self) {
        self.write_gate.send_replace(false);
    }

    pub fn release_writes(&self) {
        self.write_gate.send_replace(true);
    }

    /// `set_item` calls currently parked by [`GatedStorage::hold_writes`].
    pub fn held_writes(&self) -> usize {
        self.held_writes.load(Ordering::SeqCst)
    }

    /// Simulate a change made elsewhere.
    pub fn emit_change(&self, data: T) {
        *lock(&self.value) = Some(data.clone());
        self.outside_change.publish(&data);
        self.change.publish(&data);
    }

    pub fn stored(&self) -> Option<T> {
        lock(&self.value).clone()
    }

    /// `get_item` calls started so far.
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn change_subscriber_count(&self) -> usize {
        self.change.subscriber_count()
    }
}

#[async_trait]
impl<T: StoredValue> StorageInterface<T> for GatedStorage<T> {
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
        self.loads.fetch_add(1, Ordering::SeqCst);
        let mut gate = self.gate.subscribe();
        let _ = gate.wait_for(|open| *open).await;

        self.stored().ok_or_else(|| {
            StorageError::NotFound {
                key: self.key.clone(),
            }
            .into()
        })
    }

    async fn set_item(&self, data: T) -> TabdeckResult<()> {
        let mut gate = self.write_gate.subscribe();
        let held = !*gate.borrow();
        if held {
            self.held_writes.fetch_add(1, Ordering::SeqCst);
            let _ = gate.wait_for(|open| *open).await;
            self.held_writes.fetch_sub(1, Ordering::SeqCst);
        }
        *lock(&self.value) = Some(data.clone());
        self.change.publish(&data);
        Ok(())
    }

    async fn remove_item(&self) -> TabdeckResult<()> {
        *lock(&self.value) = None;
        Ok(())
    }
}

impl<T: StoredValue> fmt::Debug for GatedStorage<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatedStorage")
            .field("key", &self.key)
            .field("released", &*self.gate.borrow())
            .finish()
    }
}

/// Cache source that replays scripted outcomes and counts its calls.
///
/// Once the script runs out every fetch fails.
pub struct ScriptedSource<T> {
    script: Mutex<VecDeque<Result<T, String>>>,
    calls: AtomicUsize,
}

impl<T: Send + 'static> ScriptedSource<T> {
    pub fn new(script: impl IntoIterator<Item = Result<T, String>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into_iter().collect()),
            calls: AtomicUsize::new(0),
        })
    }

    /// A source that always fails.
    pub fn failing() -> Arc<Self> {
        Self::new(std::iter::empty())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<T: Send + 'static> DataSource<T> for ScriptedSource<T> {
    async fn fetch(&self) -> Result<T, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match lock(&self.script).pop_front() {
            Some(Ok(value)) => Ok(value),
            Some(Err(reason)) => Err(reason.into()),
            None => Err("source exhausted".into()),
        }
    }
}

/// Records every value published to it.
pub struct EventRecorder<T> {
    events: Arc<Mutex<Vec<T>>>,
    subscriber: Subscriber<T>,
}

impl<T: Clone + Send + 'static> EventRecorder<T> {
    pub fn new() -> Self {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        Self {
            events,
            subscriber: subscriber(move |value: &T| lock(&sink).push(value.clone())),
        }
    }

    /// Subscribe to `event`. Panics if already subscribed there.
    #[track_caller]
    pub fn attach(&self, event: &dyn PubSubEvent<T>) {
        event
            .subscribe(Arc::clone(&self.subscriber))
            .expect("recorder already attached");
    }

    pub fn detach(&self, event: &dyn PubSubEvent<T>) {
        event.unsubscribe(&self.subscriber);
    }

    pub fn subscriber(&self) -> &Subscriber<T> {
        &self.subscriber
    }

    pub fn events(&self) -> Vec<T> {
        lock(&self.events).clone()
    }

    pub fn len(&self) -> usize {
        lock(&self.events).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn last(&self) -> Option<T> {
        lock(&self.events).last().cloned()
    }

    pub fn clear(&self) {
        lock(&self.events).clear();
    }
}

impl<T: Clone + Send + 'static> Default for EventRecorder<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// A store key no other test uses.
pub fn unique_key(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::now_v7().simple())
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for tabdeck inputs.

    use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
    use proptest::prelude::*;
    use serde_json::Value;
    use std::time::Duration;

    /// Store keys as the dashboard names them: lowercase words joined by `-`.
    pub fn arb_key() -> impl Strategy<Value = String> {
        "[a-z]{1,8}(-[a-z]{1,8}){0,2}"
    }

    /// TTL in milliseconds, up to one day.
    pub fn arb_ttl_millis() -> impl Strategy<Value = i64> {
        0i64..=86_400_000
    }

    pub fn arb_ttl() -> impl Strategy<Value = Duration> {
        arb_ttl_millis().prop_map(|ms| Duration::from_millis(ms as u64))
    }

    /// A timestamp between 2020 and 2030, at millisecond precision.
    pub fn arb_timestamp() -> impl Strategy<Value = DateTime<Utc>> {
        (1_577_836_800_000i64..1_893_456_000_000i64)
            .prop_filter_map("timestamp out of range", |ms| Utc.timestamp_millis_opt(ms).single())
    }

    /// An offset applied to a timestamp, within ±2 days.
    pub fn arb_offset() -> impl Strategy<Value = ChronoDuration> {
        (-172_800_000i64..=172_800_000).prop_map(ChronoDuration::milliseconds)
    }

    /// Arbitrary JSON that survives a serde_json round trip unchanged.
    pub fn arb_json() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i32>().prop_map(|n| Value::from(n)),
            "[ -~]{0,16}".prop_map(Value::String),
        ];
        leaf.prop_recursive(3, 24, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
                prop::collection::btree_map("[a-z]{1,6}", inner, 0..4)
                    .prop_map(|m| Value::Object(m.into_iter().collect())),
            ]
        })
    }

    /// Text that is never the empty string.
    pub fn arb_text() -> impl Strategy<Value = String> {
        "[A-Za-z0-9 ,.!?]{1,40}"
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built namespaces, stores and notifiers.

    use super::*;

    /// A namespace over a fresh in-memory medium, returned with the medium.
    pub fn memory_namespace() -> (Arc<InMemoryMedium>, Arc<Namespace>) {
        let medium = Arc::new(InMemoryMedium::new());
        let namespace = Namespace::new(Arc::clone(&medium) as Arc<dyn PersistenceMedium>);
        (medium, namespace)
    }

    /// A namespace over a fresh [`FlakyMedium`], returned with the medium.
    pub fn flaky_namespace() -> (Arc<FlakyMedium>, Arc<Namespace>) {
        let medium = Arc::new(FlakyMedium::new());
        let namespace = Namespace::new(Arc::clone(&medium) as Arc<dyn PersistenceMedium>);
        (medium, namespace)
    }

    /// A persisted store behind the trait object the sync layer expects.
    #[track_caller]
    pub fn store<T: StoredValue>(
        namespace: &Arc<Namespace>,
        key: &str,
        default_value: Option<T>,
    ) -> Arc<dyn StorageInterface<T>> {
        PersistedStorage::new(namespace, key, default_value).expect("key already taken")
    }

    /// A private notification center, so tests do not share history.
    pub fn notifier() -> Arc<NotificationCenter> {
        Arc::new(NotificationCenter::new())
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions over tabdeck error variants and notifications.

    use super::*;

    /// Assert that a TabdeckResult is Ok.
    #[track_caller]
    pub fn assert_ok<T: fmt::Debug>(result: &TabdeckResult<T>) {
        assert!(result.is_ok(), "Expected Ok, got Err: {:?}", result);
    }

    /// Assert that a TabdeckResult is a NotFound storage error.
    #[track_caller]
    pub fn assert_not_found<T: fmt::Debug>(result: &TabdeckResult<T>) {
        match result {
            Err(e) if e.is_not_found() => {}
            other => panic!("Expected NotFound error, got: {:?}", other),
        }
    }

    /// Assert that a TabdeckResult is a storage error other than NotFound.
    #[track_caller]
    pub fn assert_storage_failure<T: fmt::Debug>(result: &TabdeckResult<T>) {
        match result {
            Err(TabdeckError::Storage(e)) if !matches!(e, StorageError::NotFound { .. }) => {}
            other => panic!("Expected storage failure, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_cache_error<T: fmt::Debug>(result: &TabdeckResult<T>) {
        match result {
            Err(TabdeckError::Cache(_)) => {}
            other => panic!("Expected Cache error, got: {:?}", other),
        }
    }

    /// Assert that exactly one error notification starting with `prefix`
    /// was raised on `center`.
    #[track_caller]
    pub fn assert_single_error_notification(center: &NotificationCenter, prefix: &str) {
        let errors: Vec<Notification> = center
            .recent()
            .into_iter()
            .filter(|n| n.level == NotificationLevel::Error)
            .collect();
        assert_eq!(errors.len(), 1, "Expected one error notification, got: {:?}", errors);
        assert!(
            errors[0].message.starts_with(prefix),
            "Notification {:?} does not start with {:?}",
            errors[0].message,
            prefix
        );
    }

    /// Assert that no notification was raised on `center`.
    #[track_caller]
    pub fn assert_no_notifications(center: &NotificationCenter) {
        let recent = center.recent();
        assert!(recent.is_empty(), "Expected no notifications, got: {:?}", recent);
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tabdeck_core::Notifier;

    #[test]
    fn test_flaky_medium_switches() {
        let medium = FlakyMedium::new();
        medium.set("k", "1").unwrap();
        assert_eq!(medium.write_count(), 1);

        medium.fail_writes(true);
        assert!(matches!(medium.set("k", "2"), Err(StorageError::WriteFailed { .. })));
        medium.fail_reads(true);
        assert!(matches!(medium.get("k"), Err(StorageError::ReadFailed { .. })));

        medium.fail_reads(false);
        assert_eq!(medium.get("k").unwrap().as_deref(), Some("1"));
        assert_eq!(medium.write_count(), 1);
    }

    #[tokio::test]
    async fn test_gated_storage_holds_load_until_released() {
        let store = GatedStorage::new("gated", Some(5u32));
        let pending = {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.get_item().await })
        };
        tokio::task::yield_now().await;
        assert!(!pending.is_finished());

        store.release();
        assert_eq!(pending.await.unwrap().unwrap(), 5);
        assert_eq!(store.load_count(), 1);
    }

    #[tokio::test]
    async fn test_gated_storage_emit_change_publishes_both_events() {
        let store = GatedStorage::new("gated", None::<u32>);
        let changes = EventRecorder::new();
        let outside = EventRecorder::new();
        changes.attach(store.change_event());
        outside.attach(store.outside_change_event());

        store.emit_change(3);
        store.set_item(4).await.unwrap();

        assert_eq!(changes.events(), vec![3, 4]);
        assert_eq!(outside.events(), vec![3]);
        store.release();
        assert_eq!(store.get_item().await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_scripted_source_replays_then_fails() {
        let source = ScriptedSource::new([Ok(1u8), Err("down".to_string())]);
        assert_eq!(source.fetch().await.unwrap(), 1);
        assert_eq!(source.fetch().await.unwrap_err().to_string(), "down");
        assert!(source.fetch().await.is_err());
        assert_eq!(source.calls(), 3);
    }

    #[test]
    fn test_unique_keys_differ() {
        assert_ne!(unique_key("k"), unique_key("k"));
        assert!(unique_key("settings").starts_with("settings-"));
    }

    #[tokio::test]
    async fn test_memory_store_fixture_round_trips() {
        let (medium, ns) = fixtures::memory_namespace();
        let store = fixtures::store(&ns, "fixture", None::<String>);
        assertions::assert_not_found(&store.get_item().await);

        store.set_item("x".to_string()).await.unwrap();
        assert_eq!(medium.get("ps:fixture").unwrap().as_deref(), Some("\"x\""));
    }

    #[test]
    fn test_notification_assertions() {
        let center = fixtures::notifier();
        assertions::assert_no_notifications(&center);
        center.notify(Notification::error("Could not save data to k storage"));
        assertions::assert_single_error_notification(&center, "Could not save data");
    }

    proptest! {
        #[test]
        fn prop_generated_keys_are_nonempty(key in generators::arb_key()) {
            prop_assert!(!key.is_empty());
            prop_assert!(!key.starts_with('-'));
        }

        #[test]
        fn prop_generated_json_round_trips(value in generators::arb_json()) {
            let text = serde_json::to_string(&value).unwrap();
            let back: serde_json::Value = serde_json::from_str(&text).unwrap();
            prop_assert_eq!(back, value);
        }
    }
}
