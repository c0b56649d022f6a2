//! One-to-many event fan-out.
//!
//! [`PubSub<T>`] keeps an ordered list of subscriber callbacks. Membership is
//! decided by callback identity (the `Arc` allocation), never by structure:
//! subscribing the same callback twice is an error, unsubscribing an unknown
//! one is a no-op.
//!
//! # Invariants
//!
//! 1. Subscribers are notified synchronously, in registration order.
//! 2. `publish` iterates over a snapshot taken when it starts, so a
//!    subscriber may unsubscribe itself (or anyone else) mid-publish without
//!    skipping or double-invoking the remaining subscribers.
//! 3. No lock is held while a subscriber runs.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::ConfigurationError;

/// A subscriber callback. Identity is the `Arc` allocation.
pub type Subscriber<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Wrap a closure as a [`Subscriber`].
pub fn subscriber<T, F>(f: F) -> Subscriber<T>
where
    F: Fn(&T) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Subscribe/unsubscribe facade. Handed out to consumers that may listen
/// but must not publish.
pub trait PubSubEvent<T>: Send + Sync {
    /// Register a subscriber. Fails if the same callback is already registered.
    fn subscribe(&self, subscriber: Subscriber<T>) -> Result<(), ConfigurationError>;

    /// Remove a subscriber if present.
    fn unsubscribe(&self, subscriber: &Subscriber<T>);
}

/// Generic publish/subscribe hub.
pub struct PubSub<T> {
    subscribers: Mutex<Vec<Subscriber<T>>>,
}

impl<T> PubSub<T> {
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// The listen-only view of this hub.
    pub fn event(&self) -> &dyn PubSubEvent<T> {
        self
    }

    /// Deliver `value` to every subscriber registered at the time of the call.
    ///
    /// Subscriber panics are not caught.
    pub fn publish(&self, value: &T) {
        let snapshot: Vec<Subscriber<T>> = self.lock().clone();
        for subscriber in snapshot {
            subscriber(value);
        }
    }

    /// Number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    pub fn is_subscribed(&self, subscriber: &Subscriber<T>) -> bool {
        self.lock().iter().any(|s| same_subscriber(s, subscriber))
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Subscriber<T>>> {
        // The list holds no invariant a panicking subscriber could break.
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<T> PubSubEvent<T> for PubSub<T> {
    fn subscribe(&self, subscriber: Subscriber<T>) -> Result<(), ConfigurationError> {
        let mut subscribers = self.lock();
        if subscribers.iter().any(|s| same_subscriber(s, &subscriber)) {
            return Err(ConfigurationError::DuplicateSubscriber);
        }
        subscribers.push(subscriber);
        Ok(())
    }

    fn unsubscribe(&self, subscriber: &Subscriber<T>) {
        self.lock().retain(|s| !same_subscriber(s, subscriber));
    }
}

impl<T> Default for PubSub<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for PubSub<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PubSub")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

fn same_subscriber<T>(a: &Subscriber<T>, b: &Subscriber<T>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}
