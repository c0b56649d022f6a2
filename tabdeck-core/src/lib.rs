//! tabdeck Core - shared primitives
//!
//! Error taxonomy, the publish/subscribe hub, the clock used for TTL
//! evaluation and the peripheral notification mechanism. Every other
//! tabdeck crate depends on this one.

pub mod clock;
pub mod error;
pub mod notification;
pub mod pubsub;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{CacheError, ConfigurationError, StorageError, TabdeckError, TabdeckResult};
pub use notification::{Notification, NotificationCenter, NotificationLevel, Notifier};
pub use pubsub::{subscriber, PubSub, PubSubEvent, Subscriber};
