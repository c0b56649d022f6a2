//! tabdeck Storage - persistence media, keyed stores and the async cache
//!
//! Layering, bottom up:
//!
//! - [`medium`]: synchronous string key-value media (in-memory, LMDB).
//! - [`namespace`]: key prefix, key ownership and external-change routing.
//! - [`persisted`]: [`PersistedStorage`], one JSON value per key with
//!   change events.
//! - [`cache`]: [`AsyncCache`], a TTL cache of one source value kept in a
//!   keyed store entry.

pub mod cache;
pub mod medium;
pub mod namespace;
pub mod persisted;

pub use cache::{
    source_fn, AsyncCache, CacheRead, CacheStats, CachedItem, DataSource, FnSource, ReadOrigin,
    SourceError, Ttl,
};
pub use medium::{InMemoryMedium, LmdbMedium, PersistenceMedium};
pub use medium::lmdb::LmdbMediumError;
pub use namespace::{ExternalChange, ExternalListener, Namespace, DEFAULT_PREFIX};
pub use persisted::{PersistedStorage, StorageInterface, StoredValue};
