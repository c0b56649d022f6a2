//! Time-bounded async cache.
//!
//! One [`AsyncCache`] caches one computed value in a keyed store entry.
//!
//! # Read path
//!
//! 1. Read the cached entry. Absent or older than the TTL counts as a miss.
//!    Any other read error propagates.
//! 2. On a miss, call the source. Without a source the read fails.
//! 3. A source value is cached with `createdAt = now` and returned.
//! 4. A source failure returns the default, uncached, so the next read
//!    retries the source. Without a default the failure propagates.
//!
//! Concurrent misses are not de-duplicated; each may call the source.

use std::fmt;
use std::sync::{Arc, RwLock};

use tabdeck_core::{CacheError, Clock, SystemClock, TabdeckResult};

use super::read::CacheRead;
use super::source::DataSource;
use super::stats::{CacheCounters, CacheStats};
use super::ttl::{CachedItem, Ttl};
use crate::persisted::{StorageInterface, StoredValue};

pub struct AsyncCache<T: StoredValue> {
    ttl: Ttl,
    storage: Arc<dyn StorageInterface<CachedItem<T>>>,
    default_value: Option<T>,
    source: RwLock<Option<Arc<dyn DataSource<T>>>>,
    clock: Arc<dyn Clock>,
    counters: CacheCounters,
}

impl<T: StoredValue> AsyncCache<T> {
    pub fn new(
        ttl: Ttl,
        storage: Arc<dyn StorageInterface<CachedItem<T>>>,
        default_value: Option<T>,
    ) -> Self {
        Self {
            ttl,
            storage,
            default_value,
            source: RwLock::new(None),
            clock: Arc::new(SystemClock),
            counters: CacheCounters::default(),
        }
    }

    /// Evaluate TTLs against `clock` instead of the system clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the source used on misses.
    pub fn set_source(&self, source: Arc<dyn DataSource<T>>) {
        *self.source.write().unwrap_or_else(|p| p.into_inner()) = Some(source);
    }

    pub fn has_source(&self) -> bool {
        self.source.read().unwrap_or_else(|p| p.into_inner()).is_some()
    }

    pub fn key(&self) -> &str {
        self.storage.key()
    }

    pub fn default_value(&self) -> Option<&T> {
        self.default_value.as_ref()
    }

    pub fn ttl(&self) -> &Ttl {
        &self.ttl
    }

    /// Read the value along with where it came from.
    pub async fn read(&self) -> TabdeckResult<CacheRead<T>> {
        if let Some(hit) = self.read_cached().await? {
            self.counters.hit();
            return Ok(hit);
        }
        self.counters.miss();

        let source = self
            .source
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
            .ok_or_else(|| CacheError::SourceNotDefined {
                key: self.key().to_string(),
            })?;

        match source.fetch().await {
            Ok(data) => {
                let now = self.clock.now();
                self.storage
                    .set_item(CachedItem::new(data.clone(), now))
                    .await?;
                Ok(CacheRead::from_source(data, now))
            }
            Err(e) => {
                tracing::warn!(key = %self.key(), error = %e, "Could not load data from source");
                self.counters.source_failure(self.default_value.is_some());
                match &self.default_value {
                    Some(default) => Ok(CacheRead::from_default(default.clone())),
                    None => Err(CacheError::SourceUnavailable {
                        key: self.key().to_string(),
                        reason: e.to_string(),
                    }
                    .into()),
                }
            }
        }
    }

    pub async fn get_item(&self) -> TabdeckResult<T> {
        Ok(self.read().await?.into_value())
    }

    /// Drop the cached entry; the next read calls the source.
    pub async fn remove_item(&self) -> TabdeckResult<()> {
        self.storage.remove_item().await
    }

    pub fn stats(&self) -> CacheStats {
        self.counters.snapshot()
    }

    async fn read_cached(&self) -> TabdeckResult<Option<CacheRead<T>>> {
        let item = match self.storage.get_item().await {
            Ok(item) => item,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e),
        };

        if item.is_expired(self.clock.now(), self.ttl.current()) {
            tracing::trace!(key = %self.key(), "Cached entry expired");
            return Ok(None);
        }
        Ok(Some(CacheRead::from_cache(item.data, item.created_at)))
    }
}

impl<T: StoredValue> fmt::Debug for AsyncCache<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncCache")
            .field("key", &self.key())
            .field("ttl", &self.ttl)
            .field("has_default", &self.default_value.is_some())
            .field("has_source", &self.has_source())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{source_fn, ReadOrigin, SourceError};
    use crate::medium::{InMemoryMedium, PersistenceMedium};
    use crate::namespace::Namespace;
    use crate::persisted::PersistedStorage;
    use serde::{Deserialize, Serialize};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;
    use tabdeck_core::{ManualClock, StorageError, TabdeckError};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct V {
        v: i32,
    }

    struct Fixture {
        medium: Arc<InMemoryMedium>,
        clock: Arc<ManualClock>,
        calls: Arc<AtomicUsize>,
        failing: Arc<AtomicBool>,
        cache: AsyncCache<V>,
    }

    fn fixture(ttl_ms: i64, default_value: Option<V>) -> Fixture {
        let medium = Arc::new(InMemoryMedium::new());
        let ns = Namespace::new(medium.clone());
        let storage = PersistedStorage::<CachedItem<V>>::new(&ns, "cache", None).unwrap();
        let clock = Arc::new(ManualClock::starting_now());
        let cache = AsyncCache::new(Ttl::from_millis(ttl_ms).unwrap(), storage, default_value)
            .with_clock(clock.clone());

        let calls = Arc::new(AtomicUsize::new(0));
        let failing = Arc::new(AtomicBool::new(false));
        let (c, f) = (Arc::clone(&calls), Arc::clone(&failing));
        cache.set_source(source_fn(move || {
            let n = c.fetch_add(1, Ordering::SeqCst) as i32 + 1;
            let fail = f.load(Ordering::SeqCst);
            async move {
                if fail {
                    Err::<V, SourceError>("offline".into())
                } else {
                    Ok(V { v: n })
                }
            }
        }));

        Fixture {
            medium,
            clock,
            calls,
            failing,
            cache,
        }
    }

    #[tokio::test]
    async fn test_hit_within_ttl_and_miss_after() {
        let fx = fixture(100, None);

        assert_eq!(fx.cache.get_item().await.unwrap(), V { v: 1 });
        assert_eq!(fx.cache.get_item().await.unwrap(), V { v: 1 });
        assert_eq!(fx.calls.load(Ordering::SeqCst), 1);

        fx.clock.advance(Duration::from_millis(100));
        assert_eq!(fx.cache.get_item().await.unwrap(), V { v: 1 });
        assert_eq!(fx.calls.load(Ordering::SeqCst), 1);

        fx.clock.advance(Duration::from_millis(1));
        assert_eq!(fx.cache.get_item().await.unwrap(), V { v: 2 });
        assert_eq!(fx.calls.load(Ordering::SeqCst), 2);

        let stats = fx.cache.stats();
        assert_eq!((stats.hits, stats.misses), (2, 2));
    }

    #[tokio::test]
    async fn test_read_reports_origin() {
        let fx = fixture(1_000, Some(V { v: 0 }));

        assert_eq!(fx.cache.read().await.unwrap().origin(), ReadOrigin::Source);
        assert_eq!(fx.cache.read().await.unwrap().origin(), ReadOrigin::Cache);

        fx.cache.remove_item().await.unwrap();
        fx.failing.store(true, Ordering::SeqCst);
        assert_eq!(fx.cache.read().await.unwrap().origin(), ReadOrigin::Default);
    }

    #[tokio::test]
    async fn test_default_is_returned_but_never_cached() {
        let fx = fixture(1_000, Some(V { v: 0 }));
        fx.failing.store(true, Ordering::SeqCst);

        assert_eq!(fx.cache.get_item().await.unwrap(), V { v: 0 });
        assert_eq!(fx.medium.get("ps:cache").unwrap(), None);

        assert_eq!(fx.cache.get_item().await.unwrap(), V { v: 0 });
        assert_eq!(fx.calls.load(Ordering::SeqCst), 2);

        fx.failing.store(false, Ordering::SeqCst);
        assert_eq!(fx.cache.get_item().await.unwrap(), V { v: 3 });
        assert_eq!(fx.cache.stats().default_fallbacks, 2);
    }

    #[tokio::test]
    async fn test_source_failure_without_default_propagates() {
        let fx = fixture(1_000, None);
        fx.failing.store(true, Ordering::SeqCst);

        let err = fx.cache.get_item().await.unwrap_err();

        assert_eq!(
            err,
            TabdeckError::Cache(CacheError::SourceUnavailable {
                key: "cache".into(),
                reason: "offline".into(),
            })
        );
    }

    #[tokio::test]
    async fn test_missing_source_fails() {
        let ns = Namespace::new(Arc::new(InMemoryMedium::new()));
        let storage = PersistedStorage::<CachedItem<V>>::new(&ns, "nosrc", None).unwrap();
        let cache = AsyncCache::new(Ttl::fixed(Duration::from_secs(1)), storage, Some(V { v: 0 }));

        let err = cache.get_item().await.unwrap_err();

        assert_eq!(
            err,
            TabdeckError::Cache(CacheError::SourceNotDefined { key: "nosrc".into() })
        );
    }

    #[tokio::test]
    async fn test_remove_item_forces_source_call() {
        let fx = fixture(60_000, None);
        fx.cache.get_item().await.unwrap();

        fx.cache.remove_item().await.unwrap();

        assert_eq!(fx.cache.get_item().await.unwrap(), V { v: 2 });
    }

    #[tokio::test]
    async fn test_unreadable_entry_propagates() {
        let fx = fixture(60_000, Some(V { v: 0 }));
        fx.medium.set("ps:cache", "{not json").unwrap();

        let err = fx.cache.get_item().await.unwrap_err();

        assert!(matches!(
            err,
            TabdeckError::Storage(StorageError::Serialization { .. })
        ));
        assert_eq!(fx.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_dynamic_ttl() {
        let ns = Namespace::new(Arc::new(InMemoryMedium::new()));
        let storage = PersistedStorage::<CachedItem<V>>::new(&ns, "dyn", None).unwrap();
        let clock = Arc::new(ManualClock::starting_now());
        let ttl_ms = Arc::new(AtomicUsize::new(10));
        let t = Arc::clone(&ttl_ms);
        let cache = AsyncCache::new(
            Ttl::dynamic(move || Duration::from_millis(t.load(Ordering::SeqCst) as u64)),
            storage,
            None,
        )
        .with_clock(clock.clone());
        let calls = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&calls);
        cache.set_source(source_fn(move || {
            c.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, SourceError>(V { v: 7 }) }
        }));

        cache.get_item().await.unwrap();
        clock.advance(Duration::from_millis(50));
        ttl_ms.store(100, Ordering::SeqCst);
        cache.get_item().await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
