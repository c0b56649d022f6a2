//! Cache read results.
//!
//! Every read tells the caller where the value came from, so a caller can
//! tell a fresh source value from a fallback default.

use std::time::Duration;

use chrono::{DateTime, Utc};

/// Where a [`CacheRead`] value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOrigin {
    /// Cached entry younger than the TTL.
    Cache,
    /// Fetched from the source and cached.
    Source,
    /// The source failed; the configured default. Never cached.
    Default,
}

/// Result of a cache read, carrying origin metadata.
#[derive(Debug, Clone)]
pub struct CacheRead<T> {
    value: T,
    origin: ReadOrigin,
    /// Write time of the cache entry. `None` for defaults.
    cached_at: Option<DateTime<Utc>>,
}

impl<T> CacheRead<T> {
    /// A cache hit.
    pub fn from_cache(value: T, cached_at: DateTime<Utc>) -> Self {
        Self {
            value,
            origin: ReadOrigin::Cache,
            cached_at: Some(cached_at),
        }
    }

    /// A source fetch that was written to the cache at `cached_at`.
    pub fn from_source(value: T, cached_at: DateTime<Utc>) -> Self {
        Self {
            value,
            origin: ReadOrigin::Source,
            cached_at: Some(cached_at),
        }
    }

    /// A default returned after a source failure.
    pub fn from_default(value: T) -> Self {
        Self {
            value,
            origin: ReadOrigin::Default,
            cached_at: None,
        }
    }

    pub fn into_value(self) -> T {
        self.value
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn origin(&self) -> ReadOrigin {
        self.origin
    }

    pub fn cached_at(&self) -> Option<DateTime<Utc>> {
        self.cached_at
    }

    pub fn was_cache_hit(&self) -> bool {
        self.origin == ReadOrigin::Cache
    }

    pub fn is_default(&self) -> bool {
        self.origin == ReadOrigin::Default
    }

    /// Age of the value at `now`. Zero for defaults and future timestamps.
    pub fn staleness(&self, now: DateTime<Utc>) -> Duration {
        self.cached_at
            .and_then(|cached_at| (now - cached_at).to_std().ok())
            .unwrap_or(Duration::ZERO)
    }

    /// Map the inner value to a new type.
    pub fn map<U, F>(self, f: F) -> CacheRead<U>
    where
        F: FnOnce(T) -> U,
    {
        CacheRead {
            value: f(self.value),
            origin: self.origin,
            cached_at: self.cached_at,
        }
    }
}

impl<T> AsRef<T> for CacheRead<T> {
    fn as_ref(&self) -> &T {
        &self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_flags() {
        let at = Utc::now();
        assert!(CacheRead::from_cache(1, at).was_cache_hit());
        assert!(!CacheRead::from_source(1, at).was_cache_hit());
        assert!(CacheRead::from_default(1).is_default());
        assert_eq!(CacheRead::from_default(1).cached_at(), None);
    }

    #[test]
    fn test_staleness() {
        let at = DateTime::from_timestamp_millis(10_000).unwrap();
        let read = CacheRead::from_cache("q", at);

        let later = DateTime::from_timestamp_millis(12_500).unwrap();
        assert_eq!(read.staleness(later), Duration::from_millis(2_500));

        let earlier = DateTime::from_timestamp_millis(9_000).unwrap();
        assert_eq!(read.staleness(earlier), Duration::ZERO);
        assert_eq!(CacheRead::from_default("q").staleness(later), Duration::ZERO);
    }

    #[test]
    fn test_map_keeps_metadata() {
        let at = Utc::now();
        let read = CacheRead::from_source(21, at).map(|v| v * 2);
        assert_eq!(*read.value(), 42);
        assert_eq!(read.origin(), ReadOrigin::Source);
        assert_eq!(read.cached_at(), Some(at));
    }
}
