//! TTL configuration and the cached envelope.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tabdeck_core::CacheError;

/// How long a cached value stays fresh.
#[derive(Clone)]
pub enum Ttl {
    Fixed(Duration),
    /// Re-evaluated on every read.
    Dynamic(Arc<dyn Fn() -> Duration + Send + Sync>),
}

impl Ttl {
    /// Fixed TTL from a millisecond count. Negative values are rejected.
    pub fn from_millis(millis: i64) -> Result<Self, CacheError> {
        u64::try_from(millis)
            .map(|millis| Self::Fixed(Duration::from_millis(millis)))
            .map_err(|_| CacheError::InvalidTtl { millis })
    }

    pub fn fixed(ttl: Duration) -> Self {
        Self::Fixed(ttl)
    }

    pub fn dynamic<F>(f: F) -> Self
    where
        F: Fn() -> Duration + Send + Sync + 'static,
    {
        Self::Dynamic(Arc::new(f))
    }

    /// The TTL in effect right now.
    pub fn current(&self) -> Duration {
        match self {
            Self::Fixed(ttl) => *ttl,
            Self::Dynamic(f) => f(),
        }
    }
}

impl fmt::Debug for Ttl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(ttl) => f.debug_tuple("Fixed").field(ttl).finish(),
            Self::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

/// What the cache persists: the value plus its write time.
///
/// Serialized as `{"createdAt": <epoch millis>, "data": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedItem<T> {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    pub data: T,
}

impl<T> CachedItem<T> {
    pub fn new(data: T, created_at: DateTime<Utc>) -> Self {
        Self { created_at, data }
    }

    /// Time since the write. Negative if the clock went backwards.
    pub fn live_time(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.created_at
    }

    /// Stale iff the live time is strictly greater than `ttl`.
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
        self.live_time(now) > ttl
    }
}
