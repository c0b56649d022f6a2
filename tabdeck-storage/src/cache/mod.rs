//! Time-bounded async cache over a keyed store entry.
//!
//! # Example
//!
//! ```ignore
//! let storage = PersistedStorage::<CachedItem<QuoteModel>>::new(&namespace, "quote", None)?;
//! let cache = AsyncCache::new(Ttl::fixed(Duration::from_secs(6 * 3600)), storage, Some(default_quote()));
//! cache.set_source(source_fn(move || async move { repository.random_quote().await }));
//!
//! let read = cache.read().await?;
//! if read.is_default() {
//!     tracing::info!("Showing the fallback quote");
//! }
//! ```

pub mod async_cache;
pub mod read;
pub mod source;
pub mod stats;
pub mod ttl;

pub use async_cache::AsyncCache;
pub use read::{CacheRead, ReadOrigin};
pub use source::{source_fn, DataSource, FnSource, SourceError};
pub use stats::CacheStats;
pub use ttl::{CachedItem, Ttl};
