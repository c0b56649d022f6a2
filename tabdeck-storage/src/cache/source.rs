//! Data sources feeding the async cache.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

/// Errors from a source are opaque to the cache.
pub type SourceError = Box<dyn std::error::Error + Send + Sync>;

/// Asynchronous producer of a value.
#[async_trait]
pub trait DataSource<T>: Send + Sync {
    async fn fetch(&self) -> Result<T, SourceError>;
}

/// Adapts a closure returning a future into a [`DataSource`].
pub struct FnSource<F>(F);

#[async_trait]
impl<T, F, Fut> DataSource<T> for FnSource<F>
where
    T: Send + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, SourceError>> + Send + 'static,
{
    async fn fetch(&self) -> Result<T, SourceError> {
        (self.0)().await
    }
}

/// Wrap an async closure as a shareable source.
///
/// ```ignore
/// cache.set_source(source_fn(|| async { Ok(QuoteModel::default()) }));
/// ```
pub fn source_fn<T, F, Fut>(f: F) -> Arc<dyn DataSource<T>>
where
    T: Send + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, SourceError>> + Send + 'static,
{
    Arc::new(FnSource(f))
}
