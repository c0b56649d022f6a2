//! The dashboard's cached remote values.

use std::sync::Arc;
use std::time::Duration;

use tabdeck_core::ConfigurationError;
use tabdeck_storage::{AsyncCache, CachedItem, Namespace, PersistedStorage, StorageInterface, Ttl};

use crate::models::{ImageAuthor, ImageModel, QuoteModel};

pub const QUOTE_CACHE_KEY: &str = "quote";
pub const IMAGE_CACHE_KEY: &str = "image";

pub const QUOTE_CACHE_TTL: Duration = Duration::from_secs(6 * 60 * 60);
pub const IMAGE_CACHE_TTL: Duration = Duration::from_secs(30 * 60);

pub fn default_quote() -> QuoteModel {
    QuoteModel {
        text: "If we did all the things we are capable of, we would literally astound ourselves.".to_string(),
        author: "Thomas Edison".to_string(),
    }
}

pub fn default_image() -> ImageModel {
    ImageModel {
        source: "https://images.unsplash.com/photo-1564907587809-3e1969b66ad3?ixlib=rb-1.2.1&ixid=MnwxMjA3fDB8MHxwaG90by1wYWdlfHx8fGVufDB8fHx8&auto=format&fit=crop&w=2071&q=80".to_string(),
        author: Some(ImageAuthor {
            name: "Dan Meyers".to_string(),
            url: "https://unsplash.com/@dmey503".to_string(),
        }),
    }
}

/// Random quote, refreshed every `ttl`. Has no source until one is set.
pub fn quote_cache(namespace: &Arc<Namespace>, ttl: Duration) -> Result<AsyncCache<QuoteModel>, ConfigurationError> {
    let storage: Arc<dyn StorageInterface<CachedItem<QuoteModel>>> =
        PersistedStorage::<CachedItem<QuoteModel>>::new(namespace, QUOTE_CACHE_KEY, None)?;
    Ok(AsyncCache::new(Ttl::fixed(ttl), storage, Some(default_quote())))
}

/// Background image, refreshed every `ttl`. Has no source until one is set.
pub fn image_cache(namespace: &Arc<Namespace>, ttl: Duration) -> Result<AsyncCache<ImageModel>, ConfigurationError> {
    let storage: Arc<dyn StorageInterface<CachedItem<ImageModel>>> =
        PersistedStorage::<CachedItem<ImageModel>>::new(namespace, IMAGE_CACHE_KEY, None)?;
    Ok(AsyncCache::new(Ttl::fixed(ttl), storage, Some(default_image())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabdeck_storage::{source_fn, InMemoryMedium, PersistenceMedium, ReadOrigin};

    #[tokio::test]
    async fn test_quote_cache_falls_back_to_default() {
        let medium = Arc::new(InMemoryMedium::new());
        let ns = Namespace::new(medium.clone());
        let cache = quote_cache(&ns, QUOTE_CACHE_TTL).unwrap();
        cache.set_source(source_fn(|| async { Err("offline".into()) }));

        let read = cache.read().await.unwrap();

        assert_eq!(read.origin(), ReadOrigin::Default);
        assert_eq!(read.value().author, "Thomas Edison");
        assert_eq!(medium.get("ps:quote").unwrap(), None);
    }

    #[tokio::test]
    async fn test_image_cache_stores_envelope() {
        let medium = Arc::new(InMemoryMedium::new());
        let ns = Namespace::new(medium.clone());
        let cache = image_cache(&ns, IMAGE_CACHE_TTL).unwrap();
        cache.set_source(source_fn(|| async {
            Ok(ImageModel {
                source: "http://img".to_string(),
                author: None,
            })
        }));

        assert_eq!(cache.get_item().await.unwrap().source, "http://img");

        let raw: serde_json::Value = serde_json::from_str(&medium.get("ps:image").unwrap().unwrap()).unwrap();
        assert_eq!(raw["data"]["source"], "http://img");
        assert!(raw["createdAt"].is_i64());
    }

    #[test]
    fn test_cache_keys_are_exclusive() {
        let ns = Namespace::new(Arc::new(InMemoryMedium::new()));
        quote_cache(&ns, QUOTE_CACHE_TTL).unwrap();
        assert!(quote_cache(&ns, QUOTE_CACHE_TTL).is_err());
    }
}
