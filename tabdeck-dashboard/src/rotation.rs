//! Background image rotation at day-period boundaries.

use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use tabdeck_core::{PubSub, PubSubEvent};
use tabdeck_storage::AsyncCache;
use tokio::task::JoinHandle;

use crate::daytime::DayTime;
use crate::models::ImageModel;

/// Used when the boundary cannot be computed.
const FALLBACK_DELAY: Duration = Duration::from_secs(60);

/// Delay until the next day period starts, in local time.
pub fn until_next_period() -> Duration {
    DayTime::time_until_next_period_start(Local::now().naive_local())
        .to_std()
        .unwrap_or(FALLBACK_DELAY)
}

/// Running rotation. Dropping it stops the task.
pub struct ImageRotation {
    images: Arc<PubSub<ImageModel>>,
    task: JoinHandle<()>,
}

impl ImageRotation {
    /// Fires with the current image, then with each rotated one.
    pub fn images(&self) -> &dyn PubSubEvent<ImageModel> {
        self.images.event()
    }

    pub fn stop(self) {}
}

impl Drop for ImageRotation {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl std::fmt::Debug for ImageRotation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageRotation")
            .field("subscribers", &self.images.subscriber_count())
            .field("finished", &self.task.is_finished())
            .finish()
    }
}

/// Publish the cached image, then at every `next_delay()` drop the cached
/// entry and publish a freshly fetched one.
///
/// Must run inside a tokio runtime.
pub fn spawn_image_rotation<F>(cache: Arc<AsyncCache<ImageModel>>, next_delay: F) -> ImageRotation
where
    F: Fn() -> Duration + Send + Sync + 'static,
{
    let images = Arc::new(PubSub::new());
    let hub = Arc::clone(&images);

    let task = tokio::spawn(async move {
        publish_current(&cache, &hub).await;
        loop {
            let delay = next_delay();
            tracing::debug!(delay_ms = delay.as_millis() as u64, "Next image rotation scheduled");
            tokio::time::sleep(delay).await;

            if let Err(e) = cache.remove_item().await {
                tracing::warn!(key = %cache.key(), error = %e, "Could not drop cached image");
            }
            publish_current(&cache, &hub).await;
        }
    });

    ImageRotation { images, task }
}

async fn publish_current(cache: &AsyncCache<ImageModel>, hub: &PubSub<ImageModel>) {
    match cache.get_item().await {
        Ok(image) => hub.publish(&image),
        Err(e) => tracing::warn!(key = %cache.key(), error = %e, "Could not load image"),
    }
}
