//! Background images.
//!
//! No HTTP client ships with the dashboard. Whatever fetches photos plugs
//! in as a [`PhotoFetcher`]; [`ImageRepository`] builds the query from the
//! time of day and shapes the response into an [`ImageModel`].

use std::sync::Arc;

use async_trait::async_trait;
use rand::seq::IndexedRandom;
use serde::Deserialize;
use tabdeck_storage::{DataSource, SourceError};

use crate::daytime::DayTime;
use crate::models::{ImageAuthor, ImageModel};

pub const IMAGE_CATEGORIES: [&str; 2] = ["travel", "nature"];

/// Size and quality parameters appended to the raw photo URL.
pub const IMAGE_PARAMS: &str = "w=1920&fm=jpg&q=95";

/// Random-photo request parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageQuery {
    pub query: String,
    pub orientation: &'static str,
    pub topics: &'static str,
}

impl ImageQuery {
    pub fn new(category: &str, day_time: DayTime) -> Self {
        Self {
            query: format!("{category} {day_time}"),
            orientation: "landscape",
            topics: "featured",
        }
    }

    /// A query for `day_time` in a random category.
    pub fn random(day_time: DayTime) -> Self {
        let category = IMAGE_CATEGORIES
            .choose(&mut rand::rng())
            .copied()
            .unwrap_or(IMAGE_CATEGORIES[0]);
        Self::new(category, day_time)
    }
}

/// The parts of a random-photo response the dashboard uses.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UnsplashPhoto {
    pub urls: PhotoUrls,
    pub user: PhotoUser,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PhotoUrls {
    pub raw: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PhotoUser {
    pub name: String,
    pub links: PhotoUserLinks,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PhotoUserLinks {
    pub photos: String,
}

impl From<UnsplashPhoto> for ImageModel {
    fn from(photo: UnsplashPhoto) -> Self {
        ImageModel {
            source: with_params(&photo.urls.raw, IMAGE_PARAMS),
            author: Some(ImageAuthor {
                name: photo.user.name,
                url: photo.user.links.photos,
            }),
        }
    }
}

/// Append query `params` to `url`, respecting an existing query string.
pub fn with_params(url: &str, params: &str) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{url}{separator}{params}")
}

/// Transport for random photos.
#[async_trait]
pub trait PhotoFetcher: Send + Sync {
    async fn random_photo(&self, query: &ImageQuery) -> Result<UnsplashPhoto, SourceError>;
}

pub struct ImageRepository {
    fetcher: Arc<dyn PhotoFetcher>,
}

impl ImageRepository {
    pub fn new(fetcher: Arc<dyn PhotoFetcher>) -> Self {
        Self { fetcher }
    }

    pub async fn random_image(&self) -> Result<ImageModel, SourceError> {
        let query = ImageQuery::random(DayTime::now());
        tracing::debug!(query = %query.query, "Fetching random image");
        let photo = self.fetcher.random_photo(&query).await?;
        Ok(photo.into())
    }
}

#[async_trait]
impl DataSource<ImageModel> for ImageRepository {
    async fn fetch(&self) -> Result<ImageModel, SourceError> {
        self.random_image().await
    }
}

impl std::fmt::Debug for ImageRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageRepository").finish_non_exhaustive()
    }
}
