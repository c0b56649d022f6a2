//! Paged quote collection on disk.
//!
//! The directory holds `quotes-meta.json` and pages `quotes-1.json`,
//! `quotes-2.json`, ... Quote numbers are 1-based and run across pages.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use rand::Rng;
use serde::Deserialize;
use tabdeck_storage::{DataSource, SourceError};

use crate::models::QuoteModel;

pub const META_FILE: &str = "quotes-meta.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotesMeta {
    pub pages: u32,
    pub page_size: u32,
    pub quote_count: u32,
}

impl QuotesMeta {
    /// Page holding quote `number`. `None` if no such quote exists.
    pub fn page_of(&self, number: u32) -> Option<u32> {
        self.offset_of(number)?.checked_div(self.page_size)?.checked_add(1)
    }

    /// Index of quote `number` within its page.
    pub fn index_in_page(&self, number: u32) -> Option<usize> {
        let index = self.offset_of(number)?.checked_rem(self.page_size)?;
        usize::try_from(index).ok()
    }

    fn offset_of(&self, number: u32) -> Option<u32> {
        if number > self.quote_count {
            return None;
        }
        number.checked_sub(1)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum QuoteRepositoryError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Quote collection is empty")]
    Empty,
    #[error("Quote {number} is missing from page {page}")]
    MissingQuote { number: u32, page: u32 },
}

#[derive(Debug, Clone)]
pub struct QuoteRepository {
    dir: PathBuf,
}

impl QuoteRepository {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn meta(&self) -> Result<QuotesMeta, QuoteRepositoryError> {
        read_json(&self.dir.join(META_FILE)).await
    }

    /// Quote `number`, 1-based.
    pub async fn quote(&self, meta: &QuotesMeta, number: u32) -> Result<QuoteModel, QuoteRepositoryError> {
        if meta.quote_count == 0 || meta.page_size == 0 {
            return Err(QuoteRepositoryError::Empty);
        }
        let (Some(page), Some(index)) = (meta.page_of(number), meta.index_in_page(number)) else {
            return Err(QuoteRepositoryError::MissingQuote {
                number,
                page: 0,
            });
        };
        let quotes: Vec<QuoteModel> = read_json(&self.dir.join(format!("quotes-{page}.json"))).await?;

        quotes
            .into_iter()
            .nth(index)
            .ok_or(QuoteRepositoryError::MissingQuote { number, page })
    }

    pub async fn random_quote(&self) -> Result<QuoteModel, QuoteRepositoryError> {
        let meta = self.meta().await?;
        if meta.quote_count == 0 {
            return Err(QuoteRepositoryError::Empty);
        }
        let number = rand::rng().random_range(1..=meta.quote_count);
        tracing::trace!(number, "Picked quote");
        self.quote(&meta, number).await
    }
}

#[async_trait]
impl DataSource<QuoteModel> for QuoteRepository {
    async fn fetch(&self) -> Result<QuoteModel, SourceError> {
        Ok(self.random_quote().await?)
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, QuoteRepositoryError> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| QuoteRepositoryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    serde_json::from_str(&contents).map_err(|source| QuoteRepositoryError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
