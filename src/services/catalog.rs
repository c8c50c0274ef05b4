// src/services/catalog.rs

//! Catalog fetching.
//!
//! Requests a listing page and hands it to the [`CatalogExtractor`].

use async_trait::async_trait;
use reqwest::Client;

use crate::error::Result;
use crate::models::{HttpConfig, Media};
use crate::services::CatalogExtractor;
use crate::utils::{http, library_key};

/// Form field selecting how many items a listing page returns.
pub const PAGE_SIZE_FIELD: &str = "elementsPerPage";

/// Source of catalog snapshots.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Fetch and extract every item listed at `url`.
    async fn fetch(&self, url: &str) -> Result<Vec<Media>>;
}

/// HTTP implementation of [`CatalogSource`].
pub struct CatalogCrawler {
    client: Client,
    extractor: CatalogExtractor,
    page_size: u32,
}

impl CatalogCrawler {
    pub fn new(client: Client, config: &HttpConfig) -> Result<Self> {
        Ok(Self {
            client,
            extractor: CatalogExtractor::new()?,
            page_size: config.page_size,
        })
    }
}

#[async_trait]
impl CatalogSource for CatalogCrawler {
    async fn fetch(&self, url: &str) -> Result<Vec<Media>> {
        let library = library_key(url)?;
        let page_size = self.page_size.to_string();
        let form = [(PAGE_SIZE_FIELD, page_size.as_str())];

        log::debug!("Fetching catalog {} (library '{}')", url, library);
        let html = http::post_form(&self.client, url, &form).await?;
        let media = self.extractor.extract(&html, &library)?;
        log::debug!("{} items listed at {}", media.len(), url);

        Ok(media)
    }
}
