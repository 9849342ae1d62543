use reqwest::header::ACCEPT;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use super::query::{count_url, key_page_url, media_url, page_url, ListingFilter};
use super::{FeedError, FeedResult, ListingFeed};
use crate::config::FeedConfig;
use crate::models::{Cursor, MediaItem, PageEntry};
use crate::util::{compact_text, is_http_url};

/// HTTP client for a RESO/OData listings provider.
#[derive(Clone)]
pub struct ODataFeedClient {
    client: reqwest::Client,
    base_url: String,
    access_token: String,
    filter: ListingFilter,
    media_limit: u32,
    media_size_description: Option<String>,
}

impl std::fmt::Debug for ODataFeedClient {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("ODataFeedClient")
            .field("base_url", &self.base_url)
            .field("access_token", &"[REDACTED]")
            .field("media_limit", &self.media_limit)
            .field("media_size_description", &self.media_size_description)
            .finish_non_exhaustive()
    }
}

impl ODataFeedClient {
    pub fn new(config: &FeedConfig) -> FeedResult<Self> {
        Self::with_filter(config, ListingFilter::residential())
    }

    pub fn with_filter(config: &FeedConfig, filter: ListingFilter) -> FeedResult<Self> {
        let base_url = config.base_url.trim().trim_end_matches('/').to_string();
        if !is_http_url(&base_url) {
            return Err(FeedError::InvalidConfiguration(
                "base URL must include http:// or https://".to_string(),
            ));
        }
        if config.access_token.trim().is_empty() {
            return Err(FeedError::InvalidConfiguration(
                "access token must not be empty".to_string(),
            ));
        }

        Ok(Self {
            client: reqwest::Client::builder()
                .timeout(config.request_timeout)
                .build()?,
            base_url,
            access_token: config.access_token.trim().to_string(),
            filter,
            media_limit: config.media_limit,
            media_size_description: config.media_size_description.clone(),
        })
    }

    pub const fn filter(&self) -> &ListingFilter {
        &self.filter
    }

    async fn get_page<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        url: &str,
    ) -> FeedResult<ODataPage<T>> {
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.access_token)
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(FeedError::Status {
                operation,
                status,
                body: compact_text(&body),
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body)
            .map_err(|error| FeedError::InvalidPayload(format!("{operation}: {error}")))
    }
}

impl ListingFeed for ODataFeedClient {
    async fn count_pending(&self, cursor: &Cursor) -> FeedResult<u64> {
        let url = count_url(&self.base_url, &self.filter, cursor);
        let page = self.get_page::<IgnoredAny>("Count fetch", &url).await?;
        page.count.ok_or_else(|| {
            FeedError::InvalidPayload("count response did not include @odata.count".to_string())
        })
    }

    async fn fetch_page(
        &self,
        cursor: &Cursor,
        page_size: usize,
    ) -> FeedResult<Vec<PageEntry>> {
        let url = page_url(&self.base_url, &self.filter, cursor, page_size);
        let page = self.get_page::<Value>("Batch fetch", &url).await?;
        Ok(page.value.into_iter().map(PageEntry::from_value).collect())
    }

    async fn fetch_media(&self, listing_key: &str) -> FeedResult<Vec<MediaItem>> {
        let url = media_url(
            &self.base_url,
            listing_key,
            self.media_size_description.as_deref(),
            self.media_limit,
        );
        let page = self.get_page::<RawMedia>("Media fetch", &url).await?;
        Ok(page
            .value
            .into_iter()
            .filter_map(RawMedia::into_item)
            .collect())
    }

    async fn fetch_active_key_page(&self, skip: usize, top: usize) -> FeedResult<Vec<String>> {
        let url = key_page_url(&self.base_url, &self.filter, skip, top);
        let page = self.get_page::<KeyOnly>("Active key fetch", &url).await?;
        Ok(page.value.into_iter().map(|row| row.listing_key).collect())
    }
}

#[derive(Debug, Deserialize)]
struct ODataPage<T> {
    #[serde(default = "Vec::new")]
    value: Vec<T>,
    #[serde(rename = "@odata.count")]
    count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct IgnoredAny {}

#[derive(Debug, Deserialize)]
struct KeyOnly {
    #[serde(rename = "ListingKey")]
    listing_key: String,
}

#[derive(Debug, Deserialize)]
struct RawMedia {
    #[serde(rename = "Order")]
    order: Option<i64>,
    #[serde(rename = "MediaURL")]
    media_url: Option<String>,
}

impl RawMedia {
    fn into_item(self) -> Option<MediaItem> {
        let url = self.media_url?.trim().to_string();
        if url.is_empty() {
            return None;
        }
        Some(MediaItem {
            order: self.order,
            url,
        })
    }
}
