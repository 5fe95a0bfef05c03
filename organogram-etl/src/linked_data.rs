//! Linked-Data Client
//!
//! Fetches post items for one body and period from the linked-data item API.
//!
//! # API Reference
//! - Listing: `{base}/{period}/doc/{body_type}/{body_name}/post.json?_page={n}`
//! - Detail: `{base}/{period}/doc/{body_type}/{body_name}/post/{ref}.json`
//! - Listing envelope: `{"result": {"items": [...], "itemsPerPage": n}}`
//! - Detail envelope: `{"result": {"primaryTopic": {...}}}`

use crate::eliminated::PostDetailSource;
use crate::normalizer::{NormalizeContext, PostNormalizer};
use crate::retry::with_retries;
use crate::types::LinkedDataItem;
use async_trait::async_trait;
use organogram_common::config::LinkedDataConfig;
use organogram_common::{Error, Period, Post, Result};
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

/// Body identified by `http://reference.data.gov.uk/id/<type>/<name>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyUri {
    pub body_type: String,
    pub body_name: String,
}

impl BodyUri {
    pub fn parse(uri: &str) -> Result<Self> {
        let url = Url::parse(uri.trim()).map_err(|e| Error::Config(format!("Invalid body URI '{}': {}", uri, e)))?;
        let segments: Vec<&str> = url
            .path_segments()
            .map(|s| s.filter(|seg| !seg.is_empty()).collect())
            .unwrap_or_default();

        match segments.as_slice() {
            ["id", body_type, body_name] => Ok(Self {
                body_type: body_type.to_string(),
                body_name: body_name.to_string(),
            }),
            _ => Err(Error::Config(format!(
                "Body URI '{}' is not of the form <base>/id/<type>/<name>",
                uri
            ))),
        }
    }
}

/// One page of the post listing
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ItemsPage {
    #[serde(default)]
    pub items: Vec<LinkedDataItem>,
    #[serde(default, rename = "itemsPerPage")]
    pub items_per_page: usize,
}

/// Raw access to the item API
#[async_trait]
pub trait LinkedDataSource: Send + Sync {
    /// One listing page, numbered from 1
    async fn fetch_page(&self, body: &BodyUri, period: Period, page: usize) -> Result<ItemsPage>;

    /// One post item. `Ok(None)` if the API has no such post.
    async fn fetch_post_item(&self, body: &BodyUri, period: Period, post_ref: &str) -> Result<Option<LinkedDataItem>>;
}

/// Fetch every listing page, stopping at the first short page or the first
/// page that does not say how long a page is
pub async fn fetch_all_items(
    source: &dyn LinkedDataSource,
    body: &BodyUri,
    period: Period,
    fetch_attempts: u32,
) -> Result<Vec<LinkedDataItem>> {
    let mut items = Vec::new();
    let mut page = 1;

    loop {
        let operation = format!("post listing page {}", page);
        let fetched = with_retries(&operation, fetch_attempts, || source.fetch_page(body, period, page)).await?;
        let count = fetched.items.len();
        debug!(page, count, items_per_page = fetched.items_per_page, "Fetched listing page");
        items.extend(fetched.items);

        // a listing without a page size is a single page
        if count == 0 || fetched.items_per_page == 0 || count < fetched.items_per_page {
            break;
        }
        page += 1;
    }

    info!(
        body = %body.body_name,
        period = %period,
        items = items.len(),
        pages = page,
        "Fetched linked-data posts"
    );
    Ok(items)
}

// ============================================================================
// HTTP client
// ============================================================================

#[derive(Deserialize)]
struct ListingEnvelope {
    result: ItemsPage,
}

#[derive(Deserialize)]
struct DetailEnvelope {
    result: DetailResult,
}

#[derive(Deserialize)]
struct DetailResult {
    #[serde(rename = "primaryTopic")]
    primary_topic: Option<LinkedDataItem>,
}

pub struct LinkedDataClient {
    http_client: Client,
    base_url: String,
}

impl LinkedDataClient {
    pub fn new(config: &LinkedDataConfig) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            http_client,
            base_url: config.base_url.clone(),
        })
    }

    /// `{base}/{period}/doc/{type}/{name}/<tail...>`
    fn url(&self, body: &BodyUri, period: Period, tail: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| Error::Config(format!("Invalid base URL '{}': {}", self.base_url, e)))?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| Error::Config(format!("Base URL '{}' cannot have a path", self.base_url)))?;
            segments
                .pop_if_empty()
                .push(&period.to_string())
                .push("doc")
                .push(&body.body_type)
                .push(&body.body_name)
                .extend(tail);
        }
        Ok(url)
    }

    async fn get(&self, url: Url) -> Result<Option<reqwest::Response>> {
        debug!(url = %url, "GET");
        let response = self
            .http_client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| Error::Fetch(format!("Request to {} failed: {}", url, e)))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Fetch(format!("{} returned {}: {}", url, status, body)));
        }
        Ok(Some(response))
    }
}

#[async_trait]
impl LinkedDataSource for LinkedDataClient {
    async fn fetch_page(&self, body: &BodyUri, period: Period, page: usize) -> Result<ItemsPage> {
        let mut url = self.url(body, period, &["post.json"])?;
        url.query_pairs_mut().append_pair("_page", &page.to_string());

        match self.get(url.clone()).await? {
            // past the last page
            None => Ok(ItemsPage::default()),
            Some(response) => {
                let envelope: ListingEnvelope = response
                    .json()
                    .await
                    .map_err(|e| Error::Fetch(format!("Failed to parse {}: {}", url, e)))?;
                Ok(envelope.result)
            }
        }
    }

    async fn fetch_post_item(&self, body: &BodyUri, period: Period, post_ref: &str) -> Result<Option<LinkedDataItem>> {
        let url = self.url(body, period, &["post", &format!("{}.json", post_ref)])?;

        match self.get(url.clone()).await? {
            None => Ok(None),
            Some(response) => {
                let envelope: DetailEnvelope = response
                    .json()
                    .await
                    .map_err(|e| Error::Fetch(format!("Failed to parse {}: {}", url, e)))?;
                Ok(envelope.result.primary_topic)
            }
        }
    }
}

// ============================================================================
// Post detail adapter
// ============================================================================

/// Serves eliminated-post lookups from the item API
pub struct LinkedDataPostSource<'a> {
    source: &'a dyn LinkedDataSource,
    body: BodyUri,
    period: Period,
    normalizer: PostNormalizer,
}

impl<'a> LinkedDataPostSource<'a> {
    pub fn new(source: &'a dyn LinkedDataSource, body: BodyUri, period: Period, ctx: NormalizeContext) -> Self {
        Self {
            source,
            body,
            period,
            normalizer: PostNormalizer::new(ctx),
        }
    }
}

#[async_trait]
impl PostDetailSource for LinkedDataPostSource<'_> {
    async fn fetch_post(&self, post_ref: &str) -> Result<Option<Post>> {
        let Some(item) = self.source.fetch_post_item(&self.body, self.period, post_ref).await? else {
            return Ok(None);
        };

        let mut errors = Vec::new();
        let mut warnings = Vec::new();
        let posts = self.normalizer.normalize_linked_item(&item, &mut errors, &mut warnings);
        if !errors.is_empty() {
            return Err(Error::Ingestion(errors));
        }
        Ok(posts.into_iter().next())
    }
}
