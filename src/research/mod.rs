//! Research retrieval for a resolved request.
//!
//! Market and news requests get a fixed stand-in; ticker requests pull recent
//! headlines from the market-data service and scrape each linked article.

mod store;

pub use store::ResearchStore;

use crate::capability::{guarded, MarketData, NewsItem, TextExtractor};
use crate::config::Settings;
use crate::error::{CapabilityError, NewsreelError, Result};
use crate::request::{Category, MediaRequest};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Stand-in research for market requests.
pub const MARKET_STUB: &str = "market research";
/// Stand-in research for news requests.
pub const NEWS_STUB: &str = "news research";
/// Recorded when a page loaded but no content container was found.
pub const CONTENT_NOT_FOUND: &str =
    "Content not found - page may use dynamic loading or have a different layout";
/// Prefix of the placeholder recorded for a non-200 article response.
pub const FETCH_FAILED_PREFIX: &str = "Failed to fetch article:";
/// Prefix of the placeholder recorded when the article request itself failed.
pub const FETCH_ERROR_PREFIX: &str = "Error fetching the article:";

/// One scraped article.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    pub url: String,
    pub content: String,
}

/// Research material handed to content generation.
#[derive(Debug, Clone, PartialEq)]
pub enum ResearchDocument {
    Articles(Vec<Article>),
    Stub(String),
}

impl ResearchDocument {
    /// Render the research as a single prompt body.
    pub fn body(&self) -> String {
        match self {
            ResearchDocument::Stub(text) => text.clone(),
            ResearchDocument::Articles(articles) => articles
                .iter()
                .map(|a| format!("Title: {}\nSource: {}\n\n{}", a.title, a.url, a.content.trim()))
                .collect::<Vec<_>>()
                .join("\n\n---\n\n"),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ResearchDocument::Stub(_) => 1,
            ResearchDocument::Articles(articles) => articles.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            ResearchDocument::Stub(text) => text.is_empty(),
            ResearchDocument::Articles(articles) => articles.is_empty(),
        }
    }
}

/// Fetches research and persists ticker documents.
pub struct ResearchFetcher {
    market_data: Arc<dyn MarketData>,
    extractor: Arc<dyn TextExtractor>,
    http: reqwest::Client,
    store: Arc<ResearchStore>,
    max_concurrent: usize,
    market_timeout: Duration,
    scrape_timeout: Duration,
}

impl ResearchFetcher {
    pub fn new(
        market_data: Arc<dyn MarketData>,
        extractor: Arc<dyn TextExtractor>,
        http: reqwest::Client,
        store: Arc<ResearchStore>,
        settings: &Settings,
    ) -> Self {
        Self {
            market_data,
            extractor,
            http,
            store,
            max_concurrent: settings.research.max_concurrent_fetches.max(1),
            market_timeout: settings.timeouts.market_data(),
            scrape_timeout: settings.timeouts.scrape(),
        }
    }

    /// Fetch research for a request.
    #[instrument(skip(self, request, cancel), fields(category = %request.category(), subject = %request.subject()))]
    pub async fn fetch(
        &self,
        request: &MediaRequest,
        cancel: &CancellationToken,
    ) -> Result<ResearchDocument> {
        match request.category() {
            Category::Market => Ok(ResearchDocument::Stub(MARKET_STUB.to_string())),
            Category::News => Ok(ResearchDocument::Stub(NEWS_STUB.to_string())),
            Category::Ticker => {
                let articles = self.fetch_ticker(request.subject(), cancel).await?;
                self.store.save(request.subject(), &articles).await?;
                Ok(ResearchDocument::Articles(articles))
            }
        }
    }

    async fn fetch_ticker(&self, ticker: &str, cancel: &CancellationToken) -> Result<Vec<Article>> {
        let news = guarded(
            cancel,
            "market data",
            self.market_timeout,
            self.market_data.recent_news(ticker),
        )
        .await
        .map_err(NewsreelError::fetch)?;

        info!("Fetching {} articles for {}", news.len(), ticker);

        let results: Vec<std::result::Result<Article, CapabilityError>> =
            futures::stream::iter(news)
                .map(|item| async move { self.fetch_article(&item, cancel).await })
                .buffered(self.max_concurrent)
                .collect()
                .await;

        results
            .into_iter()
            .map(|r| r.map_err(NewsreelError::fetch))
            .collect()
    }

    /// Fetch one article. Only cancellation is returned as an error; every
    /// other failure becomes placeholder content for this item.
    async fn fetch_article(
        &self,
        item: &NewsItem,
        cancel: &CancellationToken,
    ) -> std::result::Result<Article, CapabilityError> {
        let outcome = guarded(cancel, "article", self.scrape_timeout, self.download(&item.link)).await;

        let (url, content) = match outcome {
            Ok((final_url, status, _)) if status != 200 => {
                (final_url, format!("{} HTTP {}", FETCH_FAILED_PREFIX, status))
            }
            Ok((final_url, _, html)) => {
                let content = self
                    .extractor
                    .extract(&html)
                    .unwrap_or_else(|| CONTENT_NOT_FOUND.to_string());
                (final_url, content)
            }
            Err(CapabilityError::Cancelled(what)) => return Err(CapabilityError::Cancelled(what)),
            Err(e) => {
                warn!("Article fetch failed for {}: {}", item.link, e);
                (item.link.clone(), format!("{} {}", FETCH_ERROR_PREFIX, e))
            }
        };

        debug!("Fetched '{}' ({} chars)", item.title, content.len());

        Ok(Article {
            title: item.title.clone(),
            url,
            content,
        })
    }

    /// GET a page, returning the final URL after redirects, the status and the body.
    async fn download(&self, link: &str) -> std::result::Result<(String, u16, String), CapabilityError> {
        let response = self
            .http
            .get(link)
            .send()
            .await
            .map_err(|e| CapabilityError::service("article", e))?;

        let final_url = response.url().to_string();
        let status = response.status().as_u16();
        let body = if status == 200 {
            response
                .text()
                .await
                .map_err(|e| CapabilityError::service("article", e))?
        } else {
            String::new()
        };

        Ok((final_url, status, body))
    }
}
