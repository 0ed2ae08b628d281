//! Ticker news from the Yahoo Finance search endpoint.

use super::{CapabilityResult, MarketData, NewsItem};
use crate::config::MarketDataSettings;
use crate::error::CapabilityError;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument};

const MARKET_DATA: &str = "market data";

pub struct YahooFinance {
    client: reqwest::Client,
    search_url: String,
    news_count: u32,
}

impl YahooFinance {
    pub fn new(client: reqwest::Client, settings: &MarketDataSettings) -> Self {
        Self {
            client,
            search_url: settings.search_url.clone(),
            news_count: settings.news_count,
        }
    }

    fn request_url(&self, ticker: &str) -> CapabilityResult<url::Url> {
        url::Url::parse_with_params(
            &self.search_url,
            &[
                ("q", ticker.to_string()),
                ("newsCount", self.news_count.to_string()),
                ("quotesCount", "0".to_string()),
            ],
        )
        .map_err(|e| CapabilityError::service(MARKET_DATA, format!("Bad search URL: {}", e)))
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    news: Vec<SearchNews>,
}

#[derive(Debug, Deserialize)]
struct SearchNews {
    title: Option<String>,
    link: Option<String>,
}

/// Keep only items that have both a title and a link.
fn parse_news(body: &str) -> CapabilityResult<Vec<NewsItem>> {
    let parsed: SearchResponse =
        serde_json::from_str(body).map_err(|e| CapabilityError::malformed(MARKET_DATA, e))?;

    Ok(parsed
        .news
        .into_iter()
        .filter_map(|item| match (item.title, item.link) {
            (Some(title), Some(link)) if !link.is_empty() => Some(NewsItem { title, link }),
            _ => None,
        })
        .collect())
}

#[async_trait]
impl MarketData for YahooFinance {
    #[instrument(skip(self))]
    async fn recent_news(&self, ticker: &str) -> CapabilityResult<Vec<NewsItem>> {
        let url = self.request_url(ticker)?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| CapabilityError::service(MARKET_DATA, e))?;

        if !response.status().is_success() {
            return Err(CapabilityError::service(
                MARKET_DATA,
                format!("HTTP {}", response.status().as_u16()),
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|e| CapabilityError::service(MARKET_DATA, e))?;

        let items = parse_news(&body)?;
        debug!("Found {} news items for {}", items.len(), ticker);
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_news_skips_incomplete_items() {
        let body = r#"{
            "news": [
                {"title": "Apple beats estimates", "link": "https://finance.example/a"},
                {"title": "No link here"},
                {"title": "Services revenue climbs", "link": "https://finance.example/b", "publisher": "X"}
            ]
        }"#;

        let items = parse_news(body).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].title, "Services revenue climbs");
    }

    #[test]
    fn test_parse_news_rejects_garbage() {
        assert!(matches!(parse_news("<html>"), Err(CapabilityError::Malformed { .. })));
    }

    #[test]
    fn test_request_url_encodes_ticker() {
        let yahoo = YahooFinance::new(reqwest::Client::new(), &MarketDataSettings::default());
        let url = yahoo.request_url("BRK B").unwrap();
        assert!(url.as_str().contains("q=BRK+B"));
        assert!(url.as_str().contains("newsCount=8"));
    }
}
