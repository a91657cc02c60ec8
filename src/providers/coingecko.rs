//! CoinGecko market-cap lookup

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use tracing::{info, warn};

use super::models::CoinGeckoMarket;
use super::{MarketCapSource, RetryPolicy};
use crate::market_cap::MarketCapBook;

pub const DEFAULT_BASE_URL: &str = "https://api.coingecko.com/api/v3";
const PER_PAGE: usize = 250;

pub struct CoinGeckoClient {
    client: Client,
    base_url: String,
    max_pages: usize,
    retry: RetryPolicy,
}

impl CoinGeckoClient {
    pub fn new(base_url: impl Into<String>, max_pages: usize, retry: RetryPolicy) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            max_pages,
            retry,
        })
    }

    async fn page_once(&self, page: usize) -> Result<Vec<CoinGeckoMarket>> {
        let response = self
            .client
            .get(format!("{}/coins/markets", self.base_url))
            .query(&[
                ("vs_currency", "usd".to_string()),
                ("order", "market_cap_desc".to_string()),
                ("per_page", PER_PAGE.to_string()),
                ("page", page.to_string()),
                ("sparkline", "false".to_string()),
            ])
            .send()
            .await
            .context("Failed to send request to coins/markets")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("coins/markets page {} failed ({}): {}", page, status, body));
        }
        response
            .json()
            .await
            .context("Failed to parse coins/markets response")
    }
}

impl MarketCapSource for CoinGeckoClient {
    /// Pages until a short page, a failed page or `max_pages`. A partial
    /// book is still useful; unknown symbols fall back to default tiers.
    async fn market_caps(&self) -> Result<MarketCapBook> {
        let mut rows: Vec<(String, f64)> = Vec::new();

        for page in 1..=self.max_pages {
            let what = format!("coins/markets page {}", page);
            let markets = match self.retry.run(&what, || self.page_once(page)).await {
                Ok(markets) => markets,
                Err(e) => {
                    warn!("Market caps incomplete: {:#}", e);
                    break;
                }
            };
            let short_page = markets.len() < PER_PAGE;
            rows.extend(
                markets
                    .into_iter()
                    .filter_map(|m| m.market_cap.map(|cap| (m.symbol, cap))),
            );
            if short_page {
                break;
            }
        }

        let book = MarketCapBook::from_entries(rows);
        info!("Loaded market caps for {} symbols", book.len());
        Ok(book)
    }
}
