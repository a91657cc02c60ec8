//! OKX public market-data client

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::models::{OkxBook, OkxCandleRow, OkxResponse, OkxTicker, OkxTrade};
use super::{MarketData, RetryPolicy};
use crate::orderflow::{RawTrade, TradeTape};
use crate::types::{Candle, OrderBookSnapshot};

pub const DEFAULT_BASE_URL: &str = "https://www.okx.com";

pub struct OkxClient {
    client: Client,
    base_url: String,
    retry: RetryPolicy,
}

impl OkxClient {
    pub fn new(base_url: impl Into<String>, retry: RetryPolicy) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            retry,
        })
    }

    async fn get_once<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>> {
        let response = self
            .client
            .get(format!("{}{}", self.base_url, endpoint))
            .query(query)
            .send()
            .await
            .with_context(|| format!("Failed to send request to {}", endpoint))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Request to {} failed ({}): {}", endpoint, status, body));
        }

        let envelope: OkxResponse<T> = response
            .json()
            .await
            .with_context(|| format!("Failed to parse response from {}", endpoint))?;
        if envelope.code != "0" {
            bail!("{} returned code {}: {}", endpoint, envelope.code, envelope.msg);
        }
        Ok(envelope.data)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>> {
        self.retry
            .run(endpoint, || self.get_once(endpoint, query))
            .await
    }
}

/// USDT pairs by 24h quote volume, highest first, name as tie-breaker
pub fn rank_tickers(tickers: Vec<OkxTicker>, limit: usize) -> Vec<String> {
    let mut rows: Vec<(String, f64)> = tickers
        .into_iter()
        .filter(|t| t.inst_id.ends_with("-USDT"))
        .map(|t| {
            let volume = t.vol_ccy24h.parse::<f64>().ok().filter(|v| v.is_finite()).unwrap_or(0.0);
            (t.inst_id, volume)
        })
        .collect();
    rows.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    rows.into_iter().take(limit).map(|(id, _)| id).collect()
}

fn parse_candle(row: &OkxCandleRow) -> Result<Candle> {
    let field = |i: usize| -> Result<f64> {
        let raw = row.get(i).ok_or_else(|| anyhow!("candle row has no field {}", i))?;
        raw.parse::<f64>()
            .with_context(|| format!("candle field {} '{}'", i, raw))
    };
    let ms: i64 = row
        .first()
        .ok_or_else(|| anyhow!("empty candle row"))?
        .parse()
        .context("candle timestamp")?;
    let timestamp = DateTime::<Utc>::from_timestamp_millis(ms)
        .ok_or_else(|| anyhow!("timestamp {} out of range", ms))?;
    // volCcy is quote-currency volume on spot
    let turnover = field(6).unwrap_or(0.0);
    Candle::new(timestamp, field(1)?, field(2)?, field(3)?, field(4)?, turnover)
}

/// OKX lists candles newest first; returned oldest first
pub fn parse_candles(rows: &[OkxCandleRow]) -> Vec<Candle> {
    rows.iter()
        .rev()
        .filter_map(|row| match parse_candle(row) {
            Ok(candle) => Some(candle),
            Err(e) => {
                debug!("Skipping malformed candle {:?}: {:#}", row, e);
                None
            }
        })
        .collect()
}

fn parse_levels(levels: &[Vec<String>]) -> Vec<(f64, f64)> {
    levels
        .iter()
        .filter_map(|lvl| {
            let px = lvl.first()?.parse::<f64>().ok()?;
            let sz = lvl.get(1)?.parse::<f64>().ok()?;
            Some((px, sz))
        })
        .collect()
}

pub fn parse_book(book: &OkxBook) -> Result<OrderBookSnapshot> {
    OrderBookSnapshot::from_levels(&parse_levels(&book.bids), &parse_levels(&book.asks))
}

impl MarketData for OkxClient {
    async fn top_instruments(&self, limit: usize) -> Result<Vec<String>> {
        let tickers: Vec<OkxTicker> = self
            .get("/api/v5/market/tickers", &[("instType", "SPOT".to_string())])
            .await?;
        let ranked = rank_tickers(tickers, limit);
        debug!("Ranked {} USDT instruments", ranked.len());
        Ok(ranked)
    }

    async fn candles(
        &self,
        instrument: &str,
        timeframe: &str,
        limit: usize,
    ) -> Result<Vec<Candle>> {
        let rows: Vec<OkxCandleRow> = self
            .get(
                "/api/v5/market/candles",
                &[
                    ("instId", instrument.to_string()),
                    ("bar", timeframe.to_string()),
                    ("limit", limit.to_string()),
                ],
            )
            .await?;
        Ok(parse_candles(&rows))
    }

    async fn trades(&self, instrument: &str, limit: usize) -> Result<TradeTape> {
        let trades: Vec<OkxTrade> = self
            .get(
                "/api/v5/market/trades",
                &[("instId", instrument.to_string()), ("limit", limit.to_string())],
            )
            .await?;
        let raw: Vec<RawTrade> = trades.into_iter().map(RawTrade::from).collect();
        Ok(TradeTape::from_raw(&raw))
    }

    async fn order_book(
        &self,
        instrument: &str,
        depth: usize,
    ) -> Result<Option<OrderBookSnapshot>> {
        let books: Vec<OkxBook> = self
            .get(
                "/api/v5/market/books",
                &[("instId", instrument.to_string()), ("sz", depth.to_string())],
            )
            .await?;
        match books.first() {
            Some(book) if !(book.bids.is_empty() && book.asks.is_empty()) => {
                parse_book(book).map(Some)
            }
            _ => Ok(None),
        }
    }
}
