//! Market-data and market-cap adapters
//!
//! The engine only sees the two traits below. `OkxClient` and
//! `CoinGeckoClient` are thin reqwest clients over the public REST APIs;
//! tests substitute in-memory implementations.

pub mod coingecko;
pub mod models;
pub mod okx;
pub mod retry;

pub use coingecko::CoinGeckoClient;
pub use okx::OkxClient;
pub use retry::RetryPolicy;

use anyhow::Result;

use crate::market_cap::MarketCapBook;
use crate::orderflow::TradeTape;
use crate::types::{Candle, OrderBookSnapshot};

/// Inbound market data for one venue
#[allow(async_fn_in_trait)]
pub trait MarketData {
    /// USDT instruments ranked by 24h quote volume, highest first
    async fn top_instruments(&self, limit: usize) -> Result<Vec<String>>;

    /// Candles in chronological order, oldest first
    async fn candles(&self, instrument: &str, timeframe: &str, limit: usize) -> Result<Vec<Candle>>;

    async fn trades(&self, instrument: &str, limit: usize) -> Result<TradeTape>;

    /// `None` when the venue returned an empty book
    async fn order_book(&self, instrument: &str, depth: usize) -> Result<Option<OrderBookSnapshot>>;
}

/// Source of USD market caps by base symbol
#[allow(async_fn_in_trait)]
pub trait MarketCapSource {
    async fn market_caps(&self) -> Result<MarketCapBook>;
}
