//! Value types shared by the detectors, the aggregator and the digest.
//!
//! Everything here is immutable once built. Constructors validate numeric
//! fields at the boundary so the detectors never see NaN or negative prices.

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::EngineProfile;
use crate::market_cap::MarketCapSegment;
use crate::orderflow::TradeTape;
use crate::pump::PumpReading;

fn check_price(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        bail!("{} must be a finite non-negative number, got {}", name, value);
    }
    Ok(())
}

/// OHLC bar with quote-currency turnover
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub turnover: f64,
}

impl Candle {
    pub fn new(
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        turnover: f64,
    ) -> Result<Self> {
        check_price("open", open)?;
        check_price("high", high)?;
        check_price("low", low)?;
        check_price("close", close)?;
        check_price("turnover", turnover)?;
        if low > high {
            bail!("candle low {} above high {}", low, high);
        }
        Ok(Self {
            timestamp,
            open,
            high,
            low,
            close,
            turnover,
        })
    }

    /// Absolute open-to-close distance
    pub fn body(&self) -> f64 {
        (self.close - self.open).abs()
    }

    /// Full high-to-low range
    pub fn range(&self) -> f64 {
        self.high - self.low
    }
}

/// Aggressor side of a trade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl TradeSide {
    /// Parse the venue's side string; anything but buy/sell is rejected
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "buy" => Ok(Self::Buy),
            "sell" => Ok(Self::Sell),
            other => bail!("unknown trade side '{}'", other),
        }
    }
}

impl std::fmt::Display for TradeSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
        }
    }
}

/// Single print from the trade tape
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub price: f64,
    pub size: f64,
    pub side: TradeSide,
    pub timestamp: DateTime<Utc>,
}

impl Trade {
    pub fn new(price: f64, size: f64, side: TradeSide, timestamp: DateTime<Utc>) -> Result<Self> {
        check_price("price", price)?;
        check_price("size", size)?;
        Ok(Self {
            price,
            size,
            side,
            timestamp,
        })
    }

    /// Quote notional, `price * |size|`
    pub fn notional(&self) -> f64 {
        self.price * self.size.abs()
    }
}

/// Aggregated notional over a fixed depth on each side of the book
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrderBookSnapshot {
    pub bid_notional: f64,
    pub ask_notional: f64,
    pub best_bid: Option<f64>,
    pub best_ask: Option<f64>,
}

impl OrderBookSnapshot {
    pub fn new(
        bid_notional: f64,
        ask_notional: f64,
        best_bid: Option<f64>,
        best_ask: Option<f64>,
    ) -> Result<Self> {
        check_price("bid_notional", bid_notional)?;
        check_price("ask_notional", ask_notional)?;
        if let Some(bid) = best_bid {
            check_price("best_bid", bid)?;
        }
        if let Some(ask) = best_ask {
            check_price("best_ask", ask)?;
        }
        Ok(Self {
            bid_notional,
            ask_notional,
            best_bid,
            best_ask,
        })
    }

    /// Sum `price * size` over `(price, size)` levels, skipping unusable rows
    pub fn from_levels(bids: &[(f64, f64)], asks: &[(f64, f64)]) -> Result<Self> {
        let sum = |levels: &[(f64, f64)]| -> f64 {
            levels
                .iter()
                .filter(|(px, sz)| px.is_finite() && sz.is_finite())
                .map(|(px, sz)| px * sz)
                .sum()
        };
        Self::new(
            sum(bids),
            sum(asks),
            bids.first().map(|(px, _)| *px),
            asks.first().map(|(px, _)| *px),
        )
    }
}

/// Trade direction of an emitted signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Long,
    Short,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Long => write!(f, "LONG"),
            Direction::Short => write!(f, "SHORT"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructureKind {
    Support,
    Resistance,
    MsbBull,
    MsbBear,
    FvgBull,
    FvgBear,
}

impl StructureKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Support => "Support bounce",
            Self::Resistance => "Resistance rejection",
            Self::MsbBull => "Bullish MSB",
            Self::MsbBear => "Bearish MSB",
            Self::FvgBull => "Bullish FVG retest",
            Self::FvgBear => "Bearish FVG retest",
        }
    }
}

/// Price band (or single level when `low == high`) produced by a detector
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StructureLevel {
    pub kind: StructureKind,
    pub low: f64,
    pub high: f64,
}

impl StructureLevel {
    pub fn band(kind: StructureKind, low: f64, high: f64) -> Self {
        Self { kind, low, high }
    }

    pub fn point(kind: StructureKind, level: f64) -> Self {
        Self {
            kind,
            low: level,
            high: level,
        }
    }
}

/// Size tier of a whale print, ascending
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum WhaleTier {
    Small,
    Medium,
    Large,
}

impl std::fmt::Display for WhaleTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Small => write!(f, "S"),
            Self::Medium => write!(f, "M"),
            Self::Large => write!(f, "X"),
        }
    }
}

/// Largest qualifying trade on one side of the tape
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WhaleTrade {
    pub price: f64,
    pub size: f64,
    pub notional: f64,
    pub side: TradeSide,
    pub tier: WhaleTier,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrderFlowSummary {
    pub buy_notional: f64,
    pub sell_notional: f64,
    pub net_delta: f64,
    pub buy_whale: Option<WhaleTrade>,
    pub sell_whale: Option<WhaleTrade>,
    /// Share of buys among the most recent trades (0.5 with no data)
    pub buy_ratio: f64,
    pub sell_ratio: f64,
}

impl Default for OrderFlowSummary {
    fn default() -> Self {
        Self {
            buy_notional: 0.0,
            sell_notional: 0.0,
            net_delta: 0.0,
            buy_whale: None,
            sell_whale: None,
            buy_ratio: 0.5,
            sell_ratio: 0.5,
        }
    }
}

impl OrderFlowSummary {
    /// The whale on the signal's own side
    pub fn whale_for(&self, side: Direction) -> Option<&WhaleTrade> {
        match side {
            Direction::Long => self.buy_whale.as_ref(),
            Direction::Short => self.sell_whale.as_ref(),
        }
    }

    pub fn ratio_for(&self, side: Direction) -> f64 {
        match side {
            Direction::Long => self.buy_ratio,
            Direction::Short => self.sell_ratio,
        }
    }
}

/// Stop and staged targets for a structural signal
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskLevels {
    pub stop: f64,
    pub tp1: f64,
    pub tp2: f64,
    pub tp3: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionKind {
    Structure,
    NetDelta,
    BookImbalance,
    Whale,
    Participation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionCheck {
    pub kind: ConditionKind,
    pub passed: bool,
}

/// Accepted, ranked output of one analysis unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub instrument: String,
    pub timeframe: String,
    pub profile: EngineProfile,
    pub side: Direction,
    pub confidence: u8,
    pub conditions_satisfied: usize,
    pub conditions: Vec<ConditionCheck>,
    /// Levels whose detector fired for this side
    pub structure: Vec<StructureLevel>,
    pub last_close: f64,
    pub segment: MarketCapSegment,
    pub order_flow: OrderFlowSummary,
    pub order_book: Option<OrderBookSnapshot>,
    pub risk: Option<RiskLevels>,
    pub pump: Option<PumpReading>,
}

/// All market data for one (instrument, timeframe) analysis
#[derive(Debug, Clone)]
pub struct MarketSnapshot {
    pub instrument: String,
    pub timeframe: String,
    /// Chronological, oldest first
    pub candles: Vec<Candle>,
    pub trades: TradeTape,
    pub order_book: Option<OrderBookSnapshot>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candle_rejects_bad_numbers() {
        let ts = Utc::now();
        assert!(Candle::new(ts, 1.0, 2.0, 0.5, 1.5, 10.0).is_ok());
        assert!(Candle::new(ts, f64::NAN, 2.0, 0.5, 1.5, 10.0).is_err());
        assert!(Candle::new(ts, 1.0, 2.0, -0.5, 1.5, 10.0).is_err());
        assert!(Candle::new(ts, 1.0, 1.0, 2.0, 1.5, 10.0).is_err());
    }

    #[test]
    fn test_trade_side_parse() {
        assert_eq!(TradeSide::parse("BUY").unwrap(), TradeSide::Buy);
        assert_eq!(TradeSide::parse(" sell ").unwrap(), TradeSide::Sell);
        assert!(TradeSide::parse("cross").is_err());
    }

    #[test]
    fn test_trade_rejects_negative_size() {
        let ts = Utc::now();
        assert!(Trade::new(100.0, -3.0, TradeSide::Sell, ts).is_err());
        let trade = Trade::new(100.0, 3.0, TradeSide::Sell, ts).unwrap();
        assert_eq!(trade.notional(), 300.0);
    }

    #[test]
    fn test_book_from_levels() {
        let book =
            OrderBookSnapshot::from_levels(&[(10.0, 2.0), (9.0, 1.0)], &[(11.0, 1.0)]).unwrap();
        assert_eq!(book.bid_notional, 29.0);
        assert_eq!(book.ask_notional, 11.0);
        assert_eq!(book.best_bid, Some(10.0));
        assert_eq!(book.best_ask, Some(11.0));
    }

    #[test]
    fn test_direction_serializes_uppercase() {
        let json = serde_json::to_string(&Direction::Short).unwrap();
        assert_eq!(json, "\"SHORT\"");
    }
}
