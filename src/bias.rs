//! Higher-timeframe market bias from a reference instrument

use serde::{Deserialize, Serialize};

use crate::indicators::ema;
use crate::types::{Candle, Direction, OrderFlowSummary, WhaleTrade};

const MIN_CANDLES: usize = 50;
const LONG_SPAN: usize = 200;
const FAST_SPAN: usize = 12;
const SLOW_SPAN: usize = 26;
const LONG_BAND: f64 = 0.01;
const SHORT_BAND: f64 = 0.002;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketBias {
    Bull,
    Bear,
    Neutral,
}

impl MarketBias {
    /// Whether a signal on `side` survives this bias
    pub fn allows(&self, side: Direction) -> bool {
        !matches!(
            (self, side),
            (Self::Bear, Direction::Long) | (Self::Bull, Direction::Short)
        )
    }
}

impl std::fmt::Display for MarketBias {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bull => write!(f, "BULL"),
            Self::Bear => write!(f, "BEAR"),
            Self::Neutral => write!(f, "NEUTRAL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendRead {
    Up,
    Down,
    Flat,
    /// Not enough history for the reference EMA
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Momentum {
    Positive,
    Negative,
    Flat,
    Unknown,
}

/// Trend read of the reference instrument, also shown in the digest header
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendSummary {
    pub instrument: String,
    pub last_close: f64,
    pub trend_4h: TrendRead,
    pub momentum_4h: Momentum,
    pub trend_1h: TrendRead,
    pub net_delta: Option<f64>,
    pub buy_whale: Option<WhaleTrade>,
}

fn band_read(value: f64, reference: f64, band: f64) -> TrendRead {
    if value > reference * (1.0 + band) {
        TrendRead::Up
    } else if value < reference * (1.0 - band) {
        TrendRead::Down
    } else {
        TrendRead::Flat
    }
}

/// Build the summary from 4H and 1H candles; `None` below 50 candles on
/// either timeframe
pub fn summarize_trend(
    instrument: &str,
    candles_4h: &[Candle],
    candles_1h: &[Candle],
    order_flow: Option<&OrderFlowSummary>,
) -> Option<TrendSummary> {
    if candles_4h.len() < MIN_CANDLES || candles_1h.len() < MIN_CANDLES {
        return None;
    }
    let closes_4h: Vec<f64> = candles_4h.iter().map(|c| c.close).collect();
    let closes_1h: Vec<f64> = candles_1h.iter().map(|c| c.close).collect();
    let last_close = *closes_4h.last()?;

    let trend_4h = match ema(&closes_4h, LONG_SPAN) {
        Some(reference) => band_read(last_close, reference, LONG_BAND),
        None => TrendRead::Unknown,
    };

    let momentum_4h = match (ema(&closes_4h, FAST_SPAN), ema(&closes_4h, SLOW_SPAN)) {
        (Some(fast), Some(slow)) if fast > slow => Momentum::Positive,
        (Some(fast), Some(slow)) if fast < slow => Momentum::Negative,
        (Some(_), Some(_)) => Momentum::Flat,
        _ => Momentum::Unknown,
    };

    let trend_1h = match (ema(&closes_1h, FAST_SPAN), ema(&closes_1h, SLOW_SPAN)) {
        (Some(fast), Some(slow)) => band_read(fast, slow, SHORT_BAND),
        _ => TrendRead::Unknown,
    };

    Some(TrendSummary {
        instrument: instrument.to_string(),
        last_close,
        trend_4h,
        momentum_4h,
        trend_1h,
        net_delta: order_flow.map(|of| of.net_delta),
        buy_whale: order_flow.and_then(|of| of.buy_whale),
    })
}

/// Bull when both timeframes trend up, Bear when both trend down
pub fn market_bias(summary: Option<&TrendSummary>) -> MarketBias {
    match summary.map(|s| (s.trend_4h, s.trend_1h)) {
        Some((TrendRead::Up, TrendRead::Up)) => MarketBias::Bull,
        Some((TrendRead::Down, TrendRead::Down)) => MarketBias::Bear,
        _ => MarketBias::Neutral,
    }
}
