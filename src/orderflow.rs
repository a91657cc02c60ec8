//! Trade-tape aggregation: buy/sell notional, net delta, biggest whale per
//! side and a short-window participation ratio.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::market_cap::WhaleThresholds;
use crate::types::{OrderFlowSummary, Trade, TradeSide, WhaleTier, WhaleTrade};

/// Unvalidated trade row as delivered by a venue
#[derive(Debug, Clone, Default)]
pub struct RawTrade {
    pub price: String,
    pub size: String,
    pub side: String,
    pub timestamp_ms: String,
}

impl RawTrade {
    fn parse(&self) -> anyhow::Result<Trade> {
        let price: f64 = self.price.trim().parse()?;
        let size: f64 = self.size.trim().parse()?;
        let side = TradeSide::parse(&self.side)?;
        let ms: i64 = self.timestamp_ms.trim().parse()?;
        let timestamp = DateTime::<Utc>::from_timestamp_millis(ms)
            .ok_or_else(|| anyhow::anyhow!("timestamp {} out of range", ms))?;
        Trade::new(price, size, side, timestamp)
    }
}

/// Trade tape in chronological order, oldest first.
///
/// Venues disagree on tape direction, so the tape is sorted by timestamp on
/// construction. "Last N trades" always means the N most recent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TradeTape {
    trades: Vec<Trade>,
}

impl TradeTape {
    pub fn new(mut trades: Vec<Trade>) -> Self {
        trades.sort_by_key(|t| t.timestamp);
        Self { trades }
    }

    /// Parse raw rows, skipping any row with an unusable field
    pub fn from_raw(rows: &[RawTrade]) -> Self {
        let mut skipped = 0usize;
        let trades = rows
            .iter()
            .filter_map(|row| match row.parse() {
                Ok(trade) => Some(trade),
                Err(e) => {
                    skipped += 1;
                    debug!("Skipping malformed trade {:?}: {}", row, e);
                    None
                }
            })
            .collect();
        if skipped > 0 {
            debug!("Skipped {} malformed trades", skipped);
        }
        Self::new(trades)
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    /// The `n` most recent trades
    pub fn recent(&self, n: usize) -> &[Trade] {
        let start = self.trades.len().saturating_sub(n);
        &self.trades[start..]
    }

    pub fn len(&self) -> usize {
        self.trades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }
}

/// Highest tier a notional clears, if any
pub fn classify_whale(notional: f64, thresholds: &WhaleThresholds) -> Option<WhaleTier> {
    if notional >= thresholds.large {
        Some(WhaleTier::Large)
    } else if notional >= thresholds.medium {
        Some(WhaleTier::Medium)
    } else if notional >= thresholds.small {
        Some(WhaleTier::Small)
    } else {
        None
    }
}

fn keep_bigger(slot: &mut Option<WhaleTrade>, trade: &Trade, notional: f64, tier: WhaleTier) {
    let bigger = slot.map_or(true, |w| notional > w.notional);
    if bigger {
        *slot = Some(WhaleTrade {
            price: trade.price,
            size: trade.size,
            notional,
            side: trade.side,
            tier,
            timestamp: trade.timestamp,
        });
    }
}

/// Summarise a tape. Never fails; an empty tape gives the neutral summary.
pub fn analyze_order_flow(
    tape: &TradeTape,
    thresholds: &WhaleThresholds,
    momentum_window: usize,
) -> OrderFlowSummary {
    let mut summary = OrderFlowSummary::default();

    for trade in tape.trades() {
        let notional = trade.notional();
        let tier = classify_whale(notional, thresholds);
        match trade.side {
            TradeSide::Buy => {
                summary.buy_notional += notional;
                if let Some(tier) = tier {
                    keep_bigger(&mut summary.buy_whale, trade, notional, tier);
                }
            }
            TradeSide::Sell => {
                summary.sell_notional += notional;
                if let Some(tier) = tier {
                    keep_bigger(&mut summary.sell_whale, trade, notional, tier);
                }
            }
        }
    }
    summary.net_delta = summary.buy_notional - summary.sell_notional;

    let recent = tape.recent(momentum_window);
    if !recent.is_empty() {
        let buys = recent.iter().filter(|t| t.side == TradeSide::Buy).count();
        summary.buy_ratio = buys as f64 / recent.len() as f64;
        summary.sell_ratio = 1.0 - summary.buy_ratio;
    }

    summary
}
