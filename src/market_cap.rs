//! Market-cap segments and the whale-size tiers keyed by them
//!
//! The cap book is built once per batch from an external lookup and is
//! read-only afterwards; every analysis receives it by reference.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MarketCapSegment {
    /// $10B and above
    High,
    /// $1B to $10B
    Mid,
    /// $100M to $1B
    Low,
    /// Below $100M
    Micro,
    /// No cap known
    Unknown,
}

impl MarketCapSegment {
    pub fn from_cap(cap_usd: f64) -> Self {
        if !(cap_usd > 0.0) {
            Self::Unknown
        } else if cap_usd >= 10_000_000_000.0 {
            Self::High
        } else if cap_usd >= 1_000_000_000.0 {
            Self::Mid
        } else if cap_usd >= 100_000_000.0 {
            Self::Low
        } else {
            Self::Micro
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::High => "High-cap",
            Self::Mid => "Mid-cap",
            Self::Low | Self::Micro => "Low-cap",
            Self::Unknown => "Unknown-cap",
        }
    }
}

/// Ascending USD notional minimums for S / M / X whale prints
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WhaleThresholds {
    pub small: f64,
    pub medium: f64,
    pub large: f64,
}

impl WhaleThresholds {
    pub const fn new(small: f64, medium: f64, large: f64) -> Self {
        Self {
            small,
            medium,
            large,
        }
    }
}

/// Whale thresholds per segment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhaleTierTable {
    pub high: WhaleThresholds,
    pub mid: WhaleThresholds,
    pub low: WhaleThresholds,
    pub micro: WhaleThresholds,
    pub unknown: WhaleThresholds,
}

impl Default for WhaleTierTable {
    fn default() -> Self {
        Self {
            high: WhaleThresholds::new(500_000.0, 1_000_000.0, 1_500_000.0),
            mid: WhaleThresholds::new(200_000.0, 400_000.0, 800_000.0),
            low: WhaleThresholds::new(100_000.0, 150_000.0, 300_000.0),
            micro: WhaleThresholds::new(80_000.0, 120_000.0, 200_000.0),
            unknown: WhaleThresholds::new(100_000.0, 150_000.0, 300_000.0),
        }
    }
}

impl WhaleTierTable {
    pub fn for_segment(&self, segment: MarketCapSegment) -> WhaleThresholds {
        match segment {
            MarketCapSegment::High => self.high,
            MarketCapSegment::Mid => self.mid,
            MarketCapSegment::Low => self.low,
            MarketCapSegment::Micro => self.micro,
            MarketCapSegment::Unknown => self.unknown,
        }
    }
}

/// Symbol -> USD market cap, immutable after construction
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarketCapBook {
    caps: HashMap<String, f64>,
}

impl MarketCapBook {
    /// Build from raw `(symbol, cap)` rows; a symbol listed on several
    /// chains keeps its largest cap, non-positive caps are ignored
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: AsRef<str>,
    {
        let mut caps: HashMap<String, f64> = HashMap::new();
        for (symbol, cap) in entries {
            let symbol = symbol.as_ref().trim().to_ascii_uppercase();
            if symbol.is_empty() || !(cap > 0.0) {
                continue;
            }
            caps.entry(symbol)
                .and_modify(|existing| {
                    if cap > *existing {
                        *existing = cap;
                    }
                })
                .or_insert(cap);
        }
        Self { caps }
    }

    /// USD cap for a base symbol, 0 when unknown
    pub fn cap(&self, base: &str) -> f64 {
        self.caps
            .get(&base.trim().to_ascii_uppercase())
            .copied()
            .unwrap_or(0.0)
    }

    pub fn segment(&self, base: &str) -> MarketCapSegment {
        MarketCapSegment::from_cap(self.cap(base))
    }

    pub fn len(&self) -> usize {
        self.caps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.caps.is_empty()
    }
}

/// Base asset of an instrument id: `BTC-USDT` -> `BTC`, `ETHUSDT` -> `ETH`
pub fn base_symbol(instrument: &str) -> &str {
    if let Some((base, _)) = instrument.split_once('-') {
        return base;
    }
    instrument
        .strip_suffix("USDT")
        .filter(|base| !base.is_empty())
        .unwrap_or(instrument)
}
