//! Structural detectors
//!
//! Each detector looks at a candle window and answers, for one side, whether
//! its pattern fired on the decision candle (the most recent one) and which
//! price level defines it. The lookback window always excludes the decision
//! candle itself.

pub mod fvg;
pub mod msb;
pub mod zones;

pub use fvg::{find_recent_fvg, is_fvg_rejection, FvgDetector};
pub use msb::MsbDetector;
pub use zones::{ZoneReading, ZoneRejectionDetector};

use crate::pump::PumpDetector;
use crate::types::{Candle, Direction, StructureLevel};

/// Outcome of one detector for one side
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Detection {
    pub hit: bool,
    /// Defining level; may be present even when `hit` is false
    pub level: Option<StructureLevel>,
}

impl Detection {
    pub fn miss() -> Self {
        Self::default()
    }
}

/// Detector variants composed by the engine profiles
#[derive(Debug, Clone)]
pub enum StructuralDetector {
    Pump(PumpDetector),
    Zone(ZoneRejectionDetector),
    Msb(MsbDetector),
    Fvg(FvgDetector),
}

impl StructuralDetector {
    pub fn detect(&self, candles: &[Candle], side: Direction) -> Detection {
        match self {
            Self::Pump(d) => d.detect(candles, side),
            Self::Zone(d) => d.detect(candles, side),
            Self::Msb(d) => d.detect(candles, side),
            Self::Fvg(d) => d.detect(candles, side),
        }
    }
}

/// Split into (`lookback` candles before the decision candle, decision candle)
pub(crate) fn split_window(candles: &[Candle], lookback: usize) -> Option<(&[Candle], &Candle)> {
    if lookback == 0 || candles.len() < lookback + 1 {
        return None;
    }
    let (history, decision) = candles.split_at(candles.len() - 1);
    Some((&history[history.len() - lookback..], &decision[0]))
}

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::{DateTime, Duration, TimeZone, Utc};

    use crate::types::Candle;

    pub fn t0() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    /// Hourly candle `i` with explicit OHLC
    pub fn ohlc(i: i64, open: f64, high: f64, low: f64, close: f64) -> Candle {
        Candle::new(t0() + Duration::hours(i), open, high, low, close, 10_000.0).unwrap()
    }

    /// Narrow candle closing at `close`
    pub fn flat(i: i64, close: f64) -> Candle {
        ohlc(i, close, close + 0.1, close - 0.1, close)
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::flat;
    use super::*;

    #[test]
    fn test_split_window_excludes_decision() {
        let candles: Vec<Candle> = (0..6).map(|i| flat(i, 100.0 + i as f64)).collect();
        let (lookback, decision) = split_window(&candles, 3).unwrap();
        assert_eq!(lookback.len(), 3);
        assert_eq!(lookback[0].close, 102.0);
        assert_eq!(lookback[2].close, 104.0);
        assert_eq!(decision.close, 105.0);
        assert!(split_window(&candles, 6).is_none());
    }
}
