//! Fair-value gaps and their rejection on the decision candle

use super::Detection;
use crate::types::{Candle, Direction, StructureKind, StructureLevel};

/// Most recent three-candle gap in the history before the decision candle.
///
/// Only triples whose third candle lies in the last `lookback` history
/// candles are considered; the latest one wins.
pub fn find_recent_fvg(candles: &[Candle], lookback: usize) -> Option<StructureLevel> {
    let (_, history) = candles.split_last()?;
    if history.len() < 3 {
        return None;
    }

    let start = history.len().saturating_sub(lookback).max(2);
    (start..history.len()).rev().find_map(|i| {
        let first = &history[i - 2];
        let third = &history[i];
        if first.high < third.low {
            Some(StructureLevel::band(StructureKind::FvgBull, first.high, third.low))
        } else if first.low > third.high {
            Some(StructureLevel::band(StructureKind::FvgBear, third.high, first.low))
        } else {
            None
        }
    })
}

/// Whether `decision` retests `gap` and rejects it in the gap's direction
pub fn is_fvg_rejection(
    decision: &Candle,
    gap: &StructureLevel,
    buffer: f64,
    max_wick_body_ratio: f64,
) -> bool {
    let touches = decision.low <= gap.high && decision.high >= gap.low;
    if !touches {
        return false;
    }

    // Spike filter: a doji or a bar that is almost all wick proves nothing
    let body = decision.body();
    if body <= 0.0 || decision.range() / body > max_wick_body_ratio {
        return false;
    }

    match gap.kind {
        StructureKind::FvgBull => {
            decision.close > decision.open && decision.close > gap.low * (1.0 + buffer / 2.0)
        }
        StructureKind::FvgBear => {
            decision.close < decision.open && decision.close < gap.high * (1.0 - buffer / 2.0)
        }
        _ => false,
    }
}

#[derive(Debug, Clone)]
pub struct FvgDetector {
    pub lookback: usize,
    pub buffer: f64,
    pub max_wick_body_ratio: f64,
}

impl FvgDetector {
    pub fn new(lookback: usize, buffer: f64, max_wick_body_ratio: f64) -> Self {
        Self {
            lookback,
            buffer,
            max_wick_body_ratio,
        }
    }

    pub fn detect(&self, candles: &[Candle], side: Direction) -> Detection {
        let Some(gap) = find_recent_fvg(candles, self.lookback) else {
            return Detection::miss();
        };
        let wanted = match side {
            Direction::Long => StructureKind::FvgBull,
            Direction::Short => StructureKind::FvgBear,
        };
        if gap.kind != wanted {
            return Detection::miss();
        }
        let Some(decision) = candles.last() else {
            return Detection::miss();
        };

        Detection {
            hit: is_fvg_rejection(decision, &gap, self.buffer, self.max_wick_body_ratio),
            level: Some(gap),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::{flat, ohlc};
    use super::*;

    /// high[0] = 100, low[2] = 105 followed by `decision`
    fn bullish_gap(decision: Candle) -> Vec<Candle> {
        vec![
            ohlc(0, 98.0, 100.0, 97.0, 99.0),
            ohlc(1, 100.0, 106.0, 99.5, 105.5),
            ohlc(2, 105.5, 108.0, 105.0, 107.0),
            decision,
        ]
    }

    #[test]
    fn test_bullish_gap_is_found() {
        let candles = bullish_gap(ohlc(3, 101.0, 106.0, 102.0, 106.0));
        let gap = find_recent_fvg(&candles, 20).unwrap();
        assert_eq!(gap.kind, StructureKind::FvgBull);
        assert_eq!(gap.low, 100.0);
        assert_eq!(gap.high, 105.0);
    }

    #[test]
    fn test_bullish_rejection() {
        let decision = ohlc(3, 101.0, 106.0, 102.0, 106.0);
        let candles = bullish_gap(decision);
        let gap = find_recent_fvg(&candles, 20).unwrap();
        assert!(is_fvg_rejection(&decision, &gap, 0.002, 4.0));

        let detector = FvgDetector::new(20, 0.002, 4.0);
        let detection = detector.detect(&candles, Direction::Long);
        assert!(detection.hit);
        assert_eq!(detection.level, Some(gap));
        assert_eq!(detector.detect(&candles, Direction::Short), Detection::miss());
    }

    #[test]
    fn test_spike_and_doji_are_filtered() {
        let gap = StructureLevel::band(StructureKind::FvgBull, 100.0, 105.0);
        // body 1, range 8
        let spike = ohlc(3, 104.0, 110.0, 102.0, 105.0);
        assert!(!is_fvg_rejection(&spike, &gap, 0.002, 4.0));
        let doji = ohlc(3, 104.0, 106.0, 102.0, 104.0);
        assert!(!is_fvg_rejection(&doji, &gap, 0.002, 4.0));
    }

    #[test]
    fn test_rejection_needs_touch_and_direction() {
        let gap = StructureLevel::band(StructureKind::FvgBull, 100.0, 105.0);
        let above = ohlc(3, 106.0, 109.0, 105.5, 108.5);
        assert!(!is_fvg_rejection(&above, &gap, 0.002, 4.0));
        let bearish_body = ohlc(3, 105.0, 105.5, 101.0, 102.0);
        assert!(!is_fvg_rejection(&bearish_body, &gap, 0.002, 4.0));
    }

    #[test]
    fn test_bearish_gap_and_rejection() {
        let candles = vec![
            ohlc(0, 111.0, 112.0, 110.0, 110.5),
            ohlc(1, 110.0, 110.5, 104.0, 104.5),
            ohlc(2, 104.5, 105.0, 102.0, 103.0),
            ohlc(3, 106.0, 108.0, 103.5, 104.0),
        ];
        let gap = find_recent_fvg(&candles, 20).unwrap();
        assert_eq!(gap.kind, StructureKind::FvgBear);
        assert_eq!((gap.low, gap.high), (105.0, 110.0));

        let detection = FvgDetector::new(20, 0.002, 4.0).detect(&candles, Direction::Short);
        assert!(detection.hit);
    }

    #[test]
    fn test_decision_candle_is_excluded() {
        let mut candles = bullish_gap(flat(3, 105.5));
        candles.push(flat(4, 105.5));
        // Decision candle gaps far above candle 2; it must not count
        candles.push(ohlc(5, 120.0, 121.0, 119.0, 120.5));
        let gap = find_recent_fvg(&candles, 20).unwrap();
        assert_eq!((gap.low, gap.high), (100.0, 105.0));

        // Window of 2 history candles cannot reach the triple ending at 2
        assert!(find_recent_fvg(&candles, 2).is_none());
    }

    #[test]
    fn test_no_gap_in_overlapping_bars() {
        let candles: Vec<Candle> = (0..10).map(|i| flat(i, 100.0)).collect();
        assert!(find_recent_fvg(&candles, 20).is_none());
    }
}
