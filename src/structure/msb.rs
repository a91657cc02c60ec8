//! Market-structure break: decision close beyond the lookback's extreme close

use super::{split_window, Detection};
use crate::types::{Candle, Direction, StructureKind, StructureLevel};

#[derive(Debug, Clone)]
pub struct MsbDetector {
    pub lookback: usize,
    /// Required clearance past the extreme, as a fraction (0.001 = 0.1%)
    pub margin: f64,
}

impl MsbDetector {
    pub fn new(lookback: usize, margin: f64) -> Self {
        Self { lookback, margin }
    }

    /// The level is reported whether or not it broke; the risk stage uses
    /// it as a stop anchor and as the opposing target
    pub fn detect(&self, candles: &[Candle], side: Direction) -> Detection {
        let Some((window, decision)) = split_window(candles, self.lookback) else {
            return Detection::miss();
        };
        let closes = window.iter().map(|c| c.close);

        match side {
            Direction::Long => {
                let level = closes.fold(f64::NEG_INFINITY, f64::max);
                Detection {
                    hit: decision.close > level * (1.0 + self.margin),
                    level: Some(StructureLevel::point(StructureKind::MsbBull, level)),
                }
            }
            Direction::Short => {
                let level = closes.fold(f64::INFINITY, f64::min);
                Detection {
                    hit: decision.close < level * (1.0 - self.margin),
                    level: Some(StructureLevel::point(StructureKind::MsbBear, level)),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::flat;
    use super::*;

    fn series(closes: &[f64]) -> Vec<Candle> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| flat(i as i64, c))
            .collect()
    }

    #[test]
    fn test_bullish_break_needs_margin() {
        let detector = MsbDetector::new(4, 0.001);

        let broke = series(&[100.0, 101.0, 102.0, 101.5, 102.2]);
        let detection = detector.detect(&broke, Direction::Long);
        assert!(detection.hit);
        assert_eq!(detection.level.unwrap().low, 102.0);
        assert_eq!(detection.level.unwrap().kind, StructureKind::MsbBull);

        // 102.1 is within 0.1% of 102
        let marginal = series(&[100.0, 101.0, 102.0, 101.5, 102.1]);
        let detection = detector.detect(&marginal, Direction::Long);
        assert!(!detection.hit);
        assert_eq!(detection.level.unwrap().low, 102.0);
    }

    #[test]
    fn test_bearish_break() {
        let detector = MsbDetector::new(4, 0.001);
        let broke = series(&[100.0, 99.0, 98.0, 99.5, 97.8]);
        let detection = detector.detect(&broke, Direction::Short);
        assert!(detection.hit);
        assert_eq!(detection.level.unwrap().high, 98.0);
        assert!(!detector.detect(&broke, Direction::Long).hit);
    }

    #[test]
    fn test_lookback_ignores_older_extremes() {
        let detector = MsbDetector::new(3, 0.001);
        // 110 sits outside the 3-candle window
        let candles = series(&[110.0, 100.0, 101.0, 100.5, 102.0]);
        assert!(detector.detect(&candles, Direction::Long).hit);
    }

    #[test]
    fn test_short_series_is_a_miss() {
        let detector = MsbDetector::new(20, 0.001);
        let candles = series(&[100.0, 105.0]);
        assert_eq!(detector.detect(&candles, Direction::Long), Detection::miss());
    }
}
