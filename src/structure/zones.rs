//! Support/resistance touch-and-reject

use super::{split_window, Detection};
use crate::types::{Candle, Direction, StructureKind, StructureLevel};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoneReading {
    /// `[min low, min low * (1 + buffer)]`
    pub support: StructureLevel,
    /// `[max high * (1 - buffer), max high]`
    pub resistance: StructureLevel,
    pub bounce: bool,
    pub rejection: bool,
}

#[derive(Debug, Clone)]
pub struct ZoneRejectionDetector {
    pub lookback: usize,
    /// Zone width as a fraction of the level
    pub buffer: f64,
}

impl ZoneRejectionDetector {
    pub fn new(lookback: usize, buffer: f64) -> Self {
        Self { lookback, buffer }
    }

    pub fn read(&self, candles: &[Candle]) -> Option<ZoneReading> {
        let (window, decision) = split_window(candles, self.lookback)?;

        let support = window.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
        let resistance = window.iter().map(|c| c.high).fold(f64::NEG_INFINITY, f64::max);
        let support_zone = StructureLevel::band(
            StructureKind::Support,
            support,
            support * (1.0 + self.buffer),
        );
        let resistance_zone = StructureLevel::band(
            StructureKind::Resistance,
            resistance * (1.0 - self.buffer),
            resistance,
        );

        let bounce = decision.low <= support_zone.high && decision.close > support_zone.low;
        let rejection =
            decision.high >= resistance_zone.low && decision.close < resistance_zone.high;

        // A bar spanning both zones says nothing about direction
        let ambiguous = bounce && rejection;

        Some(ZoneReading {
            support: support_zone,
            resistance: resistance_zone,
            bounce: bounce && !ambiguous,
            rejection: rejection && !ambiguous,
        })
    }

    pub fn detect(&self, candles: &[Candle], side: Direction) -> Detection {
        let Some(reading) = self.read(candles) else {
            return Detection::miss();
        };
        match side {
            Direction::Long => Detection {
                hit: reading.bounce,
                level: Some(reading.support),
            },
            Direction::Short => Detection {
                hit: reading.rejection,
                level: Some(reading.resistance),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::ohlc;
    use super::*;

    /// Lookback lows `[100, 98, 97, 99]`, highs 2 above, then `decision`
    fn support_fixture(decision: Candle) -> Vec<Candle> {
        let mut candles: Vec<Candle> = [100.0, 98.0, 97.0, 99.0]
            .iter()
            .enumerate()
            .map(|(i, &low)| ohlc(i as i64, low + 1.0, low + 2.0, low, low + 1.0))
            .collect();
        candles.push(decision);
        candles
    }

    #[test]
    fn test_support_bounce_flips_at_zone_edge() {
        let detector = ZoneRejectionDetector::new(4, 0.002);
        let zone_high = 97.0 * (1.0 + 0.002);

        let touching = support_fixture(ohlc(4, 99.0, 99.5, zone_high, 98.5));
        let reading = detector.read(&touching).unwrap();
        assert_eq!(reading.support.low, 97.0);
        assert!(reading.bounce);
        assert!(detector.detect(&touching, Direction::Long).hit);

        let missing = support_fixture(ohlc(4, 99.0, 99.5, zone_high + 0.01, 98.5));
        assert!(!detector.read(&missing).unwrap().bounce);
    }

    #[test]
    fn test_support_requires_close_above_support() {
        let detector = ZoneRejectionDetector::new(4, 0.002);
        let broke = support_fixture(ohlc(4, 98.0, 98.2, 96.0, 96.9));
        assert!(!detector.read(&broke).unwrap().bounce);
    }

    #[test]
    fn test_resistance_rejection_flips_at_zone_edge() {
        let detector = ZoneRejectionDetector::new(4, 0.002);
        // highs 102, 100, 99, 101 -> resistance 102
        let zone_low = 102.0 * (1.0 - 0.002);

        let touching = support_fixture(ohlc(4, 100.5, zone_low, 100.0, 100.2));
        let reading = detector.read(&touching).unwrap();
        assert_eq!(reading.resistance.high, 102.0);
        assert!(reading.rejection);
        assert!(!reading.bounce);
        assert!(detector.detect(&touching, Direction::Short).hit);

        let short_of_zone = support_fixture(ohlc(4, 100.5, zone_low - 0.01, 100.0, 100.2));
        assert!(!detector.read(&short_of_zone).unwrap().rejection);

        let closed_through = support_fixture(ohlc(4, 100.5, 103.0, 100.0, 102.5));
        assert!(!detector.read(&closed_through).unwrap().rejection);
    }

    #[test]
    fn test_bounce_and_rejection_never_both_fire() {
        let detector = ZoneRejectionDetector::new(4, 0.002);
        // Outside bar touching both zones with a mid-range close
        let engulfing = support_fixture(ohlc(4, 99.0, 102.0, 97.0, 99.5));
        let reading = detector.read(&engulfing).unwrap();
        assert!(!(reading.bounce && reading.rejection));
        assert!(!detector.detect(&engulfing, Direction::Long).hit);
        assert!(!detector.detect(&engulfing, Direction::Short).hit);
    }

    #[test]
    fn test_insufficient_history_is_a_miss() {
        let detector = ZoneRejectionDetector::new(10, 0.002);
        let candles = support_fixture(ohlc(4, 99.0, 99.5, 97.1, 98.5));
        assert_eq!(detector.detect(&candles, Direction::Long), Detection::miss());
    }
}
