//! Turnover-acceleration (pump) detector with momentum score
//!
//! A pump candidate needs the last bar's turnover well above its smoothed
//! baseline together with a three-bar ramp, or a whale-sized bar clearing a
//! relaxed version of either. The candidate then has to persist: each of the
//! last `confirm_candles` bars must meet the baseline as it stood one bar
//! earlier.

use serde::{Deserialize, Serialize};

use crate::config::PumpConfig;
use crate::indicators::{ema, ema_series, rsi, trend_strength_approx, volume_ratio, EPSILON};
use crate::structure::Detection;
use crate::types::{Candle, Direction};

const FAST_SPAN: usize = 20;
const SLOW_SPAN: usize = 50;
const RSI_PERIOD: usize = 14;
const ATR_SPAN: usize = 14;
const STRENGTH_SCALE: f64 = 10.0;
const RAMP_BARS: usize = 3;

/// Everything the pump detector measured on the decision bar
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PumpReading {
    pub volume_ratio: f64,
    pub ramp: f64,
    pub rsi: f64,
    pub trend_strength: f64,
    /// EMA20 above EMA50
    pub trend_up: bool,
    pub is_whale: bool,
    /// Candidate survived confirmation
    pub pump_hit: bool,
    pub decision: Option<Direction>,
    /// Momentum score in `[0, 100]`
    pub score: u8,
}

#[derive(Debug, Clone)]
pub struct PumpDetector {
    pub config: PumpConfig,
}

impl PumpDetector {
    pub fn new(config: PumpConfig) -> Self {
        Self { config }
    }

    /// Measure the decision bar. `None` when history is too short for the
    /// slow EMA or the bar is too thin to trade.
    pub fn read(&self, candles: &[Candle]) -> Option<PumpReading> {
        let cfg = &self.config;
        let last = candles.last()?;
        if last.turnover < cfg.min_turnover {
            return None;
        }

        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let turnover: Vec<f64> = candles.iter().map(|c| c.turnover).collect();
        let n = turnover.len();

        let fast = ema(&closes, FAST_SPAN)?;
        let slow = ema(&closes, SLOW_SPAN)?;
        let rsi = rsi(&closes, RSI_PERIOD)?;
        let trend_strength =
            trend_strength_approx(candles, FAST_SPAN, SLOW_SPAN, ATR_SPAN, STRENGTH_SCALE)?;
        let volume_ratio = volume_ratio(&turnover, cfg.baseline_span)?;

        let baseline = ema_series(&turnover, cfg.baseline_span)?;
        // Baseline for input index m sits at m - (span - 1)
        let baseline_at = |m: usize| -> Option<f64> {
            m.checked_sub(cfg.baseline_span - 1)
                .and_then(|j| baseline.get(j).copied())
        };

        let prior = baseline_at(n.checked_sub(2)?)?;
        let ramp_sum: f64 = turnover[n.saturating_sub(RAMP_BARS)..].iter().sum();
        let ramp = ramp_sum / (prior * RAMP_BARS as f64 + EPSILON);

        let is_whale = last.turnover >= cfg.whale_usd;
        let candidate = (volume_ratio >= cfg.pump_ratio && ramp >= cfg.ramp_min)
            || (is_whale && (volume_ratio >= cfg.whale_ratio || ramp >= cfg.ramp_min));

        let pump_hit = candidate
            && (1..=cfg.confirm_candles.max(1)).all(|i| {
                let Some(m) = n.checked_sub(i + 1) else {
                    return false;
                };
                baseline_at(m).map_or(false, |base| turnover[n - i] >= base)
            });

        let trend_up = fast > slow;
        let decision = if pump_hit && (trend_up || (is_whale && cfg.follow_whales)) {
            Some(Direction::Long)
        } else if !trend_up && volume_ratio <= cfg.sell_ratio_max {
            Some(Direction::Short)
        } else {
            None
        };

        let raw = volume_ratio * 25.0
            + trend_strength / 3.0
            + rsi / 5.0
            + if is_whale { 10.0 } else { 0.0 }
            + if pump_hit { 10.0 } else { 0.0 };
        let score = raw.clamp(0.0, 100.0).floor() as u8;

        Some(PumpReading {
            volume_ratio,
            ramp,
            rsi,
            trend_strength,
            trend_up,
            is_whale,
            pump_hit,
            decision,
            score,
        })
    }

    pub fn detect(&self, candles: &[Candle], side: Direction) -> Detection {
        match self.read(candles) {
            Some(reading) => Detection {
                hit: reading.decision == Some(side),
                level: None,
            },
            None => Detection::miss(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structure::fixtures::t0;
    use chrono::Duration;

    fn bar(i: usize, close: f64, turnover: f64) -> Candle {
        Candle::new(
            t0() + Duration::hours(i as i64),
            close,
            close * 1.002,
            close * 0.998,
            close,
            turnover,
        )
        .unwrap()
    }

    /// 60 bars drifting by `step` per bar on flat turnover, then `tail` turnovers
    fn series(step: f64, tail: &[f64]) -> Vec<Candle> {
        let total = 60 + tail.len();
        (0..total)
            .map(|i| {
                let turnover = if i < 60 { 100_000.0 } else { tail[i - 60] };
                bar(i, 100.0 + step * i as f64, turnover)
            })
            .collect()
    }

    #[test]
    fn test_confirmed_pump_in_uptrend_is_long() {
        let candles = series(0.2, &[150_000.0, 300_000.0]);
        let detector = PumpDetector::new(PumpConfig::default());
        let reading = detector.read(&candles).unwrap();

        assert!(reading.volume_ratio >= 1.8);
        assert!(reading.ramp >= 1.15);
        assert!(reading.trend_up);
        assert!(reading.pump_hit);
        assert_eq!(reading.decision, Some(Direction::Long));
        assert!(detector.detect(&candles, Direction::Long).hit);
        assert!(!detector.detect(&candles, Direction::Short).hit);
    }

    #[test]
    fn test_single_bar_spike_is_not_confirmed() {
        // Bar before the spike sits below its baseline
        let candles = series(0.2, &[60_000.0, 400_000.0]);
        let reading = PumpDetector::new(PumpConfig::default())
            .read(&candles)
            .unwrap();
        assert!(reading.volume_ratio >= 1.8);
        assert!(!reading.pump_hit);
        assert_eq!(reading.decision, None);
    }

    #[test]
    fn test_quiet_downtrend_is_short() {
        let candles = series(-0.2, &[80_000.0]);
        let reading = PumpDetector::new(PumpConfig::default())
            .read(&candles)
            .unwrap();
        assert!(!reading.trend_up);
        assert!(reading.volume_ratio <= 0.9);
        assert_eq!(reading.decision, Some(Direction::Short));
    }

    #[test]
    fn test_whale_followed_against_trend() {
        let tail = [900_000.0, 900_000.0];
        let mut config = PumpConfig::default();
        let candles = series(-0.2, &tail);

        let reading = PumpDetector::new(config.clone()).read(&candles).unwrap();
        assert!(reading.is_whale);
        assert!(reading.pump_hit);
        assert_eq!(reading.decision, Some(Direction::Long));

        config.follow_whales = false;
        let reading = PumpDetector::new(config).read(&candles).unwrap();
        assert_eq!(reading.decision, None);
    }

    #[test]
    fn test_score_is_floored_and_capped() {
        let candles = series(0.2, &[150_000.0, 300_000.0]);
        let reading = PumpDetector::new(PumpConfig::default())
            .read(&candles)
            .unwrap();
        let raw = reading.volume_ratio * 25.0
            + reading.trend_strength / 3.0
            + reading.rsi / 5.0
            + 10.0;
        assert_eq!(reading.score as f64, raw.min(100.0).floor());

        let whale = series(0.2, &[900_000.0, 2_000_000.0]);
        let reading = PumpDetector::new(PumpConfig::default()).read(&whale).unwrap();
        assert_eq!(reading.score, 100);
    }

    #[test]
    fn test_thin_or_short_history_yields_nothing() {
        let detector = PumpDetector::new(PumpConfig::default());
        let thin = series(0.2, &[5_000.0]);
        assert!(detector.read(&thin).is_none());

        let short: Vec<Candle> = (0..30).map(|i| bar(i, 100.0, 100_000.0)).collect();
        assert!(detector.read(&short).is_none());
        assert_eq!(detector.detect(&short, Direction::Long), Detection::miss());
    }
}
