//! Dedupe, filter, sort and cap accepted signals into a digest

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::bias::{MarketBias, TrendSummary};
use crate::config::{EngineProfile, ProfileRun, RankingConfig};
use crate::types::{Direction, Signal};

/// Signals of one profile run, split by side
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DigestSection {
    pub profile: EngineProfile,
    pub timeframe: String,
    pub longs: Vec<Signal>,
    pub shorts: Vec<Signal>,
}

impl DigestSection {
    pub fn is_empty(&self) -> bool {
        self.longs.is_empty() && self.shorts.is_empty()
    }
}

/// Everything handed to the notifier for one batch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Digest {
    pub generated_at: DateTime<Utc>,
    pub bias: MarketBias,
    /// Trend reads of the bias instrument and any watched majors
    pub references: Vec<TrendSummary>,
    pub sections: Vec<DigestSection>,
}

impl Digest {
    pub fn signal_count(&self) -> usize {
        self.sections
            .iter()
            .map(|s| s.longs.len() + s.shorts.len())
            .sum()
    }
}

/// Keep the best signal per (instrument, timeframe, profile, side), drop
/// anything under the confidence floor, then order by confidence with
/// instrument and timeframe as tie-breakers. Input order never matters.
pub fn rank_signals(signals: Vec<Signal>, config: &RankingConfig) -> Vec<Signal> {
    let mut best: HashMap<(String, String, EngineProfile, Direction), Signal> = HashMap::new();
    for signal in signals {
        if signal.confidence < config.min_confidence {
            continue;
        }
        let key = (
            signal.instrument.clone(),
            signal.timeframe.clone(),
            signal.profile,
            signal.side,
        );
        match best.get(&key) {
            Some(existing) if existing.confidence >= signal.confidence => {}
            _ => {
                best.insert(key, signal);
            }
        }
    }

    let mut ranked: Vec<Signal> = best.into_values().collect();
    ranked.sort_by(|a, b| {
        b.confidence
            .cmp(&a.confidence)
            .then_with(|| a.instrument.cmp(&b.instrument))
            .then_with(|| a.timeframe.cmp(&b.timeframe))
            .then_with(|| a.profile.cmp(&b.profile))
            .then_with(|| a.side.cmp(&b.side))
    });
    ranked
}

/// One section per configured run, each side capped at `max_per_side`
pub fn build_digest(
    signals: Vec<Signal>,
    runs: &[ProfileRun],
    config: &RankingConfig,
    bias: MarketBias,
    references: Vec<TrendSummary>,
    generated_at: DateTime<Utc>,
) -> Digest {
    let ranked = rank_signals(signals, config);

    let sections = runs
        .iter()
        .map(|run| {
            let matching = ranked
                .iter()
                .filter(|s| s.profile == run.profile && s.timeframe == run.timeframe);
            let pick = |side: Direction| -> Vec<Signal> {
                matching
                    .clone()
                    .filter(|s| s.side == side)
                    .take(config.max_per_side)
                    .cloned()
                    .collect()
            };
            DigestSection {
                profile: run.profile,
                timeframe: run.timeframe.clone(),
                longs: pick(Direction::Long),
                shorts: pick(Direction::Short),
            }
        })
        .collect();

    Digest {
        generated_at,
        bias,
        references,
        sections,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_cap::MarketCapSegment;
    use crate::structure::fixtures::t0;
    use crate::types::OrderFlowSummary;

    fn signal(instrument: &str, side: Direction, confidence: u8) -> Signal {
        Signal {
            instrument: instrument.to_string(),
            timeframe: "4H".to_string(),
            profile: EngineProfile::Structure,
            side,
            confidence,
            conditions_satisfied: 3,
            conditions: Vec::new(),
            structure: Vec::new(),
            last_close: 1.0,
            segment: MarketCapSegment::Unknown,
            order_flow: OrderFlowSummary::default(),
            order_book: None,
            risk: None,
            pump: None,
        }
    }

    fn run() -> ProfileRun {
        ProfileRun {
            profile: EngineProfile::Structure,
            timeframe: "4H".to_string(),
            candle_limit: 200,
        }
    }

    #[test]
    fn test_dedupe_keeps_highest_confidence() {
        let ranked = rank_signals(
            vec![
                signal("AAA-USDT", Direction::Long, 60),
                signal("AAA-USDT", Direction::Long, 80),
                signal("AAA-USDT", Direction::Short, 60),
            ],
            &RankingConfig::default(),
        );
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].confidence, 80);
    }

    #[test]
    fn test_floor_and_order_are_input_independent() {
        let signals = vec![
            signal("CCC-USDT", Direction::Long, 80),
            signal("AAA-USDT", Direction::Long, 80),
            signal("BBB-USDT", Direction::Long, 100),
            signal("DDD-USDT", Direction::Long, 40),
        ];
        let mut reversed = signals.clone();
        reversed.reverse();

        let config = RankingConfig::default();
        let ranked = rank_signals(signals, &config);
        let names: Vec<&str> = ranked.iter().map(|s| s.instrument.as_str()).collect();
        assert_eq!(names, vec!["BBB-USDT", "AAA-USDT", "CCC-USDT"]);
        assert_eq!(ranked, rank_signals(reversed, &config));
    }

    #[test]
    fn test_digest_caps_each_side() {
        let config = RankingConfig {
            min_confidence: 60,
            max_per_side: 2,
        };
        let signals = (0..5)
            .map(|i| signal(&format!("L{}-USDT", i), Direction::Long, 60 + i as u8))
            .chain(std::iter::once(signal("S-USDT", Direction::Short, 70)))
            .collect();

        let digest = build_digest(
            signals,
            &[run()],
            &config,
            MarketBias::Neutral,
            Vec::new(),
            t0(),
        );
        let section = &digest.sections[0];
        assert_eq!(section.longs.len(), 2);
        assert_eq!(section.longs[0].instrument, "L4-USDT");
        assert_eq!(section.shorts.len(), 1);
        assert_eq!(digest.signal_count(), 3);
    }

    #[test]
    fn test_empty_digest_keeps_sections() {
        let digest = build_digest(
            Vec::new(),
            &[run()],
            &RankingConfig::default(),
            MarketBias::Bull,
            Vec::new(),
            t0(),
        );
        assert_eq!(digest.sections.len(), 1);
        assert!(digest.sections[0].is_empty());
    }
}
