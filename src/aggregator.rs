//! Signal aggregation and scoring
//!
//! One call analyses one snapshot under one engine profile. The profile picks
//! the structural detectors and the scoring regime; everything else (bias,
//! cap book, thresholds, clock) comes in through [`AnalysisContext`] so the
//! same inputs always give the same signals.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::bias::MarketBias;
use crate::config::{EngineConfig, EngineProfile, FlowConfig};
use crate::market_cap::{base_symbol, MarketCapBook};
use crate::orderflow::analyze_order_flow;
use crate::pump::PumpDetector;
use crate::risk::compute_levels;
use crate::structure::{
    Detection, FvgDetector, MsbDetector, StructuralDetector, ZoneRejectionDetector,
};
use crate::types::{
    ConditionCheck, ConditionKind, Direction, MarketSnapshot, OrderBookSnapshot,
    OrderFlowSummary, Signal, StructureLevel,
};

const SIDES: [Direction; 2] = [Direction::Long, Direction::Short];

/// How a profile turns condition checks into a confidence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoringRegime {
    /// Net delta, book imbalance, whale; structure is a precondition
    Relaxed,
    /// Structure, net delta, book imbalance, whale, participation
    Strict,
    /// Pump momentum score
    Momentum,
}

impl ScoringRegime {
    pub fn for_profile(profile: EngineProfile) -> Self {
        match profile {
            EngineProfile::Pump => Self::Momentum,
            EngineProfile::Zone => Self::Relaxed,
            EngineProfile::Structure | EngineProfile::Presignal => Self::Strict,
        }
    }
}

/// `satisfied / total` as a percentage, rounded half away from zero
pub fn confidence_pct(satisfied: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let pct = (satisfied.min(total) as f64 / total as f64 * 100.0).round();
    pct as u8
}

/// Batch-wide inputs shared by every analysis
#[derive(Debug, Clone, Copy)]
pub struct AnalysisContext<'a> {
    pub now: DateTime<Utc>,
    pub bias: MarketBias,
    pub caps: &'a MarketCapBook,
    pub config: &'a EngineConfig,
}

/// Detectors composed for a profile
pub fn profile_detectors(profile: EngineProfile, config: &EngineConfig) -> Vec<StructuralDetector> {
    let s = &config.structure;
    match profile {
        EngineProfile::Pump => {
            vec![StructuralDetector::Pump(PumpDetector::new(config.pump.clone()))]
        }
        EngineProfile::Zone => vec![StructuralDetector::Zone(ZoneRejectionDetector::new(
            s.lookback,
            s.zone_buffer,
        ))],
        EngineProfile::Structure | EngineProfile::Presignal => {
            let lookback = structural_lookback(profile, config);
            vec![
                StructuralDetector::Msb(MsbDetector::new(lookback, s.msb_margin)),
                StructuralDetector::Fvg(FvgDetector::new(
                    lookback,
                    s.zone_buffer,
                    s.max_wick_body_ratio,
                )),
            ]
        }
    }
}

fn structural_lookback(profile: EngineProfile, config: &EngineConfig) -> usize {
    match profile {
        EngineProfile::Presignal => config.structure.presignal_lookback,
        _ => config.structure.lookback,
    }
}

/// Candles a structural profile needs before it analyses anything
fn min_candles(profile: EngineProfile, config: &EngineConfig) -> usize {
    let window = structural_lookback(profile, config) + 3;
    match profile {
        EngineProfile::Presignal => window.max(config.structure.presignal_min_candles),
        _ => window,
    }
}

fn flow_for(profile: EngineProfile, config: &EngineConfig) -> FlowConfig {
    match profile {
        EngineProfile::Presignal => config.presignal_flow(),
        _ => config.flow.clone(),
    }
}

/// Combined structural read for one side
struct StructureRead {
    hit: bool,
    /// Levels of the detectors that fired
    levels: Vec<StructureLevel>,
    msb_level: Option<f64>,
    rejected_gap: Option<StructureLevel>,
}

fn read_structure(
    detectors: &[StructuralDetector],
    snapshot: &MarketSnapshot,
    side: Direction,
) -> StructureRead {
    let detections: Vec<(&StructuralDetector, Detection)> = detectors
        .iter()
        .map(|d| (d, d.detect(&snapshot.candles, side)))
        .collect();

    let mut read = StructureRead {
        hit: detections.iter().any(|(_, d)| d.hit),
        levels: detections
            .iter()
            .filter(|(_, d)| d.hit)
            .filter_map(|(_, d)| d.level)
            .collect(),
        msb_level: None,
        rejected_gap: None,
    };
    for (detector, detection) in &detections {
        match detector {
            StructuralDetector::Msb(_) => read.msb_level = detection.level.map(|l| l.low),
            StructuralDetector::Fvg(_) if detection.hit => read.rejected_gap = detection.level,
            _ => {}
        }
    }
    read
}

fn flow_conditions(
    regime: ScoringRegime,
    side: Direction,
    flow: &FlowConfig,
    of: &OrderFlowSummary,
    book: &OrderBookSnapshot,
) -> Vec<ConditionCheck> {
    let delta = match (side, flow.strict_delta) {
        (Direction::Long, false) => of.net_delta >= flow.net_delta_long_min,
        (Direction::Long, true) => of.net_delta > flow.net_delta_long_min,
        (Direction::Short, false) => of.net_delta <= flow.net_delta_short_max,
        (Direction::Short, true) => of.net_delta < flow.net_delta_short_max,
    };
    let imbalance = match side {
        Direction::Long => book.bid_notional > book.ask_notional * flow.book_imbalance_ratio,
        Direction::Short => book.ask_notional > book.bid_notional * flow.book_imbalance_ratio,
    };
    let check = |kind, passed| ConditionCheck { kind, passed };

    let mut conditions = Vec::with_capacity(5);
    if regime == ScoringRegime::Strict {
        conditions.push(check(ConditionKind::Structure, true));
    }
    conditions.push(check(ConditionKind::NetDelta, delta));
    conditions.push(check(ConditionKind::BookImbalance, imbalance));
    conditions.push(check(ConditionKind::Whale, of.whale_for(side).is_some()));
    if regime == ScoringRegime::Strict {
        conditions.push(check(
            ConditionKind::Participation,
            of.ratio_for(side) > flow.participation_min,
        ));
    }
    conditions
}

/// Analyse one snapshot under one profile. Returns zero, one or two signals;
/// a snapshot that lacks what the profile needs simply yields none.
pub fn analyze_snapshot(
    snapshot: &MarketSnapshot,
    profile: EngineProfile,
    ctx: &AnalysisContext<'_>,
) -> Vec<Signal> {
    match ScoringRegime::for_profile(profile) {
        ScoringRegime::Momentum => analyze_pump(snapshot, ctx),
        regime => analyze_structural(snapshot, profile, regime, ctx),
    }
}

fn analyze_pump(snapshot: &MarketSnapshot, ctx: &AnalysisContext<'_>) -> Vec<Signal> {
    let config = ctx.config;
    let detectors = profile_detectors(EngineProfile::Pump, config);
    let Some(side) = SIDES
        .into_iter()
        .find(|&side| detectors.iter().any(|d| d.detect(&snapshot.candles, side).hit))
    else {
        return Vec::new();
    };
    let reading = detectors.iter().find_map(|d| match d {
        StructuralDetector::Pump(pump) => pump.read(&snapshot.candles),
        _ => None,
    });
    let (Some(reading), Some(last)) = (reading, snapshot.candles.last()) else {
        return Vec::new();
    };

    let segment = ctx.caps.segment(base_symbol(&snapshot.instrument));
    let thresholds = config.whale_tiers.for_segment(segment);
    let order_flow = analyze_order_flow(&snapshot.trades, &thresholds, config.flow.momentum_window);

    let conditions = vec![
        ConditionCheck {
            kind: ConditionKind::Structure,
            passed: reading.pump_hit,
        },
        ConditionCheck {
            kind: ConditionKind::Whale,
            passed: reading.is_whale,
        },
    ];

    vec![Signal {
        instrument: snapshot.instrument.clone(),
        timeframe: snapshot.timeframe.clone(),
        profile: EngineProfile::Pump,
        side,
        confidence: reading.score,
        conditions_satisfied: conditions.iter().filter(|c| c.passed).count(),
        conditions,
        structure: Vec::new(),
        last_close: last.close,
        segment,
        order_flow,
        order_book: snapshot.order_book,
        risk: None,
        pump: Some(reading),
    }]
}

fn analyze_structural(
    snapshot: &MarketSnapshot,
    profile: EngineProfile,
    regime: ScoringRegime,
    ctx: &AnalysisContext<'_>,
) -> Vec<Signal> {
    let config = ctx.config;
    let required = min_candles(profile, config);
    let candles = &snapshot.candles;
    let Some(last) = candles.last() else {
        return Vec::new();
    };
    if candles.len() < required {
        debug!(
            "{} {}: {} candles, need {}",
            snapshot.instrument,
            snapshot.timeframe,
            candles.len(),
            required
        );
        return Vec::new();
    }

    let age = ctx.now - last.timestamp;
    if age > config.structure.max_candle_age() {
        debug!(
            "{} {}: decision candle {}s old, skipping",
            snapshot.instrument,
            snapshot.timeframe,
            age.num_seconds()
        );
        return Vec::new();
    }

    if snapshot.trades.is_empty() {
        return Vec::new();
    }
    let Some(book) = snapshot.order_book else {
        return Vec::new();
    };

    let segment = ctx.caps.segment(base_symbol(&snapshot.instrument));
    let thresholds = config.whale_tiers.for_segment(segment);
    let flow = flow_for(profile, config);
    let order_flow = analyze_order_flow(&snapshot.trades, &thresholds, flow.momentum_window);
    let min_conditions = match regime {
        ScoringRegime::Relaxed => flow.relaxed_min_conditions,
        _ => flow.strict_min_conditions,
    };

    let detectors = profile_detectors(profile, config);
    let mut signals = Vec::new();

    for side in SIDES {
        if profile.uses_bias() && !ctx.bias.allows(side) {
            continue;
        }
        let structure = read_structure(&detectors, snapshot, side);
        if !structure.hit {
            continue;
        }

        let conditions = flow_conditions(regime, side, &flow, &order_flow, &book);
        let satisfied = conditions.iter().filter(|c| c.passed).count();
        if satisfied < min_conditions {
            continue;
        }

        let risk = (profile == EngineProfile::Structure).then(|| {
            compute_levels(
                side,
                last.close,
                structure.msb_level,
                structure.rejected_gap.as_ref(),
            )
        });

        signals.push(Signal {
            instrument: snapshot.instrument.clone(),
            timeframe: snapshot.timeframe.clone(),
            profile,
            side,
            confidence: confidence_pct(satisfied, conditions.len()),
            conditions_satisfied: satisfied,
            conditions,
            structure: structure.levels,
            last_close: last.close,
            segment,
            order_flow,
            order_book: Some(book),
            risk,
            pump: None,
        });
    }

    signals
}

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::Duration;

    use crate::orderflow::TradeTape;
    use crate::structure::fixtures::{flat, ohlc, t0};
    use crate::types::{Candle, MarketSnapshot, OrderBookSnapshot, Trade, TradeSide};

    /// 29 flat candles at 100, then a decision candle closing at `close`
    pub fn breakout(close: f64) -> Vec<Candle> {
        let mut candles: Vec<Candle> = (0..29).map(|i| flat(i, 100.0)).collect();
        candles.push(flat(29, close));
        candles
    }

    /// Wide range 95..105, then a candle bouncing off 95
    pub fn support_bounce() -> Vec<Candle> {
        let mut candles: Vec<Candle> =
            (0..29).map(|i| ohlc(i, 100.0, 105.0, 95.0, 100.0)).collect();
        candles.push(ohlc(29, 95.5, 96.5, 95.1, 96.0));
        candles
    }

    /// Buys then sells at price 100, given as USD notionals
    pub fn tape(buys: &[f64], sells: &[f64]) -> TradeTape {
        let rows = buys
            .iter()
            .map(|n| (*n, TradeSide::Buy))
            .chain(sells.iter().map(|n| (*n, TradeSide::Sell)))
            .enumerate()
            .map(|(i, (notional, side))| {
                let ts = t0() + Duration::seconds(i as i64);
                Trade::new(100.0, notional / 100.0, side, ts).unwrap()
            })
            .collect();
        TradeTape::new(rows)
    }

    /// 62 hourly bars on a gentle uptrend whose last two bars ramp turnover
    pub fn pump_ramp() -> Vec<Candle> {
        (0..62)
            .map(|i| {
                let turnover = match i {
                    60 => 150_000.0,
                    61 => 300_000.0,
                    _ => 100_000.0,
                };
                let close = 100.0 + 0.2 * i as f64;
                let ts = t0() + Duration::hours(i);
                Candle::new(ts, close, close * 1.002, close * 0.998, close, turnover).unwrap()
            })
            .collect()
    }

    pub fn book(bid: f64, ask: f64) -> Option<OrderBookSnapshot> {
        Some(OrderBookSnapshot::new(bid, ask, None, None).unwrap())
    }

    pub fn snapshot(
        instrument: &str,
        candles: Vec<Candle>,
        trades: TradeTape,
        order_book: Option<OrderBookSnapshot>,
    ) -> MarketSnapshot {
        MarketSnapshot {
            instrument: instrument.to_string(),
            timeframe: "4H".to_string(),
            candles,
            trades,
            order_book,
        }
    }
}
