//! Indicator primitives over plain numeric series
//!
//! Every EMA in the crate goes through [`ema_series`]: smoothing factor
//! `k = 2 / (span + 1)`, seeded with the simple average of the first `span`
//! values. Functions return `None` when the series is too short.

use crate::types::Candle;

/// Added to denominators that may be zero
pub const EPSILON: f64 = 1e-12;

/// EMA over `values`; element `j` corresponds to input index `span - 1 + j`
pub fn ema_series(values: &[f64], span: usize) -> Option<Vec<f64>> {
    if span == 0 || values.len() < span {
        return None;
    }

    let k = 2.0 / (span as f64 + 1.0);
    let seed = values[..span].iter().sum::<f64>() / span as f64;

    let mut out = Vec::with_capacity(values.len() - span + 1);
    out.push(seed);
    let mut prev = seed;
    for &v in &values[span..] {
        prev = v * k + prev * (1.0 - k);
        out.push(prev);
    }
    Some(out)
}

/// Latest EMA value
pub fn ema(values: &[f64], span: usize) -> Option<f64> {
    ema_series(values, span).and_then(|s| s.last().copied())
}

/// Wilder RSI of the last value, in `[0, 100]`
pub fn rsi(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period + 1 {
        return None;
    }

    let changes: Vec<f64> = values.windows(2).map(|w| w[1] - w[0]).collect();
    let p = period as f64;

    let mut avg_gain = changes[..period].iter().map(|c| c.max(0.0)).sum::<f64>() / p;
    let mut avg_loss = changes[..period].iter().map(|c| (-c).max(0.0)).sum::<f64>() / p;

    for &c in &changes[period..] {
        avg_gain = (avg_gain * (p - 1.0) + c.max(0.0)) / p;
        avg_loss = (avg_loss * (p - 1.0) + (-c).max(0.0)) / p;
    }

    let rs = avg_gain / (avg_loss + EPSILON);
    Some(100.0 - 100.0 / (1.0 + rs))
}

/// Last bar's turnover against the smoothed baseline one bar earlier,
/// so the current bar never inflates its own baseline
pub fn volume_ratio(turnover: &[f64], baseline_span: usize) -> Option<f64> {
    let baseline = ema_series(turnover, baseline_span)?;
    if baseline.len() < 2 {
        return None;
    }
    let last = *turnover.last()?;
    Some(last / (baseline[baseline.len() - 2] + EPSILON))
}

/// True range per bar, first bar uses its own high-low
pub fn true_ranges(candles: &[Candle]) -> Vec<f64> {
    let mut out = Vec::with_capacity(candles.len());
    let mut prev_close: Option<f64> = None;
    for c in candles {
        let tr = match prev_close {
            Some(pc) => c
                .range()
                .max((c.high - pc).abs())
                .max((c.low - pc).abs()),
            None => c.range(),
        };
        out.push(tr);
        prev_close = Some(c.close);
    }
    out
}

/// EMA-smoothed average true range
pub fn average_true_range(candles: &[Candle], span: usize) -> Option<f64> {
    ema(&true_ranges(candles), span)
}

/// Cheap stand-in for ADX: EMA spread measured in ATRs, times `scale`.
/// Only meaningful relative to other readings.
pub fn trend_strength_approx(
    candles: &[Candle],
    fast: usize,
    slow: usize,
    atr_span: usize,
    scale: f64,
) -> Option<f64> {
    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
    let fast = ema(&closes, fast)?;
    let slow = ema(&closes, slow)?;
    let atr = average_true_range(candles, atr_span)?;
    Some((fast - slow).abs() / (atr + EPSILON) * scale)
}
