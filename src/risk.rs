//! Stop and staged take-profit levels for structural signals
//!
//! The stop anchors on the rejected FVG edge when there is one, then on the
//! MSB level, then on a fixed percentage. TP1/TP2 are fixed percentages from
//! the close; TP3 is the MSB level when it lies ahead of price.

use crate::types::{Direction, RiskLevels, StructureKind, StructureLevel};

const STOP_PAD: f64 = 0.005;
const STOP_FALLBACK: f64 = 0.018;
const TP1: f64 = 0.012;
const TP2: f64 = 0.024;
const TP3_FALLBACK: f64 = 0.036;

/// `fvg` is the gap the decision candle rejected, if any; a gap of the wrong
/// direction is ignored.
pub fn compute_levels(
    side: Direction,
    last_close: f64,
    msb_level: Option<f64>,
    fvg: Option<&StructureLevel>,
) -> RiskLevels {
    match side {
        Direction::Long => {
            let gap = fvg.filter(|g| g.kind == StructureKind::FvgBull);
            let stop = match (gap, msb_level) {
                (Some(g), _) => g.low * (1.0 - STOP_PAD),
                (None, Some(level)) => level * (1.0 - STOP_PAD),
                (None, None) => last_close * (1.0 - STOP_FALLBACK),
            };
            let tp3 = msb_level
                .filter(|&level| level > last_close)
                .unwrap_or(last_close * (1.0 + TP3_FALLBACK));
            RiskLevels {
                stop,
                tp1: last_close * (1.0 + TP1),
                tp2: last_close * (1.0 + TP2),
                tp3,
            }
        }
        Direction::Short => {
            let gap = fvg.filter(|g| g.kind == StructureKind::FvgBear);
            let stop = match (gap, msb_level) {
                (Some(g), _) => g.high * (1.0 + STOP_PAD),
                (None, Some(level)) => level * (1.0 + STOP_PAD),
                (None, None) => last_close * (1.0 + STOP_FALLBACK),
            };
            let tp3 = msb_level
                .filter(|&level| level < last_close)
                .unwrap_or(last_close * (1.0 - TP3_FALLBACK));
            RiskLevels {
                stop,
                tp1: last_close * (1.0 - TP1),
                tp2: last_close * (1.0 - TP2),
                tp3,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close_to(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_long_stop_prefers_fvg_edge() {
        let gap = StructureLevel::band(StructureKind::FvgBull, 95.0, 98.0);
        let levels = compute_levels(Direction::Long, 100.0, Some(97.0), Some(&gap));
        assert!(close_to(levels.stop, 95.0 * 0.995));
        assert!(close_to(levels.tp1, 101.2));
        assert!(close_to(levels.tp2, 102.4));
        // MSB level below price is not a target
        assert!(close_to(levels.tp3, 103.6));
    }

    #[test]
    fn test_long_falls_back_to_msb_then_percent() {
        let levels = compute_levels(Direction::Long, 100.0, Some(97.0), None);
        assert!(close_to(levels.stop, 97.0 * 0.995));

        let levels = compute_levels(Direction::Long, 100.0, None, None);
        assert!(close_to(levels.stop, 98.2));
        assert!(close_to(levels.tp3, 103.6));
    }

    #[test]
    fn test_long_tp3_uses_msb_above_price() {
        let levels = compute_levels(Direction::Long, 100.0, Some(105.0), None);
        assert_eq!(levels.tp3, 105.0);
    }

    #[test]
    fn test_short_mirrors_long() {
        let gap = StructureLevel::band(StructureKind::FvgBear, 102.0, 104.0);
        let levels = compute_levels(Direction::Short, 100.0, Some(96.0), Some(&gap));
        assert!(close_to(levels.stop, 104.0 * 1.005));
        assert!(close_to(levels.tp1, 98.8));
        assert!(close_to(levels.tp2, 97.6));
        assert_eq!(levels.tp3, 96.0);

        let levels = compute_levels(Direction::Short, 100.0, None, None);
        assert!(close_to(levels.stop, 101.8));
        assert!(close_to(levels.tp3, 96.4));
    }

    #[test]
    fn test_wrong_direction_gap_is_ignored() {
        let gap = StructureLevel::band(StructureKind::FvgBull, 95.0, 98.0);
        let levels = compute_levels(Direction::Short, 100.0, None, Some(&gap));
        assert!(close_to(levels.stop, 101.8));
    }
}
