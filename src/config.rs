//! Configuration for the signal engine

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::market_cap::WhaleTierTable;

/// Detector composition and scoring policy for one analysis pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineProfile {
    /// Turnover acceleration, BUY/SELL with momentum score
    Pump,
    /// Support/resistance touch-and-reject, relaxed 2-of-3 scoring
    Zone,
    /// MSB or FVG rejection, strict 3-of-5 scoring with risk levels
    Structure,
    /// Early structure alert on the lower timeframe, loosened thresholds
    Presignal,
}

impl EngineProfile {
    /// Whether the market-bias gate applies to this profile
    pub fn uses_bias(&self) -> bool {
        !matches!(self, Self::Pump)
    }
}

impl std::fmt::Display for EngineProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pump => write!(f, "Pump"),
            Self::Zone => write!(f, "Zone"),
            Self::Structure => write!(f, "Structure"),
            Self::Presignal => write!(f, "Presignal"),
        }
    }
}

impl std::str::FromStr for EngineProfile {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pump" => Ok(Self::Pump),
            "zone" => Ok(Self::Zone),
            "structure" => Ok(Self::Structure),
            "presignal" | "pre" => Ok(Self::Presignal),
            other => anyhow::bail!("unknown engine profile '{}'", other),
        }
    }
}

/// One profile applied to one candle timeframe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileRun {
    pub profile: EngineProfile,
    /// Venue bar label, e.g. "4H"
    pub timeframe: String,
    pub candle_limit: usize,
}

impl std::str::FromStr for ProfileRun {
    type Err = anyhow::Error;

    /// `profile:timeframe:limit`, e.g. `structure:4H:200`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split(':').collect();
        let [profile, timeframe, limit] = parts.as_slice() else {
            anyhow::bail!("expected profile:timeframe:limit, got '{}'", s);
        };
        let timeframe = timeframe.trim();
        if timeframe.is_empty() {
            anyhow::bail!("empty timeframe in '{}'", s);
        }
        let candle_limit: usize = limit
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("bad candle limit in '{}': {}", s, e))?;
        Ok(Self {
            profile: profile.parse()?,
            timeframe: timeframe.to_string(),
            candle_limit,
        })
    }
}

/// Turnover-acceleration thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PumpConfig {
    /// Last bar / smoothed baseline needed for a pump candidate
    pub pump_ratio: f64,
    /// Last-3-bar turnover vs 3x baseline
    pub ramp_min: f64,
    /// Preceding bars that must each clear their own baseline
    pub confirm_candles: usize,
    /// Single-bar turnover that counts as whale activity
    pub whale_usd: f64,
    /// Relaxed ratio when the bar is a whale bar
    pub whale_ratio: f64,
    /// Buy on whale bars even without an uptrend
    pub follow_whales: bool,
    /// Volume ratio at or below which a downtrend emits SELL
    pub sell_ratio_max: f64,
    /// Decision bars with less turnover are ignored
    pub min_turnover: f64,
    pub baseline_span: usize,
}

impl Default for PumpConfig {
    fn default() -> Self {
        Self {
            pump_ratio: 1.8,
            ramp_min: 1.15,
            confirm_candles: 2,
            whale_usd: 800_000.0,
            whale_ratio: 1.25,
            follow_whales: true,
            sell_ratio_max: 0.90,
            min_turnover: 20_000.0,
            baseline_span: 10,
        }
    }
}

/// Structural detector parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructureConfig {
    /// Candles before the decision candle considered by the detectors
    pub lookback: usize,
    /// Lookback used by the presignal profile
    pub presignal_lookback: usize,
    /// Shortest series the presignal profile analyses
    pub presignal_min_candles: usize,
    /// Zone width as a fraction of the level (0.002 = 0.2%)
    pub zone_buffer: f64,
    /// Close must clear the lookback extreme by this fraction
    pub msb_margin: f64,
    /// FVG retests with range/body above this are treated as spikes
    pub max_wick_body_ratio: f64,
    /// Structural signals on older decision candles are suppressed
    pub max_candle_age_secs: i64,
}

impl StructureConfig {
    pub fn max_candle_age(&self) -> Duration {
        Duration::seconds(self.max_candle_age_secs)
    }
}

impl Default for StructureConfig {
    fn default() -> Self {
        Self {
            lookback: 20,
            presignal_lookback: 15,
            presignal_min_candles: 30,
            zone_buffer: 0.002,
            msb_margin: 0.001,
            max_wick_body_ratio: 4.0,
            max_candle_age_secs: 90 * 60, // one and a half hours after the 4H open
        }
    }
}

/// Order-flow and order-book condition thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowConfig {
    /// Net delta a LONG needs (USD)
    pub net_delta_long_min: f64,
    /// Net delta a SHORT needs (USD, negative)
    pub net_delta_short_max: f64,
    /// Net delta must be strictly beyond the thresholds rather than reach them
    pub strict_delta: bool,
    /// Bid/ask notional ratio for a book imbalance
    pub book_imbalance_ratio: f64,
    /// Recent-trade share a side needs
    pub participation_min: f64,
    /// Trades in the short momentum window
    pub momentum_window: usize,
    /// Minimum true conditions in the strict regime
    pub strict_min_conditions: usize,
    /// Minimum true conditions in the relaxed regime
    pub relaxed_min_conditions: usize,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            net_delta_long_min: 50_000.0,
            net_delta_short_max: -50_000.0,
            strict_delta: false,
            book_imbalance_ratio: 1.3,
            participation_min: 0.55,
            momentum_window: 20,
            strict_min_conditions: 3,
            relaxed_min_conditions: 2,
        }
    }
}

/// Output volume bounds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingConfig {
    pub min_confidence: u8,
    pub max_per_side: usize,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            min_confidence: 60,
            max_per_side: 25,
        }
    }
}

/// Full engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub runs: Vec<ProfileRun>,
    /// Instrument whose higher-timeframe trend sets the market bias
    pub bias_instrument: String,
    /// Majors summarised in the digest header alongside the bias instrument
    pub watch_instruments: Vec<String>,
    /// Top instruments by 24h quote volume to scan
    pub top_limit: usize,
    pub trades_limit: usize,
    pub book_depth: usize,
    /// Snapshots fetched concurrently
    pub concurrency: usize,
    pub pump: PumpConfig,
    pub structure: StructureConfig,
    pub flow: FlowConfig,
    pub ranking: RankingConfig,
    pub whale_tiers: WhaleTierTable,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            runs: vec![
                ProfileRun {
                    profile: EngineProfile::Presignal,
                    timeframe: "1H".to_string(),
                    candle_limit: 80,
                },
                ProfileRun {
                    profile: EngineProfile::Structure,
                    timeframe: "4H".to_string(),
                    candle_limit: 200,
                },
            ],
            bias_instrument: "BTC-USDT".to_string(),
            watch_instruments: vec!["ETH-USDT".to_string()],
            top_limit: 150,
            trades_limit: 200,
            book_depth: 20,
            concurrency: 12,
            pump: PumpConfig::default(),
            structure: StructureConfig::default(),
            flow: FlowConfig::default(),
            ranking: RankingConfig::default(),
            whale_tiers: WhaleTierTable::default(),
        }
    }
}

impl EngineConfig {
    /// Presignal thresholds: any net buying (selling), any book lean
    pub fn presignal_flow(&self) -> FlowConfig {
        FlowConfig {
            net_delta_long_min: 0.0,
            net_delta_short_max: 0.0,
            strict_delta: true,
            book_imbalance_ratio: 1.0,
            ..self.flow.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_parse() {
        assert_eq!("pump".parse::<EngineProfile>().unwrap(), EngineProfile::Pump);
        assert_eq!(" Structure ".parse::<EngineProfile>().unwrap(), EngineProfile::Structure);
        assert_eq!("pre".parse::<EngineProfile>().unwrap(), EngineProfile::Presignal);
        assert!("scalp".parse::<EngineProfile>().is_err());
    }

    #[test]
    fn test_profile_run_parse() {
        let run: ProfileRun = "structure:4H:200".parse().unwrap();
        assert_eq!(run.profile, EngineProfile::Structure);
        assert_eq!(run.timeframe, "4H");
        assert_eq!(run.candle_limit, 200);

        assert!("pump:1H".parse::<ProfileRun>().is_err());
        assert!("pump::100".parse::<ProfileRun>().is_err());
        assert!("pump:1H:many".parse::<ProfileRun>().is_err());
    }

    #[test]
    fn test_presignal_flow_loosens_thresholds() {
        let config = EngineConfig::default();
        let flow = config.presignal_flow();
        assert_eq!(flow.net_delta_long_min, 0.0);
        assert!(flow.strict_delta);
        assert!(!config.flow.strict_delta);
        assert_eq!(flow.book_imbalance_ratio, 1.0);
        assert_eq!(flow.momentum_window, config.flow.momentum_window);
    }

    #[test]
    fn test_max_candle_age() {
        let config = StructureConfig::default();
        assert_eq!(config.max_candle_age(), Duration::minutes(90));
    }
}
