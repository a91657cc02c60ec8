// Library crate - signal engine, market-data adapters and digest delivery

pub mod aggregator;
pub mod bias;
pub mod config;
pub mod indicators;
pub mod market_cap;
pub mod notify;
pub mod orderflow;
pub mod providers;
pub mod pump;
pub mod ranking;
pub mod risk;
pub mod scanner;
pub mod structure;
pub mod types;

// Re-export commonly used types
pub use aggregator::{analyze_snapshot, confidence_pct, AnalysisContext, ScoringRegime};
pub use bias::{market_bias, MarketBias, TrendSummary};
pub use config::{EngineConfig, EngineProfile, ProfileRun};
pub use market_cap::{MarketCapBook, MarketCapSegment, WhaleTierTable};
pub use orderflow::{analyze_order_flow, TradeTape};
pub use ranking::{build_digest, rank_signals, Digest};
pub use scanner::Scanner;
pub use structure::StructuralDetector;
pub use types::*;
