//! Batch runner: fetch, analyse, rank
//!
//! Network fetches run concurrently with a bounded stream; analysis is pure
//! and runs on the rayon pool once all snapshots are in. A unit whose fetch
//! fails is logged and left out, never retried here. Units of the same
//! instrument fail independently.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::aggregator::{analyze_snapshot, AnalysisContext};
use crate::bias::{market_bias, summarize_trend, MarketBias, TrendSummary};
use crate::config::{EngineConfig, EngineProfile};
use crate::market_cap::{base_symbol, MarketCapBook};
use crate::orderflow::{analyze_order_flow, TradeTape};
use crate::providers::MarketData;
use crate::ranking::{build_digest, Digest};
use crate::types::{MarketSnapshot, Signal};

const REFERENCE_CANDLES: usize = 200;

pub struct Scanner {
    config: EngineConfig,
}

/// Snapshots of one instrument, one per configured run
type Unit = (EngineProfile, MarketSnapshot);

impl Scanner {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    async fn reference_summary<M: MarketData>(
        &self,
        market: &M,
        caps: &MarketCapBook,
        instrument: &str,
    ) -> Result<Option<TrendSummary>> {
        let candles_4h = market.candles(instrument, "4H", REFERENCE_CANDLES).await?;
        let candles_1h = market.candles(instrument, "1H", REFERENCE_CANDLES).await?;
        let order_flow = match market.trades(instrument, self.config.trades_limit).await {
            Ok(tape) if !tape.is_empty() => {
                let thresholds = self
                    .config
                    .whale_tiers
                    .for_segment(caps.segment(base_symbol(instrument)));
                Some(analyze_order_flow(&tape, &thresholds, self.config.flow.momentum_window))
            }
            Ok(_) => None,
            Err(e) => {
                warn!("{}: trades unavailable for summary: {:#}", instrument, e);
                None
            }
        };
        Ok(summarize_trend(instrument, &candles_4h, &candles_1h, order_flow.as_ref()))
    }

    /// Summaries for the bias instrument (first) and the watched majors
    pub async fn reference_summaries<M: MarketData>(
        &self,
        market: &M,
        caps: &MarketCapBook,
    ) -> Vec<TrendSummary> {
        let instruments = std::iter::once(&self.config.bias_instrument)
            .chain(self.config.watch_instruments.iter());
        let mut summaries = Vec::new();
        for instrument in instruments {
            match self.reference_summary(market, caps, instrument).await {
                Ok(Some(summary)) => summaries.push(summary),
                Ok(None) => warn!("{}: not enough candles for a trend summary", instrument),
                Err(e) => warn!("{}: trend summary failed: {:#}", instrument, e),
            }
        }
        summaries
    }

    /// One result per configured run. Trades and book are shared by the runs;
    /// when either is unavailable the runs still go ahead without it.
    async fn fetch_units<M: MarketData>(&self, market: &M, instrument: &str) -> Vec<Result<Unit>> {
        let trades = match market.trades(instrument, self.config.trades_limit).await {
            Ok(tape) => tape,
            Err(e) => {
                warn!("{}: trades unavailable: {:#}", instrument, e);
                TradeTape::default()
            }
        };
        let order_book = match market.order_book(instrument, self.config.book_depth).await {
            Ok(book) => book,
            Err(e) => {
                warn!("{}: order book unavailable: {:#}", instrument, e);
                None
            }
        };

        let mut units = Vec::with_capacity(self.config.runs.len());
        for run in &self.config.runs {
            let unit = market
                .candles(instrument, &run.timeframe, run.candle_limit)
                .await
                .with_context(|| format!("{} {} candles", run.profile, run.timeframe))
                .map(|candles| {
                    let snapshot = MarketSnapshot {
                        instrument: instrument.to_string(),
                        timeframe: run.timeframe.clone(),
                        candles,
                        trades: trades.clone(),
                        order_book,
                    };
                    (run.profile, snapshot)
                });
            units.push(unit);
        }
        units
    }

    /// Analyse fetched units against a fixed bias and clock
    pub fn analyze_units(
        &self,
        units: &[(EngineProfile, MarketSnapshot)],
        bias: MarketBias,
        caps: &MarketCapBook,
        now: DateTime<Utc>,
    ) -> Vec<Signal> {
        let ctx = AnalysisContext {
            now,
            bias,
            caps,
            config: &self.config,
        };
        units
            .par_iter()
            .flat_map_iter(|(profile, snapshot)| analyze_snapshot(snapshot, *profile, &ctx))
            .collect()
    }

    /// One full batch. Only a failed instrument listing aborts the run.
    pub async fn run<M: MarketData>(
        &self,
        market: &M,
        caps: &MarketCapBook,
        now: DateTime<Utc>,
    ) -> Result<Digest> {
        let references = self.reference_summaries(market, caps).await;
        let bias = market_bias(
            references
                .iter()
                .find(|s| s.instrument == self.config.bias_instrument),
        );
        info!("Market bias: {}", bias);

        let instruments = market
            .top_instruments(self.config.top_limit)
            .await
            .context("Failed to list instruments")?;
        info!("Scanning {} instruments", instruments.len());

        let fetched: Vec<(String, Vec<Result<Unit>>)> = stream::iter(instruments)
            .map(|instrument| async move {
                let units = self.fetch_units(market, &instrument).await;
                (instrument, units)
            })
            .buffer_unordered(self.config.concurrency.max(1))
            .collect()
            .await;

        let mut units: Vec<Unit> = Vec::new();
        let mut failed = 0usize;
        for (instrument, results) in fetched {
            for result in results {
                match result {
                    Ok(unit) => units.push(unit),
                    Err(e) => {
                        failed += 1;
                        warn!("{}: skipped: {:#}", instrument, e);
                    }
                }
            }
        }
        units.sort_by(|a, b| {
            a.1.instrument
                .cmp(&b.1.instrument)
                .then_with(|| a.1.timeframe.cmp(&b.1.timeframe))
                .then_with(|| a.0.cmp(&b.0))
        });
        debug!("{} analysis units, {} failed", units.len(), failed);

        let signals = self.analyze_units(&units, bias, caps, now);
        let digest = build_digest(
            signals,
            &self.config.runs,
            &self.config.ranking,
            bias,
            references,
            now,
        );
        info!(
            "Batch done: {} signals from {} units ({} units failed)",
            digest.signal_count(),
            units.len(),
            failed
        );
        Ok(digest)
    }
}
