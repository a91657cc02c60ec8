use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use tracing::{error, info, warn};

use whale_radar::config::{EngineConfig, ProfileRun};
use whale_radar::notify::{render_digest, Notifier};
use whale_radar::providers::{
    coingecko, okx, CoinGeckoClient, MarketCapSource, OkxClient, RetryPolicy,
};
use whale_radar::{MarketCapBook, Scanner};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Profile runs as profile:timeframe:limit (comma-separated)
    #[arg(
        long,
        env = "RUNS",
        value_delimiter = ',',
        default_value = "presignal:1H:80,structure:4H:200"
    )]
    runs: Vec<ProfileRun>,

    /// Number of top USDT instruments by 24h volume to scan
    #[arg(long, env = "TOP_LIMIT", default_value = "150")]
    top_limit: usize,

    /// Instrument whose trend sets the market bias
    #[arg(long, env = "BIAS_INSTRUMENT", default_value = "BTC-USDT")]
    bias_instrument: String,

    /// Extra instruments summarised in the digest header (comma-separated)
    #[arg(long, env = "WATCH_INSTRUMENTS", value_delimiter = ',', default_value = "ETH-USDT")]
    watch: Vec<String>,

    /// Concurrent instrument fetches
    #[arg(long, env = "CONCURRENCY", default_value = "12")]
    concurrency: usize,

    #[arg(long, env = "TRADES_LIMIT", default_value = "200")]
    trades_limit: usize,

    #[arg(long, env = "ORDERBOOK_DEPTH", default_value = "20")]
    book_depth: usize,

    /// Minimum confidence to report
    #[arg(long, env = "MIN_CONF", default_value = "60")]
    min_confidence: u8,

    #[arg(long, env = "MAX_PER_SIDE", default_value = "25")]
    max_per_side: usize,

    #[arg(long, env = "NET_DELTA_MIN_POS", default_value = "50000")]
    net_delta_long_min: f64,

    #[arg(long, env = "NET_DELTA_MIN_NEG", default_value = "-50000", allow_hyphen_values = true)]
    net_delta_short_max: f64,

    #[arg(long, env = "ORDERBOOK_IMB_RATIO", default_value = "1.3")]
    book_imbalance_ratio: f64,

    #[arg(long, env = "STRUCT_LOOKBACK", default_value = "20")]
    lookback: usize,

    #[arg(long, env = "ZONE_BUFFER", default_value = "0.002")]
    zone_buffer: f64,

    /// Structural signals on older decision candles are dropped
    #[arg(long, env = "MAX_CANDLE_AGE_MIN", default_value = "90")]
    max_candle_age_min: i64,

    #[arg(long, env = "PUMP_RATIO", default_value = "1.8")]
    pump_ratio: f64,

    #[arg(long, env = "PUMP_RAMP_MIN", default_value = "1.15")]
    pump_ramp_min: f64,

    #[arg(long, env = "PUMP_CONFIRM_CANDLES", default_value = "2")]
    pump_confirm_candles: usize,

    #[arg(long, env = "WHALE_USD", default_value = "800000")]
    whale_usd: f64,

    #[arg(long, env = "MIN_TURNOVER", default_value = "20000")]
    min_turnover: f64,

    /// Skip buying whale bars that go against the trend
    #[arg(long, env = "NO_FOLLOW_WHALES")]
    no_follow_whales: bool,

    /// CoinGecko pages of 250 coins to load for market caps
    #[arg(long, env = "MCAP_PAGES", default_value = "3")]
    mcap_pages: usize,

    #[arg(long, env = "OKX_BASE_URL", default_value = okx::DEFAULT_BASE_URL)]
    okx_url: String,

    #[arg(long, env = "COINGECKO_BASE_URL", default_value = coingecko::DEFAULT_BASE_URL)]
    coingecko_url: String,

    #[arg(long, env = "TELEGRAM_TOKEN", hide_env_values = true)]
    telegram_token: Option<String>,

    #[arg(long, env = "CHAT_ID")]
    chat_id: Option<String>,

    /// Print the digest as JSON instead of sending it
    #[arg(long)]
    json: bool,
}

impl Args {
    fn engine_config(&self) -> EngineConfig {
        let mut config = EngineConfig {
            runs: self.runs.clone(),
            bias_instrument: self.bias_instrument.clone(),
            watch_instruments: self
                .watch
                .iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            top_limit: self.top_limit,
            trades_limit: self.trades_limit,
            book_depth: self.book_depth,
            concurrency: self.concurrency,
            ..EngineConfig::default()
        };
        config.ranking.min_confidence = self.min_confidence;
        config.ranking.max_per_side = self.max_per_side;
        config.flow.net_delta_long_min = self.net_delta_long_min;
        config.flow.net_delta_short_max = self.net_delta_short_max;
        config.flow.book_imbalance_ratio = self.book_imbalance_ratio;
        config.structure.lookback = self.lookback;
        config.structure.zone_buffer = self.zone_buffer;
        config.structure.max_candle_age_secs = self.max_candle_age_min * 60;
        config.pump.pump_ratio = self.pump_ratio;
        config.pump.ramp_min = self.pump_ramp_min;
        config.pump.confirm_candles = self.pump_confirm_candles;
        config.pump.whale_usd = self.whale_usd;
        config.pump.min_turnover = self.min_turnover;
        config.pump.follow_whales = !self.no_follow_whales;
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("whale_radar=info".parse()?),
        )
        .init();

    let args = Args::parse();
    let config = args.engine_config();

    info!("Starting whale-radar");
    for run in &config.runs {
        info!("Run: {} on {} ({} candles)", run.profile, run.timeframe, run.candle_limit);
    }

    let retry = RetryPolicy::default();
    let market = OkxClient::new(args.okx_url.clone(), retry.clone())?;
    let cap_source = CoinGeckoClient::new(args.coingecko_url.clone(), args.mcap_pages, retry)?;
    let notifier = Notifier::from_credentials(args.telegram_token.clone(), args.chat_id.clone())?;

    info!("Loading market caps from CoinGecko...");
    let caps = match cap_source.market_caps().await {
        Ok(caps) => caps,
        Err(e) => {
            // Every instrument falls into the Unknown segment
            warn!("Market caps unavailable: {:#}", e);
            MarketCapBook::default()
        }
    };

    let scanner = Scanner::new(config);
    let digest = match scanner.run(&market, &caps, Utc::now()).await {
        Ok(digest) => digest,
        Err(e) => {
            error!("Scan failed: {:#}", e);
            return Err(e);
        }
    };

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&digest).context("Failed to serialize digest")?
        );
        return Ok(());
    }

    notifier.send(&render_digest(&digest)).await?;
    info!("Digest delivered ({} signals)", digest.signal_count());
    Ok(())
}
