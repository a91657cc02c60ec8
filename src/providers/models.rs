//! Wire types for the OKX public market endpoints and CoinGecko
//!
//! OKX sends every number as a string; conversion to validated domain values
//! happens in the client, so rows that fail to parse can be skipped one by one.

use serde::Deserialize;

use crate::orderflow::RawTrade;

/// OKX envelope: `code == "0"` means success
#[derive(Debug, Deserialize)]
pub struct OkxResponse<T> {
    pub code: String,
    #[serde(default)]
    pub msg: String,
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OkxTicker {
    pub inst_id: String,
    /// 24h volume in quote currency
    #[serde(default)]
    pub vol_ccy24h: String,
}

/// `[ts, o, h, l, c, vol, volCcy, volCcyQuote, confirm]`
pub type OkxCandleRow = Vec<String>;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OkxTrade {
    pub px: String,
    pub sz: String,
    pub side: String,
    pub ts: String,
}

impl From<OkxTrade> for RawTrade {
    fn from(t: OkxTrade) -> Self {
        RawTrade {
            price: t.px,
            size: t.sz,
            side: t.side,
            timestamp_ms: t.ts,
        }
    }
}

/// Levels are `[price, size, deprecated, order_count]`
#[derive(Debug, Deserialize)]
pub struct OkxBook {
    #[serde(default)]
    pub bids: Vec<Vec<String>>,
    #[serde(default)]
    pub asks: Vec<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct CoinGeckoMarket {
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub market_cap: Option<f64>,
}
