//! Digest rendering and delivery

use std::fmt::Write as _;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use tracing::{info, warn};

use crate::bias::{Momentum, TrendRead, TrendSummary};
use crate::config::EngineProfile;
use crate::ranking::{Digest, DigestSection};
use crate::types::Signal;

/// Telegram rejects messages over 4096 characters
const MAX_MESSAGE_CHARS: usize = 4000;

/// `1234567.8` -> `1,234,568`
pub fn fmt_usd(value: f64) -> String {
    let rounded = value.round();
    let digits = format!("{:.0}", rounded.abs());
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    if rounded < 0.0 {
        out.insert(0, '-');
    }
    out
}

fn trend_label(trend: TrendRead) -> &'static str {
    match trend {
        TrendRead::Up => "Up",
        TrendRead::Down => "Down",
        TrendRead::Flat => "Flat",
        TrendRead::Unknown => "Not enough data",
    }
}

fn momentum_label(momentum: Momentum) -> &'static str {
    match momentum {
        Momentum::Positive => "Positive",
        Momentum::Negative => "Negative",
        Momentum::Flat => "Flat",
        Momentum::Unknown => "Unknown",
    }
}

fn render_reference(out: &mut String, summary: &TrendSummary) {
    let _ = writeln!(out, "\n*{}*", summary.instrument);
    let _ = writeln!(out, "- Price (4H): `{:.2}`", summary.last_close);
    let _ = writeln!(
        out,
        "- 4H trend: *{}* | Momentum: *{}*",
        trend_label(summary.trend_4h),
        momentum_label(summary.momentum_4h)
    );
    let _ = writeln!(out, "- 1H trend: *{}*", trend_label(summary.trend_1h));
    match summary.net_delta {
        Some(delta) => {
            let _ = writeln!(out, "- Net delta: {} USDT", fmt_usd(delta));
        }
        None => {
            let _ = writeln!(out, "- Net delta: no data");
        }
    }
    match &summary.buy_whale {
        Some(w) => {
            let _ = writeln!(out, "- Whale: {}-BUY ~${}", w.tier, fmt_usd(w.notional));
        }
        None => {
            let _ = writeln!(out, "- No significant BUY whale");
        }
    }
}

fn section_title(section: &DigestSection) -> String {
    match section.profile {
        EngineProfile::Pump => format!("{} Pump / Dump", section.timeframe),
        EngineProfile::Zone => format!("{} Zone Rejections", section.timeframe),
        EngineProfile::Structure => format!("{} Confirmed Signals", section.timeframe),
        EngineProfile::Presignal => format!("{} Pre-Signals", section.timeframe),
    }
}

fn render_signal(out: &mut String, signal: &Signal) {
    let _ = writeln!(
        out,
        "\n*{} ({})* {}",
        signal.instrument,
        signal.side,
        signal.segment.label()
    );
    let _ = writeln!(out, "- Close ({}): `{:.4}`", signal.timeframe, signal.last_close);

    if let Some(pump) = &signal.pump {
        let _ = writeln!(
            out,
            "- Vol x{:.2} | ramp {:.2} | RSI {:.1} | trend {}",
            pump.volume_ratio,
            pump.ramp,
            pump.rsi,
            if pump.trend_up { "up" } else { "down" }
        );
        if pump.is_whale {
            let _ = writeln!(out, "- Whale bar");
        }
    }

    if !signal.structure.is_empty() {
        let labels: Vec<&str> = signal.structure.iter().map(|l| l.kind.label()).collect();
        let _ = writeln!(out, "- Structure: {}", labels.join(", "));
    }

    if signal.profile != EngineProfile::Pump {
        let of = &signal.order_flow;
        let _ = writeln!(out, "- Net delta: `{} USDT`", fmt_usd(of.net_delta));
        if let Some(book) = &signal.order_book {
            let _ = writeln!(
                out,
                "- Book (bid/ask): `{} / {}`",
                fmt_usd(book.bid_notional),
                fmt_usd(book.ask_notional)
            );
        }
        let _ = writeln!(
            out,
            "- Flow: BUY {:.0}% / SELL {:.0}%",
            of.buy_ratio * 100.0,
            of.sell_ratio * 100.0
        );
        match of.whale_for(signal.side) {
            Some(w) => {
                let _ = writeln!(out, "- Whale: {}-{} ~${}", w.tier, w.side, fmt_usd(w.notional));
            }
            None => {
                let _ = writeln!(out, "- Whale: none");
            }
        }
    }

    let _ = writeln!(out, "- Confidence: *{}%*", signal.confidence);

    if let Some(risk) = &signal.risk {
        let _ = writeln!(
            out,
            "- TP1/TP2/TP3: `{:.4} / {:.4} / {:.4}`",
            risk.tp1, risk.tp2, risk.tp3
        );
        let _ = writeln!(out, "- Stop: `{:.4}`", risk.stop);
    }
}

/// Markdown digest: market header, one block per profile run, timestamp
pub fn render_digest(digest: &Digest) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "*Market overview* (bias: *{}*)", digest.bias);
    for summary in &digest.references {
        render_reference(&mut out, summary);
    }

    for section in digest.sections.iter().filter(|s| !s.is_empty()) {
        let _ = writeln!(out, "\n*{}*", section_title(section));
        for signal in section.longs.iter().chain(section.shorts.iter()) {
            render_signal(&mut out, signal);
        }
    }

    if digest.sections.iter().all(|s| s.is_empty()) {
        let _ = writeln!(out, "\n_No new signals this run._");
    }

    let _ = write!(
        out,
        "\n_Time:_ `{}`",
        digest.generated_at.format("%Y-%m-%d %H:%M UTC")
    );
    out
}

/// Split on line boundaries so each chunk fits one message. Lines longer
/// than `max_chars` are cut at character boundaries.
pub fn split_message(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    let pieces = text.lines().flat_map(|line| {
        let chars: Vec<char> = line.chars().collect();
        if chars.is_empty() {
            vec![String::new()]
        } else {
            chars.chunks(max_chars).map(|c| c.iter().collect()).collect()
        }
    });

    for piece in pieces {
        let len = piece.chars().count();
        if !current.is_empty() && current_len + len + 1 > max_chars {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if !current.is_empty() {
            current.push('\n');
            current_len += 1;
        }
        current.push_str(&piece);
        current_len += len;
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Where the digest goes
pub enum Notifier {
    Telegram {
        client: Client,
        token: String,
        chat_id: String,
    },
    Stdout,
}

impl Notifier {
    /// Telegram when both credentials are present, stdout otherwise
    pub fn from_credentials(token: Option<String>, chat_id: Option<String>) -> Result<Self> {
        match (token, chat_id) {
            (Some(token), Some(chat_id)) if !token.is_empty() && !chat_id.is_empty() => {
                let client = Client::builder()
                    .timeout(Duration::from_secs(10))
                    .build()
                    .context("Failed to create HTTP client")?;
                Ok(Self::Telegram {
                    client,
                    token,
                    chat_id,
                })
            }
            _ => {
                warn!("TELEGRAM_TOKEN or CHAT_ID not set, digest goes to stdout");
                Ok(Self::Stdout)
            }
        }
    }

    pub async fn send(&self, text: &str) -> Result<()> {
        match self {
            Self::Stdout => {
                println!("{}", text);
                Ok(())
            }
            Self::Telegram {
                client,
                token,
                chat_id,
            } => {
                let url = format!("https://api.telegram.org/bot{}/sendMessage", token);
                let chunks = split_message(text, MAX_MESSAGE_CHARS);
                for chunk in &chunks {
                    let response = client
                        .post(&url)
                        .form(&[
                            ("chat_id", chat_id.as_str()),
                            ("text", chunk.as_str()),
                            ("parse_mode", "Markdown"),
                        ])
                        .send()
                        .await
                        .context("Failed to send Telegram message")?;
                    let status = response.status();
                    if !status.is_success() {
                        let body = response.text().await.unwrap_or_default();
                        return Err(anyhow!("Telegram sendMessage failed ({}): {}", status, body));
                    }
                }
                info!("Sent digest to Telegram in {} message(s)", chunks.len());
                Ok(())
            }
        }
    }
}
