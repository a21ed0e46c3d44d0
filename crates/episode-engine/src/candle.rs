//! Candle and Timeframe Types

use chrono::{Duration, NaiveTime};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Decimal places every synthesized price is rounded to.
pub const PRICE_DECIMALS: u32 = 2;

/// One OHLC bar.
///
/// Producers guarantee `low <= min(open, close)` and `high >= max(open, close)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Display label (`HH:MM`, `Day N`, ...)
    pub time: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl Candle {
    pub fn is_valid(&self) -> bool {
        self.low <= self.open.min(self.close)
            && self.high >= self.open.max(self.close)
            && self.low <= self.high
    }

    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    pub fn body(&self) -> f64 {
        (self.close - self.open).abs()
    }
}

/// Round a price to [`PRICE_DECIMALS`] places, half away from zero.
pub fn round_price(value: f64) -> f64 {
    Decimal::from_f64(value)
        .map(|d| d.round_dp_with_strategy(PRICE_DECIMALS, RoundingStrategy::MidpointAwayFromZero))
        .and_then(|d| d.to_f64())
        .unwrap_or_else(|| (value * 100.0).round() / 100.0)
}

/// Chart timeframe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1m")]
    M1,
    #[serde(rename = "3m")]
    M3,
    #[serde(rename = "5m")]
    M5,
    #[serde(rename = "15m")]
    M15,
    #[serde(rename = "30m")]
    M30,
    #[serde(rename = "1H")]
    H1,
    #[serde(rename = "2H")]
    H2,
    #[serde(rename = "4H")]
    H4,
    #[serde(rename = "1D")]
    D1,
    #[serde(rename = "1W")]
    W1,
    #[serde(rename = "1M")]
    Mo1,
}

impl Timeframe {
    pub const ALL: [Timeframe; 11] = [
        Timeframe::M1,
        Timeframe::M3,
        Timeframe::M5,
        Timeframe::M15,
        Timeframe::M30,
        Timeframe::H1,
        Timeframe::H2,
        Timeframe::H4,
        Timeframe::D1,
        Timeframe::W1,
        Timeframe::Mo1,
    ];

    /// Typical bar range in price units. Finer timeframes move less.
    pub fn volatility(&self) -> f64 {
        match self {
            Timeframe::M1 => 0.5,
            Timeframe::M3 => 1.0,
            Timeframe::M5 => 1.5,
            Timeframe::M15 => 3.0,
            Timeframe::M30 => 5.0,
            Timeframe::H1 => 8.0,
            Timeframe::H2 => 12.0,
            Timeframe::H4 => 20.0,
            Timeframe::D1 => 50.0,
            Timeframe::W1 => 150.0,
            Timeframe::Mo1 => 400.0,
        }
    }

    /// Bar length in minutes (a month counts as 30 days).
    pub fn minutes(&self) -> i64 {
        match self {
            Timeframe::M1 => 1,
            Timeframe::M3 => 3,
            Timeframe::M5 => 5,
            Timeframe::M15 => 15,
            Timeframe::M30 => 30,
            Timeframe::H1 => 60,
            Timeframe::H2 => 120,
            Timeframe::H4 => 240,
            Timeframe::D1 => 1_440,
            Timeframe::W1 => 10_080,
            Timeframe::Mo1 => 43_200,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Timeframe::M1 => "1m",
            Timeframe::M3 => "3m",
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
            Timeframe::M30 => "30m",
            Timeframe::H1 => "1H",
            Timeframe::H2 => "2H",
            Timeframe::H4 => "4H",
            Timeframe::D1 => "1D",
            Timeframe::W1 => "1W",
            Timeframe::Mo1 => "1M",
        }
    }

    pub fn is_intraday(&self) -> bool {
        self.minutes() < Timeframe::D1.minutes()
    }

    /// Label for bar `index`, intraday bars counted from midnight.
    pub fn label(&self, index: usize) -> String {
        self.label_from(NaiveTime::default(), index)
    }

    /// Label for bar `index`, intraday bars counted from `anchor`.
    pub fn label_from(&self, anchor: NaiveTime, index: usize) -> String {
        match self {
            Timeframe::D1 => format!("Day {}", index + 1),
            Timeframe::W1 => format!("Week {}", index + 1),
            Timeframe::Mo1 => format!("Month {}", index + 1),
            _ => self.time_of(anchor, index).format("%H:%M").to_string(),
        }
    }

    /// Wall-clock time of an intraday bar; wraps past midnight.
    pub fn time_of(&self, anchor: NaiveTime, index: usize) -> NaiveTime {
        let offset = Duration::minutes(self.minutes() * index as i64);
        anchor.overflowing_add_signed(offset).0
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl std::str::FromStr for Timeframe {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Case matters: "1M" is monthly, "1m" is one minute.
        match s {
            "1m" => Ok(Timeframe::M1),
            "3m" => Ok(Timeframe::M3),
            "5m" => Ok(Timeframe::M5),
            "15m" => Ok(Timeframe::M15),
            "30m" => Ok(Timeframe::M30),
            "1H" | "1h" => Ok(Timeframe::H1),
            "2H" | "2h" => Ok(Timeframe::H2),
            "4H" | "4h" => Ok(Timeframe::H4),
            "1D" | "1d" => Ok(Timeframe::D1),
            "1W" | "1w" => Ok(Timeframe::W1),
            "1M" | "1mo" => Ok(Timeframe::Mo1),
            _ => Err(anyhow::anyhow!("Invalid timeframe: {}", s)),
        }
    }
}
