use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::FeedError;

/// A single OHLC candlestick: the timestamp marks the start of the interval.
///
/// Invariants (enforced by `try_new`, never by direct field construction outside
/// this crate): `low <= open <= high`, `low <= close <= high`, `low <= high`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candlestick {
    pub timestamp_secs: i64,
    pub open: Decimal,
    pub close: Decimal,
    pub low: Decimal,
    pub high: Decimal,
}

impl Candlestick {
    pub fn try_new(
        timestamp_secs: i64,
        open: Decimal,
        close: Decimal,
        low: Decimal,
        high: Decimal,
    ) -> Result<Self, FeedError> {
        if open == Decimal::ZERO || close == Decimal::ZERO || low == Decimal::ZERO || high == Decimal::ZERO {
            return Err(FeedError::received_zero_value());
        }
        if low > open || open > high || low > close || close > high || low > high {
            return Err(FeedError::invalid_ohlc(timestamp_secs));
        }
        Ok(Self {
            timestamp_secs,
            open,
            close,
            low,
            high,
        })
    }

    /// Clone this candle with its timestamp rewritten, used by the gap patcher.
    pub fn cloned_at(&self, timestamp_secs: i64) -> Self {
        Self {
            timestamp_secs,
            ..*self
        }
    }
}

impl Serialize for Candlestick {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        use serde_json::value::RawValue;

        // Prices go over the wire as bare number tokens (§6), not quoted
        // strings, so each formatted price is boxed as a `RawValue` rather
        // than serialized as a `String`.
        let raw = |d: Decimal| -> Result<Box<RawValue>, S::Error> {
            RawValue::from_string(crate::price::format_decimal(d)).map_err(serde::ser::Error::custom)
        };

        let mut state = serializer.serialize_struct("Candlestick", 5)?;
        state.serialize_field("t", &self.timestamp_secs)?;
        state.serialize_field("o", &raw(self.open)?)?;
        state.serialize_field("c", &raw(self.close)?)?;
        state.serialize_field("l", &raw(self.low)?)?;
        state.serialize_field("h", &raw(self.high)?)?;
        state.end()
    }
}

/// Closed enumeration: the only market type this system understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarketType {
    CoinPair,
}

impl MarketType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarketType::CoinPair => "coin-pair",
        }
    }
}

impl fmt::Display for MarketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for MarketType {
    type Err = FeedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "coin-pair" | "COIN" => Ok(MarketType::CoinPair),
            _ => Err(FeedError::InvalidMarketType),
        }
    }
}

/// Closed enumeration of supported exchanges. Widening this is a semver break.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Provider {
    Binance,
    Bitfinex,
    Coinbase,
    Ftx,
    Kucoin,
    Bitstamp,
    BinanceUsdMFutures,
    Bybit,
    Okx,
    Htx,
    Upbit,
    Bitget,
    Mexc,
    Gate,
}

impl Provider {
    pub const ALL: [Provider; 14] = [
        Provider::Binance,
        Provider::Bitfinex,
        Provider::Coinbase,
        Provider::Ftx,
        Provider::Kucoin,
        Provider::Bitstamp,
        Provider::BinanceUsdMFutures,
        Provider::Bybit,
        Provider::Okx,
        Provider::Htx,
        Provider::Upbit,
        Provider::Bitget,
        Provider::Mexc,
        Provider::Gate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Binance => "binance",
            Provider::Bitfinex => "bitfinex",
            Provider::Coinbase => "coinbase",
            Provider::Ftx => "ftx",
            Provider::Kucoin => "kucoin",
            Provider::Bitstamp => "bitstamp",
            Provider::BinanceUsdMFutures => "binance-usdm-futures",
            Provider::Bybit => "bybit",
            Provider::Okx => "okx",
            Provider::Htx => "htx",
            Provider::Upbit => "upbit",
            Provider::Bitget => "bitget",
            Provider::Mexc => "mexc",
            Provider::Gate => "gate",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Provider {
    type Err = FeedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Provider::ALL
            .iter()
            .find(|p| p.as_str() == s)
            .copied()
            .ok_or_else(|| FeedError::UnsupportedProvider(s.to_string()))
    }
}

/// The tuple (market-type, provider, base-asset, quote-asset).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MarketSource {
    pub market_type: MarketType,
    pub provider: Provider,
    pub base: String,
    pub quote: String,
}

impl MarketSource {
    pub fn new(provider: Provider, base: impl Into<String>, quote: impl Into<String>) -> Self {
        Self {
            market_type: MarketType::CoinPair,
            provider,
            base: base.into().to_uppercase(),
            quote: quote.into().to_uppercase(),
        }
    }

    /// Canonical string form: `type:provider:base-quote`.
    pub fn canonical_name(&self) -> String {
        format!(
            "{}:{}:{}-{}",
            self.market_type, self.provider, self.base, self.quote
        )
    }
}

/// A positive duration, always representable as a whole number of seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Interval(i64);

impl Interval {
    pub const ONE_MINUTE: Interval = Interval(60);
    pub const THREE_MINUTES: Interval = Interval(3 * 60);
    pub const FIVE_MINUTES: Interval = Interval(5 * 60);
    pub const FIFTEEN_MINUTES: Interval = Interval(15 * 60);
    pub const THIRTY_MINUTES: Interval = Interval(30 * 60);
    pub const ONE_HOUR: Interval = Interval(60 * 60);
    pub const TWO_HOURS: Interval = Interval(2 * 60 * 60);
    pub const THREE_HOURS: Interval = Interval(3 * 60 * 60);
    pub const FOUR_HOURS: Interval = Interval(4 * 60 * 60);
    pub const SIX_HOURS: Interval = Interval(6 * 60 * 60);
    pub const EIGHT_HOURS: Interval = Interval(8 * 60 * 60);
    pub const TWELVE_HOURS: Interval = Interval(12 * 60 * 60);
    pub const ONE_DAY: Interval = Interval(24 * 60 * 60);
    pub const THREE_DAYS: Interval = Interval(3 * 24 * 60 * 60);
    pub const SEVEN_DAYS: Interval = Interval(7 * 24 * 60 * 60);
    pub const FOURTEEN_DAYS: Interval = Interval(14 * 24 * 60 * 60);
    pub const THIRTY_DAYS: Interval = Interval(30 * 24 * 60 * 60);

    pub fn from_secs(secs: i64) -> Result<Self, FeedError> {
        if secs <= 0 {
            return Err(FeedError::UnsupportedInterval(format!(
                "interval must be positive, got {secs}s"
            )));
        }
        Ok(Interval(secs))
    }

    pub fn as_secs(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_name_matches_spec_form() {
        let market = MarketSource::new(Provider::Binance, "btc", "usdt");
        assert_eq!(market.canonical_name(), "coin-pair:binance:BTC-USDT");
    }

    #[test]
    fn interval_rejects_non_positive() {
        assert!(Interval::from_secs(0).is_err());
        assert!(Interval::from_secs(-5).is_err());
        assert!(Interval::from_secs(60).is_ok());
    }

    #[test]
    fn candlestick_rejects_ohlc_violation() {
        let d = |v: i64| Decimal::new(v, 0);
        assert!(Candlestick::try_new(0, d(10), d(10), d(20), d(5)).is_err());
        assert!(Candlestick::try_new(0, d(10), d(10), d(5), d(20)).is_ok());
    }

    #[test]
    fn candlestick_rejects_zero_price() {
        let d = |v: i64| Decimal::new(v, 0);
        assert!(Candlestick::try_new(0, d(0), d(10), d(5), d(20)).is_err());
    }

    #[test]
    fn provider_round_trips_through_str() {
        for p in Provider::ALL {
            let parsed: Provider = p.as_str().parse().unwrap();
            assert_eq!(parsed, p);
        }
    }

    #[test]
    fn candlestick_serializes_prices_as_bare_number_tokens() {
        let candle = Candlestick::try_new(
            1,
            Decimal::new(10, 1), // 1.0
            Decimal::new(15, 1), // 1.5
            Decimal::new(10, 1),
            Decimal::new(15, 1),
        )
        .unwrap();
        let json = serde_json::to_string(&candle).unwrap();
        assert_eq!(json, r#"{"t":1,"o":1,"c":1.5,"l":1,"h":1.5}"#);
    }
}
