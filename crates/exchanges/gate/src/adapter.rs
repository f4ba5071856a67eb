use crate::types::{GateCandleRow, GateErrorEnvelope};
use async_trait::async_trait;
use candlefeed_core::error::FeedError;
use candlefeed_core::model::{Candlestick, Interval, MarketSource, Provider};
use candlefeed_core::price::parse_price_str;
use candlefeed_core::time::normalize;
use candlefeed_exchanges_common::{reject_invalid_page, ExchangeAdapter, HttpCandleClient, RequestGate};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

const BASE_URL: &str = "https://api.gateio.ws/api/v4/spot/candlesticks";
const MAX_INTERVALS_BACK: i64 = 10_000;
const PER_CALL_LIMIT: u32 = 1_000;

fn interval_code(interval: Interval) -> Result<&'static str, FeedError> {
    match interval.as_secs() {
        60 => Ok("1m"),
        300 => Ok("5m"),
        900 => Ok("15m"),
        1800 => Ok("30m"),
        3600 => Ok("1h"),
        14400 => Ok("4h"),
        28800 => Ok("8h"),
        86400 => Ok("1d"),
        604800 => Ok("7d"),
        2592000 => Ok("30d"),
        _ => Err(FeedError::UnsupportedInterval(format!("{interval}"))),
    }
}

/// `BTC_USDT`: underscore-separated, uppercase.
fn currency_pair(market: &MarketSource) -> String {
    format!("{}_{}", market.base, market.quote)
}

fn parse_row(row: &GateCandleRow) -> Result<Candlestick, FeedError> {
    if row.len() < 6 {
        return Err(FeedError::InvalidJsonResponse("candle row too short".into()));
    }
    let ts = row[0]
        .as_str()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| FeedError::InvalidJsonResponse("bad timestamp".into()))?;
    let field = |i: usize| -> Result<&str, FeedError> {
        row[i]
            .as_str()
            .ok_or_else(|| FeedError::InvalidJsonResponse(format!("field {i} is not a string")))
    };
    // [ts, quote-volume, close, high, low, open, base-volume, closed]
    Candlestick::try_new(
        ts,
        parse_price_str(field(5)?)?,
        parse_price_str(field(2)?)?,
        parse_price_str(field(4)?)?,
        parse_price_str(field(3)?)?,
    )
}

pub struct GateAdapter {
    http: HttpCandleClient,
    gate: RequestGate,
    debug: AtomicBool,
}

impl GateAdapter {
    pub fn new() -> Self {
        Self {
            http: HttpCandleClient::new(),
            gate: RequestGate::new(),
            debug: AtomicBool::new(false),
        }
    }
}

impl Default for GateAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExchangeAdapter for GateAdapter {
    async fn request(
        &self,
        market: &MarketSource,
        start: DateTime<Utc>,
        interval: Interval,
    ) -> Result<Vec<Candlestick>, FeedError> {
        let code = interval_code(interval)?;
        let _guard = self.gate.acquire().await;
        let start_ts = normalize(start, interval, false);

        let oldest_allowed = Utc::now().timestamp() - MAX_INTERVALS_BACK * interval.as_secs();
        if start_ts < oldest_allowed {
            return Err(FeedError::DataTooFarBack);
        }

        let candles = candlefeed_exchanges_common::execute(
            || async {
                let raw: serde_json::Value = self
                    .http
                    .get_json(
                        BASE_URL,
                        &[
                            ("currency_pair", currency_pair(market)),
                            ("interval", code.to_string()),
                            ("from", start_ts.to_string()),
                            ("limit", PER_CALL_LIMIT.to_string()),
                        ],
                    )
                    .await?;

                if raw.is_object() {
                    let envelope: GateErrorEnvelope = serde_json::from_value(raw)
                        .map_err(|e| FeedError::InvalidJsonResponse(e.to_string()))?;
                    if envelope.label == "INVALID_CURRENCY_PAIR" {
                        return Err(FeedError::InvalidMarketPair);
                    }
                    return Err(FeedError::ExchangeError {
                        code: None,
                        message: envelope.message,
                        retryable: false,
                    });
                }

                let rows: Vec<GateCandleRow> = serde_json::from_value(raw)
                    .map_err(|e| FeedError::InvalidJsonResponse(e.to_string()))?;
                if rows.is_empty() {
                    return Err(FeedError::OutOfCandlesticks);
                }

                let candles: Vec<Candlestick> = rows.iter().map(parse_row).collect::<Result<_, _>>()?;
                reject_invalid_page(&candles)?;
                Ok(candles)
            },
            candlefeed_exchanges_common::RetryStrategy::default(),
        )
        .await?;
        Ok(candlefeed_exchanges_common::patch_from_ts(candles, start_ts, interval))
    }

    fn patience(&self) -> Duration {
        Duration::from_secs(2)
    }

    fn name(&self) -> Provider {
        Provider::Gate
    }

    fn set_debug(&self, debug: bool) {
        self.debug.store(debug, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn currency_pair_is_underscore_separated_uppercase() {
        let market = MarketSource::new(Provider::Gate, "btc", "usdt");
        assert_eq!(currency_pair(&market), "BTC_USDT");
    }

    #[test]
    fn parse_row_maps_open_close_high_low_order() {
        let row: GateCandleRow = serde_json::from_str(
            r#"["1700000000", "987.6", "105", "110", "90", "100", "123.4", "true"]"#,
        )
        .unwrap();
        let candle = parse_row(&row).unwrap();
        assert_eq!(candle.timestamp_secs, 1_700_000_000);
        assert_eq!(candle.open.to_string(), "100");
        assert_eq!(candle.close.to_string(), "105");
    }
}
