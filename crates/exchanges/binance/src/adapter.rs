use crate::types::{BinanceErrorEnvelope, BinanceKlineRow};
use async_trait::async_trait;
use candlefeed_core::error::FeedError;
use candlefeed_core::model::{Candlestick, Interval, MarketSource, Provider};
use candlefeed_core::price::parse_price_str;
use candlefeed_core::time::normalize;
use candlefeed_exchanges_common::{reject_invalid_page, ExchangeAdapter, HttpCandleClient, RequestGate};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

const BASE_URL: &str = "https://api.binance.com/api/v3/klines";

fn interval_code(interval: Interval) -> Result<&'static str, FeedError> {
    match interval.as_secs() {
        60 => Ok("1m"),
        180 => Ok("3m"),
        300 => Ok("5m"),
        900 => Ok("15m"),
        1800 => Ok("30m"),
        3600 => Ok("1h"),
        7200 => Ok("2h"),
        14400 => Ok("4h"),
        21600 => Ok("6h"),
        28800 => Ok("8h"),
        43200 => Ok("12h"),
        86400 => Ok("1d"),
        259200 => Ok("3d"),
        604800 => Ok("1w"),
        2592000 => Ok("1M"),
        _ => Err(FeedError::UnsupportedInterval(format!("{interval}"))),
    }
}

/// `BTCUSDT`: concatenated, uppercase, no separator.
fn symbol(market: &MarketSource) -> String {
    format!("{}{}", market.base, market.quote)
}

fn parse_row(row: &BinanceKlineRow) -> Result<Candlestick, FeedError> {
    if row.len() < 5 {
        return Err(FeedError::InvalidJsonResponse("kline row too short".into()));
    }
    let open_time_ms = row[0]
        .as_i64()
        .ok_or_else(|| FeedError::InvalidJsonResponse("missing open time".into()))?;
    let field = |i: usize| -> Result<&str, FeedError> {
        row[i]
            .as_str()
            .ok_or_else(|| FeedError::InvalidJsonResponse(format!("field {i} is not a string")))
    };
    Candlestick::try_new(
        open_time_ms / 1000,
        parse_price_str(field(1)?)?,
        parse_price_str(field(4)?)?,
        parse_price_str(field(3)?)?,
        parse_price_str(field(2)?)?,
    )
}

pub struct BinanceAdapter {
    http: HttpCandleClient,
    gate: RequestGate,
    debug: AtomicBool,
}

impl BinanceAdapter {
    pub fn new() -> Self {
        Self {
            http: HttpCandleClient::new(),
            gate: RequestGate::new(),
            debug: AtomicBool::new(false),
        }
    }
}

impl Default for BinanceAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExchangeAdapter for BinanceAdapter {
    async fn request(
        &self,
        market: &MarketSource,
        start: DateTime<Utc>,
        interval: Interval,
    ) -> Result<Vec<Candlestick>, FeedError> {
        let code = interval_code(interval)?;
        let _guard = self.gate.acquire().await;
        let start_ts = normalize(start, interval, false);

        let candles = candlefeed_exchanges_common::execute(
            || async {
                let raw: serde_json::Value = self
                    .http
                    .get_json(
                        BASE_URL,
                        &[
                            ("symbol", symbol(market)),
                            ("interval", code.to_string()),
                            ("startTime", (start_ts * 1000).to_string()),
                        ],
                    )
                    .await?;

                if let Ok(err) = serde_json::from_value::<BinanceErrorEnvelope>(raw.clone()) {
                    return Err(map_error(err));
                }

                let rows: Vec<BinanceKlineRow> = serde_json::from_value(raw)
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
        Provider::Binance
    }

    fn set_debug(&self, debug: bool) {
        self.debug.store(debug, Ordering::SeqCst);
    }
}

fn map_error(err: BinanceErrorEnvelope) -> FeedError {
    if err.code == -1121 {
        return FeedError::InvalidMarketPair;
    }
    FeedError::ExchangeError {
        code: Some(err.code),
        message: err.msg,
        retryable: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_concatenates_uppercase() {
        let market = MarketSource::new(Provider::Binance, "btc", "usdt");
        assert_eq!(symbol(&market), "BTCUSDT");
    }

    #[test]
    fn interval_code_rejects_unsupported() {
        assert!(interval_code(Interval::THREE_HOURS).is_err());
        assert_eq!(interval_code(Interval::ONE_MINUTE).unwrap(), "1m");
    }

    #[test]
    fn parse_row_reads_ohlc_in_kline_order() {
        let row: BinanceKlineRow = serde_json::from_str(
            r#"[1700000000000, "100.0", "110.0", "90.0", "105.0", "1234.5"]"#,
        )
        .unwrap();
        let candle = parse_row(&row).unwrap();
        assert_eq!(candle.timestamp_secs, 1_700_000_000);
        assert_eq!(candle.open.to_string(), "100.0");
        assert_eq!(candle.close.to_string(), "105.0");
    }

    #[test]
    fn map_error_translates_invalid_symbol_code() {
        let err = map_error(BinanceErrorEnvelope {
            code: -1121,
            msg: "Invalid symbol.".into(),
        });
        assert!(matches!(err, FeedError::InvalidMarketPair));
    }
}
