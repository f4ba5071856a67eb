use crate::types::KucoinEnvelope;
use async_trait::async_trait;
use candlefeed_core::error::FeedError;
use candlefeed_core::model::{Candlestick, Interval, MarketSource, Provider};
use candlefeed_core::price::parse_price_str;
use candlefeed_core::time::normalize;
use candlefeed_exchanges_common::{reject_invalid_page, ExchangeAdapter, HttpCandleClient, RequestGate};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

const BASE_URL: &str = "https://api.kucoin.com/api/v1/market/candles";

fn interval_code(interval: Interval) -> Result<&'static str, FeedError> {
    match interval.as_secs() {
        60 => Ok("1min"),
        180 => Ok("3min"),
        300 => Ok("5min"),
        900 => Ok("15min"),
        1800 => Ok("30min"),
        3600 => Ok("1hour"),
        7200 => Ok("2hour"),
        14400 => Ok("4hour"),
        21600 => Ok("6hour"),
        28800 => Ok("8hour"),
        43200 => Ok("12hour"),
        86400 => Ok("1day"),
        604800 => Ok("1week"),
        _ => Err(FeedError::UnsupportedInterval(format!("{interval}"))),
    }
}

/// `BTC-USDT`: hyphenated, uppercase, following Coinbase's convention.
fn symbol(market: &MarketSource) -> String {
    format!("{}-{}", market.base, market.quote)
}

fn parse_row(row: &[String]) -> Result<Candlestick, FeedError> {
    if row.len() < 5 {
        return Err(FeedError::InvalidJsonResponse("candle row too short".into()));
    }
    let ts: i64 = row[0]
        .parse()
        .map_err(|_| FeedError::InvalidJsonResponse("bad timestamp".into()))?;
    // [time, open, close, high, low, volume, turnover]
    Candlestick::try_new(
        ts,
        parse_price_str(&row[1])?,
        parse_price_str(&row[2])?,
        parse_price_str(&row[4])?,
        parse_price_str(&row[3])?,
    )
}

pub struct KucoinAdapter {
    http: HttpCandleClient,
    gate: RequestGate,
    debug: AtomicBool,
}

impl KucoinAdapter {
    pub fn new() -> Self {
        Self {
            http: HttpCandleClient::new(),
            gate: RequestGate::new(),
            debug: AtomicBool::new(false),
        }
    }
}

impl Default for KucoinAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExchangeAdapter for KucoinAdapter {
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
                let envelope: KucoinEnvelope = self
                    .http
                    .get_json(
                        BASE_URL,
                        &[
                            ("symbol", symbol(market)),
                            ("type", code.to_string()),
                            ("startAt", start_ts.to_string()),
                        ],
                    )
                    .await?;

                if envelope.code != "200000" {
                    let msg = envelope.msg.clone().unwrap_or_default();
                    if msg.to_lowercase().contains("symbol") {
                        return Err(FeedError::InvalidMarketPair);
                    }
                    return Err(FeedError::ExchangeError {
                        code: envelope.code.parse().ok(),
                        message: msg,
                        retryable: false,
                    });
                }

                let rows = envelope.data.clone().unwrap_or_default();
                if rows.is_empty() {
                    return Err(FeedError::OutOfCandlesticks);
                }

                let candles: Vec<Candlestick> = rows.iter().map(|r| parse_row(r)).collect::<Result<_, _>>()?;
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
        Provider::Kucoin
    }

    fn set_debug(&self, debug: bool) {
        self.debug.store(debug, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_is_hyphenated_uppercase() {
        let market = MarketSource::new(Provider::Kucoin, "btc", "usdt");
        assert_eq!(symbol(&market), "BTC-USDT");
    }

    #[test]
    fn parse_row_maps_open_close_high_low_order() {
        let row = vec![
            "1700000000".to_string(),
            "100".to_string(),
            "105".to_string(),
            "110".to_string(),
            "90".to_string(),
            "1234.5".to_string(),
        ];
        let candle = parse_row(&row).unwrap();
        assert_eq!(candle.timestamp_secs, 1_700_000_000);
        assert_eq!(candle.high.to_string(), "110");
        assert_eq!(candle.low.to_string(), "90");
    }
}
