use crate::types::{CoinbaseCandleRow, CoinbaseErrorEnvelope};
use async_trait::async_trait;
use candlefeed_core::error::FeedError;
use candlefeed_core::model::{Candlestick, Interval, MarketSource, Provider};
use candlefeed_core::price::parse_price_f64;
use candlefeed_core::time::normalize;
use candlefeed_exchanges_common::{reject_invalid_page, ExchangeAdapter, HttpCandleClient, RequestGate};
use chrono::{DateTime, TimeZone, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

const MAX_CANDLES_PER_CALL: i64 = 300;

fn granularity_secs(interval: Interval) -> Result<i64, FeedError> {
    match interval.as_secs() {
        secs @ (60 | 300 | 900 | 3600 | 21600 | 86400) => Ok(secs),
        _ => Err(FeedError::UnsupportedInterval(format!("{interval}"))),
    }
}

/// `BTC-USD`: hyphenated, uppercase.
fn product_id(market: &MarketSource) -> String {
    format!("{}-{}", market.base, market.quote)
}

fn parse_row(row: &CoinbaseCandleRow) -> Result<Candlestick, FeedError> {
    if row.len() < 6 {
        return Err(FeedError::InvalidJsonResponse("candle row too short".into()));
    }
    let num = |i: usize| -> Result<f64, FeedError> {
        row[i]
            .as_f64()
            .ok_or_else(|| FeedError::InvalidJsonResponse(format!("field {i} is not numeric")))
    };
    let ts = row[0]
        .as_i64()
        .ok_or_else(|| FeedError::InvalidJsonResponse("missing time".into()))?;
    // [time, low, high, open, close, volume]
    Candlestick::try_new(
        ts,
        parse_price_f64(num(3)?)?,
        parse_price_f64(num(4)?)?,
        parse_price_f64(num(1)?)?,
        parse_price_f64(num(2)?)?,
    )
}

pub struct CoinbaseAdapter {
    http: HttpCandleClient,
    gate: RequestGate,
    debug: AtomicBool,
}

impl CoinbaseAdapter {
    pub fn new() -> Self {
        Self {
            http: HttpCandleClient::new(),
            gate: RequestGate::new(),
            debug: AtomicBool::new(false),
        }
    }
}

impl Default for CoinbaseAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExchangeAdapter for CoinbaseAdapter {
    async fn request(
        &self,
        market: &MarketSource,
        start: DateTime<Utc>,
        interval: Interval,
    ) -> Result<Vec<Candlestick>, FeedError> {
        let granularity = granularity_secs(interval)?;
        let _guard = self.gate.acquire().await;
        let start_ts = normalize(start, interval, false);
        let end_ts = start_ts + granularity * MAX_CANDLES_PER_CALL;
        let start_iso = Utc.timestamp_opt(start_ts, 0).single().unwrap().to_rfc3339();
        let end_iso = Utc.timestamp_opt(end_ts, 0).single().unwrap().to_rfc3339();

        let url = format!(
            "https://api.exchange.coinbase.com/products/{}/candles",
            product_id(market)
        );

        let candles = candlefeed_exchanges_common::execute(
            || async {
                let raw: serde_json::Value = self
                    .http
                    .get_json(
                        &url,
                        &[
                            ("granularity", granularity.to_string()),
                            ("start", start_iso.clone()),
                            ("end", end_iso.clone()),
                        ],
                    )
                    .await?;

                if raw.is_object() {
                    let envelope: CoinbaseErrorEnvelope = serde_json::from_value(raw)
                        .map_err(|e| FeedError::InvalidJsonResponse(e.to_string()))?;
                    if envelope.message == "NotFound" {
                        return Err(FeedError::InvalidMarketPair);
                    }
                    return Err(FeedError::ExchangeError {
                        code: None,
                        message: envelope.message,
                        retryable: false,
                    });
                }

                let rows: Vec<CoinbaseCandleRow> = serde_json::from_value(raw)
                    .map_err(|e| FeedError::InvalidJsonResponse(e.to_string()))?;
                if rows.is_empty() {
                    return Err(FeedError::OutOfCandlesticks);
                }

                let mut candles: Vec<Candlestick> = rows.iter().map(parse_row).collect::<Result<_, _>>()?;
                candles.reverse();
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
        Provider::Coinbase
    }

    fn set_debug(&self, debug: bool) {
        self.debug.store(debug, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn product_id_is_hyphenated_uppercase() {
        let market = MarketSource::new(Provider::Coinbase, "btc", "usd");
        assert_eq!(product_id(&market), "BTC-USD");
    }

    #[test]
    fn parse_row_maps_low_high_open_close_order() {
        let row: CoinbaseCandleRow =
            serde_json::from_str(r#"[1700000000, 90.0, 110.0, 100.0, 105.0, 1234.5]"#).unwrap();
        let candle = parse_row(&row).unwrap();
        assert_eq!(candle.timestamp_secs, 1_700_000_000);
        assert_eq!(candle.open.to_string(), "100");
        assert_eq!(candle.close.to_string(), "105");
        assert_eq!(candle.low.to_string(), "90");
        assert_eq!(candle.high.to_string(), "110");
    }
}
