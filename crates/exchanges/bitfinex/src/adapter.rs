use crate::types::BitfinexCandleRow;
use async_trait::async_trait;
use candlefeed_core::error::FeedError;
use candlefeed_core::model::{Candlestick, Interval, MarketSource, Provider};
use candlefeed_core::price::parse_price_f64;
use candlefeed_core::time::normalize;
use candlefeed_exchanges_common::{reject_invalid_page, ExchangeAdapter, HttpCandleClient, RequestGate};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

fn interval_code(interval: Interval) -> Result<&'static str, FeedError> {
    match interval.as_secs() {
        60 => Ok("1m"),
        300 => Ok("5m"),
        900 => Ok("15m"),
        1800 => Ok("30m"),
        3600 => Ok("1h"),
        10800 => Ok("3h"),
        21600 => Ok("6h"),
        43200 => Ok("12h"),
        86400 => Ok("1D"),
        604800 => Ok("1W"),
        1209600 => Ok("14D"),
        2592000 => Ok("1M"),
        _ => Err(FeedError::UnsupportedInterval(format!("{interval}"))),
    }
}

/// `tBTCUSD`: a leading `t` then concatenated uppercase base/quote.
fn symbol(market: &MarketSource) -> String {
    format!("t{}{}", market.base, market.quote)
}

fn parse_row(row: &BitfinexCandleRow) -> Result<Candlestick, FeedError> {
    if row.len() < 5 {
        return Err(FeedError::InvalidJsonResponse("candle row too short".into()));
    }
    let num = |i: usize| -> Result<f64, FeedError> {
        row[i]
            .as_f64()
            .ok_or_else(|| FeedError::InvalidJsonResponse(format!("field {i} is not numeric")))
    };
    let mts = row[0]
        .as_i64()
        .ok_or_else(|| FeedError::InvalidJsonResponse("missing mts".into()))?;
    // [MTS, OPEN, CLOSE, HIGH, LOW, VOLUME]
    Candlestick::try_new(
        mts / 1000,
        parse_price_f64(num(1)?)?,
        parse_price_f64(num(2)?)?,
        parse_price_f64(num(4)?)?,
        parse_price_f64(num(3)?)?,
    )
}

pub struct BitfinexAdapter {
    http: HttpCandleClient,
    gate: RequestGate,
    debug: AtomicBool,
}

impl BitfinexAdapter {
    pub fn new() -> Self {
        Self {
            http: HttpCandleClient::new(),
            gate: RequestGate::new(),
            debug: AtomicBool::new(false),
        }
    }
}

impl Default for BitfinexAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExchangeAdapter for BitfinexAdapter {
    async fn request(
        &self,
        market: &MarketSource,
        start: DateTime<Utc>,
        interval: Interval,
    ) -> Result<Vec<Candlestick>, FeedError> {
        let code = interval_code(interval)?;
        let _guard = self.gate.acquire().await;
        let start_ts = normalize(start, interval, false);
        let url = format!(
            "https://api-pub.bitfinex.com/v2/candles/trade:{}:{}/hist",
            code,
            symbol(market)
        );

        let candles = candlefeed_exchanges_common::execute(
            || async {
                let raw: serde_json::Value = self
                    .http
                    .get_json(
                        &url,
                        &[("start", (start_ts * 1000).to_string()), ("sort", "1".to_string())],
                    )
                    .await?;

                if let Some(arr) = raw.as_array() {
                    if arr.first().and_then(|v| v.as_str()) == Some("error") {
                        let code = arr.get(1).and_then(|v| v.as_i64());
                        let message = arr.get(2).and_then(|v| v.as_str()).unwrap_or("").to_string();
                        return Err(FeedError::ExchangeError {
                            code,
                            message,
                            retryable: false,
                        });
                    }
                    if arr.is_empty() {
                        return Err(FeedError::InvalidMarketPair);
                    }
                }

                let rows: Vec<BitfinexCandleRow> = serde_json::from_value(raw)
                    .map_err(|e| FeedError::InvalidJsonResponse(e.to_string()))?;
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
        Provider::Bitfinex
    }

    fn set_debug(&self, debug: bool) {
        self.debug.store(debug, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_has_leading_t() {
        let market = MarketSource::new(Provider::Bitfinex, "btc", "usd");
        assert_eq!(symbol(&market), "tBTCUSD");
    }

    #[test]
    fn parse_row_maps_open_close_high_low_order() {
        let row: BitfinexCandleRow =
            serde_json::from_str(r#"[1700000000000, 100.0, 105.0, 110.0, 90.0, 1234.5]"#).unwrap();
        let candle = parse_row(&row).unwrap();
        assert_eq!(candle.timestamp_secs, 1_700_000_000);
        assert_eq!(candle.open.to_string(), "100");
        assert_eq!(candle.close.to_string(), "105");
        assert_eq!(candle.high.to_string(), "110");
        assert_eq!(candle.low.to_string(), "90");
    }
}
