use crate::types::BitgetEnvelope;
use async_trait::async_trait;
use candlefeed_core::error::FeedError;
use candlefeed_core::model::{Candlestick, Interval, MarketSource, Provider};
use candlefeed_core::price::parse_price_str;
use candlefeed_core::time::normalize;
use candlefeed_exchanges_common::{reject_invalid_page, ExchangeAdapter, HttpCandleClient, RequestGate};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

const BASE_URL: &str = "https://api.bitget.com/api/spot/v1/market/candles";

fn period_code(interval: Interval) -> Result<&'static str, FeedError> {
    match interval.as_secs() {
        60 => Ok("1min"),
        300 => Ok("5min"),
        900 => Ok("15min"),
        1800 => Ok("30min"),
        3600 => Ok("1h"),
        14400 => Ok("4h"),
        43200 => Ok("12h"),
        86400 => Ok("1day"),
        604800 => Ok("1week"),
        _ => Err(FeedError::UnsupportedInterval(format!("{interval}"))),
    }
}

/// `BTCUSDT_SPBL`: concatenated uppercase plus the spot-book-line suffix.
fn symbol(market: &MarketSource) -> String {
    format!("{}{}_SPBL", market.base, market.quote)
}

fn parse_row(row: &[String]) -> Result<Candlestick, FeedError> {
    if row.len() < 5 {
        return Err(FeedError::InvalidJsonResponse("candle row too short".into()));
    }
    let ts_ms: i64 = row[0]
        .parse()
        .map_err(|_| FeedError::InvalidJsonResponse("bad timestamp".into()))?;
    Candlestick::try_new(
        ts_ms / 1000,
        parse_price_str(&row[1])?,
        parse_price_str(&row[4])?,
        parse_price_str(&row[3])?,
        parse_price_str(&row[2])?,
    )
}

pub struct BitgetAdapter {
    http: HttpCandleClient,
    gate: RequestGate,
    debug: AtomicBool,
}

impl BitgetAdapter {
    pub fn new() -> Self {
        Self {
            http: HttpCandleClient::new(),
            gate: RequestGate::new(),
            debug: AtomicBool::new(false),
        }
    }
}

impl Default for BitgetAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExchangeAdapter for BitgetAdapter {
    async fn request(
        &self,
        market: &MarketSource,
        start: DateTime<Utc>,
        interval: Interval,
    ) -> Result<Vec<Candlestick>, FeedError> {
        let period = period_code(interval)?;
        let _guard = self.gate.acquire().await;
        let start_ts = normalize(start, interval, false);
        let end_ts = start_ts + interval.as_secs() * 100;

        let candles = candlefeed_exchanges_common::execute(
            || async {
                let envelope: BitgetEnvelope = self
                    .http
                    .get_json(
                        BASE_URL,
                        &[
                            ("symbol", symbol(market)),
                            ("period", period.to_string()),
                            ("after", (start_ts * 1000).to_string()),
                            ("before", (end_ts * 1000).to_string()),
                        ],
                    )
                    .await?;

                if envelope.code != "00000" {
                    if envelope.msg.to_lowercase().contains("symbol") {
                        return Err(FeedError::InvalidMarketPair);
                    }
                    return Err(FeedError::ExchangeError {
                        code: envelope.code.parse().ok(),
                        message: envelope.msg,
                        retryable: false,
                    });
                }

                let rows = envelope.data.unwrap_or_default();
                if rows.is_empty() {
                    return Err(FeedError::OutOfCandlesticks);
                }

                let mut candles: Vec<Candlestick> =
                    rows.iter().map(|r| parse_row(r)).collect::<Result<_, _>>()?;
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
        Provider::Bitget
    }

    fn set_debug(&self, debug: bool) {
        self.debug.store(debug, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_carries_spbl_suffix() {
        let market = MarketSource::new(Provider::Bitget, "btc", "usdt");
        assert_eq!(symbol(&market), "BTCUSDT_SPBL");
    }

    #[test]
    fn parse_row_maps_open_close_high_low_order() {
        let row = vec![
            "1700000000000".to_string(),
            "100".to_string(),
            "110".to_string(),
            "90".to_string(),
            "105".to_string(),
            "1234.5".to_string(),
            "5678.9".to_string(),
        ];
        let candle = parse_row(&row).unwrap();
        assert_eq!(candle.timestamp_secs, 1_700_000_000);
        assert_eq!(candle.close.to_string(), "105");
    }
}
