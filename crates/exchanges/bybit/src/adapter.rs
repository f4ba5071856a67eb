use crate::types::BybitKlineResponse;
use async_trait::async_trait;
use candlefeed_core::error::FeedError;
use candlefeed_core::model::{Candlestick, Interval, MarketSource, Provider};
use candlefeed_core::price::parse_price_str;
use candlefeed_core::time::normalize;
use candlefeed_exchanges_common::{reject_invalid_page, ExchangeAdapter, HttpCandleClient, RequestGate};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

const BASE_URL: &str = "https://api.bybit.com/v5/market/kline";

fn interval_code(interval: Interval) -> Result<&'static str, FeedError> {
    match interval.as_secs() {
        60 => Ok("1"),
        180 => Ok("3"),
        300 => Ok("5"),
        900 => Ok("15"),
        1800 => Ok("30"),
        3600 => Ok("60"),
        7200 => Ok("120"),
        14400 => Ok("240"),
        21600 => Ok("360"),
        43200 => Ok("720"),
        86400 => Ok("D"),
        604800 => Ok("W"),
        2592000 => Ok("M"),
        _ => Err(FeedError::UnsupportedInterval(format!("{interval}"))),
    }
}

/// `BTCUSDT`: concatenated, uppercase, no separator, spot category.
fn symbol(market: &MarketSource) -> String {
    format!("{}{}", market.base, market.quote)
}

fn parse_row(row: &[String]) -> Result<Candlestick, FeedError> {
    if row.len() < 5 {
        return Err(FeedError::InvalidJsonResponse("kline row too short".into()));
    }
    let start_ms: i64 = row[0]
        .parse()
        .map_err(|_| FeedError::InvalidJsonResponse("bad start timestamp".into()))?;
    Candlestick::try_new(
        start_ms / 1000,
        parse_price_str(&row[1])?,
        parse_price_str(&row[4])?,
        parse_price_str(&row[3])?,
        parse_price_str(&row[2])?,
    )
}

pub struct BybitAdapter {
    http: HttpCandleClient,
    gate: RequestGate,
    debug: AtomicBool,
}

impl BybitAdapter {
    pub fn new() -> Self {
        Self {
            http: HttpCandleClient::new(),
            gate: RequestGate::new(),
            debug: AtomicBool::new(false),
        }
    }
}

impl Default for BybitAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExchangeAdapter for BybitAdapter {
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
                let payload: BybitKlineResponse = self
                    .http
                    .get_json(
                        BASE_URL,
                        &[
                            ("category", "spot".to_string()),
                            ("symbol", symbol(market)),
                            ("interval", code.to_string()),
                            ("start", (start_ts * 1000).to_string()),
                        ],
                    )
                    .await?;

                if payload.ret_code != 0 {
                    return Err(map_error(payload.ret_code, payload.ret_msg));
                }
                let rows = payload.result.map(|r| r.list).unwrap_or_default();
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
        Provider::Bybit
    }

    fn set_debug(&self, debug: bool) {
        self.debug.store(debug, Ordering::SeqCst);
    }
}

fn map_error(code: i64, msg: String) -> FeedError {
    if msg.to_lowercase().contains("not supported symbols") || msg.to_lowercase().contains("invalid symbol") {
        return FeedError::InvalidMarketPair;
    }
    FeedError::ExchangeError {
        code: Some(code),
        message: msg,
        retryable: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_concatenates_uppercase() {
        let market = MarketSource::new(Provider::Bybit, "btc", "usdt");
        assert_eq!(symbol(&market), "BTCUSDT");
    }

    #[test]
    fn parse_row_reads_ohlc_in_kline_order() {
        let row = vec![
            "1700000000000".to_string(),
            "100.0".to_string(),
            "110.0".to_string(),
            "90.0".to_string(),
            "105.0".to_string(),
            "1234.5".to_string(),
        ];
        let candle = parse_row(&row).unwrap();
        assert_eq!(candle.timestamp_secs, 1_700_000_000);
        assert_eq!(candle.close.to_string(), "105.0");
    }
}
