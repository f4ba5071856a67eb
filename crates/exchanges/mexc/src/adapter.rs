use crate::types::{MexcErrorEnvelope, MexcKlineRow};
use async_trait::async_trait;
use candlefeed_core::error::FeedError;
use candlefeed_core::model::{Candlestick, Interval, MarketSource, Provider};
use candlefeed_core::price::parse_price_str;
use candlefeed_core::time::normalize;
use candlefeed_exchanges_common::{reject_invalid_page, ExchangeAdapter, HttpCandleClient, RequestGate};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

const BASE_URL: &str = "https://api.mexc.com/api/v3/klines";

fn interval_code(interval: Interval) -> Result<&'static str, FeedError> {
    match interval.as_secs() {
        60 => Ok("1m"),
        300 => Ok("5m"),
        900 => Ok("15m"),
        1800 => Ok("30m"),
        3600 => Ok("60m"),
        14400 => Ok("4h"),
        86400 => Ok("1d"),
        604800 => Ok("1W"),
        2592000 => Ok("1M"),
        _ => Err(FeedError::UnsupportedInterval(format!("{interval}"))),
    }
}

/// `BTCUSDT`: concatenated, uppercase, same convention as Binance.
fn symbol(market: &MarketSource) -> String {
    format!("{}{}", market.base, market.quote)
}

fn parse_row(row: &MexcKlineRow) -> Result<Candlestick, FeedError> {
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

pub struct MexcAdapter {
    http: HttpCandleClient,
    gate: RequestGate,
    debug: AtomicBool,
}

impl MexcAdapter {
    pub fn new() -> Self {
        Self {
            http: HttpCandleClient::new(),
            gate: RequestGate::new(),
            debug: AtomicBool::new(false),
        }
    }
}

impl Default for MexcAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExchangeAdapter for MexcAdapter {
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

                if let Ok(err) = serde_json::from_value::<MexcErrorEnvelope>(raw.clone()) {
                    if err.msg.to_lowercase().contains("symbol") {
                        return Err(FeedError::InvalidMarketPair);
                    }
                    return Err(FeedError::ExchangeError {
                        code: Some(err.code),
                        message: err.msg,
                        retryable: false,
                    });
                }

                let rows: Vec<MexcKlineRow> = serde_json::from_value(raw)
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
        Provider::Mexc
    }

    fn set_debug(&self, debug: bool) {
        self.debug.store(debug, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_concatenates_uppercase() {
        let market = MarketSource::new(Provider::Mexc, "btc", "usdt");
        assert_eq!(symbol(&market), "BTCUSDT");
    }
}
