use crate::types::OkxEnvelope;
use async_trait::async_trait;
use candlefeed_core::error::FeedError;
use candlefeed_core::model::{Candlestick, Interval, MarketSource, Provider};
use candlefeed_core::price::parse_price_str;
use candlefeed_core::time::normalize;
use candlefeed_exchanges_common::{reject_invalid_page, ExchangeAdapter, HttpCandleClient, RequestGate};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

const BASE_URL: &str = "https://www.okx.com/api/v5/market/candles";

fn bar_code(interval: Interval) -> Result<&'static str, FeedError> {
    match interval.as_secs() {
        60 => Ok("1m"),
        180 => Ok("3m"),
        300 => Ok("5m"),
        900 => Ok("15m"),
        1800 => Ok("30m"),
        3600 => Ok("1H"),
        7200 => Ok("2H"),
        14400 => Ok("4H"),
        21600 => Ok("6H"),
        43200 => Ok("12H"),
        86400 => Ok("1D"),
        259200 => Ok("3D"),
        604800 => Ok("1W"),
        2592000 => Ok("1M"),
        _ => Err(FeedError::UnsupportedInterval(format!("{interval}"))),
    }
}

/// `BTC-USD`: hyphenated, uppercase.
fn inst_id(market: &MarketSource) -> String {
    format!("{}-{}", market.base, market.quote)
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

pub struct OkxAdapter {
    http: HttpCandleClient,
    gate: RequestGate,
    debug: AtomicBool,
}

impl OkxAdapter {
    pub fn new() -> Self {
        Self {
            http: HttpCandleClient::new(),
            gate: RequestGate::new(),
            debug: AtomicBool::new(false),
        }
    }
}

impl Default for OkxAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExchangeAdapter for OkxAdapter {
    async fn request(
        &self,
        market: &MarketSource,
        start: DateTime<Utc>,
        interval: Interval,
    ) -> Result<Vec<Candlestick>, FeedError> {
        let bar = bar_code(interval)?;
        let _guard = self.gate.acquire().await;
        let start_ts = normalize(start, interval, false);

        let candles = candlefeed_exchanges_common::execute(
            || async {
                let envelope: OkxEnvelope = self
                    .http
                    .get_json(
                        BASE_URL,
                        &[
                            ("instId", inst_id(market)),
                            ("bar", bar.to_string()),
                            ("before", (start_ts * 1000).to_string()),
                        ],
                    )
                    .await?;

                if envelope.code != "0" {
                    if envelope.msg.to_lowercase().contains("instrument") {
                        return Err(FeedError::InvalidMarketPair);
                    }
                    return Err(FeedError::ExchangeError {
                        code: envelope.code.parse().ok(),
                        message: envelope.msg,
                        retryable: false,
                    });
                }

                let rows = envelope.data.clone().unwrap_or_default();
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
        Provider::Okx
    }

    fn set_debug(&self, debug: bool) {
        self.debug.store(debug, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inst_id_is_hyphenated_uppercase() {
        let market = MarketSource::new(Provider::Okx, "btc", "usd");
        assert_eq!(inst_id(&market), "BTC-USD");
    }
}
