use crate::types::{UpbitCandle, UpbitErrorEnvelope};
use async_trait::async_trait;
use candlefeed_core::error::FeedError;
use candlefeed_core::model::{Candlestick, Interval, MarketSource, Provider};
use candlefeed_core::price::parse_price_f64;
use candlefeed_core::time::normalize;
use candlefeed_exchanges_common::{reject_invalid_page, ExchangeAdapter, HttpCandleClient, RequestGate};
use chrono::{DateTime, TimeZone, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Upbit's seconds-granularity candles are retained for roughly 3 months;
/// requests further back than that for minute-or-finer candles are guarded
/// rather than silently returning an empty page.
const MINUTE_RETENTION_SECS: i64 = 90 * 24 * 3600;

fn endpoint(interval: Interval) -> Result<String, FeedError> {
    let path = match interval.as_secs() {
        60 => "minutes/1",
        180 => "minutes/3",
        300 => "minutes/5",
        900 => "minutes/15",
        1800 => "minutes/30",
        3600 => "minutes/60",
        14400 => "minutes/240",
        86400 => "days",
        604800 => "weeks",
        2592000 => "months",
        _ => return Err(FeedError::UnsupportedInterval(format!("{interval}"))),
    };
    Ok(format!("https://api.upbit.com/v1/candles/{path}"))
}

/// `KRW-BTC`: quote first, then base, opposite of most peers' convention.
fn market_code(market: &MarketSource) -> String {
    format!("{}-{}", market.quote, market.base)
}

fn parse_candle(candle: UpbitCandle) -> Result<Candlestick, FeedError> {
    Candlestick::try_new(
        candle.timestamp / 1000,
        parse_price_f64(candle.opening_price)?,
        parse_price_f64(candle.trade_price)?,
        parse_price_f64(candle.low_price)?,
        parse_price_f64(candle.high_price)?,
    )
}

pub struct UpbitAdapter {
    http: HttpCandleClient,
    gate: RequestGate,
    debug: AtomicBool,
}

impl UpbitAdapter {
    pub fn new() -> Self {
        Self {
            http: HttpCandleClient::new(),
            gate: RequestGate::new(),
            debug: AtomicBool::new(false),
        }
    }
}

impl Default for UpbitAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExchangeAdapter for UpbitAdapter {
    async fn request(
        &self,
        market: &MarketSource,
        start: DateTime<Utc>,
        interval: Interval,
    ) -> Result<Vec<Candlestick>, FeedError> {
        let url = endpoint(interval)?;
        let _guard = self.gate.acquire().await;
        let start_ts = normalize(start, interval, false);

        if interval.as_secs() < 3600 && (Utc::now().timestamp() - start_ts) > MINUTE_RETENTION_SECS {
            return Err(FeedError::DataTooFarBack);
        }

        let to = Utc
            .timestamp_opt(start_ts, 0)
            .single()
            .ok_or_else(|| FeedError::InvalidIso8601("start timestamp out of range".into()))?
            .to_rfc3339();

        let candles = candlefeed_exchanges_common::execute(
            || async {
                let raw: serde_json::Value = self
                    .http
                    .get_json(&url, &[("market", market_code(market)), ("to", to.clone())])
                    .await?;

                if raw.is_object() {
                    let envelope: UpbitErrorEnvelope = serde_json::from_value(raw)
                        .map_err(|e| FeedError::InvalidJsonResponse(e.to_string()))?;
                    if envelope.error.name.contains("market") {
                        return Err(FeedError::InvalidMarketPair);
                    }
                    return Err(FeedError::ExchangeError {
                        code: None,
                        message: envelope.error.message,
                        retryable: false,
                    });
                }

                let rows: Vec<UpbitCandle> = serde_json::from_value(raw)
                    .map_err(|e| FeedError::InvalidJsonResponse(e.to_string()))?;
                if rows.is_empty() {
                    return Err(FeedError::OutOfCandlesticks);
                }

                let mut candles: Vec<Candlestick> =
                    rows.into_iter().map(parse_candle).collect::<Result<_, _>>()?;
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
        Provider::Upbit
    }

    fn set_debug(&self, debug: bool) {
        self.debug.store(debug, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn market_code_is_quote_then_base() {
        let market = MarketSource::new(Provider::Upbit, "btc", "krw");
        assert_eq!(market_code(&market), "KRW-BTC");
    }
}
