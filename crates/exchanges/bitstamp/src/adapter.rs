use crate::types::{BitstampCandle, BitstampEnvelope};
use async_trait::async_trait;
use candlefeed_core::error::FeedError;
use candlefeed_core::model::{Candlestick, Interval, MarketSource, Provider};
use candlefeed_core::time::normalize;
use candlefeed_exchanges_common::{reject_invalid_page, ExchangeAdapter, HttpCandleClient, NumericField, RequestGate};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

fn step_secs(interval: Interval) -> Result<i64, FeedError> {
    match interval.as_secs() {
        secs @ (60 | 180 | 300 | 900 | 1800 | 3600 | 7200 | 14400 | 21600 | 43200 | 86400 | 259200) => Ok(secs),
        _ => Err(FeedError::UnsupportedInterval(format!("{interval}"))),
    }
}

/// `btcusd`: concatenated, lowercase, no separator.
fn pair(market: &MarketSource) -> String {
    format!("{}{}", market.base.to_lowercase(), market.quote.to_lowercase())
}

fn timestamp_secs(field: &NumericField) -> Result<i64, FeedError> {
    match field {
        NumericField::Number(v) => Ok(*v as i64),
        NumericField::Text(s) => s
            .parse()
            .map_err(|_| FeedError::InvalidJsonResponse("bad timestamp".into())),
    }
}

fn parse_candle(candle: BitstampCandle) -> Result<Candlestick, FeedError> {
    let ts = timestamp_secs(&candle.timestamp)?;
    Candlestick::try_new(
        ts,
        candle.open.into_decimal()?,
        candle.close.into_decimal()?,
        candle.low.into_decimal()?,
        candle.high.into_decimal()?,
    )
}

pub struct BitstampAdapter {
    http: HttpCandleClient,
    gate: RequestGate,
    debug: AtomicBool,
}

impl BitstampAdapter {
    pub fn new() -> Self {
        Self {
            http: HttpCandleClient::new(),
            gate: RequestGate::new(),
            debug: AtomicBool::new(false),
        }
    }
}

impl Default for BitstampAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExchangeAdapter for BitstampAdapter {
    async fn request(
        &self,
        market: &MarketSource,
        start: DateTime<Utc>,
        interval: Interval,
    ) -> Result<Vec<Candlestick>, FeedError> {
        let step = step_secs(interval)?;
        let _guard = self.gate.acquire().await;
        let start_ts = normalize(start, interval, false);

        let url = format!("https://www.bitstamp.net/api/v2/ohlc/{}/", pair(market));
        let candles = candlefeed_exchanges_common::execute(
            || async {
                let envelope: BitstampEnvelope = self
                    .http
                    .get_json(&url, &[("step", step.to_string()), ("start", start_ts.to_string())])
                    .await?;

                if envelope.data.is_none() {
                    if let Some(reason) = envelope.reason {
                        let text = reason.to_string();
                        if text.to_lowercase().contains("not found") {
                            return Err(FeedError::InvalidMarketPair);
                        }
                        return Err(FeedError::ExchangeError {
                            code: None,
                            message: text,
                            retryable: false,
                        });
                    }
                    return Err(FeedError::InvalidJsonResponse("missing data field".into()));
                }

                let rows = envelope.data.unwrap().ohlc;
                if rows.is_empty() {
                    return Err(FeedError::OutOfCandlesticks);
                }

                let candles: Vec<Candlestick> =
                    rows.into_iter().map(parse_candle).collect::<Result<_, _>>()?;
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
        Provider::Bitstamp
    }

    fn set_debug(&self, debug: bool) {
        self.debug.store(debug, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_is_lowercase_concatenated() {
        let market = MarketSource::new(Provider::Bitstamp, "btc", "usd");
        assert_eq!(pair(&market), "btcusd");
    }

    #[test]
    fn timestamp_secs_accepts_string_or_number() {
        assert_eq!(timestamp_secs(&NumericField::Number(1700000000.0)).unwrap(), 1_700_000_000);
        assert_eq!(
            timestamp_secs(&NumericField::Text("1700000000".into())).unwrap(),
            1_700_000_000
        );
    }
}
