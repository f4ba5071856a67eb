use crate::types::{FtxCandle, FtxEnvelope};
use async_trait::async_trait;
use candlefeed_core::error::FeedError;
use candlefeed_core::model::{Candlestick, Interval, MarketSource, Provider};
use candlefeed_core::price::parse_price_f64;
use candlefeed_core::time::normalize;
use candlefeed_exchanges_common::{reject_invalid_page, ExchangeAdapter, HttpCandleClient, RequestGate};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

fn resolution_secs(interval: Interval) -> Result<i64, FeedError> {
    match interval.as_secs() {
        secs @ (15 | 60 | 300 | 900 | 3600 | 14400 | 86400) => Ok(secs),
        secs if secs % 86400 == 0 && secs / 86400 <= 30 => Ok(secs),
        _ => Err(FeedError::UnsupportedInterval(format!("{interval}"))),
    }
}

/// `BTC/USDT`: slash-separated, uppercase.
fn market_name(market: &MarketSource) -> String {
    format!("{}/{}", market.base, market.quote)
}

fn parse_candle(candle: FtxCandle) -> Result<Candlestick, FeedError> {
    Candlestick::try_new(
        candle.time / 1000,
        parse_price_f64(candle.open)?,
        parse_price_f64(candle.close)?,
        parse_price_f64(candle.low)?,
        parse_price_f64(candle.high)?,
    )
}

pub struct FtxAdapter {
    http: HttpCandleClient,
    gate: RequestGate,
    debug: AtomicBool,
}

impl FtxAdapter {
    pub fn new() -> Self {
        Self {
            http: HttpCandleClient::new(),
            gate: RequestGate::new(),
            debug: AtomicBool::new(false),
        }
    }
}

impl Default for FtxAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExchangeAdapter for FtxAdapter {
    async fn request(
        &self,
        market: &MarketSource,
        start: DateTime<Utc>,
        interval: Interval,
    ) -> Result<Vec<Candlestick>, FeedError> {
        let resolution = resolution_secs(interval)?;
        let _guard = self.gate.acquire().await;
        let start_ts = normalize(start, interval, false);

        let url = format!(
            "https://ftx.com/api/markets/{}/candles",
            market_name(market)
        );
        let candles = candlefeed_exchanges_common::execute(
            || async {
                let envelope: FtxEnvelope = self
                    .http
                    .get_json(
                        &url,
                        &[("resolution", resolution.to_string()), ("start_time", start_ts.to_string())],
                    )
                    .await?;

                if !envelope.success {
                    let message = envelope.error.clone().unwrap_or_default();
                    if message.to_lowercase().contains("no such market") {
                        return Err(FeedError::InvalidMarketPair);
                    }
                    return Err(FeedError::ExchangeError {
                        code: None,
                        message,
                        retryable: false,
                    });
                }

                let rows = envelope.result.clone().unwrap_or_default();
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
        Provider::Ftx
    }

    fn set_debug(&self, debug: bool) {
        self.debug.store(debug, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn market_name_is_slash_separated() {
        let market = MarketSource::new(Provider::Ftx, "btc", "usdt");
        assert_eq!(market_name(&market), "BTC/USDT");
    }

    #[test]
    fn resolution_rejects_unsupported() {
        assert!(resolution_secs(Interval::from_secs(7).unwrap()).is_err());
        assert_eq!(resolution_secs(Interval::ONE_MINUTE).unwrap(), 60);
    }
}
