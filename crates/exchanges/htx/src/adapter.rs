use crate::types::{HtxCandle, HtxEnvelope};
use async_trait::async_trait;
use candlefeed_core::error::FeedError;
use candlefeed_core::model::{Candlestick, Interval, MarketSource, Provider};
use candlefeed_core::time::normalize;
use candlefeed_exchanges_common::{reject_invalid_page, ExchangeAdapter, HttpCandleClient, NumericField, RequestGate};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

const BASE_URL: &str = "https://api.huobi.pro/market/history/kline";

fn period_code(interval: Interval) -> Result<&'static str, FeedError> {
    match interval.as_secs() {
        60 => Ok("1min"),
        300 => Ok("5min"),
        900 => Ok("15min"),
        1800 => Ok("30min"),
        3600 => Ok("60min"),
        14400 => Ok("4hour"),
        86400 => Ok("1day"),
        604800 => Ok("1week"),
        2592000 => Ok("1mon"),
        _ => Err(FeedError::UnsupportedInterval(format!("{interval}"))),
    }
}

/// `btcusdt`: concatenated, lowercase, no separator.
fn symbol(market: &MarketSource) -> String {
    format!("{}{}", market.base.to_lowercase(), market.quote.to_lowercase())
}

fn id_secs(field: &NumericField) -> Result<i64, FeedError> {
    match field {
        NumericField::Number(v) => Ok(*v as i64),
        NumericField::Text(s) => s
            .parse()
            .map_err(|_| FeedError::InvalidJsonResponse("bad candle id".into())),
    }
}

fn parse_candle(candle: HtxCandle) -> Result<Candlestick, FeedError> {
    let ts = id_secs(&candle.id)?;
    Candlestick::try_new(
        ts,
        candle.open.into_decimal()?,
        candle.close.into_decimal()?,
        candle.low.into_decimal()?,
        candle.high.into_decimal()?,
    )
}

pub struct HtxAdapter {
    http: HttpCandleClient,
    gate: RequestGate,
    debug: AtomicBool,
}

impl HtxAdapter {
    pub fn new() -> Self {
        Self {
            http: HttpCandleClient::new(),
            gate: RequestGate::new(),
            debug: AtomicBool::new(false),
        }
    }
}

impl Default for HtxAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExchangeAdapter for HtxAdapter {
    async fn request(
        &self,
        market: &MarketSource,
        start: DateTime<Utc>,
        interval: Interval,
    ) -> Result<Vec<Candlestick>, FeedError> {
        let period = period_code(interval)?;
        let _guard = self.gate.acquire().await;
        let start_ts = normalize(start, interval, false);

        let candles = candlefeed_exchanges_common::execute(
            || async {
                let envelope: HtxEnvelope = self
                    .http
                    .get_json(
                        BASE_URL,
                        &[
                            ("symbol", symbol(market)),
                            ("period", period.to_string()),
                            ("from", start_ts.to_string()),
                        ],
                    )
                    .await?;

                if envelope.status != "ok" {
                    let msg = envelope.err_msg.unwrap_or_default();
                    if envelope.err_code.as_deref() == Some("invalid-parameter") && msg.contains("symbol") {
                        return Err(FeedError::InvalidMarketPair);
                    }
                    return Err(FeedError::ExchangeError {
                        code: None,
                        message: msg,
                        retryable: false,
                    });
                }

                let rows = envelope.data.unwrap_or_default();
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
        Provider::Htx
    }

    fn set_debug(&self, debug: bool) {
        self.debug.store(debug, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_is_lowercase_concatenated() {
        let market = MarketSource::new(Provider::Htx, "btc", "usdt");
        assert_eq!(symbol(&market), "btcusdt");
    }

    #[test]
    fn id_secs_accepts_string_or_number() {
        assert_eq!(id_secs(&NumericField::Number(1700000000.0)).unwrap(), 1_700_000_000);
        assert_eq!(id_secs(&NumericField::Text("1700000000".into())).unwrap(), 1_700_000_000);
    }
}
