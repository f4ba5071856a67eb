use candlefeed_core::error::FeedError;
use candlefeed_core::model::Candlestick;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::sync::Mutex;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Thin wrapper around `reqwest::Client`, shared by every per-provider
/// adapter crate so none of them repeat the timeout/error-mapping dance.
pub struct HttpCandleClient {
    client: Client,
}

impl HttpCandleClient {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("reqwest client builds with a fixed, valid config");
        Self { client }
    }

    /// GET `url` with `query`, enforcing the 10s timeout and mapping
    /// transport/HTTP-layer failures before the caller ever inspects a body.
    /// A non-2xx response carrying `Retry-After` becomes `FeedError::RateLimit`
    /// immediately; other non-2xx responses are read and returned as
    /// `BrokenBodyResponse` for the caller to inspect as an error envelope.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, FeedError> {
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| FeedError::ExecutingRequest(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(FeedError::RateLimit { retry_after });
        }

        let body = response
            .text()
            .await
            .map_err(|e| FeedError::BrokenBodyResponse(e.to_string()))?;

        if !status.is_success() {
            return Err(FeedError::BrokenBodyResponse(format!(
                "http {status}: {body}"
            )));
        }

        serde_json::from_str(&body).map_err(|e| FeedError::InvalidJsonResponse(e.to_string()))
    }
}

impl Default for HttpCandleClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared zero-price / OHLC-invariant page validator every adapter calls
/// before gap-patching (§4.4 "Reject pages …").
pub fn reject_invalid_page(candles: &[Candlestick]) -> Result<(), FeedError> {
    for c in candles {
        if c.open.is_zero() || c.close.is_zero() || c.low.is_zero() || c.high.is_zero() {
            return Err(FeedError::received_zero_value());
        }
        if c.low > c.open || c.open > c.high || c.low > c.close || c.close > c.high || c.low > c.high {
            return Err(FeedError::invalid_ohlc(c.timestamp_secs));
        }
    }
    Ok(())
}

/// Gives adapters the serialize-in-arrival-order guarantee of §4.4/§5
/// without every provider crate repeating the lock dance: hold the guard for
/// the duration of one `request` call.
#[derive(Default)]
pub struct RequestGate {
    lock: Mutex<()>,
}

impl RequestGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.lock.lock().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn candle(v: i64) -> Candlestick {
        Candlestick::try_new(0, Decimal::new(v, 0), Decimal::new(v, 0), Decimal::new(v, 0), Decimal::new(v, 0)).unwrap()
    }

    #[test]
    fn reject_invalid_page_accepts_well_formed_candles() {
        assert!(reject_invalid_page(&[candle(10)]).is_ok());
    }

    #[tokio::test]
    async fn request_gate_serializes_access() {
        let gate = RequestGate::new();
        let _guard = gate.acquire().await;
        drop(_guard);
        let _guard2 = gate.acquire().await;
    }
}
