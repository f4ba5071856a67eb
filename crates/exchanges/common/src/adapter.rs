use async_trait::async_trait;
use candlefeed_core::error::FeedError;
use candlefeed_core::model::{Candlestick, Interval, MarketSource, Provider};
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Common interface implemented by every per-exchange candle adapter (§4.4).
///
/// Implementations are expected to serialize their own in-flight requests
/// (one outstanding request per adapter instance, see [`crate::http::RequestGate`])
/// and to translate exchange-specific error envelopes into [`FeedError`]
/// rather than letting transport errors leak through unmapped.
#[async_trait]
pub trait ExchangeAdapter: Send + Sync {
    /// Fetch candles for `market` starting at `start`, at the given `interval`.
    /// The returned page is not required to be gap-free or length-bounded by
    /// the caller; adapters return whatever the upstream REST call yields.
    async fn request(
        &self,
        market: &MarketSource,
        start: DateTime<Utc>,
        interval: Interval,
    ) -> Result<Vec<Candlestick>, FeedError>;

    /// How long callers should wait for a response before treating the
    /// adapter as stalled. Distinct per-exchange because upstream rate
    /// limiters and response times vary widely.
    fn patience(&self) -> Duration;

    /// The provider this adapter speaks for.
    fn name(&self) -> Provider;

    /// Toggle verbose per-request logging.
    fn set_debug(&self, debug: bool);
}
