use std::time::Duration;
use thiserror::Error;

/// Per-error metadata every `FeedError` variant exposes, so the retry engine
/// and façade can inspect one shape regardless of which category fired.
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorMeta {
    pub retryable: bool,
    pub exchange_side: bool,
    pub retry_after: Option<Duration>,
    pub provider_code: Option<i64>,
}

/// The closed error taxonomy of the feed. Widening it is a semver break.
#[derive(Debug, Error, Clone)]
pub enum FeedError {
    #[error("interval not supported by this adapter: {0}")]
    UnsupportedInterval(String),

    #[error("provider not in registry: {0}")]
    UnsupportedProvider(String),

    #[error("only coin-pair market types are supported")]
    InvalidMarketType,

    #[error("exchange reports the market pair does not exist")]
    InvalidMarketPair,

    #[error("exchange rate limit hit{}", retry_after_suffix(.retry_after))]
    RateLimit { retry_after: Option<Duration> },

    #[error("transport failure executing request: {0}")]
    ExecutingRequest(String),

    #[error("response body could not be fully read: {0}")]
    BrokenBodyResponse(String),

    #[error("response body did not parse as the expected envelope: {0}")]
    InvalidJsonResponse(String),

    #[error("response contained zero candlesticks where at least one was expected")]
    OutOfCandlesticks,

    #[error("requested start is further back than the exchange retains data")]
    DataTooFarBack,

    /// Internal flow-control signal used by the cache/iterator boundary.
    /// Never surfaced through a public API — see `FeedError::is_internal_only`.
    #[error("cache miss")]
    CacheMiss,

    #[error("cache has no LRU configured for this interval")]
    NotConfiguredForInterval,

    #[error("ill-formed ISO-8601 datetime: {0}")]
    InvalidIso8601(String),

    #[error("producer supplied a zero price")]
    ReceivedZeroValue,

    #[error("producer supplied candles that are not strictly ascending and equally spaced")]
    NonSubsequent,

    #[error("producer supplied a timestamp that is not a multiple of the interval")]
    NotMultiple,

    #[error("candle at {0} violates the OHLC invariants")]
    InvalidOhlc(i64),

    #[error("exchange returned a provider-specific error (code {code:?}): {message}")]
    ExchangeError {
        code: Option<i64>,
        message: String,
        retryable: bool,
    },

    /// Not part of spec.md's closed taxonomy: a façade-level addition guarding
    /// the documented precondition on `set-start-from-next` ("legal before
    /// the first `next()` call").
    #[error("set_start_from_next called after iteration has already begun")]
    IteratorAlreadyStarted,
}

fn retry_after_suffix(retry_after: &Option<Duration>) -> String {
    match retry_after {
        Some(d) => format!(" (retry after {:?})", d),
        None => String::new(),
    }
}

impl FeedError {
    pub fn received_zero_value() -> Self {
        FeedError::ReceivedZeroValue
    }

    pub fn invalid_ohlc(timestamp_secs: i64) -> Self {
        FeedError::InvalidOhlc(timestamp_secs)
    }

    pub fn rate_limit(retry_after: Option<Duration>) -> Self {
        FeedError::RateLimit { retry_after }
    }

    /// `true` for `CacheMiss`: an internal flow-control signal that must never
    /// be returned from a public API call (spec propagation policy, §7).
    pub fn is_internal_only(&self) -> bool {
        matches!(self, FeedError::CacheMiss)
    }

    pub fn meta(&self) -> ErrorMeta {
        match self {
            FeedError::UnsupportedInterval(_) => ErrorMeta::default(),
            FeedError::UnsupportedProvider(_) => ErrorMeta::default(),
            FeedError::InvalidMarketType => ErrorMeta::default(),
            FeedError::InvalidMarketPair => ErrorMeta {
                exchange_side: true,
                ..Default::default()
            },
            FeedError::RateLimit { retry_after } => ErrorMeta {
                retryable: true,
                exchange_side: true,
                retry_after: *retry_after,
                ..Default::default()
            },
            FeedError::ExecutingRequest(_) => ErrorMeta {
                retryable: true,
                ..Default::default()
            },
            FeedError::BrokenBodyResponse(_) => ErrorMeta {
                retryable: true,
                ..Default::default()
            },
            FeedError::InvalidJsonResponse(_) => ErrorMeta {
                retryable: true,
                exchange_side: true,
                ..Default::default()
            },
            FeedError::OutOfCandlesticks => ErrorMeta {
                retryable: true,
                exchange_side: true,
                ..Default::default()
            },
            FeedError::DataTooFarBack => ErrorMeta::default(),
            FeedError::CacheMiss => ErrorMeta::default(),
            FeedError::NotConfiguredForInterval => ErrorMeta::default(),
            FeedError::InvalidIso8601(_) => ErrorMeta::default(),
            FeedError::ReceivedZeroValue => ErrorMeta::default(),
            FeedError::NonSubsequent => ErrorMeta::default(),
            FeedError::NotMultiple => ErrorMeta::default(),
            FeedError::InvalidOhlc(_) => ErrorMeta::default(),
            FeedError::ExchangeError {
                code, retryable, ..
            } => ErrorMeta {
                retryable: *retryable,
                exchange_side: true,
                provider_code: *code,
                ..Default::default()
            },
            FeedError::IteratorAlreadyStarted => ErrorMeta::default(),
        }
    }

    pub fn retryable(&self) -> bool {
        self.meta().retryable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_miss_is_internal_only() {
        assert!(FeedError::CacheMiss.is_internal_only());
        assert!(!FeedError::InvalidMarketPair.is_internal_only());
    }

    #[test]
    fn rate_limit_carries_retry_after() {
        let err = FeedError::rate_limit(Some(Duration::from_secs(5)));
        assert!(err.retryable());
        assert_eq!(err.meta().retry_after, Some(Duration::from_secs(5)));
    }

    #[test]
    fn unsupported_interval_is_not_retryable() {
        let err = FeedError::UnsupportedInterval("2M".into());
        assert!(!err.retryable());
    }
}
