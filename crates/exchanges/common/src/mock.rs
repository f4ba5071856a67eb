//! Test double for `ExchangeAdapter`, used by the facade crate's iterator
//! tests and by this crate's own retry/gap tests instead of hitting a real
//! exchange.
use crate::adapter::ExchangeAdapter;
use async_trait::async_trait;
use candlefeed_core::error::FeedError;
use candlefeed_core::model::{Candlestick, Interval, MarketSource, Provider};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Replays a fixed script of responses, one per call to `request`, cycling
/// back to the start once exhausted. Useful for driving retry/iterator
/// scenarios deterministically.
pub struct MockAdapter {
    provider: Provider,
    responses: Mutex<Vec<Result<Vec<Candlestick>, FeedError>>>,
    call_count: AtomicUsize,
    debug: AtomicBool,
}

impl MockAdapter {
    pub fn new(provider: Provider, responses: Vec<Result<Vec<Candlestick>, FeedError>>) -> Self {
        Self {
            provider,
            responses: Mutex::new(responses),
            call_count: AtomicUsize::new(0),
            debug: AtomicBool::new(false),
        }
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExchangeAdapter for MockAdapter {
    async fn request(
        &self,
        _market: &MarketSource,
        _start: DateTime<Utc>,
        _interval: Interval,
    ) -> Result<Vec<Candlestick>, FeedError> {
        let idx = self.call_count.fetch_add(1, Ordering::SeqCst);
        let responses = self.responses.lock().expect("mock lock poisoned");
        if responses.is_empty() {
            return Ok(Vec::new());
        }
        responses[idx % responses.len()].clone()
    }

    fn patience(&self) -> Duration {
        Duration::from_secs(0)
    }

    fn name(&self) -> Provider {
        self.provider
    }

    fn set_debug(&self, debug: bool) {
        self.debug.store(debug, Ordering::SeqCst);
    }
}
