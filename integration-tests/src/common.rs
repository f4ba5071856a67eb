//! Shared helpers for cross-crate tests: build a [`CandleIterator`] wired to a
//! [`MockAdapter`] and a fresh [`PageCache`], without going through
//! [`candlefeed::MarketFacade`] (which only registers real exchange adapters).
use candlefeed::{CandleIterator, IteratorOptions, MarketSource, PageCache};
use candlefeed_core::model::{Interval, Provider};
use candlefeed_exchanges_common::MockAdapter;
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;

pub fn candle(ts: i64, value: i64) -> candlefeed::Candlestick {
    candlefeed_core::model::Candlestick::try_new(
        ts,
        Decimal::new(value, 0),
        Decimal::new(value, 0),
        Decimal::new(value, 0),
        Decimal::new(value, 0),
    )
    .unwrap()
}

pub fn dt(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

pub fn market(provider: Provider) -> MarketSource {
    MarketSource::new(provider, "btc", "usdt")
}

/// Builds an iterator over a fresh cache configured only for `interval`,
/// backed by a `MockAdapter` that replays `responses` (cycling once
/// exhausted).
pub fn iterator_with_responses(
    interval: Interval,
    start: DateTime<Utc>,
    responses: Vec<Result<Vec<candlefeed::Candlestick>, candlefeed::FeedError>>,
) -> (CandleIterator, Arc<MockAdapter>) {
    let adapter = Arc::new(MockAdapter::new(Provider::Binance, responses));
    let mut sizes = HashMap::new();
    sizes.insert(interval, 10_000);
    let cache = Arc::new(PageCache::new(sizes));
    let iterator = CandleIterator::new(
        adapter.clone(),
        cache,
        market(Provider::Binance),
        start,
        interval,
        IteratorOptions::default(),
    );
    (iterator, adapter)
}
