use candlefeed_core::error::FeedError;
use candlefeed_core::model::{Candlestick, Interval, MarketSource};
use candlefeed_core::time::normalize;
use candlefeed_exchanges_common::ExchangeAdapter;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::debug;

use crate::PageCache;

/// Options accepted by [`crate::MarketFacade::iterator`] (§4.6).
#[derive(Debug, Clone, Copy, Default)]
pub struct IteratorOptions {
    pub start_from_next: bool,
}

/// Lazy forward cursor over a market's candlesticks (§4.6).
///
/// Owned strictly by its caller: not `Sync`, and `next`/`set_start_from_next`
/// are the only ways to mutate it. Two iterators over the same market and
/// interval observe identical sequences modulo adapter calls made in between.
pub struct CandleIterator {
    adapter: Arc<dyn ExchangeAdapter>,
    cache: Arc<PageCache>,
    market: MarketSource,
    interval: Interval,
    /// `normalize(start, interval, false)`, kept so `set_start_from_next` can
    /// be applied or re-applied idempotently before the first `next` call.
    base_timestamp: i64,
    next_timestamp: i64,
    buffer: VecDeque<Candlestick>,
    started: bool,
}

impl CandleIterator {
    /// Exposed publicly so integration tests (and embedders wiring in their
    /// own adapter/cache instances) can build a cursor without going through
    /// [`crate::MarketFacade`]; the façade itself is the one sanctioned way
    /// to get a cursor against the registry of real exchange adapters.
    pub fn new(
        adapter: Arc<dyn ExchangeAdapter>,
        cache: Arc<PageCache>,
        market: MarketSource,
        start: DateTime<Utc>,
        interval: Interval,
        options: IteratorOptions,
    ) -> Self {
        let base_timestamp = normalize(start, interval, false);
        let next_timestamp = if options.start_from_next {
            base_timestamp + interval.as_secs()
        } else {
            base_timestamp
        };
        Self {
            adapter,
            cache,
            market,
            interval,
            base_timestamp,
            next_timestamp,
            buffer: VecDeque::new(),
            started: false,
        }
    }

    /// Legal only before the first call to `next`; advances the start by one
    /// additional interval. Returns `FeedError::IteratorAlreadyStarted` once
    /// iteration has begun — an addition beyond spec.md's silence on the
    /// violation case, consistent with §8's monotonic-advance invariant.
    pub fn set_start_from_next(&mut self, flag: bool) -> Result<(), FeedError> {
        if self.started {
            return Err(FeedError::IteratorAlreadyStarted);
        }
        self.next_timestamp = if flag {
            self.base_timestamp + self.interval.as_secs()
        } else {
            self.base_timestamp
        };
        Ok(())
    }

    pub fn next_timestamp(&self) -> i64 {
        self.next_timestamp
    }

    /// The four-step algorithm of spec.md §4.6: buffer hit, cache hit,
    /// adapter miss (gap-patched and cached), propagate adapter errors
    /// unchanged.
    pub async fn next(&mut self) -> Result<Candlestick, FeedError> {
        self.started = true;
        let market_name = self.market.canonical_name();

        loop {
            if let Some(front) = self.buffer.front() {
                if front.timestamp_secs == self.next_timestamp {
                    let candle = self.buffer.pop_front().expect("checked non-empty above");
                    self.next_timestamp += self.interval.as_secs();
                    return Ok(candle);
                }
                // Buffer is stale relative to our cursor (shouldn't normally
                // happen since we only ever fill it starting at our cursor),
                // drop it and re-fetch.
                self.buffer.clear();
            }

            match self.cache.get(&market_name, self.interval, self.as_instant()) {
                Ok(run) => {
                    debug!(market = %market_name, ts = self.next_timestamp, "cache hit");
                    self.buffer = run.into();
                    continue;
                }
                Err(FeedError::CacheMiss) => {
                    debug!(market = %market_name, ts = self.next_timestamp, "cache miss, querying adapter");
                    let page = self
                        .adapter
                        .request(&self.market, self.as_instant(), self.interval)
                        .await?;
                    self.cache.put(&market_name, self.interval, &page)?;
                    self.buffer = page.into();
                    continue;
                }
                Err(other) => return Err(other),
            }
        }
    }

    fn as_instant(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.next_timestamp, 0).expect("next_timestamp is a valid unix second count")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candlefeed_core::model::Provider;
    use candlefeed_exchanges_common::MockAdapter;
    use chrono::TimeZone;
    use rust_decimal::Decimal;
    use std::collections::HashMap;

    fn candle(ts: i64, v: i64) -> Candlestick {
        Candlestick::try_new(ts, Decimal::new(v, 0), Decimal::new(v, 0), Decimal::new(v, 0), Decimal::new(v, 0)).unwrap()
    }

    fn cache_1h() -> Arc<PageCache> {
        let mut sizes = HashMap::new();
        sizes.insert(Interval::ONE_HOUR, 1_000);
        Arc::new(PageCache::new(sizes))
    }

    fn market() -> MarketSource {
        MarketSource::new(Provider::Binance, "btc", "usdt")
    }

    #[tokio::test]
    async fn yields_candles_in_ascending_order_across_pages() {
        let base = 1_657_378_800i64; // 2022-07-09T15:00:00Z
        let page = vec![candle(base, 1), candle(base + 3600, 2), candle(base + 7200, 3)];
        let adapter: Arc<dyn ExchangeAdapter> =
            Arc::new(MockAdapter::new(Provider::Binance, vec![Ok(page)]));
        let cache = cache_1h();
        let start = Utc.timestamp_opt(base, 0).unwrap();
        let mut it = CandleIterator::new(adapter, cache, market(), start, Interval::ONE_HOUR, IteratorOptions::default());

        let c1 = it.next().await.unwrap();
        let c2 = it.next().await.unwrap();
        let c3 = it.next().await.unwrap();
        assert_eq!(
            vec![c1.timestamp_secs, c2.timestamp_secs, c3.timestamp_secs],
            vec![base, base + 3600, base + 7200]
        );
    }

    #[tokio::test]
    async fn second_iterator_observes_cache_populated_by_first() {
        let base = 3600i64;
        let page = vec![candle(base, 1), candle(base + 3600, 2)];
        let adapter: Arc<dyn ExchangeAdapter> =
            Arc::new(MockAdapter::new(Provider::Binance, vec![Ok(page)]));
        let cache = cache_1h();
        let start = Utc.timestamp_opt(base, 0).unwrap();

        let mut it1 = CandleIterator::new(
            adapter.clone(),
            cache.clone(),
            market(),
            start,
            Interval::ONE_HOUR,
            IteratorOptions::default(),
        );
        let _ = it1.next().await.unwrap();

        let mut it2 = CandleIterator::new(adapter, cache, market(), start, Interval::ONE_HOUR, IteratorOptions::default());
        let c = it2.next().await.unwrap();
        assert_eq!(c.timestamp_secs, base);
    }

    #[tokio::test]
    async fn set_start_from_next_before_first_call_advances_one_interval() {
        let base = 3600i64;
        let start = Utc.timestamp_opt(base, 0).unwrap();
        let adapter: Arc<dyn ExchangeAdapter> = Arc::new(MockAdapter::new(Provider::Binance, vec![]));
        let mut it = CandleIterator::new(adapter, cache_1h(), market(), start, Interval::ONE_HOUR, IteratorOptions::default());
        it.set_start_from_next(true).unwrap();
        assert_eq!(it.next_timestamp(), base + 3600);
    }

    #[tokio::test]
    async fn set_start_from_next_after_first_call_errors() {
        let base = 3600i64;
        let page = vec![candle(base, 1)];
        let start = Utc.timestamp_opt(base, 0).unwrap();
        let adapter: Arc<dyn ExchangeAdapter> = Arc::new(MockAdapter::new(Provider::Binance, vec![Ok(page)]));
        let mut it = CandleIterator::new(adapter, cache_1h(), market(), start, Interval::ONE_HOUR, IteratorOptions::default());
        let _ = it.next().await.unwrap();
        assert!(matches!(it.set_start_from_next(true), Err(FeedError::IteratorAlreadyStarted)));
    }

    #[tokio::test]
    async fn adapter_errors_propagate_unchanged() {
        let start = Utc.timestamp_opt(3600, 0).unwrap();
        let adapter: Arc<dyn ExchangeAdapter> =
            Arc::new(MockAdapter::new(Provider::Binance, vec![Err(FeedError::InvalidMarketPair)]));
        let mut it = CandleIterator::new(adapter, cache_1h(), market(), start, Interval::ONE_HOUR, IteratorOptions::default());
        assert!(matches!(it.next().await, Err(FeedError::InvalidMarketPair)));
    }
}
