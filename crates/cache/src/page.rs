use candlefeed_core::error::FeedError;
use candlefeed_core::model::{Candlestick, Interval};
use candlefeed_core::time::normalize;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Number of contiguous candles grouped into one cache entry (§3).
const BUCKET_SPAN: i64 = 500;

type BucketKey = (String, i64);

#[derive(Default)]
struct BucketEntry {
    offsets: HashMap<u16, Candlestick>,
}

/// One interval's LRU: buckets live in a `DashMap` so puts/gets against
/// different buckets (different markets, or far-apart bucket indices within
/// the same market) proceed concurrently through separate shards, the same
/// concurrency the teacher's own cache relies on for its tickers/orderbooks
/// maps. Touch-order and hit/miss counters are bookkeeping on top of that and
/// stay behind their own small lock.
struct IntervalLru {
    capacity: usize,
    buckets: DashMap<BucketKey, BucketEntry>,
    state: Mutex<LruState>,
}

#[derive(Default)]
struct LruState {
    /// Touch order, most-recently-used at the back.
    order: VecDeque<BucketKey>,
    hits: u64,
    misses: u64,
}

impl LruState {
    fn touch(&mut self, key: &BucketKey) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            self.order.remove(pos);
        }
        self.order.push_back(key.clone());
    }
}

impl IntervalLru {
    fn evict_if_over_capacity(&self, state: &mut LruState) {
        while self.buckets.len() > self.capacity {
            if let Some(oldest) = state.order.pop_front() {
                self.buckets.remove(&oldest);
            } else {
                break;
            }
        }
    }
}

fn bucket_offset(market: &str, ts: i64, interval_secs: i64) -> (BucketKey, u16) {
    let span_secs = BUCKET_SPAN * interval_secs;
    let bucket_index = ts.div_euclid(span_secs);
    let offset = ((ts - bucket_index * span_secs) / interval_secs) as u16;
    ((market.to_string(), bucket_index), offset)
}

/// Snapshot of hit/miss counters for one interval's LRU.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Per-interval LRU page cache keyed by `(market-canonical-name, bucket-index)`.
///
/// Each entry holds up to 500 contiguous candles. Concurrent puts/gets on the
/// same interval serialize through that interval's own lock; different
/// intervals are fully independent (§4.5, §5).
pub struct PageCache {
    intervals: HashMap<i64, Arc<IntervalLru>>,
}

impl PageCache {
    /// `sizes` maps each supported interval to its LRU's bucket capacity. A
    /// zero or negative configured size is coerced to 1. Intervals absent
    /// from `sizes` respond to `put`/`get` with `NotConfiguredForInterval`.
    pub fn new(sizes: HashMap<Interval, i64>) -> Self {
        let intervals = sizes
            .into_iter()
            .map(|(interval, size)| {
                let capacity = if size <= 0 { 1 } else { size as usize };
                (
                    interval.as_secs(),
                    Arc::new(IntervalLru {
                        capacity,
                        buckets: DashMap::new(),
                        state: Mutex::new(LruState::default()),
                    }),
                )
            })
            .collect();
        Self { intervals }
    }

    fn lru_for(&self, interval: Interval) -> Result<&Arc<IntervalLru>, FeedError> {
        self.intervals
            .get(&interval.as_secs())
            .ok_or(FeedError::NotConfiguredForInterval)
    }

    /// Insert a contiguous, ascending, equal-interval run of candles for
    /// `market`. A put may span multiple buckets; each receives its slice.
    /// Pre-existing offsets in an overlapping bucket are overwritten.
    pub fn put(
        &self,
        market: &str,
        interval: Interval,
        candles: &[Candlestick],
    ) -> Result<(), FeedError> {
        let lru = self.lru_for(interval)?;
        if candles.is_empty() {
            return Ok(());
        }
        let secs = interval.as_secs();
        for c in candles {
            if c.open.is_zero() || c.close.is_zero() || c.low.is_zero() || c.high.is_zero() {
                return Err(FeedError::ReceivedZeroValue);
            }
            if c.timestamp_secs % secs != 0 {
                return Err(FeedError::NotMultiple);
            }
        }
        for pair in candles.windows(2) {
            if pair[1].timestamp_secs - pair[0].timestamp_secs != secs {
                return Err(FeedError::NonSubsequent);
            }
        }

        let mut state = lru.state.lock().expect("cache lock poisoned");
        for candle in candles {
            let (key, offset) = bucket_offset(market, candle.timestamp_secs, secs);
            lru.buckets
                .entry(key.clone())
                .or_default()
                .offsets
                .insert(offset, *candle);
            state.touch(&key);
        }
        lru.evict_if_over_capacity(&mut state);
        debug!(market, interval = secs, count = candles.len(), "cached candle page");
        Ok(())
    }

    /// Look up the longest contiguous prefix of candles starting at the
    /// interval boundary covering `instant`. Returns `CacheMiss` if that
    /// bucket has never been populated. Subsequent buckets are not
    /// coalesced: callers issuing large ranges must call `get` repeatedly.
    pub fn get(
        &self,
        market: &str,
        interval: Interval,
        instant: DateTime<Utc>,
    ) -> Result<Vec<Candlestick>, FeedError> {
        let lru = self.lru_for(interval)?;
        let ts = normalize(instant, interval, false);
        let (key, offset) = bucket_offset(market, ts, interval.as_secs());

        let Some(entry) = lru.buckets.get(&key) else {
            lru.state.lock().expect("cache lock poisoned").misses += 1;
            return Err(FeedError::CacheMiss);
        };
        if !entry.offsets.contains_key(&offset) {
            drop(entry);
            lru.state.lock().expect("cache lock poisoned").misses += 1;
            return Err(FeedError::CacheMiss);
        }

        let mut result = Vec::new();
        let mut cursor = offset;
        loop {
            match entry.offsets.get(&cursor) {
                Some(candle) => {
                    result.push(*candle);
                    if cursor as i64 + 1 >= BUCKET_SPAN {
                        break;
                    }
                    cursor += 1;
                }
                None => break,
            }
        }
        drop(entry);

        let mut state = lru.state.lock().expect("cache lock poisoned");
        state.hits += 1;
        state.touch(&key);
        Ok(result)
    }

    /// Hit/miss snapshot for one interval, without resetting the counters.
    pub fn stats(&self, interval: Interval) -> Result<CacheStats, FeedError> {
        let lru = self.lru_for(interval)?;
        let state = lru.state.lock().expect("cache lock poisoned");
        Ok(CacheStats {
            hits: state.hits,
            misses: state.misses,
        })
    }

    /// Aggregate hit ratio across every configured interval.
    pub fn hit_ratio(&self) -> f64 {
        let mut hits = 0u64;
        let mut misses = 0u64;
        for lru in self.intervals.values() {
            let state = lru.state.lock().expect("cache lock poisoned");
            hits += state.hits;
            misses += state.misses;
        }
        CacheStats { hits, misses }.hit_ratio()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal::Decimal;

    fn candle(ts: i64, v: i64) -> Candlestick {
        Candlestick::try_new(
            ts,
            Decimal::new(v, 0),
            Decimal::new(v, 0),
            Decimal::new(v, 0),
            Decimal::new(v, 0),
        )
        .unwrap()
    }

    fn dt(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn cache_with_1m() -> PageCache {
        let mut sizes = HashMap::new();
        sizes.insert(Interval::ONE_MINUTE, 10_000);
        PageCache::new(sizes)
    }

    #[test]
    fn put_then_get_round_trips() {
        let cache = cache_with_1m();
        let base = 3 * 3600 + 4 * 60; // 03:04:00
        let candles = vec![candle(base, 100), candle(base + 60, 101)];
        cache.put("m", Interval::ONE_MINUTE, &candles).unwrap();

        let got = cache.get("m", Interval::ONE_MINUTE, dt(base)).unwrap();
        assert_eq!(got, candles);
    }

    #[test]
    fn miss_then_fill_scenario_from_spec() {
        // Two puts at buckets [03:04,03:05] and [03:07,03:08], 1m interval.
        let cache = cache_with_1m();
        let h0304 = 3 * 3600 + 4 * 60;
        let h0305 = h0304 + 60;
        let h0307 = h0304 + 3 * 60;
        let h0308 = h0307 + 60;

        cache
            .put("m", Interval::ONE_MINUTE, &[candle(h0304, 1), candle(h0305, 2)])
            .unwrap();
        cache
            .put("m", Interval::ONE_MINUTE, &[candle(h0307, 3), candle(h0308, 4)])
            .unwrap();

        let got = cache.get("m", Interval::ONE_MINUTE, dt(h0304)).unwrap();
        assert_eq!(got.iter().map(|c| c.timestamp_secs).collect::<Vec<_>>(), vec![h0304, h0305]);

        let miss = cache.get("m", Interval::ONE_MINUTE, dt(h0304 + 2 * 60));
        assert!(matches!(miss, Err(FeedError::CacheMiss)));

        let got2 = cache.get("m", Interval::ONE_MINUTE, dt(h0307)).unwrap();
        assert_eq!(got2.iter().map(|c| c.timestamp_secs).collect::<Vec<_>>(), vec![h0307, h0308]);
    }

    #[test]
    fn not_configured_interval_errors() {
        let cache = cache_with_1m();
        let err = cache.get("m", Interval::ONE_HOUR, dt(0));
        assert!(matches!(err, Err(FeedError::NotConfiguredForInterval)));
    }

    #[test]
    fn zero_size_coerced_to_one() {
        let mut sizes = HashMap::new();
        sizes.insert(Interval::ONE_MINUTE, 0);
        let cache = PageCache::new(sizes);
        assert_eq!(cache.intervals[&60].capacity, 1);
    }

    #[test]
    fn put_rejects_non_subsequent() {
        let cache = cache_with_1m();
        let candles = vec![candle(0, 1), candle(180, 2)];
        assert!(matches!(
            cache.put("m", Interval::ONE_MINUTE, &candles),
            Err(FeedError::NonSubsequent)
        ));
    }

    #[test]
    fn put_rejects_unaligned_timestamp() {
        let cache = cache_with_1m();
        let candles = vec![candle(5, 1)];
        assert!(matches!(
            cache.put("m", Interval::ONE_MINUTE, &candles),
            Err(FeedError::NotMultiple)
        ));
    }

    #[test]
    fn lru_evicts_oldest_bucket_over_capacity() {
        let mut sizes = HashMap::new();
        sizes.insert(Interval::ONE_MINUTE, 1);
        let cache = PageCache::new(sizes);

        let bucket_span = BUCKET_SPAN * 60;
        cache.put("m", Interval::ONE_MINUTE, &[candle(0, 1)]).unwrap();
        cache
            .put("m", Interval::ONE_MINUTE, &[candle(bucket_span, 2)])
            .unwrap();

        // First bucket evicted once the second (different bucket) is inserted.
        assert!(matches!(
            cache.get("m", Interval::ONE_MINUTE, dt(0)),
            Err(FeedError::CacheMiss)
        ));
        assert!(cache.get("m", Interval::ONE_MINUTE, dt(bucket_span)).is_ok());
    }
}
