use candlefeed_core::model::Interval;
use candlefeed_integration_tests::common::{candle, dt, iterator_with_responses};

#[tokio::test]
async fn iterator_advances_monotonically_across_adapter_pages() {
    let base = 1_657_378_800i64; // 2022-07-09T15:00:00Z
    let page_one = vec![candle(base, 1), candle(base + 3600, 2)];
    let page_two = vec![candle(base + 7200, 3), candle(base + 10800, 4)];
    let (mut it, adapter) =
        iterator_with_responses(Interval::ONE_HOUR, dt(base), vec![Ok(page_one), Ok(page_two)]);

    let mut timestamps = Vec::new();
    for _ in 0..4 {
        timestamps.push(it.next().await.unwrap().timestamp_secs);
    }
    assert_eq!(timestamps, vec![base, base + 3600, base + 7200, base + 10800]);
    // Second page only fetched once the first is exhausted from the buffer/cache.
    assert_eq!(adapter.call_count(), 2);
}

#[tokio::test]
async fn a_candle_once_emitted_is_never_emitted_again() {
    let base = 0i64;
    let page = vec![candle(base, 1), candle(base + 60, 2), candle(base + 120, 3)];
    let (mut it, _adapter) = iterator_with_responses(Interval::ONE_MINUTE, dt(base), vec![Ok(page)]);

    let mut seen = Vec::new();
    for _ in 0..3 {
        seen.push(it.next().await.unwrap().timestamp_secs);
    }
    assert_eq!(seen, vec![0, 60, 120]);
    assert_eq!(seen.len(), seen.iter().collect::<std::collections::HashSet<_>>().len());
}

#[tokio::test]
async fn start_from_next_shifts_first_emitted_candle() {
    let base = 3600i64;
    let page = vec![candle(base + 3600, 1), candle(base + 7200, 2)];
    let (mut it, _adapter) = iterator_with_responses(Interval::ONE_HOUR, dt(base), vec![Ok(page)]);
    it.set_start_from_next(true).unwrap();

    let first = it.next().await.unwrap();
    assert_eq!(first.timestamp_secs, base + 3600);
}

#[tokio::test]
async fn non_retryable_adapter_error_propagates_to_caller() {
    let (mut it, _adapter) = iterator_with_responses(
        Interval::ONE_HOUR,
        dt(3600),
        vec![Err(candlefeed_core::error::FeedError::InvalidMarketPair)],
    );
    let err = it.next().await.unwrap_err();
    assert!(matches!(err, candlefeed_core::error::FeedError::InvalidMarketPair));
}
