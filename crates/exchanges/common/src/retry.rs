use candlefeed_core::error::FeedError;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

const DEFAULT_ATTEMPTS: u32 = 3;
const DEFAULT_FIRST_SLEEP: Duration = Duration::from_secs(1);
const DEFAULT_MULTIPLIER: f64 = 2.0;

/// `(attempts, first-sleep, sleep-multiplier)`, each defaultable by passing
/// zero (§4.3). No jitter is added here; a caller wanting jitter wraps `fn`
/// itself.
#[derive(Debug, Clone, Copy)]
pub struct RetryStrategy {
    pub attempts: u32,
    pub first_sleep: Duration,
    pub sleep_multiplier: f64,
}

impl RetryStrategy {
    pub fn new(attempts: u32, first_sleep: Duration, sleep_multiplier: f64) -> Self {
        Self {
            attempts: if attempts == 0 { DEFAULT_ATTEMPTS } else { attempts },
            first_sleep: if first_sleep.is_zero() { DEFAULT_FIRST_SLEEP } else { first_sleep },
            sleep_multiplier: if sleep_multiplier == 0.0 { DEFAULT_MULTIPLIER } else { sleep_multiplier },
        }
    }
}

impl Default for RetryStrategy {
    fn default() -> Self {
        Self::new(0, Duration::ZERO, 0.0)
    }
}

/// Run `f` up to `strategy.attempts` times. A non-retryable error stops
/// immediately. A `retry_after` on the error overrides exactly one sleep
/// cycle (the running sleep is not itself multiplied by that override). The
/// last attempt never sleeps.
pub async fn execute<F, Fut, T>(mut f: F, strategy: RetryStrategy) -> Result<T, FeedError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, FeedError>>,
{
    let mut sleep_for = strategy.first_sleep;

    for attempt in 1..=strategy.attempts {
        match f().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                let meta = err.meta();
                if !meta.retryable {
                    return Err(err);
                }
                if attempt >= strategy.attempts {
                    debug!(attempt, "retry attempts exhausted");
                    return Err(err);
                }

                let this_cycle = match meta.retry_after {
                    Some(over) if !over.is_zero() => over,
                    _ => sleep_for,
                };
                debug!(attempt, sleep_ms = this_cycle.as_millis() as u64, "retrying after failure");
                sleep(this_cycle).await;

                sleep_for = multiply_duration(sleep_for, strategy.sleep_multiplier);
            }
        }
    }
    unreachable!("loop always returns on last attempt")
}

fn multiply_duration(d: Duration, multiplier: f64) -> Duration {
    let nanos = (d.as_nanos() as f64 * multiplier).round();
    Duration::from_nanos(nanos.max(0.0) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::time::Duration;

    fn strategy(attempts: u32, first_sleep_ms: u64, multiplier: f64) -> RetryStrategy {
        RetryStrategy::new(attempts, Duration::from_millis(first_sleep_ms), multiplier)
    }

    #[test]
    fn zero_fields_replaced_by_defaults() {
        let s = RetryStrategy::new(0, Duration::ZERO, 0.0);
        assert_eq!(s.attempts, DEFAULT_ATTEMPTS);
        assert_eq!(s.first_sleep, DEFAULT_FIRST_SLEEP);
        assert_eq!(s.sleep_multiplier, DEFAULT_MULTIPLIER);
    }

    #[tokio::test]
    async fn succeeds_without_retry() {
        let calls = Cell::new(0);
        let result = execute(
            || {
                calls.set(calls.get() + 1);
                async { Ok::<_, FeedError>(42) }
            },
            strategy(3, 1, 2.0),
        )
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test]
    async fn retries_retryable_error_until_success() {
        let calls = Cell::new(0);
        let result = execute(
            || {
                let n = calls.get() + 1;
                calls.set(n);
                async move {
                    if n < 3 {
                        Err(FeedError::InvalidJsonResponse("boom".into()))
                    } else {
                        Ok(n)
                    }
                }
            },
            strategy(5, 1, 2.0),
        )
        .await;
        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn non_retryable_error_stops_immediately() {
        let calls = Cell::new(0);
        let result: Result<i32, FeedError> = execute(
            || {
                calls.set(calls.get() + 1);
                async { Err(FeedError::InvalidMarketPair) }
            },
            strategy(5, 1, 2.0),
        )
        .await;
        assert!(result.is_err());
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test]
    async fn exhausts_all_attempts_and_surfaces_last_error() {
        let calls = Cell::new(0);
        let result: Result<i32, FeedError> = execute(
            || {
                calls.set(calls.get() + 1);
                async { Err(FeedError::InvalidJsonResponse("always".into())) }
            },
            strategy(3, 1, 2.0),
        )
        .await;
        assert!(result.is_err());
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn retry_after_overrides_single_cycle() {
        let calls = Cell::new(0);
        let result: Result<i32, FeedError> = execute(
            || {
                let n = calls.get() + 1;
                calls.set(n);
                async move {
                    if n == 1 {
                        Err(FeedError::RateLimit {
                            retry_after: Some(Duration::from_millis(5)),
                        })
                    } else {
                        Ok(n)
                    }
                }
            },
            strategy(3, 1000, 2.0),
        )
        .await;
        assert_eq!(result.unwrap(), 2);
    }
}
