use candlefeed::{FacadeOptions, IteratorOptions, MarketFacade, MarketSource};
use candlefeed_core::error::FeedError;
use candlefeed_core::model::{Interval, Provider};
use chrono::Utc;

#[test]
fn unsupported_provider_string_is_rejected_before_reaching_the_facade() {
    let parsed = "not-a-real-exchange".parse::<Provider>();
    assert!(matches!(parsed, Err(FeedError::UnsupportedProvider(_))));
}

#[test]
fn facade_builds_an_iterator_for_every_registered_provider() {
    let facade = MarketFacade::new(FacadeOptions::default());
    for provider in Provider::ALL {
        let market = MarketSource::new(provider, "btc", "usdt");
        let result = facade.iterator(market, Utc::now(), Interval::ONE_HOUR, IteratorOptions::default());
        assert!(result.is_ok(), "provider {provider} should build an iterator");
    }
}

#[test]
fn calculate_cache_hit_ratio_starts_at_zero_with_no_traffic() {
    let facade = MarketFacade::new(FacadeOptions::default());
    assert_eq!(facade.calculate_cache_hit_ratio(), 0.0);
}

#[test]
fn set_debug_broadcasts_without_panicking() {
    let facade = MarketFacade::new(FacadeOptions::default());
    facade.set_debug(true);
    facade.set_debug(false);
}
