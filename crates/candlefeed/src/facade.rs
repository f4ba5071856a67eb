use candlefeed_core::error::FeedError;
use candlefeed_core::model::{Interval, MarketSource, MarketType, Provider};
use candlefeed_exchanges_common::ExchangeAdapter;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use crate::iterator::{CandleIterator, IteratorOptions};
use crate::PageCache;

/// Options accepted by [`MarketFacade::new`] (§4.7).
#[derive(Debug, Clone)]
pub struct FacadeOptions {
    /// Per-interval bucket counts for the shared page cache.
    pub cache_sizes: HashMap<Interval, i64>,
    pub debug: bool,
}

impl Default for FacadeOptions {
    fn default() -> Self {
        let mut cache_sizes = HashMap::new();
        cache_sizes.insert(Interval::ONE_MINUTE, 10_000);
        cache_sizes.insert(Interval::ONE_HOUR, 1_000);
        cache_sizes.insert(Interval::ONE_DAY, 1_000);
        Self {
            cache_sizes,
            debug: false,
        }
    }
}

/// Registry of one instance of each supported adapter, plus the cache shared
/// by every iterator it builds (§4.7).
pub struct MarketFacade {
    adapters: HashMap<Provider, Arc<dyn ExchangeAdapter>>,
    cache: Arc<PageCache>,
}

impl MarketFacade {
    pub fn new(options: FacadeOptions) -> Self {
        let mut adapters: HashMap<Provider, Arc<dyn ExchangeAdapter>> = HashMap::new();
        adapters.insert(Provider::Binance, Arc::new(candlefeed_binance::BinanceAdapter::new()));
        adapters.insert(
            Provider::BinanceUsdMFutures,
            Arc::new(candlefeed_binance_usdm_futures::BinanceUsdMFuturesAdapter::new()),
        );
        adapters.insert(Provider::Bitfinex, Arc::new(candlefeed_bitfinex::BitfinexAdapter::new()));
        adapters.insert(Provider::Bitget, Arc::new(candlefeed_bitget::BitgetAdapter::new()));
        adapters.insert(Provider::Bitstamp, Arc::new(candlefeed_bitstamp::BitstampAdapter::new()));
        adapters.insert(Provider::Bybit, Arc::new(candlefeed_bybit::BybitAdapter::new()));
        adapters.insert(Provider::Coinbase, Arc::new(candlefeed_coinbase::CoinbaseAdapter::new()));
        adapters.insert(Provider::Ftx, Arc::new(candlefeed_ftx::FtxAdapter::new()));
        adapters.insert(Provider::Gate, Arc::new(candlefeed_gate::GateAdapter::new()));
        adapters.insert(Provider::Htx, Arc::new(candlefeed_htx::HtxAdapter::new()));
        adapters.insert(Provider::Kucoin, Arc::new(candlefeed_kucoin::KucoinAdapter::new()));
        adapters.insert(Provider::Mexc, Arc::new(candlefeed_mexc::MexcAdapter::new()));
        adapters.insert(Provider::Okx, Arc::new(candlefeed_okx::OkxAdapter::new()));
        adapters.insert(Provider::Upbit, Arc::new(candlefeed_upbit::UpbitAdapter::new()));

        for adapter in adapters.values() {
            adapter.set_debug(options.debug);
        }

        Self {
            adapters,
            cache: Arc::new(PageCache::new(options.cache_sizes)),
        }
    }

    /// Validates `market.type == coin-pair` and `market.provider` against the
    /// registry, then builds an iterator starting at `start`/`interval`.
    pub fn iterator(
        &self,
        market: MarketSource,
        start: DateTime<Utc>,
        interval: Interval,
        options: IteratorOptions,
    ) -> Result<CandleIterator, FeedError> {
        if market.market_type != MarketType::CoinPair {
            return Err(FeedError::InvalidMarketType);
        }
        let adapter = self
            .adapters
            .get(&market.provider)
            .ok_or_else(|| FeedError::UnsupportedProvider(market.provider.to_string()))?
            .clone();
        Ok(CandleIterator::new(adapter, self.cache.clone(), market, start, interval, options))
    }

    /// Broadcasts the debug flag to every registered adapter.
    pub fn set_debug(&self, debug: bool) {
        for adapter in self.adapters.values() {
            adapter.set_debug(debug);
        }
    }

    /// Logs the current aggregate cache hit ratio without resetting counters.
    pub fn calculate_cache_hit_ratio(&self) -> f64 {
        let ratio = self.cache.hit_ratio();
        info!(hit_ratio = ratio, "cache hit ratio");
        ratio
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unsupported_provider_string_before_building_market_source() {
        let err: Result<Provider, _> = "not-a-real-exchange".parse();
        assert!(matches!(err, Err(FeedError::UnsupportedProvider(_))));
    }

    #[test]
    fn facade_registers_all_fourteen_providers() {
        let facade = MarketFacade::new(FacadeOptions::default());
        for provider in Provider::ALL {
            assert!(facade.adapters.contains_key(&provider), "missing adapter for {provider}");
        }
    }

    #[test]
    fn iterator_rejects_invalid_market_type_is_unreachable_via_public_api() {
        // MarketType is a closed enum with a single member constructed only
        // via MarketSource::new, so InvalidMarketType can only be hit by the
        // FromStr parser (core::model tests) — documented here for clarity.
        assert_eq!(MarketType::CoinPair.as_str(), "coin-pair");
    }
}
