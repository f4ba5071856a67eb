use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;

use crate::model::Interval;

/// Shared defaults for cache sizing and debug logging, read once by the
/// façade and the CLI so both agree on the same starting point (§4.7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Per-interval bucket counts for the page cache's LRUs, keyed by seconds.
    pub cache_sizes_secs: HashMap<i64, usize>,
    pub debug: bool,
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = Config::default();
        if let Ok(v) = env::var("CANDLEFEED_DEBUG") {
            config.debug = v.parse().unwrap_or(config.debug);
        }
        if let Ok(v) = env::var("RUST_LOG") {
            config.log_level = v;
        }
        Ok(config)
    }

    pub fn cache_size_for(&self, interval: Interval) -> usize {
        self.cache_sizes_secs
            .get(&interval.as_secs())
            .copied()
            .unwrap_or(DEFAULT_CACHE_SIZE)
    }
}

/// Used for any interval without an explicit entry in `cache_sizes_secs`.
const DEFAULT_CACHE_SIZE: usize = 1_000;

impl Default for Config {
    fn default() -> Self {
        let mut cache_sizes_secs = HashMap::new();
        cache_sizes_secs.insert(Interval::ONE_MINUTE.as_secs(), 10_000);
        cache_sizes_secs.insert(Interval::ONE_HOUR.as_secs(), 1_000);
        cache_sizes_secs.insert(Interval::ONE_DAY.as_secs(), 1_000);
        Self {
            cache_sizes_secs,
            debug: false,
            log_level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_cache_sizes() {
        let config = Config::default();
        assert_eq!(config.cache_size_for(Interval::ONE_MINUTE), 10_000);
        assert_eq!(config.cache_size_for(Interval::ONE_HOUR), 1_000);
        assert_eq!(config.cache_size_for(Interval::ONE_DAY), 1_000);
        assert_eq!(config.cache_size_for(Interval::THREE_DAYS), DEFAULT_CACHE_SIZE);
    }
}
