pub mod facade;
pub mod iterator;

pub use candlefeed_cache::PageCache;
pub use candlefeed_core::error::FeedError;
pub use candlefeed_core::model::{Candlestick, Interval, MarketSource, MarketType, Provider};
pub use facade::{FacadeOptions, MarketFacade};
pub use iterator::{CandleIterator, IteratorOptions};
