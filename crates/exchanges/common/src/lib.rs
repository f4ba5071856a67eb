pub mod adapter;
pub mod gap;
pub mod http;
pub mod numeric;
pub mod retry;

#[cfg(feature = "mock")]
pub mod mock;

pub use adapter::ExchangeAdapter;
pub use gap::{patch, patch_from_ts};
pub use http::{reject_invalid_page, HttpCandleClient, RequestGate};
pub use numeric::NumericField;
pub use retry::{execute, RetryStrategy};

#[cfg(feature = "mock")]
pub use mock::MockAdapter;
