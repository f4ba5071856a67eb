use serde::Deserialize;

/// Identical shape to spot Binance: `[openTime, open, high, low, close, volume, ...]`.
pub type FuturesKlineRow = Vec<serde_json::Value>;

#[derive(Debug, Deserialize)]
pub struct FuturesErrorEnvelope {
    pub code: i64,
    pub msg: String,
}
