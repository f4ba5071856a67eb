use serde::Deserialize;

/// One row of `GET /api/v3/klines`: `[openTime, open, high, low, close, volume, ...]`.
/// Binance returns ascending arrays already, so no reversal is needed.
pub type BinanceKlineRow = Vec<serde_json::Value>;

#[derive(Debug, Deserialize)]
pub struct BinanceErrorEnvelope {
    pub code: i64,
    pub msg: String,
}
