use serde::Deserialize;

/// One row of `GET /api/v3/klines`: `[openTime, open, high, low, close, volume, ...]`,
/// ascending already, same shape as Binance's.
pub type MexcKlineRow = Vec<serde_json::Value>;

#[derive(Debug, Deserialize)]
pub struct MexcErrorEnvelope {
    pub code: i64,
    pub msg: String,
}
