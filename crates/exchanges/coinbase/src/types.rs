/// Success rows: `[time, low, high, open, close, volume]`, newest first.
pub type CoinbaseCandleRow = Vec<serde_json::Value>;

#[derive(Debug, serde::Deserialize)]
pub struct CoinbaseErrorEnvelope {
    pub message: String,
}
