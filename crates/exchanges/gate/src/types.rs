/// `[ts, quote-volume, close, high, low, open, base-volume, closed]`,
/// ascending — Gate.io does not return newest-first.
pub type GateCandleRow = Vec<serde_json::Value>;

#[derive(Debug, serde::Deserialize)]
pub struct GateErrorEnvelope {
    pub label: String,
    pub message: String,
}
