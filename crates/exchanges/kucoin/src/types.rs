use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct KucoinEnvelope {
    pub code: String,
    pub msg: Option<String>,
    /// Rows: `[time, open, close, high, low, volume, turnover]`, ascending
    /// already — KuCoin never returns newest-first, unlike most peers.
    pub data: Option<Vec<Vec<String>>>,
}
