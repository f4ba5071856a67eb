use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct BitgetEnvelope {
    pub code: String,
    pub msg: String,
    /// Rows: `[ts, open, high, low, close, baseVol, quoteVol]`, newest first.
    pub data: Option<Vec<Vec<String>>>,
}
