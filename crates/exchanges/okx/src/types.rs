use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct OkxEnvelope {
    pub code: String,
    pub msg: String,
    /// Rows: `[ts, o, h, l, c, vol, volCcy]`, newest first.
    pub data: Option<Vec<Vec<String>>>,
}
