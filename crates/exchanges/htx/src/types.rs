use candlefeed_exchanges_common::NumericField;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct HtxEnvelope {
    pub status: String,
    #[serde(rename = "err-code")]
    pub err_code: Option<String>,
    #[serde(rename = "err-msg")]
    pub err_msg: Option<String>,
    /// Newest-first, fields accepted as numeric or string.
    pub data: Option<Vec<HtxCandle>>,
}

#[derive(Debug, Deserialize)]
pub struct HtxCandle {
    pub id: NumericField,
    pub open: NumericField,
    pub close: NumericField,
    pub low: NumericField,
    pub high: NumericField,
}
