use candlefeed_exchanges_common::NumericField;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct BitstampEnvelope {
    pub data: Option<BitstampData>,
    /// Present only on error responses, e.g. `"Currency pair not found"`.
    pub reason: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct BitstampData {
    pub ohlc: Vec<BitstampCandle>,
}

#[derive(Debug, Deserialize)]
pub struct BitstampCandle {
    pub timestamp: NumericField,
    pub open: NumericField,
    pub high: NumericField,
    pub low: NumericField,
    pub close: NumericField,
}
