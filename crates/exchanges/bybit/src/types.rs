use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct BybitKlineResponse {
    #[serde(rename = "retCode")]
    pub ret_code: i64,
    #[serde(rename = "retMsg")]
    pub ret_msg: String,
    pub result: Option<BybitKlineResult>,
}

#[derive(Debug, Deserialize)]
pub struct BybitKlineResult {
    /// Each row: `[start, open, high, low, close, volume, turnover]`, newest first.
    pub list: Vec<Vec<String>>,
}
