use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct FtxEnvelope {
    pub success: bool,
    pub error: Option<String>,
    pub result: Option<Vec<FtxCandle>>,
}

#[derive(Debug, Deserialize)]
pub struct FtxCandle {
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}
