use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct UpbitCandle {
    pub timestamp: i64,
    pub opening_price: f64,
    pub high_price: f64,
    pub low_price: f64,
    pub trade_price: f64,
}

#[derive(Debug, Deserialize)]
pub struct UpbitErrorEnvelope {
    pub error: UpbitError,
}

#[derive(Debug, Deserialize)]
pub struct UpbitError {
    pub name: String,
    pub message: String,
}
