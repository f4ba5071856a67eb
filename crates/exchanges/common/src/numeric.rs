use candlefeed_core::error::FeedError;
use candlefeed_core::price::{parse_price_f64, parse_price_str};
use rust_decimal::Decimal;
use serde::Deserialize;

/// Some exchanges (HTX, Bitstamp) return numeric candle fields as either a
/// JSON number or a JSON string depending on endpoint version. This untagged
/// enum accepts either and normalizes to `Decimal` right after deserializing.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum NumericField {
    Number(f64),
    Text(String),
}

impl NumericField {
    pub fn into_decimal(self) -> Result<Decimal, FeedError> {
        match self {
            NumericField::Number(v) => parse_price_f64(v),
            NumericField::Text(s) => parse_price_str(&s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_numeric_form() {
        let field: NumericField = serde_json::from_str("1.5").unwrap();
        assert_eq!(field.into_decimal().unwrap(), Decimal::new(15, 1));
    }

    #[test]
    fn accepts_string_form() {
        let field: NumericField = serde_json::from_str("\"1.5\"").unwrap();
        assert_eq!(field.into_decimal().unwrap(), Decimal::new(15, 1));
    }
}
