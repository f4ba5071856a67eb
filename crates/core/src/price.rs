use rust_decimal::Decimal;
use std::str::FromStr;

use crate::error::FeedError;

/// Parse a wire float into a `Decimal`, rejecting non-finite values per the
/// bit-exact JSON contract (`infinities and NaNs are rejected`).
pub fn parse_price_f64(value: f64) -> Result<Decimal, FeedError> {
    if !value.is_finite() {
        return Err(FeedError::InvalidJsonResponse(format!(
            "non-finite price: {value}"
        )));
    }
    Decimal::from_str(&value.to_string())
        .map_err(|e| FeedError::InvalidJsonResponse(format!("unparseable price {value}: {e}")))
}

/// Parse a wire string into a `Decimal`.
pub fn parse_price_str(value: &str) -> Result<Decimal, FeedError> {
    Decimal::from_str(value)
        .map_err(|e| FeedError::InvalidJsonResponse(format!("unparseable price {value:?}: {e}")))
}

/// Render a `Decimal` without trailing zeros: `1.0 -> "1"`, `0.001 -> "0.001"`.
pub fn format_decimal(value: Decimal) -> String {
    let normalized = value.normalize();
    let text = normalized.to_string();
    if let Some(dot) = text.find('.') {
        let trimmed = text.trim_end_matches('0');
        let trimmed = trimmed.trim_end_matches('.');
        if trimmed.is_empty() || (trimmed == "-" ) {
            return "0".to_string();
        }
        let _ = dot;
        trimmed.to_string()
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_trailing_zeros() {
        assert_eq!(format_decimal(Decimal::from_str("1.0").unwrap()), "1");
        assert_eq!(format_decimal(Decimal::from_str("0.001").unwrap()), "0.001");
        assert_eq!(format_decimal(Decimal::from_str("1.50").unwrap()), "1.5");
        assert_eq!(format_decimal(Decimal::from_str("100").unwrap()), "100");
    }

    #[test]
    fn rejects_non_finite_floats() {
        assert!(parse_price_f64(f64::NAN).is_err());
        assert!(parse_price_f64(f64::INFINITY).is_err());
        assert!(parse_price_f64(1.5).is_ok());
    }
}
