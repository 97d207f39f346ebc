//! Numeric field decoding shared by the exchange adapters.
//!
//! Exchanges ship prices and sizes as JSON strings. These helpers make
//! sure no numeric field leaves an adapter still typed as a string.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde_json::Value;

use crate::domain::{CandleStick, PriceLevel};
use crate::error::FeedError;

pub fn parse_f64(raw: &str, field: &str) -> Result<f64, FeedError> {
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| FeedError::Decode(format!("{field}: not a number: {raw:?}")))
}

pub fn parse_decimal(raw: &str, field: &str) -> Result<Decimal, FeedError> {
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .map_err(|_| FeedError::Decode(format!("{field}: not a decimal: {raw:?}")))
}

/// Accepts either a JSON number or a numeric string.
pub fn value_f64(value: &Value, field: &str) -> Result<f64, FeedError> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| FeedError::Decode(format!("{field}: out of range"))),
        Value::String(s) => parse_f64(s, field),
        other => Err(FeedError::Decode(format!("{field}: unexpected {other}"))),
    }
}

/// Accepts either a JSON integer or an integer string.
pub fn value_i64(value: &Value, field: &str) -> Result<i64, FeedError> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| FeedError::Decode(format!("{field}: not an integer"))),
        Value::String(s) => s
            .parse()
            .map_err(|_| FeedError::Decode(format!("{field}: not an integer: {s:?}"))),
        other => Err(FeedError::Decode(format!("{field}: unexpected {other}"))),
    }
}

/// Decode `[[price, qty], ...]` string pairs.
///
/// Zero-quantity levels (removals in delta feeds) are dropped.
pub fn parse_levels(levels: &[(String, String)], side: &str) -> Result<Vec<PriceLevel>, FeedError> {
    let mut out = Vec::with_capacity(levels.len());
    for (price, qty) in levels {
        let price = parse_f64(price, side)?;
        let qty = parse_f64(qty, side)?;
        if qty > 0.0 {
            out.push((price, qty));
        }
    }
    Ok(out)
}

/// Decode a REST kline row: `[openTimeMs, open, high, low, close, ...]`.
pub fn candle_from_row(row: &[Value]) -> Result<CandleStick, FeedError> {
    if row.len() < 5 {
        return Err(FeedError::Decode(format!(
            "kline row has {} fields, expected at least 5",
            row.len()
        )));
    }
    Ok(CandleStick {
        time: value_i64(&row[0], "openTime")? / 1000,
        open: value_f64(&row[1], "open")?,
        high: value_f64(&row[2], "high")?,
        low: value_f64(&row[3], "low")?,
        close: value_f64(&row[4], "close")?,
    })
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_parse_f64_rejects_garbage() {
        assert_eq!(parse_f64("16578.50", "p").unwrap(), 16578.5);
        assert!(parse_f64("abc", "p").is_err());
        assert!(parse_f64("NaN", "p").is_err());
    }

    #[test]
    fn test_parse_decimal_keeps_exact_digits() {
        assert_eq!(parse_decimal("0.00100000", "q").unwrap(), dec!(0.00100000));
        assert_eq!(parse_decimal("0.00100000", "q").unwrap().to_string(), "0.00100000");
    }

    #[test]
    fn test_levels_drop_zero_quantity() {
        let levels = vec![
            ("100.5".to_string(), "1.5".to_string()),
            ("100.0".to_string(), "0".to_string()),
        ];
        assert_eq!(parse_levels(&levels, "bids").unwrap(), vec![(100.5, 1.5)]);
    }

    #[test]
    fn test_candle_from_mixed_row() {
        let row = vec![
            json!(1_499_040_000_000_i64),
            json!("0.01634790"),
            json!("0.80000000"),
            json!("0.01575800"),
            json!("0.01577100"),
            json!("148976.11427815"),
        ];
        let candle = candle_from_row(&row).unwrap();
        assert_eq!(candle.time, 1_499_040_000);
        assert_eq!(candle.high, 0.8);
    }

    #[test]
    fn test_short_row_is_rejected() {
        assert!(candle_from_row(&[json!(1)]).is_err());
    }
}
