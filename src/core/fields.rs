//! Parsing of raw form values into typed ledger inputs.
//!
//! The presentation layer submits every field as text, exactly as typed. Blank
//! money fields mean zero, anything else must be a finite decimal number. Values
//! are normalized to cents here so every later computation works on the same
//! precision that gets stored.

use crate::errors::{Error, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;

/// Largest magnitude a money column holds: `Decimal(12, 2)`.
#[must_use]
pub fn max_amount() -> Decimal {
    Decimal::new(999_999_999_999, 2)
}

/// Rejects amounts a money column cannot store without losing cents.
///
/// # Errors
/// Returns `Error::InvalidAmount` when `|amount|` exceeds [`max_amount`].
pub fn ensure_storable(field: &'static str, amount: Decimal) -> Result<Decimal> {
    if amount.abs() > max_amount() {
        return Err(Error::InvalidAmount { field, amount });
    }
    Ok(amount)
}

/// Adds two money values, failing instead of overflowing.
///
/// # Errors
/// Returns `Error::AmountOverflow` when the sum does not fit a `Decimal`.
pub fn checked_add(field: &'static str, a: Decimal, b: Decimal) -> Result<Decimal> {
    a.checked_add(b).ok_or(Error::AmountOverflow { field })
}

/// Subtracts two money values, failing instead of overflowing.
///
/// # Errors
/// Returns `Error::AmountOverflow` when the difference does not fit a `Decimal`.
pub fn checked_sub(field: &'static str, a: Decimal, b: Decimal) -> Result<Decimal> {
    a.checked_sub(b).ok_or(Error::AmountOverflow { field })
}

/// Rounds a monetary value to cents, midpoint away from zero.
#[must_use]
pub fn round_cents(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

fn non_blank(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|s| !s.is_empty())
}

fn parse_decimal(field: &'static str, raw: &str) -> Result<Decimal> {
    let cleaned: String = raw
        .strip_prefix('$')
        .unwrap_or(raw)
        .chars()
        .filter(|c| *c != ',')
        .collect();

    let amount = Decimal::from_str(cleaned.trim())
        .map(round_cents)
        .map_err(|e| Error::InvalidField {
            field,
            value: raw.to_string(),
            reason: format!("not a number: {e}"),
        })?;
    ensure_storable(field, amount)
}

/// Parses an optional fee component. Blank or absent means zero.
///
/// # Errors
/// Returns `Error::InvalidField` for non-numeric text and
/// `Error::InvalidAmount` for negative values.
pub fn parse_fee(field: &'static str, raw: Option<&str>) -> Result<Decimal> {
    let Some(raw) = non_blank(raw) else {
        return Ok(Decimal::ZERO);
    };
    let amount = parse_decimal(field, raw)?;
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(Error::InvalidAmount { field, amount });
    }
    Ok(amount)
}

/// Parses an amount that must be present and strictly positive.
///
/// # Errors
/// Returns `Error::MissingField` when blank, `Error::InvalidField` for
/// non-numeric text and `Error::InvalidAmount` for zero or negative values.
pub fn parse_positive_amount(field: &'static str, raw: Option<&str>) -> Result<Decimal> {
    let raw = non_blank(raw).ok_or(Error::MissingField { field })?;
    let amount = parse_decimal(field, raw)?;
    if amount <= Decimal::ZERO {
        return Err(Error::InvalidAmount { field, amount });
    }
    Ok(amount)
}

/// Parses an optional amount, returning `None` when blank.
///
/// # Errors
/// Returns `Error::InvalidField` for non-numeric text.
pub fn parse_optional_amount(field: &'static str, raw: Option<&str>) -> Result<Option<Decimal>> {
    non_blank(raw).map(|r| parse_decimal(field, r)).transpose()
}

/// Parses a non-negative item count. Blank or absent means zero.
///
/// # Errors
/// Returns `Error::InvalidField` for anything that is not a whole number >= 0.
pub fn parse_quantity(field: &'static str, raw: Option<&str>) -> Result<i32> {
    let Some(raw) = non_blank(raw) else {
        return Ok(0);
    };
    match raw.parse::<i32>() {
        Ok(n) if n >= 0 => Ok(n),
        Ok(_) => Err(Error::InvalidField {
            field,
            value: raw.to_string(),
            reason: "must not be negative".to_string(),
        }),
        Err(e) => Err(Error::InvalidField {
            field,
            value: raw.to_string(),
            reason: format!("not a whole number: {e}"),
        }),
    }
}

/// Parses a required date. A bare `YYYY-MM-DD` becomes midnight UTC; full RFC 3339
/// timestamps are converted to UTC.
///
/// # Errors
/// Returns `Error::MissingField` when blank and `Error::InvalidField` when the
/// text is neither format.
pub fn parse_date(field: &'static str, raw: Option<&str>) -> Result<DateTime<Utc>> {
    let raw = non_blank(raw).ok_or(Error::MissingField { field })?;

    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(date.and_time(chrono::NaiveTime::MIN).and_utc());
    }

    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::InvalidField {
            field,
            value: raw.to_string(),
            reason: format!("expected YYYY-MM-DD or RFC 3339: {e}"),
        })
}

/// Parses required free text, trimming surrounding whitespace.
///
/// # Errors
/// Returns `Error::MissingField` when blank.
pub fn parse_required_text(field: &'static str, raw: Option<&str>) -> Result<String> {
    non_blank(raw)
        .map(str::to_string)
        .ok_or(Error::MissingField { field })
}

/// Trims optional free text, mapping blank to `None`.
#[must_use]
pub fn parse_optional_text(raw: Option<&str>) -> Option<String> {
    non_blank(raw).map(str::to_string)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use chrono::{Datelike, Timelike};
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_fee_blank_is_zero() {
        assert_eq!(parse_fee("subtotal", None).unwrap(), Decimal::ZERO);
        assert_eq!(parse_fee("subtotal", Some("")).unwrap(), Decimal::ZERO);
        assert_eq!(parse_fee("subtotal", Some("   ")).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn test_parse_fee_accepts_currency_formatting() {
        assert_eq!(parse_fee("subtotal", Some("100.00")).unwrap(), dec!(100.00));
        assert_eq!(parse_fee("subtotal", Some("$1,250.5")).unwrap(), dec!(1250.50));
        assert_eq!(parse_fee("subtotal", Some(" 8.505 ")).unwrap(), dec!(8.51));
    }

    #[test]
    fn test_parse_fee_rejects_non_numeric() {
        for raw in ["abc", "NaN", "inf", "-inf", "12.3.4"] {
            let result = parse_fee("tax_collected", Some(raw));
            assert!(
                matches!(
                    result,
                    Err(Error::InvalidField {
                        field: "tax_collected",
                        ..
                    })
                ),
                "{raw} should be rejected"
            );
        }
    }

    #[test]
    fn test_parse_fee_rejects_negative() {
        let result = parse_fee("ad_fees", Some("-2"));
        assert!(matches!(
            result,
            Err(Error::InvalidAmount {
                field: "ad_fees",
                ..
            })
        ));
    }

    #[test]
    fn test_parse_positive_amount() {
        assert_eq!(
            parse_positive_amount("amount", Some("40")).unwrap(),
            dec!(40)
        );
        assert!(matches!(
            parse_positive_amount("amount", None),
            Err(Error::MissingField { field: "amount" })
        ));
        assert!(matches!(
            parse_positive_amount("amount", Some("0")),
            Err(Error::InvalidAmount { .. })
        ));
        assert!(matches!(
            parse_positive_amount("amount", Some("-5")),
            Err(Error::InvalidAmount { .. })
        ));
        assert!(matches!(
            parse_positive_amount("amount", Some("0.001")),
            Err(Error::InvalidAmount { .. })
        ));
    }

    #[test]
    fn test_amounts_beyond_column_precision_are_rejected() {
        assert_eq!(
            parse_fee("subtotal", Some("9,999,999,999.99")).unwrap(),
            dec!(9999999999.99)
        );
        for raw in [
            "10000000000",
            "123456789012345.67",
            "79228162514264337593543950335",
        ] {
            assert!(
                matches!(
                    parse_fee("subtotal", Some(raw)),
                    Err(Error::InvalidAmount {
                        field: "subtotal",
                        ..
                    })
                ),
                "{raw} should be rejected"
            );
        }
        assert!(matches!(
            parse_positive_amount("amount", Some("-10000000000")),
            Err(Error::InvalidAmount { .. })
        ));
        assert!(matches!(
            parse_optional_amount("amount", Some("99999999999")),
            Err(Error::InvalidAmount { .. })
        ));
    }

    #[test]
    fn test_checked_arithmetic() {
        assert_eq!(
            checked_add("total", dec!(1.50), dec!(2.25)).unwrap(),
            dec!(3.75)
        );
        assert!(matches!(
            checked_add("total", Decimal::MAX, Decimal::ONE),
            Err(Error::AmountOverflow { field: "total" })
        ));
        assert!(matches!(
            checked_sub("total", Decimal::MIN, Decimal::ONE),
            Err(Error::AmountOverflow { field: "total" })
        ));
    }

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity("number_of_items", None).unwrap(), 0);
        assert_eq!(parse_quantity("number_of_items", Some("3")).unwrap(), 3);
        assert!(parse_quantity("number_of_items", Some("-1")).is_err());
        assert!(parse_quantity("number_of_items", Some("2.5")).is_err());
    }

    #[test]
    fn test_parse_date_formats() {
        let date = parse_date("order_date", Some("2024-03-15")).unwrap();
        assert_eq!((date.year(), date.month(), date.day()), (2024, 3, 15));
        assert_eq!(date.hour(), 0);

        let ts = parse_date("order_date", Some("2024-03-15T23:30:00-05:00")).unwrap();
        assert_eq!((ts.month(), ts.day(), ts.hour()), (3, 16, 4));

        assert!(matches!(
            parse_date("order_date", Some("")),
            Err(Error::MissingField { field: "order_date" })
        ));
        assert!(matches!(
            parse_date("order_date", Some("15/03/2024")),
            Err(Error::InvalidField { .. })
        ));
    }

    #[test]
    fn test_parse_text() {
        assert_eq!(
            parse_required_text("method", Some("  PayPal ")).unwrap(),
            "PayPal"
        );
        assert!(parse_required_text("method", Some(" ")).is_err());
        assert_eq!(parse_optional_text(Some("")), None);
        assert_eq!(parse_optional_text(Some(" note ")), Some("note".to_string()));
    }
}
