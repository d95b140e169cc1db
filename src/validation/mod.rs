use bigdecimal::BigDecimal;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub mod phone;

pub use phone::{normalize_phone, PhoneNormalizer};

pub const AMOUNT_INPUT_MAX_LEN: usize = 64;
pub const AMOUNT_MAX_INTEGER_DIGITS: usize = 15;
pub const AMOUNT_MAX_SCALE: usize = 2;
pub const PAYMENT_TYPES: &[&str] = &["deposit", "withdrawal"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub type ValidationResult = Result<(), ValidationError>;

pub fn sanitize_string(value: &str) -> String {
    value
        .chars()
        .filter(|ch| !ch.is_control())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn validate_required(field: &'static str, value: &str) -> ValidationResult {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }

    Ok(())
}

pub fn validate_max_len(field: &'static str, value: &str, max_len: usize) -> ValidationResult {
    if value.len() > max_len {
        return Err(ValidationError::new(
            field,
            format!("must be at most {} characters", max_len),
        ));
    }

    Ok(())
}

pub fn validate_enum(field: &'static str, value: &str, allowed: &[&str]) -> ValidationResult {
    if allowed.iter().all(|candidate| value != *candidate) {
        return Err(ValidationError::new(
            field,
            format!("must be one of: {}", allowed.join(", ")),
        ));
    }

    Ok(())
}

pub fn validate_positive_amount(amount: &BigDecimal) -> ValidationResult {
    if amount <= &BigDecimal::from(0) {
        return Err(ValidationError::new("amount", "must be greater than zero"));
    }

    Ok(())
}

/// Parses a user id, rejecting blanks before attempting the UUID parse.
pub fn parse_user_id(raw: &str) -> Result<Uuid, ValidationError> {
    let raw = sanitize_string(raw);
    validate_required("uuid", &raw)?;
    Uuid::parse_str(&raw).map_err(|_| ValidationError::new("uuid", "must be a valid UUID"))
}

/// Accepts `digits[.digits]` only. Exponents and signs are rejected so the
/// magnitude of a parsed amount stays bounded.
fn validate_plain_decimal(text: &str) -> ValidationResult {
    let (integer, fraction) = match text.split_once('.') {
        Some((integer, fraction)) => (integer, Some(fraction)),
        None => (text, None),
    };

    let all_digits = |part: &str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(integer) || !fraction.map_or(true, all_digits) {
        return Err(ValidationError::new("amount", "must be a plain decimal number"));
    }

    if integer.trim_start_matches('0').len() > AMOUNT_MAX_INTEGER_DIGITS {
        return Err(ValidationError::new(
            "amount",
            format!("must have at most {} integer digits", AMOUNT_MAX_INTEGER_DIGITS),
        ));
    }

    // serde_json renders whole floats as `500.0`; trailing zeros carry no scale.
    let scale = fraction.map_or(0, |f| f.trim_end_matches('0').len());
    if scale > AMOUNT_MAX_SCALE {
        return Err(ValidationError::new(
            "amount",
            format!("must have at most {} decimal places", AMOUNT_MAX_SCALE),
        ));
    }

    Ok(())
}

/// Accepts either a JSON number or a numeric string.
pub fn parse_amount(raw: &serde_json::Value) -> Result<BigDecimal, ValidationError> {
    let text = match raw {
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::String(s) => sanitize_string(s),
        serde_json::Value::Null => return Err(ValidationError::new("amount", "is required")),
        _ => return Err(ValidationError::new("amount", "must be a number")),
    };
    validate_max_len("amount", &text, AMOUNT_INPUT_MAX_LEN)?;
    validate_plain_decimal(&text)?;

    let amount = BigDecimal::from_str(&text)
        .map_err(|_| ValidationError::new("amount", "must be a number"))?;
    validate_positive_amount(&amount)?;
    Ok(amount)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn validates_required_field() {
        assert!(validate_required("field", "value").is_ok());
        assert!(validate_required("field", "   ").is_err());
    }

    #[test]
    fn validates_max_len() {
        assert!(validate_max_len("field", "abc", 3).is_ok());
        assert!(validate_max_len("field", "abcd", 3).is_err());
    }

    #[test]
    fn validates_enum_values() {
        assert!(validate_enum("type", "deposit", PAYMENT_TYPES).is_ok());
        assert!(validate_enum("type", "transfer", PAYMENT_TYPES).is_err());
    }

    #[test]
    fn sanitizes_string() {
        assert_eq!(sanitize_string("  hello\tworld  "), "hello world");
        assert_eq!(sanitize_string(" \n "), "");
        assert_eq!(sanitize_string("ab\u{0000}cd\u{0007}"), "abcd");
    }

    #[test]
    fn validates_positive_amount() {
        let positive = BigDecimal::from_str("1.23").expect("valid decimal");
        assert!(validate_positive_amount(&positive).is_ok());
        assert!(validate_positive_amount(&BigDecimal::from(0)).is_err());
        assert!(validate_positive_amount(&BigDecimal::from(-1)).is_err());
    }

    #[test]
    fn parses_amount_from_number_or_string() {
        assert_eq!(parse_amount(&json!(500)).unwrap(), BigDecimal::from(500));
        assert_eq!(
            parse_amount(&json!("250.50")).unwrap(),
            BigDecimal::from_str("250.50").unwrap()
        );
        assert!(parse_amount(&json!("-5")).is_err());
        assert!(parse_amount(&json!(0)).is_err());
        assert!(parse_amount(&json!("abc")).is_err());
        assert!(parse_amount(&json!(null)).is_err());
        assert!(parse_amount(&json!(true)).is_err());
        assert_eq!(parse_amount(&json!(500.0)).unwrap(), BigDecimal::from(500));
    }

    #[test]
    fn rejects_exponent_and_oversized_amounts() {
        for raw in [
            json!("1e-9223372036854775808"),
            json!("1e100000000"),
            json!("5E2"),
            json!(1e300),
            json!(".5"),
            json!("5."),
            json!("+5"),
            json!("1 000"),
            json!("1234567890123456"),
            json!("10.001"),
        ] {
            let err = parse_amount(&raw).unwrap_err();
            assert_eq!(err.field, "amount", "input {}", raw);
        }

        assert_eq!(
            parse_amount(&json!("999999999999999.99")).unwrap(),
            BigDecimal::from_str("999999999999999.99").unwrap()
        );
        assert_eq!(
            parse_amount(&json!("0012.500")).unwrap(),
            BigDecimal::from_str("12.5").unwrap()
        );
    }

    #[test]
    fn parses_user_id() {
        let id = Uuid::new_v4();
        assert_eq!(parse_user_id(&id.to_string()).unwrap(), id);
        assert_eq!(parse_user_id("").unwrap_err().field, "uuid");
        assert!(parse_user_id("not-a-uuid").is_err());
    }
}
