pub mod sanitize;

use bigdecimal::BigDecimal;
use serde_json::Value;

/// Renders a decimal as a JSON number, falling back to a string when the
/// value has no exact JSON representation.
pub fn decimal_json(amount: &BigDecimal) -> Value {
    let text = amount.normalized().to_string();
    text.parse::<serde_json::Number>()
        .map(Value::Number)
        .unwrap_or(Value::String(text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn renders_decimals_as_numbers() {
        assert_eq!(decimal_json(&BigDecimal::from(500)), serde_json::json!(500));
        assert_eq!(
            decimal_json(&BigDecimal::from_str("250.50").unwrap()),
            serde_json::json!(250.5)
        );
    }
}
