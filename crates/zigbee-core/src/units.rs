//! Unit, range and lookup utilities
//!
//! Pure helpers shared by every converter: rounding, linear range mapping,
//! clamping, enum lookup tables and type assertions on JSON request values.

use serde_json::{Map, Value};

use crate::error::ValueError;

/// A static enum table mapping external names to wire values
pub type Lookup<V> = &'static [(&'static str, V)];

/// Round to a number of decimal places
#[must_use]
pub fn precision_round(number: f64, precision: i32) -> f64 {
    let factor = 10f64.powi(precision);
    (number * factor).round() / factor
}

/// Clamp into `[min, max]`
#[must_use]
pub fn number_within_range(number: f64, min: f64, max: f64) -> f64 {
    if number > max {
        max
    } else if number < min {
        min
    } else {
        number
    }
}

#[must_use]
pub fn is_in_range(min: f64, max: f64, value: f64) -> bool {
    value >= min && value <= max
}

/// Linear interpolation between two ranges, rounded to an integer.
///
/// Values outside the source range are extrapolated, not clamped.
#[must_use]
pub fn map_number_range(value: f64, from_low: f64, from_high: f64, to_low: f64, to_high: f64) -> f64 {
    map_number_range_precision(value, from_low, from_high, to_low, to_high, 0)
}

#[must_use]
pub fn map_number_range_precision(
    value: f64,
    from_low: f64,
    from_high: f64,
    to_low: f64,
    to_high: f64,
    precision: i32,
) -> f64 {
    let mapped = to_low + (value - from_low) * (to_high - to_low) / (from_high - from_low);
    precision_round(mapped, precision)
}

/// Convert a celsius value to the celsius equivalent of the nearest half degree fahrenheit
#[must_use]
pub fn normalize_celsius_version_of_fahrenheit(value: f64) -> f64 {
    let fahrenheit = value * 1.8 + 32.0;
    let rounded = precision_round((precision_round(fahrenheit * 2.0, 1)).round() / 2.0, 1);
    precision_round((rounded - 32.0) / 1.8, 2)
}

/// JSON number for `value`; integral values become integers
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn number_value(value: f64) -> Value {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 9_007_199_254_740_992.0 {
        Value::from(value as i64)
    } else {
        serde_json::Number::from_f64(value).map_or(Value::Null, Value::Number)
    }
}

/// Render a JSON value the way it appears in error messages
#[must_use]
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn wrong_type(key: &str, expected: &'static str, value: &Value) -> ValueError {
    ValueError::WrongType {
        key: key.to_string(),
        expected,
        got: format!("{} ({})", type_name(value), display_value(value)),
    }
}

/// Parse a number from a JSON number or a numeric string
pub fn to_number(value: &Value, key: &str) -> Result<f64, ValueError> {
    match value {
        Value::Number(n) => n.as_f64().ok_or_else(|| wrong_type(key, "number", value)),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| wrong_type(key, "number", value)),
        _ => Err(wrong_type(key, "number", value)),
    }
}

/// Require a JSON number
pub fn require_number(value: &Value, key: &str) -> Result<f64, ValueError> {
    value
        .as_f64()
        .filter(|n| !n.is_nan())
        .ok_or_else(|| wrong_type(key, "number", value))
}

/// Require a JSON string
pub fn require_string<'a>(value: &'a Value, key: &str) -> Result<&'a str, ValueError> {
    value.as_str().ok_or_else(|| wrong_type(key, "string", value))
}

/// Require a JSON object
pub fn require_object<'a>(value: &'a Value, key: &str) -> Result<&'a Map<String, Value>, ValueError> {
    value.as_object().ok_or_else(|| wrong_type(key, "object", value))
}

/// Require a JSON boolean
pub fn require_bool(value: &Value, key: &str) -> Result<bool, ValueError> {
    value.as_bool().ok_or_else(|| wrong_type(key, "boolean", value))
}

/// Require a numeric value within `[min, max]`
pub fn require_range(value: &Value, key: &str, min: f64, max: f64) -> Result<f64, ValueError> {
    ensure_range(to_number(value, key)?, key, min, max)
}

/// Require a JSON number (not a numeric string) within `[min, max]`
pub fn require_number_in(value: &Value, key: &str, min: f64, max: f64) -> Result<f64, ValueError> {
    ensure_range(require_number(value, key)?, key, min, max)
}

/// Pass `number` through when it lies within `[min, max]`
pub fn ensure_range(number: f64, key: &str, min: f64, max: f64) -> Result<f64, ValueError> {
    if is_in_range(min, max, number) {
        Ok(number)
    } else {
        Err(ValueError::OutOfRange {
            key: key.to_string(),
            min,
            max,
            value: number,
        })
    }
}

/// Reject a string not among `allowed`
pub fn validate_value(value: &str, allowed: &[&str]) -> Result<(), ValueError> {
    if allowed.contains(&value) {
        Ok(())
    } else {
        Err(ValueError::NotAllowed {
            value: value.to_string(),
            allowed: allowed.join(","),
        })
    }
}

/// Resolve a request value through a lookup table.
///
/// Strings are tried as given, lower-cased and upper-cased; numbers are
/// matched against their decimal rendering.
pub fn lookup_value<V: Copy>(value: &Value, table: Lookup<V>) -> Result<V, ValueError> {
    let found = match value {
        Value::String(s) => find_key(table, s)
            .or_else(|| find_key(table, &s.to_lowercase()))
            .or_else(|| find_key(table, &s.to_uppercase())),
        Value::Number(n) => find_key(table, &n.to_string()),
        Value::Bool(b) => find_key(table, &b.to_string()),
        _ => None,
    };
    found.ok_or_else(|| ValueError::NotInLookup {
        value: display_value(value),
        allowed: format!(
            "[{}]",
            table.iter().map(|(k, _)| *k).collect::<Vec<_>>().join(", ")
        ),
    })
}

/// Like [`lookup_value`] but falls back to `default` on a miss
#[must_use]
pub fn lookup_value_or<V: Copy>(value: &Value, table: Lookup<V>, default: V) -> V {
    lookup_value(value, table).unwrap_or(default)
}

fn find_key<V: Copy>(table: Lookup<V>, key: &str) -> Option<V> {
    table.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
}

/// Reverse lookup: the external name of a wire value
#[must_use]
pub fn lookup_key<V: PartialEq>(table: Lookup<V>, value: &V) -> Option<&'static str> {
    table.iter().find(|(_, v)| v == value).map(|(k, _)| *k)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const MODES: Lookup<u8> = &[("off", 0), ("auto", 1), ("heat", 4)];

    #[test]
    fn test_precision_round() {
        assert_eq!(precision_round(0.123456, 4), 0.1235);
        assert_eq!(precision_round(12.5, 0), 13.0);
    }

    #[test]
    fn test_map_number_range() {
        assert_eq!(map_number_range(50.0, 0.0, 100.0, 0.0, 254.0), 127.0);
        assert_eq!(map_number_range(100.0, 0.0, 100.0, 0.0, 254.0), 254.0);
        assert_eq!(map_number_range(0.0, 0.0, 100.0, 154.0, 500.0), 154.0);
        assert_eq!(map_number_range_precision(1.0, 0.0, 3.0, 0.0, 1.0, 2), 0.33);
    }

    #[test]
    fn test_map_number_range_round_trip() {
        for x in 0..=100 {
            let x = f64::from(x);
            let there = map_number_range(x, 0.0, 100.0, 0.0, 254.0);
            let back = map_number_range(there, 0.0, 254.0, 0.0, 100.0);
            assert!((back - x).abs() <= 1.0, "{x} -> {there} -> {back}");
        }
    }

    #[test]
    fn test_number_within_range() {
        assert_eq!(number_within_range(300.0, 0.0, 254.0), 254.0);
        assert_eq!(number_within_range(-3.0, 0.0, 254.0), 0.0);
        assert_eq!(number_within_range(12.0, 0.0, 254.0), 12.0);
        assert!(is_in_range(0.0, 10.0, 10.0));
        assert!(!is_in_range(0.0, 10.0, 10.5));
    }

    #[test]
    fn test_normalize_fahrenheit() {
        // 21.0C = 69.8F -> 70.0F -> 21.11C
        assert_eq!(normalize_celsius_version_of_fahrenheit(21.0), 21.11);
        assert_eq!(normalize_celsius_version_of_fahrenheit(20.0), 20.0);
    }

    #[test]
    fn test_to_number() {
        assert_eq!(to_number(&json!(3), "transition").unwrap(), 3.0);
        assert_eq!(to_number(&json!("2.5"), "transition").unwrap(), 2.5);
        assert!(matches!(
            to_number(&json!("fast"), "transition"),
            Err(ValueError::WrongType { .. })
        ));
        assert!(require_number(&json!("2"), "x").is_err());
    }

    #[test]
    fn test_require_range() {
        assert_eq!(require_range(&json!(10), "speed", 0.0, 20.0).unwrap(), 10.0);
        let err = require_range(&json!(30), "speed", 0.0, 20.0).unwrap_err();
        assert_eq!(err.to_string(), "'speed' needs to be within 0 and 20, got 30");

        assert_eq!(require_number_in(&json!(20), "speed", 0.0, 20.0).unwrap(), 20.0);
        assert!(matches!(
            require_number_in(&json!("10"), "speed", 0.0, 20.0),
            Err(ValueError::WrongType { .. })
        ));
        assert!(matches!(
            require_number_in(&json!(-1), "speed", 0.0, 20.0),
            Err(ValueError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_lookup_value() {
        assert_eq!(lookup_value(&json!("heat"), MODES).unwrap(), 4);
        assert_eq!(lookup_value(&json!("HEAT"), MODES).unwrap(), 4);
        assert!(matches!(
            lookup_value(&json!("cool"), MODES),
            Err(ValueError::NotInLookup { .. })
        ));
        assert_eq!(lookup_value_or(&json!("cool"), MODES, 9), 9);
    }

    #[test]
    fn test_lookup_key() {
        assert_eq!(lookup_key(MODES, &1), Some("auto"));
        assert_eq!(lookup_key(MODES, &7), None);
    }

    #[test]
    fn test_number_value() {
        assert_eq!(number_value(100.0), json!(100));
        assert_eq!(number_value(-3.0), json!(-3));
        assert_eq!(number_value(0.4573), json!(0.4573));
        assert_eq!(number_value(f64::NAN), Value::Null);
    }

    #[test]
    fn test_validate_value() {
        assert!(validate_value("toggle", &["on", "off", "toggle"]).is_ok());
        let err = validate_value("dim", &["on", "off"]).unwrap_err();
        assert_eq!(err.to_string(), "'dim' not allowed, choose between: on,off");
    }
}
