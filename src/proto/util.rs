//! Helpers for decoding loosely-typed 402 response bodies.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Deserializes a scalar field that servers send either as a string or as a number.
///
/// Numbers are rendered as their decimal text. Empty strings, `null`, and any other
/// JSON type decode to `None` instead of failing the whole shape.
///
/// Use together with `#[serde(default)]` so a missing field is `None` as well.
pub fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|value| match value {
        Value::String(s) if !s.is_empty() => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct Probe {
        #[serde(default, deserialize_with = "lenient_string")]
        amount: Option<String>,
    }

    fn decode(value: Value) -> Option<String> {
        serde_json::from_value::<Probe>(value).unwrap().amount
    }

    #[test]
    fn test_lenient_string_accepts_strings_and_numbers() {
        assert_eq!(decode(json!({"amount": "1000"})), Some("1000".into()));
        assert_eq!(decode(json!({"amount": 1000})), Some("1000".into()));
    }

    #[test]
    fn test_lenient_string_drops_other_values() {
        assert_eq!(decode(json!({})), None);
        assert_eq!(decode(json!({"amount": ""})), None);
        assert_eq!(decode(json!({"amount": null})), None);
        assert_eq!(decode(json!({"amount": {"value": 1}})), None);
        assert_eq!(decode(json!({"amount": true})), None);
    }
}
