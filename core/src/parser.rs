//! Parser capability for the flat-object decode path.

use std::collections::HashMap;

use serde_json::Value;

use crate::error::GatewayError;

/// Shape of a decoded response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// A flat key-value object.
    Object(HashMap<String, String>),
    /// A list-shaped body with this many elements.
    List(usize),
}

/// Decodes raw response text.
pub trait Parser: Send + Sync {
    /// `GatewayError::Decode` when `raw` is not decodable at all.
    fn parse(&self, raw: &str) -> Result<Decoded, GatewayError>;
}

/// JSON parser. String values are taken as-is, `null` values are skipped,
/// and any other value is kept as its JSON text.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonParser;

impl Parser for JsonParser {
    fn parse(&self, raw: &str) -> Result<Decoded, GatewayError> {
        let value: Value = serde_json::from_str(raw).map_err(|e| GatewayError::Decode(e.to_string()))?;
        match value {
            Value::Object(map) => Ok(Decoded::Object(
                map.into_iter()
                    .filter_map(|(key, value)| match value {
                        Value::Null => None,
                        Value::String(s) => Some((key, s)),
                        other => Some((key, other.to_string())),
                    })
                    .collect(),
            )),
            Value::Array(items) => Ok(Decoded::List(items.len())),
            other => Err(GatewayError::Decode(format!(
                "expected a JSON object, found {}",
                kind(&other)
            ))),
        }
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_object_decodes_to_map() {
        let decoded = JsonParser.parse(r#"{"a":"1","b":"2"}"#).unwrap();
        let Decoded::Object(map) = decoded else {
            panic!("expected object");
        };
        assert_eq!(map.len(), 2);
        assert_eq!(map["a"], "1");
        assert_eq!(map["b"], "2");
    }

    #[test]
    fn non_string_values_keep_json_text() {
        let Decoded::Object(map) = JsonParser
            .parse(r#"{"n":3,"ok":true,"nested":{"x":1},"gone":null}"#)
            .unwrap()
        else {
            panic!("expected object");
        };
        assert_eq!(map["n"], "3");
        assert_eq!(map["ok"], "true");
        assert_eq!(map["nested"], r#"{"x":1}"#);
        assert!(!map.contains_key("gone"));
    }

    #[test]
    fn array_is_reported_as_list() {
        assert_eq!(JsonParser.parse(r#"[{"a":"1"},{"a":"2"}]"#).unwrap(), Decoded::List(2));
    }

    #[test]
    fn malformed_text_is_decode_error() {
        assert!(matches!(JsonParser.parse("testing123"), Err(GatewayError::Decode(_))));
    }

    #[test]
    fn scalar_is_decode_error() {
        let err = JsonParser.parse("42").unwrap_err();
        assert!(err.to_string().contains("a number"));
    }
}
