//! Lenient readers over the case fact bag.
//!
//! Facts arrive from forms, stored records and assistant extraction, so a
//! bond amount may be `10000`, `10000.0` or `"10000"`. Rules read through
//! these helpers instead of indexing JSON directly.

use serde_json::{Map, Value as JsonValue};

/// Mapping of fact name to value.
pub type Facts = Map<String, JsonValue>;

/// Build a fact map from a JSON object. Non-objects yield an empty map.
pub fn facts_from_json(value: JsonValue) -> Facts {
    match value {
        JsonValue::Object(map) => map,
        _ => Facts::new(),
    }
}

/// Interpret a JSON value as a number, accepting numeric strings.
///
/// `"NaN"` and `"inf"` parse as floats but are not amounts; they read as
/// absent like any other unparsable value.
pub fn as_number(value: &JsonValue) -> Option<f64> {
    let n = match value {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => s.trim().replace(',', "").parse::<f64>().ok(),
        _ => None,
    };
    n.filter(|n| n.is_finite())
}

/// Read a top-level numeric fact.
pub fn number(facts: &Facts, key: &str) -> Option<f64> {
    facts.get(key).and_then(as_number)
}

/// Read a numeric fact nested one level deep, e.g. `financial.down_payment`.
pub fn nested_number(facts: &Facts, outer: &str, inner: &str) -> Option<f64> {
    facts.get(outer).and_then(|o| o.get(inner)).and_then(as_number)
}

/// Read a top-level string fact, trimmed. Empty strings read as absent.
pub fn text<'a>(facts: &'a Facts, key: &str) -> Option<&'a str> {
    facts
        .get(key)
        .and_then(JsonValue::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Read a string nested one level deep.
pub fn nested_text<'a>(facts: &'a Facts, outer: &str, inner: &str) -> Option<&'a str> {
    facts
        .get(outer)
        .and_then(|o| o.get(inner))
        .and_then(JsonValue::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Whether a value carries content: non-null and, for strings and
/// collections, non-empty.
pub fn is_present(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => false,
        JsonValue::String(s) => !s.trim().is_empty(),
        JsonValue::Array(a) => !a.is_empty(),
        JsonValue::Object(o) => !o.is_empty(),
        _ => true,
    }
}
