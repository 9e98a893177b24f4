//! Prototype-pollution-safe JSON parsing (C1)
//!
//! `safe_parse_json` parses text into a `serde_json::Value`, then recursively
//! strips (for objects) or filters (for arrays) any key equal to
//! `__proto__`, `constructor`, or `prototype`. Rust has no prototype chain to
//! pollute, but the persisted JSON in `related_memories` (§4.10) may have
//! been written by — or round-tripped through — a JS-based tool upstream, so
//! the same defense-in-depth guard is applied on read.

use serde_json::Value;

const DANGEROUS_KEYS: [&str; 3] = ["__proto__", "constructor", "prototype"];

fn sanitize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let cleaned = map
                .into_iter()
                .filter(|(k, _)| !DANGEROUS_KEYS.contains(&k.as_str()))
                .map(|(k, v)| (k, sanitize(v)))
                .collect();
            Value::Object(cleaned)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sanitize).collect()),
        other => other,
    }
}

/// Parse `text` as JSON, stripping dangerous keys at every level. On any
/// parse error, returns `default` and logs a warning. Never panics.
pub fn safe_parse_json(text: &str, default: Value) -> Value {
    match serde_json::from_str::<Value>(text) {
        Ok(value) => sanitize(value),
        Err(e) => {
            tracing::warn!(error = %e, "safe_parse_json: parse failed, returning default");
            default
        }
    }
}

/// Parse `text` into a strongly-typed `T` via the same sanitize-then-decode
/// path. Returns `default` if parsing or decoding fails.
pub fn safe_parse_json_as<T: serde::de::DeserializeOwned>(text: &str, default: T) -> T {
    let value = safe_parse_json(text, Value::Null);
    serde_json::from_value(value).unwrap_or(default)
}
