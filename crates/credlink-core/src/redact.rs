//! Scrubbing of secret values from diagnostic text.

use std::collections::HashMap;

use serde_json::{Map, Value};

/// Replace every occurrence of each secret in `text` with its label.
///
/// Longer secrets are replaced first so a secret that contains another is
/// never partially exposed. Empty secrets are ignored.
pub fn redact(text: &str, secrets: &HashMap<String, &'static str>) -> String {
    let mut ordered: Vec<(&str, &str)> = secrets
        .iter()
        .filter(|(secret, _)| !secret.is_empty())
        .map(|(secret, label)| (secret.as_str(), *label))
        .collect();
    ordered.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

    ordered
        .into_iter()
        .fold(text.to_owned(), |acc, (secret, label)| acc.replace(secret, label))
}

/// Replace every value in `raw` that is a held secret with its label.
///
/// Only whole values are compared, after the same trimming and scalar
/// coercion the config decoder applies. Keys and other values are left
/// alone, so a short secret never mangles the surrounding document.
pub fn redact_values(
    raw: &Map<String, Value>,
    secrets: &HashMap<String, &'static str>,
) -> Map<String, Value> {
    raw.iter()
        .map(|(key, value)| (key.clone(), redact_value(value, secrets)))
        .collect()
}

fn redact_value(value: &Value, secrets: &HashMap<String, &'static str>) -> Value {
    let scalar = match value {
        Value::String(s) => s.trim().to_owned(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => {
            return Value::Array(items.iter().map(|v| redact_value(v, secrets)).collect());
        }
        Value::Object(map) => return Value::Object(redact_values(map, secrets)),
        Value::Null | Value::Bool(_) => return value.clone(),
    };
    match secrets.get(&scalar) {
        Some(label) if !scalar.is_empty() => Value::String((*label).to_owned()),
        _ => value.clone(),
    }
}
