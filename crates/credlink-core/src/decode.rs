//! Weak type coercion for loosely-typed config payloads.
//!
//! Hosts hand us whatever their config store produced, so scalar fields are
//! accepted in any common representation: numbers as strings, strings as
//! numbers, booleans as `0`/`1`. Only values of the wrong shape (arrays,
//! objects, unparseable text) are rejected, always naming the field.
//! `null` is treated as absent.

use serde_json::{Map, Value};

use crate::error::ProducerError;

/// Find the first non-null value for any alias.
///
/// Exact key matches win over case-insensitive ones.
fn lookup<'a>(map: &'a Map<String, Value>, aliases: &[&str]) -> Option<&'a Value> {
    let exact = aliases.iter().find_map(|alias| map.get(*alias));
    let found = exact.or_else(|| {
        aliases.iter().find_map(|alias| {
            map.iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(alias))
                .map(|(_, value)| value)
        })
    });
    found.filter(|value| !value.is_null())
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn decode_error(field: &'static str, reason: String) -> ProducerError {
    ProducerError::ConfigDecode { field, reason }
}

/// Decode a string field.
///
/// # Errors
///
/// Returns [`ProducerError::ConfigDecode`] if the value is an array or object.
pub(crate) fn string(
    map: &Map<String, Value>,
    field: &'static str,
    aliases: &[&str],
) -> Result<Option<String>, ProducerError> {
    let Some(value) = lookup(map, aliases) else {
        return Ok(None);
    };
    match value {
        Value::String(s) => Ok(Some(s.clone())),
        Value::Number(n) => Ok(Some(n.to_string())),
        Value::Bool(b) => Ok(Some(if *b { "1" } else { "0" }.to_owned())),
        other => Err(decode_error(
            field,
            format!("expected a string, found {}", describe(other)),
        )),
    }
}

/// Decode an unsigned integer field. An empty string decodes as `0`.
///
/// # Errors
///
/// Returns [`ProducerError::ConfigDecode`] for negative numbers, non-numeric
/// strings, arrays and objects.
pub(crate) fn unsigned(
    map: &Map<String, Value>,
    field: &'static str,
    aliases: &[&str],
) -> Result<Option<u64>, ProducerError> {
    let Some(value) = lookup(map, aliases) else {
        return Ok(None);
    };
    match value {
        Value::Number(n) => {
            if let Some(v) = n.as_u64() {
                return Ok(Some(v));
            }
            match n.as_f64() {
                #[allow(
                    clippy::cast_possible_truncation,
                    clippy::cast_sign_loss,
                    clippy::cast_precision_loss
                )]
                Some(f) if f.is_finite() && f >= 0.0 && f <= u64::MAX as f64 => Ok(Some(f as u64)),
                _ => Err(decode_error(
                    field,
                    format!("expected an unsigned integer, found {n}"),
                )),
            }
        }
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Ok(Some(0));
            }
            trimmed.parse::<u64>().map(Some).map_err(|_| {
                decode_error(
                    field,
                    format!("cannot parse '{trimmed}' as an unsigned integer"),
                )
            })
        }
        Value::Bool(b) => Ok(Some(u64::from(*b))),
        other => Err(decode_error(
            field,
            format!("expected an unsigned integer, found {}", describe(other)),
        )),
    }
}

/// Decode a boolean field. Accepts the usual textual spellings and numbers
/// (non-zero is `true`).
///
/// # Errors
///
/// Returns [`ProducerError::ConfigDecode`] for unrecognized strings, arrays
/// and objects.
pub(crate) fn boolean(
    map: &Map<String, Value>,
    field: &'static str,
    aliases: &[&str],
) -> Result<Option<bool>, ProducerError> {
    let Some(value) = lookup(map, aliases) else {
        return Ok(None);
    };
    match value {
        Value::Bool(b) => Ok(Some(*b)),
        Value::Number(n) => Ok(Some(n.as_f64().is_some_and(|f| f != 0.0))),
        Value::String(s) => match s.trim() {
            "" => Ok(Some(false)),
            "1" | "t" | "T" | "true" | "TRUE" | "True" => Ok(Some(true)),
            "0" | "f" | "F" | "false" | "FALSE" | "False" => Ok(Some(false)),
            other => Err(decode_error(
                field,
                format!("cannot parse '{other}' as a boolean"),
            )),
        },
        other => Err(decode_error(
            field,
            format!("expected a boolean, found {}", describe(other)),
        )),
    }
}
