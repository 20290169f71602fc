//! RFC 8785 JSON Canonicalization Scheme emitter.

use std::fmt::Write as _;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::CanonicalError;
use crate::number::format_number;

/// Maximum nesting depth accepted by the emitter.
pub const MAX_DEPTH: usize = 128;

/// Canonical bytes of a JSON value.
pub fn canonicalize(value: &Value) -> Result<Vec<u8>, CanonicalError> {
    canonical_string(value).map(String::into_bytes)
}

/// Canonical form of a JSON value as a UTF-8 string.
pub fn canonical_string(value: &Value) -> Result<String, CanonicalError> {
    let mut output = String::new();
    emit_value(value, &mut output, 0)?;
    Ok(output)
}

/// Canonical bytes of any serializable value (via its `serde_json` form).
pub fn canonicalize_serializable<T: Serialize>(value: &T) -> Result<Vec<u8>, CanonicalError> {
    let value =
        serde_json::to_value(value).map_err(|e| CanonicalError::Serialization(e.to_string()))?;
    canonicalize(&value)
}

fn emit_value(value: &Value, output: &mut String, depth: usize) -> Result<(), CanonicalError> {
    if depth > MAX_DEPTH {
        return Err(CanonicalError::MaxDepthExceeded {
            max_depth: MAX_DEPTH,
        });
    }

    match value {
        Value::Null => output.push_str("null"),
        Value::Bool(b) => output.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => output.push_str(&format_number(n)?),
        Value::String(s) => emit_string(s, output),
        Value::Array(items) => {
            output.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    output.push(',');
                }
                emit_value(item, output, depth + 1)?;
            }
            output.push(']');
        }
        Value::Object(map) => emit_object(map, output, depth)?,
    }
    Ok(())
}

/// Minimal escaping per RFC 8785 §3.2.2.2.
fn emit_string(s: &str, output: &mut String) {
    output.push('"');
    for c in s.chars() {
        match c {
            '"' => output.push_str("\\\""),
            '\\' => output.push_str("\\\\"),
            '\u{0008}' => output.push_str("\\b"),
            '\u{000C}' => output.push_str("\\f"),
            '\n' => output.push_str("\\n"),
            '\r' => output.push_str("\\r"),
            '\t' => output.push_str("\\t"),
            c if ('\u{0000}'..='\u{001F}').contains(&c) => {
                let _ = write!(output, "\\u{:04x}", c as u32);
            }
            c => output.push(c),
        }
    }
    output.push('"');
}

/// Keys are ordered by their UTF-16 code unit sequence, not by UTF-8 bytes.
fn emit_object(
    map: &Map<String, Value>,
    output: &mut String,
    depth: usize,
) -> Result<(), CanonicalError> {
    let mut entries: Vec<(&String, &Value)> = map.iter().collect();
    entries.sort_by(|(a, _), (b, _)| a.encode_utf16().cmp(b.encode_utf16()));

    output.push('{');
    for (i, (key, value)) in entries.into_iter().enumerate() {
        if i > 0 {
            output.push(',');
        }
        emit_string(key, output);
        output.push(':');
        emit_value(value, output, depth + 1)?;
    }
    output.push('}');
    Ok(())
}
