//! Strict JSON parsing.
//!
//! `serde_json` silently keeps the last value for a repeated key. Governance
//! inputs must not have two readings, so duplicates are rejected after key
//! decoding (`"a"` and `"\u0061"` collide).

use std::collections::BTreeSet;

use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use serde_json::{Map, Number, Value};

use crate::error::CanonicalError;

const DUPLICATE_KEY_MARKER: &str = "duplicate key: ";

/// Parse JSON text, rejecting duplicate object keys.
pub fn parse_strict(input: &str) -> Result<Value, CanonicalError> {
    let mut deserializer = serde_json::Deserializer::from_str(input);
    let value = StrictValue::deserialize(&mut deserializer).map_err(|e| {
        let message = e.to_string();
        match message.strip_prefix(DUPLICATE_KEY_MARKER) {
            // serde_json appends " at line X column Y"
            Some(rest) => CanonicalError::DuplicateKey {
                key: rest.split(" at line ").next().unwrap_or(rest).to_string(),
            },
            None => CanonicalError::Parse(message),
        }
    })?;
    deserializer
        .end()
        .map_err(|e| CanonicalError::Parse(e.to_string()))?;
    Ok(value.0)
}

struct StrictValue(Value);

impl<'de> Deserialize<'de> for StrictValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct StrictVisitor;

        impl<'de> Visitor<'de> for StrictVisitor {
            type Value = Value;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                formatter.write_str("any valid JSON value")
            }

            fn visit_bool<E>(self, v: bool) -> Result<Value, E> {
                Ok(Value::Bool(v))
            }

            fn visit_i64<E>(self, v: i64) -> Result<Value, E> {
                Ok(Value::Number(v.into()))
            }

            fn visit_u64<E>(self, v: u64) -> Result<Value, E> {
                Ok(Value::Number(v.into()))
            }

            fn visit_f64<E>(self, v: f64) -> Result<Value, E>
            where
                E: de::Error,
            {
                Number::from_f64(v)
                    .map(Value::Number)
                    .ok_or_else(|| de::Error::custom("non-finite number"))
            }

            fn visit_str<E>(self, v: &str) -> Result<Value, E> {
                Ok(Value::String(v.to_owned()))
            }

            fn visit_string<E>(self, v: String) -> Result<Value, E> {
                Ok(Value::String(v))
            }

            fn visit_none<E>(self) -> Result<Value, E> {
                Ok(Value::Null)
            }

            fn visit_unit<E>(self) -> Result<Value, E> {
                Ok(Value::Null)
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Value, A::Error>
            where
                A: SeqAccess<'de>,
            {
                let mut items = Vec::new();
                while let Some(item) = seq.next_element::<StrictValue>()? {
                    items.push(item.0);
                }
                Ok(Value::Array(items))
            }

            fn visit_map<A>(self, mut map: A) -> Result<Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut seen = BTreeSet::new();
                let mut object = Map::new();
                while let Some(key) = map.next_key::<String>()? {
                    if !seen.insert(key.clone()) {
                        return Err(de::Error::custom(format!("{DUPLICATE_KEY_MARKER}{key}")));
                    }
                    let value = map.next_value::<StrictValue>()?;
                    object.insert(key, value.0);
                }
                Ok(Value::Object(object))
            }
        }

        deserializer.deserialize_any(StrictVisitor).map(StrictValue)
    }
}
