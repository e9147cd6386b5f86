//! Deserializers for the v1 API's stringly-typed fields.

use std::fmt::Display;
use std::str::FromStr;

use serde::de::{self, Deserializer};
use serde::Deserialize;
use serde_json::Value;

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    String(String),
    Number(serde_json::Number),
}

impl StringOrNumber {
    fn into_string(self) -> String {
        match self {
            StringOrNumber::String(s) => s.trim().to_string(),
            StringOrNumber::Number(n) => n.to_string(),
        }
    }
}

/// Parse a number sent either as `"123"` or `123`.
pub fn number<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: Display,
{
    StringOrNumber::deserialize(deserializer)?
        .into_string()
        .parse()
        .map_err(de::Error::custom)
}

/// Like [`number`] but `null` and `""` become `None`.
pub fn optional_number<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: Display,
{
    match Option::<StringOrNumber>::deserialize(deserializer)? {
        None => Ok(None),
        Some(v) => {
            let s = v.into_string();
            if s.is_empty() {
                Ok(None)
            } else {
                s.parse().map(Some).map_err(de::Error::custom)
            }
        }
    }
}

/// An id sent either as a string or a number, kept as a string.
pub fn id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(StringOrNumber::deserialize(deserializer)?.into_string())
}

/// `"1"`/`1`/`true` flags.
pub fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Bool(b) => Ok(b),
        Value::Number(n) => Ok(n.as_f64().is_some_and(|v| v != 0.0)),
        Value::String(s) => Ok(!matches!(s.trim(), "" | "0" | "false")),
        Value::Null => Ok(false),
        other => Err(de::Error::custom(format!("invalid flag: {}", other))),
    }
}

/// An object, or `None` for the API's `0` placeholder on unknown matches.
pub fn object_or_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: serde::de::DeserializeOwned,
{
    match Value::deserialize(deserializer)? {
        v @ Value::Object(_) => serde_json::from_value(v).map(Some).map_err(de::Error::custom),
        _ => Ok(None),
    }
}
