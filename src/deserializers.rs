//! Lenient integer decoding for model answers.
//!
//! Prompts ask for a JSON `number`, so a model may answer `12.5` or `"4"`
//! where the Rust field is an integer. These round instead of rejecting.

use serde::de::Error;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

fn rounded<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let raw = match value {
        Value::Null => return Ok(0.0),
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| D::Error::custom("invalid numeric value"))?,
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return Ok(0.0);
            }
            s.parse::<f64>()
                .map_err(|_| D::Error::custom(format!("expected a number, got '{}'", s)))?
        }
        other => {
            return Err(D::Error::custom(format!("expected a number, got {}", other)));
        }
    };
    let rounded = raw.round();
    if !rounded.is_finite() {
        return Err(D::Error::custom("non-finite numeric value"));
    }
    Ok(rounded)
}

/// Rounds to the nearest integer; negatives clamp to 0.
pub fn de_u32_rounded<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(rounded(deserializer)?.clamp(0.0, u32::MAX as f64) as u32)
}

pub fn de_u8_rounded<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(rounded(deserializer)?.clamp(0.0, u8::MAX as f64) as u8)
}

pub fn de_i64_rounded<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    // `as` saturates at the i64 bounds.
    Ok(rounded(deserializer)? as i64)
}
