// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Sensor reading decoding and validation.
//!
//! Decoding and validation form a single fallible step: a payload either
//! becomes a [`SensorReading`] or a [`ReadingError`] describing why it was
//! rejected. Field absence never escapes this boundary as a panic.
//!
//! Expected payload shape:
//!
//! ```json
//! {
//!   "time_read": 1700000000,
//!   "temperature": 21.5,
//!   "humidity": 40.2,
//!   "uptime": { "seconds": 3600 },
//!   "sensor": { "id": "kitchen" }
//! }
//! ```

use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

/// Nanoseconds per second.
pub const NANOS_PER_SEC: i64 = 1_000_000_000;

/// Reasons a payload is rejected.
#[derive(Debug, Error)]
pub enum ReadingError {
    #[error("payload is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("payload is not a JSON object")]
    NotAnObject,

    #[error("missing field '{0}'")]
    MissingField(&'static str),

    #[error("invalid field '{field}': {reason}")]
    InvalidField { field: &'static str, reason: String },
}

/// A validated sensor reading.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorReading {
    /// Read time in seconds since the Unix epoch.
    pub time_read: i64,
    pub temperature: f64,
    pub humidity: f64,
    /// Sensor uptime in seconds.
    pub uptime_seconds: i64,
    /// Sensor metadata, used verbatim as tags.
    pub sensor: BTreeMap<String, String>,
}

/// Document shape before validation. Absent members decode as `Null`.
#[derive(Debug, Deserialize)]
struct RawReading {
    #[serde(default)]
    time_read: Value,
    #[serde(default)]
    temperature: Value,
    #[serde(default)]
    humidity: Value,
    #[serde(default)]
    uptime: Value,
    #[serde(default)]
    sensor: Value,
}

impl SensorReading {
    /// Decode and validate a raw payload.
    pub fn parse(payload: &[u8]) -> Result<Self, ReadingError> {
        let text = std::str::from_utf8(payload)?;
        // Derived structs also accept sequences, so the document kind is
        // checked before mapping members.
        let doc: Value = serde_json::from_str(text)?;
        if !doc.is_object() {
            return Err(ReadingError::NotAnObject);
        }
        let raw = RawReading::deserialize(doc)?;
        Self::from_raw(raw)
    }

    /// Timestamp of the reading in nanoseconds since the Unix epoch.
    pub fn timestamp_ns(&self) -> i64 {
        // Bounds checked during validation.
        self.time_read * NANOS_PER_SEC
    }

    fn from_raw(raw: RawReading) -> Result<Self, ReadingError> {
        let time_read = epoch_seconds("time_read", present("time_read", &raw.time_read)?)?;
        let temperature = float("temperature", present("temperature", &raw.temperature)?)?;
        let humidity = float("humidity", present("humidity", &raw.humidity)?)?;
        let uptime = raw.uptime.get("seconds").unwrap_or(&Value::Null);
        let uptime_seconds = integer("uptime.seconds", present("uptime.seconds", uptime)?)?;
        let sensor = tag_map("sensor", present("sensor", &raw.sensor)?)?;

        Ok(Self {
            time_read,
            temperature,
            humidity,
            uptime_seconds,
            sensor,
        })
    }
}

fn present<'a>(field: &'static str, value: &'a Value) -> Result<&'a Value, ReadingError> {
    if value.is_null() {
        Err(ReadingError::MissingField(field))
    } else {
        Ok(value)
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ReadingError {
    ReadingError::InvalidField {
        field,
        reason: reason.into(),
    }
}

/// Coerce a number or numeric string to a finite float.
fn float(field: &'static str, value: &Value) -> Result<f64, ReadingError> {
    let v = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match v {
        Some(v) if v.is_finite() => Ok(v),
        _ => Err(invalid(field, format!("expected a number, got {}", value))),
    }
}

/// Coerce an integer, a float (truncated toward zero) or an integer string.
fn integer(field: &'static str, value: &Value) -> Result<i64, ReadingError> {
    let v = match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(truncate)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    v.ok_or_else(|| invalid(field, format!("expected an integer, got {}", value)))
}

/// Like [`integer`], but fractional seconds are rejected and the value must
/// survive conversion to nanoseconds.
fn epoch_seconds(field: &'static str, value: &Value) -> Result<i64, ReadingError> {
    if let Value::Number(n) = value {
        if n.as_i64().is_none() && n.as_f64().is_some_and(|f| f.fract() != 0.0) {
            return Err(invalid(field, format!("expected whole seconds, got {}", n)));
        }
    }
    let secs = integer(field, value)?;
    if secs.checked_mul(NANOS_PER_SEC).is_none() {
        return Err(invalid(field, format!("{} seconds overflows a nanosecond timestamp", secs)));
    }
    Ok(secs)
}

fn truncate(f: f64) -> Option<i64> {
    let t = f.trunc();
    if t.is_finite() && t >= i64::MIN as f64 && t < i64::MAX as f64 {
        Some(t as i64)
    } else {
        None
    }
}

/// Convert a JSON object to a tag map. Scalar values keep their text form.
fn tag_map(field: &'static str, value: &Value) -> Result<BTreeMap<String, String>, ReadingError> {
    let obj = value
        .as_object()
        .ok_or_else(|| invalid(field, format!("expected an object, got {}", value)))?;

    obj.iter()
        .map(|(key, val)| {
            let text = match val {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                // Null, arrays and objects are not valid tag values
                _ => {
                    return Err(invalid(
                        field,
                        format!("tag '{}' must be a string, got {}", key, val),
                    ))
                }
            };
            if has_line_break(key) || has_line_break(&text) {
                return Err(invalid(
                    field,
                    format!("tag '{}' contains a line break", key.escape_debug()),
                ));
            }
            Ok((key.clone(), text))
        })
        .collect()
}

fn has_line_break(s: &str) -> bool {
    s.contains(['\n', '\r'])
}
