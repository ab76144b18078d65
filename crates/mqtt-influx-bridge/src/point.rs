// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Point records and InfluxDB Line Protocol encoding.
//!
//! Line Protocol format:
//! ```text
//! measurement,tag1=val1,tag2=val2 field1=val1,field2=val2 timestamp_ns
//! ```
//!
//! See: <https://docs.influxdata.com/influxdb/v1/write_protocols/line_protocol_reference/>

use crate::reading::SensorReading;
use std::collections::BTreeMap;
use std::fmt;

/// Measurement every sensor reading is stored under.
pub const MEASUREMENT: &str = "sensors";

/// A value that can be stored in an InfluxDB field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue {
    /// 64-bit floating point.
    Float(f64),
    /// 64-bit signed integer.
    Integer(i64),
}

impl FieldValue {
    /// Format this value for InfluxDB Line Protocol.
    ///
    /// - Float: written as-is (e.g., `21.5`)
    /// - Integer: suffixed with `i` (e.g., `42i`)
    pub fn to_line_protocol(&self) -> String {
        match self {
            FieldValue::Float(v) => format!("{}", v),
            FieldValue::Integer(v) => format!("{}i", v),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_line_protocol())
    }
}

/// A single time-stamped, tagged, multi-field record.
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    /// Timestamp in nanoseconds since the Unix epoch.
    pub time_ns: i64,
    pub measurement: String,
    /// Fields in write order.
    pub fields: Vec<(String, FieldValue)>,
    pub tags: BTreeMap<String, String>,
}

impl Point {
    /// Build the point stored for a validated sensor reading.
    pub fn from_reading(reading: &SensorReading) -> Self {
        Self {
            time_ns: reading.timestamp_ns(),
            measurement: MEASUREMENT.to_string(),
            fields: vec![
                ("temp".to_string(), FieldValue::Float(reading.temperature)),
                ("humidity".to_string(), FieldValue::Float(reading.humidity)),
                ("uptime".to_string(), FieldValue::Integer(reading.uptime_seconds)),
                ("time_of_read".to_string(), FieldValue::Integer(reading.time_read)),
            ],
            tags: reading.sensor.clone(),
        }
    }

    /// Look up a field by key.
    pub fn field(&self, key: &str) -> Option<FieldValue> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| *v)
    }

    /// Encode this point as one Line Protocol line.
    ///
    /// Tags are emitted sorted by key. Tags with an empty key or value are
    /// left out since Line Protocol cannot represent them.
    pub fn to_line_protocol(&self) -> String {
        let mut line = escape_measurement(&self.measurement);

        for (key, value) in &self.tags {
            if key.is_empty() || value.is_empty() {
                continue;
            }
            line.push(',');
            line.push_str(&escape_key(key));
            line.push('=');
            line.push_str(&escape_key(value));
        }

        line.push(' ');
        for (i, (key, value)) in self.fields.iter().enumerate() {
            if i > 0 {
                line.push(',');
            }
            line.push_str(&escape_key(key));
            line.push('=');
            line.push_str(&value.to_line_protocol());
        }

        line.push(' ');
        line.push_str(&self.time_ns.to_string());
        line
    }
}

/// Encode a batch of points, one line per point.
pub fn encode_batch(points: &[Point]) -> String {
    points
        .iter()
        .map(Point::to_line_protocol)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Escape a measurement name for Line Protocol.
/// Spaces and commas must be escaped with backslash.
fn escape_measurement(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace(',', "\\,")
        .replace(' ', "\\ ")
        .replace('\n', "\\n")
}

/// Escape tag keys, tag values and field keys.
/// Backslashes go first so a trailing one cannot swallow the separator.
/// Line breaks are written as `\n` to keep one point per line.
fn escape_key(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace(',', "\\,")
        .replace('=', "\\=")
        .replace(' ', "\\ ")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kitchen_reading() -> SensorReading {
        SensorReading {
            time_read: 1_700_000_000,
            temperature: 21.5,
            humidity: 40.2,
            uptime_seconds: 3600,
            sensor: BTreeMap::from([("id".to_string(), "kitchen".to_string())]),
        }
    }

    #[test]
    fn test_field_value_float() {
        assert_eq!(FieldValue::Float(3.15).to_line_protocol(), "3.15");
    }

    #[test]
    fn test_field_value_integer() {
        assert_eq!(FieldValue::Integer(42).to_line_protocol(), "42i");
        assert_eq!(FieldValue::Integer(-7).to_string(), "-7i");
    }

    #[test]
    fn test_point_from_reading() {
        let point = Point::from_reading(&kitchen_reading());

        assert_eq!(point.time_ns, 1_700_000_000_000_000_000);
        assert_eq!(point.measurement, "sensors");
        assert_eq!(point.field("temp"), Some(FieldValue::Float(21.5)));
        assert_eq!(point.field("humidity"), Some(FieldValue::Float(40.2)));
        assert_eq!(point.field("uptime"), Some(FieldValue::Integer(3600)));
        assert_eq!(
            point.field("time_of_read"),
            Some(FieldValue::Integer(1_700_000_000))
        );
        assert_eq!(point.field("missing"), None);
        assert_eq!(point.tags.len(), 1);
        assert_eq!(point.tags["id"], "kitchen");
    }

    #[test]
    fn test_point_line_protocol() {
        let point = Point::from_reading(&kitchen_reading());
        assert_eq!(
            point.to_line_protocol(),
            "sensors,id=kitchen temp=21.5,humidity=40.2,uptime=3600i,time_of_read=1700000000i 1700000000000000000"
        );
    }

    #[test]
    fn test_point_line_protocol_tags_sorted() {
        let mut reading = kitchen_reading();
        reading.sensor.insert("location".into(), "room1".into());
        reading.sensor.insert("building".into(), "north".into());

        let line = Point::from_reading(&reading).to_line_protocol();
        assert!(line.starts_with("sensors,building=north,id=kitchen,location=room1 "));
    }

    #[test]
    fn test_point_line_protocol_escape_special_chars() {
        let point = Point {
            time_ns: 3_000_000_000,
            measurement: "my measurement".into(),
            fields: vec![("field=key".into(), FieldValue::Integer(1))],
            tags: BTreeMap::from([("tag key".to_string(), "tag,value".to_string())]),
        };

        assert_eq!(
            point.to_line_protocol(),
            "my\\ measurement,tag\\ key=tag\\,value field\\=key=1i 3000000000"
        );
    }

    #[test]
    fn test_point_line_protocol_trailing_backslash_keeps_separator() {
        let mut reading = kitchen_reading();
        reading.sensor.insert("path".into(), "C:\\".into());

        let line = Point::from_reading(&reading).to_line_protocol();
        assert!(
            line.starts_with("sensors,id=kitchen,path=C:\\\\ temp=21.5,"),
            "line: {}",
            line
        );
    }

    #[test]
    fn test_point_line_protocol_newline_stays_on_one_line() {
        let mut reading = kitchen_reading();
        reading
            .sensor
            .insert("id".into(), "a\nsensors,id=evil temp=99 1".into());

        let body = encode_batch(&[Point::from_reading(&reading)]);
        assert_eq!(body.lines().count(), 1);
        assert!(
            body.starts_with("sensors,id=a\\nsensors\\,id\\=evil\\ temp\\=99\\ 1 temp=21.5,"),
            "body: {}",
            body
        );
    }

    #[test]
    fn test_point_line_protocol_skips_empty_tags() {
        let mut reading = kitchen_reading();
        reading.sensor.insert("note".into(), String::new());

        let point = Point::from_reading(&reading);
        assert_eq!(point.tags.len(), 2);
        assert!(point.to_line_protocol().starts_with("sensors,id=kitchen temp="));
    }

    #[test]
    fn test_point_without_tags() {
        let mut reading = kitchen_reading();
        reading.sensor.clear();

        let line = Point::from_reading(&reading).to_line_protocol();
        assert!(line.starts_with("sensors temp=21.5,"));
    }

    #[test]
    fn test_encode_batch() {
        let a = Point::from_reading(&kitchen_reading());
        let mut reading = kitchen_reading();
        reading.time_read += 60;
        let b = Point::from_reading(&reading);

        let body = encode_batch(&[a, b]);
        let lines: Vec<_> = body.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with(" 1700000000000000000"));
        assert!(lines[1].ends_with(" 1700000060000000000"));
    }
}
