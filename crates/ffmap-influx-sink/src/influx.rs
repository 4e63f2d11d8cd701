// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Metric points and their InfluxDB Line Protocol encoding.
//!
//! Line Protocol format:
//! ```text
//! measurement,tag1=val1,tag2=val2 field=value timestamp_ns
//! ```
//!
//! See: <https://docs.influxdata.com/influxdb/v1/write_protocols/line_protocol_reference/>

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;

use crate::export::{PointWriter, WriteError};

/// Field name carried by statistics points.
pub const VALUE_FIELD: &str = "value";

/// A value that can be stored in an InfluxDB field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// 64-bit floating point.
    Float(f64),
    /// 64-bit signed integer.
    Integer(i64),
    /// UTF-8 string.
    String(String),
}

impl FieldValue {
    /// Format this value for InfluxDB Line Protocol.
    ///
    /// - Float: written as-is (e.g., `3.14`)
    /// - Integer: suffixed with `i` (e.g., `42i`)
    /// - String: quoted with double quotes, inner quotes escaped (e.g., `"hello"`)
    pub fn to_line_protocol(&self) -> String {
        match self {
            FieldValue::Float(v) => format!("{}", v),
            FieldValue::Integer(v) => format!("{}i", v),
            FieldValue::String(v) => {
                let escaped = v
                    .replace('\\', "\\\\")
                    .replace('"', "\\\"")
                    .replace('\n', "\\n");
                format!("\"{}\"", escaped)
            }
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_line_protocol())
    }
}

/// A tag value. InfluxDB stores every tag as a string; the variant only
/// decides how the value is rendered.
///
/// Booleans render as `True`/`False`, matching the series already stored
/// by the deployed exporter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagValue {
    String(String),
    Bool(bool),
    Int(i64),
}

impl fmt::Display for TagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagValue::String(s) => f.write_str(s),
            TagValue::Bool(b) => f.write_str(render_bool(*b)),
            TagValue::Int(i) => write!(f, "{}", i),
        }
    }
}

impl From<&str> for TagValue {
    fn from(s: &str) -> Self {
        TagValue::String(s.to_string())
    }
}

impl From<String> for TagValue {
    fn from(s: String) -> Self {
        TagValue::String(s)
    }
}

impl From<bool> for TagValue {
    fn from(b: bool) -> Self {
        TagValue::Bool(b)
    }
}

impl From<i64> for TagValue {
    fn from(i: i64) -> Self {
        TagValue::Int(i)
    }
}

/// `True`/`False`, the boolean spelling used in tag and string values.
pub fn render_bool(b: bool) -> &'static str {
    if b {
        "True"
    } else {
        "False"
    }
}

/// Tags identifying the node or link a point belongs to.
pub type TagSet = BTreeMap<String, TagValue>;

/// A single time-series point with exactly one field.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricPoint {
    pub measurement: String,
    pub tags: TagSet,
    pub timestamp: DateTime<Utc>,
    pub field: String,
    pub value: FieldValue,
}

impl MetricPoint {
    pub fn new(
        measurement: impl Into<String>,
        tags: TagSet,
        timestamp: DateTime<Utc>,
        field: impl Into<String>,
        value: FieldValue,
    ) -> Self {
        Self {
            measurement: measurement.into(),
            tags,
            timestamp,
            field: field.into(),
            value,
        }
    }

    /// Encode this point as one Line Protocol line.
    ///
    /// Tags come out sorted by key. Tags with an empty value are left out,
    /// InfluxDB rejects them. A timestamp outside the nanosecond range
    /// (before 1677 or after 2262) is omitted, so the server assigns one.
    pub fn to_line_protocol(&self) -> String {
        let mut line = escape_measurement(&self.measurement);

        for (key, value) in &self.tags {
            let value = value.to_string();
            if value.is_empty() {
                continue;
            }
            line.push(',');
            line.push_str(&escape_tag(key));
            line.push('=');
            line.push_str(&escape_tag(&value));
        }

        line.push(' ');
        line.push_str(&escape_tag(&self.field));
        line.push('=');
        line.push_str(&self.value.to_line_protocol());

        if let Some(ns) = self.timestamp.timestamp_nanos_opt() {
            line.push(' ');
            line.push_str(&ns.to_string());
        }

        line
    }
}

/// Accumulates points as Line Protocol lines.
///
/// Doubles as an in-memory [`PointWriter`], used for dry runs and tests.
pub struct LineProtocolWriter {
    buffer: Vec<String>,
}

impl LineProtocolWriter {
    /// Create a new empty writer.
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Append a single point.
    pub fn write_point(&mut self, point: &MetricPoint) {
        self.buffer.push(point.to_line_protocol());
    }

    /// Flush the buffer, returning all accumulated lines.
    pub fn flush(&mut self) -> Vec<String> {
        std::mem::take(&mut self.buffer)
    }

    /// Get the current number of buffered lines.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

impl Default for LineProtocolWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl PointWriter for LineProtocolWriter {
    fn write_points(&mut self, points: &[MetricPoint]) -> Result<(), WriteError> {
        for point in points {
            self.write_point(point);
        }
        Ok(())
    }
}

/// Encode a batch of points as a newline-separated Line Protocol body.
pub fn encode_batch(points: &[MetricPoint]) -> String {
    points
        .iter()
        .map(MetricPoint::to_line_protocol)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Escape a measurement name for Line Protocol.
/// Backslashes first, then commas, spaces and newlines.
fn escape_measurement(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace(',', "\\,")
        .replace(' ', "\\ ")
        .replace('\n', "\\n")
}

/// Escape tag keys, tag values and field keys.
/// Backslashes first, then commas, equals signs, spaces and newlines.
fn escape_tag(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace(',', "\\,")
        .replace('=', "\\=")
        .replace(' ', "\\ ")
        .replace('\n', "\\n")
}
