// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The ffmap-backend node-info document (`nodes.json`).
//!
//! ```text
//! { "version": 1, "timestamp": "...", "nodes": { "<node_id>": {
//!     "nodeinfo": { node_id, hostname, system, software, hardware, location },
//!     "statistics": { ... },
//!     "lastseen": "2020-01-01T00:00:00Z" } } }
//! ```
//!
//! Records stay as raw JSON until they are processed, so one malformed node
//! only fails itself.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::geohash;
use crate::influx::{MetricPoint, TagSet};
use crate::statistics::{self, StatisticsError};

/// The only document version this exporter understands.
pub const SUPPORTED_VERSION: u64 = 1;

/// Role that excludes a node from statistics export.
pub const GATEWAY_ROLE: &str = "gateway";

/// Errors that make a whole document unusable.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("unsupported document version {found} (expected {expected})")]
    UnsupportedVersion { found: u64, expected: u64 },

    #[error("malformed document: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Errors confined to a single node.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("malformed node record: {0}")]
    Record(#[from] serde_json::Error),

    #[error("invalid lastseen '{0}'")]
    Timestamp(String),

    #[error(transparent)]
    Statistics(#[from] StatisticsError),
}

/// Reject documents that declare a version other than [`SUPPORTED_VERSION`].
pub fn check_version(version: Option<u64>) -> Result<(), DocumentError> {
    match version {
        Some(found) if found != SUPPORTED_VERSION => {
            Err(DocumentError::UnsupportedVersion {
                found,
                expected: SUPPORTED_VERSION,
            })
        }
        _ => Ok(()),
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodesDocument {
    #[serde(default)]
    pub version: Option<u64>,
    #[serde(default)]
    pub timestamp: Option<String>,
    /// Raw node records keyed by node id.
    pub nodes: BTreeMap<String, Value>,
}

impl NodesDocument {
    pub fn from_value(value: Value) -> Result<Self, DocumentError> {
        let doc: Self = serde_json::from_value(value)?;
        check_version(doc.version)?;
        Ok(doc)
    }

    pub fn from_json(json: &str) -> Result<Self, DocumentError> {
        Self::from_value(serde_json::from_str(json)?)
    }
}

/// Whether a raw record declares `nodeinfo.system.role == "gateway"`.
///
/// Checked before the record is parsed, so a gateway is skipped even when
/// the rest of its record is incomplete.
pub fn is_gateway(raw: &Value) -> bool {
    raw.pointer("/nodeinfo/system/role").and_then(Value::as_str) == Some(GATEWAY_ROLE)
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeRecord {
    pub nodeinfo: NodeInfo,
    pub statistics: Map<String, Value>,
    pub lastseen: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeInfo {
    pub node_id: String,
    pub hostname: String,
    #[serde(default)]
    pub system: System,
    pub software: Software,
    pub hardware: Hardware,
    /// Kept raw: a malformed location drops the tag, not the node.
    #[serde(default)]
    pub location: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct System {
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Software {
    pub firmware: Firmware,
    pub autoupdater: Autoupdater,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Firmware {
    pub base: String,
    pub release: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Autoupdater {
    pub enabled: bool,
    pub branch: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Hardware {
    pub model: String,
    pub nproc: i64,
}

impl NodeRecord {
    pub fn from_value(raw: &Value) -> Result<Self, NodeError> {
        Ok(Self::deserialize(raw)?)
    }

    /// Tags shared by every point of this node.
    pub fn tags(&self) -> TagSet {
        let info = &self.nodeinfo;
        let mut tags = TagSet::new();
        tags.insert("node_id".to_string(), info.node_id.clone().into());
        tags.insert("hostname".to_string(), info.hostname.clone().into());
        tags.insert(
            "firmware_base".to_string(),
            info.software.firmware.base.clone().into(),
        );
        tags.insert(
            "firmware_release".to_string(),
            info.software.firmware.release.clone().into(),
        );
        tags.insert(
            "autoupdater_enabled".to_string(),
            info.software.autoupdater.enabled.into(),
        );
        tags.insert(
            "autoupdater_branch".to_string(),
            info.software.autoupdater.branch.clone().into(),
        );
        tags.insert(
            "hardware_model".to_string(),
            info.hardware.model.clone().into(),
        );
        tags.insert("hardware_nproc".to_string(), info.hardware.nproc.into());

        if let Some(location) = info.location.as_ref().and_then(location_geohash) {
            tags.insert("location".to_string(), location.into());
        }

        tags
    }

    pub fn timestamp(&self) -> Result<DateTime<Utc>, NodeError> {
        parse_lastseen(&self.lastseen).ok_or_else(|| NodeError::Timestamp(self.lastseen.clone()))
    }

    /// Build this node's statistics batch.
    pub fn points(&self) -> Result<Vec<MetricPoint>, NodeError> {
        let timestamp = self.timestamp()?;
        let tags = self.tags();
        Ok(statistics::build_points(&self.statistics, timestamp, &tags)?)
    }
}

/// Geohash of `{"latitude": .., "longitude": ..}`, if both are usable.
fn location_geohash(location: &Value) -> Option<String> {
    let latitude = location.get("latitude")?.as_f64()?;
    let longitude = location.get("longitude")?.as_f64()?;
    geohash::encode(latitude, longitude, geohash::DEFAULT_PRECISION)
}

/// Parse a `lastseen` value: RFC 3339, or a naive ISO 8601 date-time taken
/// as UTC. Values outside the nanosecond timestamp range are rejected.
pub fn parse_lastseen(s: &str) -> Option<DateTime<Utc>> {
    let parsed = DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
                .map(|naive| Utc.from_utc_datetime(&naive))
        })
        .ok()?;
    parsed.timestamp_nanos_opt().map(|_| parsed)
}
