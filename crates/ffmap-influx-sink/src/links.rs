// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Link point construction.
//!
//! Each link becomes one `link` point tagged with both endpoints. The stored
//! `tq` field is the reciprocal of the raw transmission quality.
//!
//! NOTE: raw tq is documented as 0-255, higher is better, which makes the
//! stored value shrink as quality improves. Kept as deployed until someone
//! confirms whether the dashboards expect the inverted value.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::influx::{FieldValue, MetricPoint, TagSet};
use crate::topology::{ResolveError, ResolvedLink, TopologyResolver};

pub const LINK_MEASUREMENT: &str = "link";
pub const TQ_FIELD: &str = "tq";

/// Errors confined to a single link.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("malformed link record: {0}")]
    Record(#[from] serde_json::Error),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("transmission quality is zero")]
    ZeroQuality,

    #[error("transmission quality {0} is not a finite number")]
    InvalidQuality(f64),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LinkRecord {
    pub source: usize,
    pub target: usize,
    pub tq: f64,
    #[serde(default)]
    pub vpn: bool,
    #[serde(default)]
    pub bidirect: bool,
}

impl LinkRecord {
    pub fn from_value(raw: &Value) -> Result<Self, LinkError> {
        Ok(Self::deserialize(raw)?)
    }
}

/// Stored `tq` for a raw transmission quality.
pub fn inverse_quality(raw: f64) -> Result<f64, LinkError> {
    if !raw.is_finite() {
        return Err(LinkError::InvalidQuality(raw));
    }
    if raw == 0.0 {
        return Err(LinkError::ZeroQuality);
    }
    Ok(1.0 / raw)
}

/// Build the point for a resolved link.
pub fn build_point(
    resolved: &ResolvedLink,
    link: &LinkRecord,
    timestamp: DateTime<Utc>,
) -> Result<MetricPoint, LinkError> {
    let tq = inverse_quality(link.tq)?;

    let mut tags = TagSet::new();
    tags.insert("s_nodeid".to_string(), resolved.source_id.clone().into());
    tags.insert("t_nodeid".to_string(), resolved.target_id.clone().into());
    tags.insert(
        "s_hostname".to_string(),
        resolved.source_hostname.clone().into(),
    );
    tags.insert(
        "t_hostname".to_string(),
        resolved.target_hostname.clone().into(),
    );
    tags.insert("bidirect".to_string(), link.bidirect.into());
    tags.insert("vpn".to_string(), link.vpn.into());

    Ok(MetricPoint::new(
        LINK_MEASUREMENT,
        tags,
        timestamp,
        TQ_FIELD,
        FieldValue::Float(tq),
    ))
}

/// Parse, resolve and build one raw link.
pub fn link_point(
    resolver: &TopologyResolver<'_>,
    raw: &Value,
    timestamp: DateTime<Utc>,
) -> Result<MetricPoint, LinkError> {
    let link = LinkRecord::from_value(raw)?;
    let resolved = resolver.resolve(link.source, link.target)?;
    build_point(&resolved, &link, timestamp)
}
