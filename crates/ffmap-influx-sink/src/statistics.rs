// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Statistics point construction.
//!
//! One point per flattened statistic: the flat key is the measurement, the
//! node's tags and `lastseen` are shared by every point of the batch.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::coerce::{coerce, CoercionError};
use crate::flatten::{flatten, FlattenError};
use crate::influx::{MetricPoint, TagSet, VALUE_FIELD};

#[derive(Debug, Error)]
pub enum StatisticsError {
    #[error(transparent)]
    Flatten(#[from] FlattenError),

    #[error(transparent)]
    Coercion(#[from] CoercionError),
}

/// Build the point batch for one node's statistics.
///
/// All-or-nothing: the first statistic that cannot be coerced discards the
/// whole batch.
pub fn build_points(
    stats: &Map<String, Value>,
    timestamp: DateTime<Utc>,
    tags: &TagSet,
) -> Result<Vec<MetricPoint>, StatisticsError> {
    let flat = flatten(stats)?;
    let mut points = Vec::with_capacity(flat.len());

    for (key, raw) in &flat {
        let value = coerce(key, raw)?;
        log::trace!("{} {:?} -> {:?}", key, raw, value);
        points.push(MetricPoint::new(
            key.as_str(),
            tags.clone(),
            timestamp,
            VALUE_FIELD,
            value,
        ));
    }

    Ok(points)
}
