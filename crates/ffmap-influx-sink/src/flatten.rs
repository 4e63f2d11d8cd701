// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Flattening of nested node statistics.
//!
//! `{"traffic": {"rx": {"bytes": 1}}}` becomes `{"traffic_rx_bytes": 1}`.
//! Keys are unique as long as no source key segment contains [`SEPARATOR`].

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;

/// Joins parent and child key segments.
pub const SEPARATOR: char = '_';

/// Deepest nesting accepted before flattening gives up.
pub const MAX_DEPTH: usize = 32;

/// Flattened statistics, keyed by joined path.
pub type FlatStatistics = BTreeMap<String, Value>;

#[derive(Debug, Error)]
pub enum FlattenError {
    #[error("statistics nested deeper than {max} levels at '{path}'")]
    TooDeep { path: String, max: usize },
}

/// Flatten a nested statistics object into a single-level mapping.
///
/// Objects are recursed into; every other value (including arrays and null)
/// is emitted unchanged under its joined key.
pub fn flatten(stats: &Map<String, Value>) -> Result<FlatStatistics, FlattenError> {
    let mut out = FlatStatistics::new();
    flatten_into(stats, None, 1, &mut out)?;
    Ok(out)
}

fn flatten_into(
    stats: &Map<String, Value>,
    prefix: Option<&str>,
    depth: usize,
    out: &mut FlatStatistics,
) -> Result<(), FlattenError> {
    for (key, value) in stats {
        let path = match prefix {
            Some(prefix) => format!("{}{}{}", prefix, SEPARATOR, key),
            None => key.clone(),
        };

        match value {
            Value::Object(child) => {
                if depth >= MAX_DEPTH {
                    return Err(FlattenError::TooDeep {
                        path,
                        max: MAX_DEPTH,
                    });
                }
                flatten_into(child, Some(&path), depth + 1, out)?;
            }
            leaf => {
                out.insert(path, leaf.clone());
            }
        }
    }
    Ok(())
}
