// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Geohash encoding for node locations.

use ::geohash::Coord;

/// Characters produced for a node `location` tag.
pub const DEFAULT_PRECISION: usize = 12;

/// Encode a coordinate as a geohash of `precision` characters.
///
/// Returns `None` for non-finite or out-of-range coordinates.
pub fn encode(latitude: f64, longitude: f64, precision: usize) -> Option<String> {
    if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
        return None;
    }

    ::geohash::encode(
        Coord {
            x: longitude,
            y: latitude,
        },
        precision,
    )
    .map_err(|e| log::debug!("geohash of ({}, {}) failed: {:?}", latitude, longitude, e))
    .ok()
}
