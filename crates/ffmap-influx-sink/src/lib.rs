// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! ffmap InfluxDB Sink
//!
//! Turns ffmap-backend mesh snapshots (`nodes.json` and `graph.json`) into
//! InfluxDB metric points.
//!
//! This crate provides:
//! - Recursive flattening of nested node statistics
//! - Key-driven type coercion of statistic values
//! - Per-node statistics points tagged with node identity
//! - Topology resolution from link indices to node ids and hostnames
//! - Link quality points
//! - An export driver that isolates per-record failures
//! - YAML-based configuration
//!
//! # Overview
//!
//! The sink does NOT perform HTTP requests to InfluxDB. Finished batches go
//! to a [`PointWriter`]; the `ffmap-export` tool supplies one that talks to
//! the database.
//!
//! ```text
//! nodes.json --> NodeRecord --> flatten --> coerce --> MetricPoint ---+
//!                                                                     +--> PointWriter
//! graph.json --> TopologyResolver --> link point --------------------+
//! ```

pub mod coerce;
pub mod config;
pub mod export;
pub mod flatten;
pub mod geohash;
pub mod influx;
pub mod links;
pub mod nodes;
pub mod statistics;
pub mod topology;

pub use config::ExportConfig;
pub use export::{export, ExportDriver, ExportError, ExportReport, PointWriter, WriteError};
pub use influx::{LineProtocolWriter, MetricPoint};
pub use nodes::NodesDocument;
pub use topology::{NodeDirectory, TopologyGraph};
