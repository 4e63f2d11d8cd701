// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Export run orchestration.
//!
//! Walks every node and every link, builds one point batch per record and
//! hands each batch to a [`PointWriter`]. A record that fails is logged,
//! counted and skipped; only an unreachable database ends the run.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

use crate::influx::MetricPoint;
use crate::links::{self, LinkError};
use crate::nodes::{is_gateway, NodeError, NodeRecord, NodesDocument};
use crate::topology::{NodeDirectory, TopologyGraph, TopologyResolver};

/// Destination for finished point batches.
pub trait PointWriter {
    /// Write one batch. Batches are independent; there is no cross-batch
    /// atomicity.
    fn write_points(&mut self, points: &[MetricPoint]) -> Result<(), WriteError>;
}

impl<W: PointWriter + ?Sized> PointWriter for &mut W {
    fn write_points(&mut self, points: &[MetricPoint]) -> Result<(), WriteError> {
        (**self).write_points(points)
    }
}

#[derive(Debug, Error)]
pub enum WriteError {
    /// The database could not be reached. Ends the run.
    #[error("connection failed: {0}")]
    Connection(String),

    /// The database refused this batch. Later batches are still attempted.
    #[error("batch rejected: {0}")]
    Rejected(String),
}

/// Errors that abort an export run.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("database unreachable: {0}")]
    Connection(String),
}

/// Result of processing one node record.
#[derive(Debug)]
pub enum NodeOutcome {
    Points(Vec<MetricPoint>),
    /// Gateways are never exported.
    Gateway,
    Failed(NodeError),
}

/// Process one raw node record into its point batch.
pub fn node_outcome(raw: &Value) -> NodeOutcome {
    if is_gateway(raw) {
        return NodeOutcome::Gateway;
    }
    match NodeRecord::from_value(raw).and_then(|record| record.points()) {
        Ok(points) => NodeOutcome::Points(points),
        Err(e) => NodeOutcome::Failed(e),
    }
}

/// Result of processing one raw link record.
#[derive(Debug)]
pub enum LinkOutcome {
    Point(MetricPoint),
    Failed(LinkError),
}

pub fn link_outcome(
    resolver: &TopologyResolver<'_>,
    raw: &Value,
    timestamp: DateTime<Utc>,
) -> LinkOutcome {
    match links::link_point(resolver, raw, timestamp) {
        Ok(point) => LinkOutcome::Point(point),
        Err(e) => LinkOutcome::Failed(e),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Node,
    Link,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKind::Node => f.write_str("node"),
            RecordKind::Link => f.write_str("link"),
        }
    }
}

/// A record left out of the export, with the reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRecord {
    pub kind: RecordKind,
    pub id: String,
    pub reason: String,
}

/// Counters for one export run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportReport {
    pub nodes_exported: usize,
    pub nodes_gateway: usize,
    pub nodes_failed: usize,
    pub links_exported: usize,
    pub links_failed: usize,
    pub writes_rejected: usize,
    pub points_written: usize,
    pub skipped: Vec<SkippedRecord>,
}

impl fmt::Display for ExportReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "nodes: {} exported, {} gateways, {} failed; links: {} exported, {} failed; \
             {} points written, {} batches rejected",
            self.nodes_exported,
            self.nodes_gateway,
            self.nodes_failed,
            self.links_exported,
            self.links_failed,
            self.points_written,
            self.writes_rejected
        )
    }
}

/// Drives one export run against a writer.
pub struct ExportDriver<W: PointWriter> {
    writer: W,
    report: ExportReport,
}

impl<W: PointWriter> ExportDriver<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            report: ExportReport::default(),
        }
    }

    /// Export statistics for every non-gateway node.
    pub fn export_nodes(&mut self, doc: &NodesDocument) -> Result<(), ExportError> {
        for (node_id, raw) in &doc.nodes {
            match node_outcome(raw) {
                NodeOutcome::Points(points) => {
                    if self.submit(RecordKind::Node, node_id, &points)? {
                        self.report.nodes_exported += 1;
                    }
                }
                NodeOutcome::Gateway => {
                    log::debug!("skipping gateway {}", node_id);
                    self.report.nodes_gateway += 1;
                }
                NodeOutcome::Failed(e) => {
                    self.report.nodes_failed += 1;
                    self.skip(RecordKind::Node, node_id, e.to_string());
                }
            }
        }
        Ok(())
    }

    /// Export one `link` point per topology link, stamped with `timestamp`.
    pub fn export_links(
        &mut self,
        graph: &TopologyGraph,
        directory: &NodeDirectory,
        timestamp: DateTime<Utc>,
    ) -> Result<(), ExportError> {
        if directory.is_empty() && !graph.links.is_empty() {
            log::warn!(
                "no node hostnames known, all {} links will be skipped",
                graph.links.len()
            );
        } else {
            log::debug!(
                "resolving {} links against {} hostnames",
                graph.links.len(),
                directory.len()
            );
        }
        let resolver = TopologyResolver::new(graph, directory);

        for (index, raw) in graph.links.iter().enumerate() {
            let id = link_id(index, raw);
            match link_outcome(&resolver, raw, timestamp) {
                LinkOutcome::Point(point) => {
                    if self.submit(RecordKind::Link, &id, std::slice::from_ref(&point))? {
                        self.report.links_exported += 1;
                    }
                }
                LinkOutcome::Failed(e) => {
                    self.report.links_failed += 1;
                    self.skip(RecordKind::Link, &id, e.to_string());
                }
            }
        }
        Ok(())
    }

    /// End the run and return its report.
    pub fn finish(self) -> ExportReport {
        log::info!("export finished: {}", self.report);
        self.report
    }

    /// Write one batch. `Ok(false)` means the database rejected it.
    fn submit(
        &mut self,
        kind: RecordKind,
        id: &str,
        points: &[MetricPoint],
    ) -> Result<bool, ExportError> {
        if points.is_empty() {
            log::debug!("{} {} has no points", kind, id);
            return Ok(true);
        }

        match self.writer.write_points(points) {
            Ok(()) => {
                self.report.points_written += points.len();
                Ok(true)
            }
            Err(WriteError::Rejected(reason)) => {
                self.report.writes_rejected += 1;
                self.skip(kind, id, format!("write rejected: {}", reason));
                Ok(false)
            }
            Err(WriteError::Connection(reason)) => Err(ExportError::Connection(reason)),
        }
    }

    fn skip(&mut self, kind: RecordKind, id: &str, reason: String) {
        log::warn!("skipping {} {}: {}", kind, id, reason);
        self.report.skipped.push(SkippedRecord {
            kind,
            id: id.to_string(),
            reason,
        });
    }
}

fn link_id(index: usize, raw: &Value) -> String {
    match (
        raw.get("source").and_then(Value::as_u64),
        raw.get("target").and_then(Value::as_u64),
    ) {
        (Some(source), Some(target)) => format!("#{} ({} -> {})", index, source, target),
        _ => format!("#{}", index),
    }
}

/// Run a full export: node statistics, then links when a graph is given.
///
/// Gateway nodes still resolve as link endpoints.
pub fn export<W: PointWriter>(
    writer: W,
    nodes: &NodesDocument,
    graph: Option<&TopologyGraph>,
    timestamp: DateTime<Utc>,
) -> Result<ExportReport, ExportError> {
    let mut driver = ExportDriver::new(writer);
    driver.export_nodes(nodes)?;
    if let Some(graph) = graph {
        let directory = NodeDirectory::from_document(nodes);
        driver.export_links(graph, &directory, timestamp)?;
    }
    Ok(driver.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::influx::LineProtocolWriter;
    use chrono::TimeZone;
    use serde_json::json;

    /// Rejects batches for the `reject` hostname, fails hard when `down`.
    struct ScriptedWriter {
        reject: &'static str,
        down: bool,
        batches: Vec<Vec<MetricPoint>>,
    }

    impl PointWriter for ScriptedWriter {
        fn write_points(&mut self, points: &[MetricPoint]) -> Result<(), WriteError> {
            if self.down {
                return Err(WriteError::Connection("refused".to_string()));
            }
            if points[0].tags.get("hostname").map(|h| h.to_string()).as_deref() == Some(self.reject) {
                return Err(WriteError::Rejected("partial write".to_string()));
            }
            self.batches.push(points.to_vec());
            Ok(())
        }
    }

    fn node(hostname: &str, role: &str, statistics: Value) -> Value {
        json!({
            "nodeinfo": {
                "node_id": hostname,
                "hostname": hostname,
                "system": {"role": role},
                "software": {
                    "firmware": {"base": "gluon", "release": "1.0"},
                    "autoupdater": {"enabled": false, "branch": "beta"}
                },
                "hardware": {"model": "x86", "nproc": 2}
            },
            "statistics": statistics,
            "lastseen": "2020-01-01T00:00:00Z"
        })
    }

    fn document(nodes: Vec<(&str, Value)>) -> NodesDocument {
        NodesDocument {
            version: Some(1),
            timestamp: None,
            nodes: nodes
                .into_iter()
                .map(|(id, raw)| (id.to_string(), raw))
                .collect(),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 1, 1, 0, 5, 0).unwrap()
    }

    #[test]
    fn test_gateway_produces_no_points() {
        let raw = node("gw01", "gateway", json!({"clients": 10, "uptime": 5}));
        assert!(matches!(node_outcome(&raw), NodeOutcome::Gateway));
    }

    #[test]
    fn test_failed_node_isolated() {
        let doc = document(vec![
            ("a", node("a", "node", json!({"clients": "3"}))),
            ("b", node("b", "node", json!({"clients": "lots"}))),
            ("c", node("c", "node", json!({"clients": 4}))),
        ]);
        let mut writer = LineProtocolWriter::new();

        let report = export(&mut writer, &doc, None, now()).expect("export");

        assert_eq!(report.nodes_exported, 2);
        assert_eq!(report.nodes_failed, 1);
        assert_eq!(report.points_written, 2);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].kind, RecordKind::Node);
        assert_eq!(report.skipped[0].id, "b");
        assert_eq!(writer.len(), 2);
    }

    #[test]
    fn test_rejected_write_does_not_block_later_batches() {
        let doc = document(vec![
            ("a", node("a", "node", json!({"clients": 1}))),
            ("b", node("b", "node", json!({"clients": 2}))),
            ("c", node("c", "node", json!({"clients": 3}))),
        ]);
        let mut writer = ScriptedWriter {
            reject: "a",
            down: false,
            batches: Vec::new(),
        };

        let report = export(&mut writer, &doc, None, now()).expect("export");

        assert_eq!(report.writes_rejected, 1);
        assert_eq!(report.nodes_exported, 2);
        assert_eq!(writer.batches.len(), 2);
        assert!(report.skipped[0].reason.contains("partial write"));
    }

    #[test]
    fn test_connection_failure_aborts() {
        let doc = document(vec![("a", node("a", "node", json!({"clients": 1})))]);
        let writer = ScriptedWriter {
            reject: "",
            down: true,
            batches: Vec::new(),
        };

        assert!(matches!(
            export(writer, &doc, None, now()),
            Err(ExportError::Connection(_))
        ));
    }

    #[test]
    fn test_links_resolve_through_gateways() {
        let doc = document(vec![
            ("a", node("a", "node", json!({"clients": 1}))),
            ("gw", node("gw", "gateway", json!({"clients": 1}))),
        ]);
        let graph = TopologyGraph::from_value(json!({
            "nodes": [{"node_id": "gw"}, {"node_id": "a"}, {"node_id": "ghost"}],
            "links": [
                {"source": 1, "target": 0, "tq": 1, "vpn": true},
                {"source": 1, "target": 2, "tq": 1},
                {"source": 0, "target": 1, "tq": 0},
                {"source": "x"}
            ]
        }))
        .unwrap();
        let mut writer = LineProtocolWriter::new();

        let report = export(&mut writer, &doc, Some(&graph), now()).expect("export");

        assert_eq!(report.nodes_exported, 1);
        assert_eq!(report.nodes_gateway, 1);
        assert_eq!(report.links_exported, 1);
        assert_eq!(report.links_failed, 3);

        let link_ids: Vec<&str> = report
            .skipped
            .iter()
            .filter(|s| s.kind == RecordKind::Link)
            .map(|s| s.id.as_str())
            .collect();
        assert_eq!(link_ids, vec!["#1 (1 -> 2)", "#2 (0 -> 1)", "#3"]);

        let lines = writer.flush();
        assert_eq!(
            lines.last().map(String::as_str),
            Some("link,bidirect=False,s_hostname=a,s_nodeid=a,t_hostname=gw,t_nodeid=gw,vpn=True tq=1 1577837100000000000")
        );
    }

    #[test]
    fn test_links_without_directory_all_skipped() {
        let graph = TopologyGraph::from_value(json!({
            "nodes": [{"node_id": "a"}, {"node_id": "b"}],
            "links": [{"source": 0, "target": 1, "tq": 1}, {"source": 1, "target": 0, "tq": 2}]
        }))
        .unwrap();
        let directory = NodeDirectory::default();
        assert!(directory.is_empty());

        let mut writer = LineProtocolWriter::new();
        let mut driver = ExportDriver::new(&mut writer);
        driver.export_links(&graph, &directory, now()).expect("export");
        let report = driver.finish();

        assert_eq!(report.links_exported, 0);
        assert_eq!(report.links_failed, 2);
        assert!(report.skipped.iter().all(|s| s.reason.contains("no node record")));
        assert!(writer.is_empty());
    }

    #[test]
    fn test_report_display() {
        let report = ExportReport {
            nodes_exported: 3,
            nodes_gateway: 1,
            points_written: 12,
            ..Default::default()
        };
        assert_eq!(
            report.to_string(),
            "nodes: 3 exported, 1 gateways, 0 failed; links: 0 exported, 0 failed; \
             12 points written, 0 batches rejected"
        );
    }
}
