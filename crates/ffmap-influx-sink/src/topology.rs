// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Topology graph (`graph.json`) and link endpoint resolution.
//!
//! Links address their endpoints by position in the graph's node list. The
//! node-info document is keyed by node id instead, so every endpoint goes
//! through two lookups:
//!
//! ```text
//! link.source --(graph.nodes[i])--> node_id --(NodeDirectory)--> hostname
//! ```

use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

use crate::nodes::{check_version, DocumentError, NodesDocument};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("link endpoint {index} out of range ({len} topology nodes)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("topology node {index} has no node_id")]
    MissingNodeId { index: usize },

    #[error("no node record with a hostname for '{0}'")]
    UnknownNode(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TopologyNode {
    #[serde(default)]
    pub node_id: Option<String>,
}

/// Topology nodes addressed by position, and the links between them.
///
/// Links stay raw until they are processed (see
/// [`crate::links::LinkRecord`]), so a malformed link only fails itself.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TopologyGraph {
    #[serde(default)]
    pub nodes: Vec<TopologyNode>,
    #[serde(default)]
    pub links: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct TopologyDocument {
    #[serde(default)]
    version: Option<u64>,
    #[serde(default)]
    batadv: Option<TopologyGraph>,
    #[serde(flatten)]
    graph: TopologyGraph,
}

impl TopologyGraph {
    /// Parse a topology document. The graph may sit at the top level or,
    /// as ffmap-backend writes it, under `batadv`.
    pub fn from_value(value: Value) -> Result<Self, DocumentError> {
        let doc: TopologyDocument = serde_json::from_value(value)?;
        check_version(doc.version)?;
        Ok(doc.batadv.unwrap_or(doc.graph))
    }

    pub fn from_json(json: &str) -> Result<Self, DocumentError> {
        Self::from_value(serde_json::from_str(json)?)
    }

    /// Node id of the topology node at `index`.
    pub fn node_id(&self, index: usize) -> Result<&str, ResolveError> {
        let node = self.nodes.get(index).ok_or(ResolveError::IndexOutOfRange {
            index,
            len: self.nodes.len(),
        })?;
        node.node_id
            .as_deref()
            .ok_or(ResolveError::MissingNodeId { index })
    }
}

/// Hostnames of every node in the info document, keyed by node id.
///
/// Gateways are included: links to them still resolve even though their
/// statistics are not exported.
#[derive(Debug, Clone, Default)]
pub struct NodeDirectory {
    hostnames: HashMap<String, String>,
}

impl NodeDirectory {
    pub fn from_document(doc: &NodesDocument) -> Self {
        doc.nodes
            .iter()
            .filter_map(|(node_id, raw)| {
                raw.pointer("/nodeinfo/hostname")
                    .and_then(Value::as_str)
                    .map(|hostname| (node_id.clone(), hostname.to_string()))
            })
            .collect()
    }

    pub fn hostname(&self, node_id: &str) -> Option<&str> {
        self.hostnames.get(node_id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.hostnames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hostnames.is_empty()
    }
}

impl FromIterator<(String, String)> for NodeDirectory {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            hostnames: iter.into_iter().collect(),
        }
    }
}

/// Both endpoints of a link, by id and hostname.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLink {
    pub source_id: String,
    pub target_id: String,
    pub source_hostname: String,
    pub target_hostname: String,
}

/// Joins the topology graph with the node directory.
pub struct TopologyResolver<'a> {
    graph: &'a TopologyGraph,
    directory: &'a NodeDirectory,
}

impl<'a> TopologyResolver<'a> {
    pub fn new(graph: &'a TopologyGraph, directory: &'a NodeDirectory) -> Self {
        Self { graph, directory }
    }

    pub fn resolve(&self, source: usize, target: usize) -> Result<ResolvedLink, ResolveError> {
        let (source_id, source_hostname) = self.endpoint(source)?;
        let (target_id, target_hostname) = self.endpoint(target)?;
        Ok(ResolvedLink {
            source_id,
            target_id,
            source_hostname,
            target_hostname,
        })
    }

    fn endpoint(&self, index: usize) -> Result<(String, String), ResolveError> {
        let node_id = self.graph.node_id(index)?;
        let hostname = self
            .directory
            .hostname(node_id)
            .ok_or_else(|| ResolveError::UnknownNode(node_id.to_string()))?;
        Ok((node_id.to_string(), hostname.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn graph(ids: &[Option<&str>]) -> TopologyGraph {
        TopologyGraph {
            nodes: ids
                .iter()
                .map(|id| TopologyNode {
                    node_id: id.map(str::to_string),
                })
                .collect(),
            links: Vec::new(),
        }
    }

    fn directory(entries: &[(&str, &str)]) -> NodeDirectory {
        entries
            .iter()
            .map(|(id, host)| (id.to_string(), host.to_string()))
            .collect()
    }

    #[test]
    fn test_resolve_both_endpoints() {
        let graph = graph(&[Some("A"), Some("B")]);
        let directory = directory(&[("A", "h1"), ("B", "h2")]);
        let resolver = TopologyResolver::new(&graph, &directory);

        let link = resolver.resolve(0, 1).expect("resolve");
        assert_eq!(
            (
                link.source_id.as_str(),
                link.target_id.as_str(),
                link.source_hostname.as_str(),
                link.target_hostname.as_str()
            ),
            ("A", "B", "h1", "h2")
        );
    }

    #[test]
    fn test_graph_order_differs_from_directory() {
        let graph = graph(&[Some("C"), Some("A"), Some("B")]);
        let directory = directory(&[("A", "h1"), ("B", "h2"), ("C", "h3")]);
        let resolver = TopologyResolver::new(&graph, &directory);

        let link = resolver.resolve(2, 0).expect("resolve");
        assert_eq!(link.source_id, "B");
        assert_eq!(link.target_hostname, "h3");
    }

    #[test]
    fn test_index_out_of_range() {
        let graph = graph(&[Some("A")]);
        let directory = directory(&[("A", "h1")]);
        let resolver = TopologyResolver::new(&graph, &directory);

        assert_eq!(
            resolver.resolve(0, 5),
            Err(ResolveError::IndexOutOfRange { index: 5, len: 1 })
        );
    }

    #[test]
    fn test_topology_node_without_id() {
        let graph = graph(&[Some("A"), None]);
        let directory = directory(&[("A", "h1")]);
        let resolver = TopologyResolver::new(&graph, &directory);

        assert_eq!(
            resolver.resolve(0, 1),
            Err(ResolveError::MissingNodeId { index: 1 })
        );
    }

    #[test]
    fn test_node_missing_from_info_document() {
        let graph = graph(&[Some("A"), Some("Z")]);
        let directory = directory(&[("A", "h1")]);
        let resolver = TopologyResolver::new(&graph, &directory);

        assert_eq!(
            resolver.resolve(0, 1),
            Err(ResolveError::UnknownNode("Z".to_string()))
        );
    }

    #[test]
    fn test_parse_flat_document() {
        let graph = TopologyGraph::from_value(json!({
            "nodes": [{"node_id": "A", "id": "02:00:00:00:00:01"}, {"id": "02:00:00:00:00:02"}],
            "links": [{"source": 0, "target": 1, "tq": 1.2, "vpn": false, "bidirect": true}]
        }))
        .expect("parse");

        assert_eq!(graph.nodes.len(), 2);
        assert_eq!(graph.nodes[0].node_id.as_deref(), Some("A"));
        assert_eq!(graph.nodes[1].node_id, None);
        assert_eq!(graph.links.len(), 1);
    }

    #[test]
    fn test_parse_batadv_document() {
        let graph = TopologyGraph::from_value(json!({
            "version": 1,
            "batadv": {
                "directed": false,
                "nodes": [{"node_id": "A"}, {"node_id": "B"}],
                "links": []
            }
        }))
        .expect("parse");

        assert_eq!(graph.nodes.len(), 2);
        assert!(graph.links.is_empty());
    }

    #[test]
    fn test_parse_wrong_version() {
        let result = TopologyGraph::from_json(r#"{"version": 3, "nodes": [], "links": []}"#);
        assert!(matches!(
            result,
            Err(DocumentError::UnsupportedVersion { found: 3, .. })
        ));
    }

    #[test]
    fn test_directory_from_document() {
        let doc = NodesDocument::from_value(json!({
            "nodes": {
                "A": {"nodeinfo": {"hostname": "h1", "system": {"role": "gateway"}}},
                "B": {"nodeinfo": {}},
                "C": {"nodeinfo": {"hostname": "h3"}}
            }
        }))
        .unwrap();

        let directory = NodeDirectory::from_document(&doc);
        assert_eq!(directory.len(), 2);
        assert_eq!(directory.hostname("A"), Some("h1"));
        assert_eq!(directory.hostname("B"), None);
        assert_eq!(directory.hostname("C"), Some("h3"));
    }
}
