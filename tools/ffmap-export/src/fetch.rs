// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Snapshot document retrieval.

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use serde_json::Value;
use std::path::Path;

/// Whether `source` names an HTTP(S) resource rather than a local file.
pub fn is_remote(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

/// Fetch and parse one JSON document from a URL or a local path.
///
/// One attempt only. Any failure here ends the run.
pub fn fetch_document(http: &Client, source: &str) -> Result<Value> {
    if is_remote(source) {
        tracing::info!("fetching {}", source);
        let response = http
            .get(source)
            .send()
            .with_context(|| format!("failed to fetch {}", source))?
            .error_for_status()
            .with_context(|| format!("failed to fetch {}", source))?;
        response
            .json()
            .with_context(|| format!("{} is not valid JSON", source))
    } else {
        read_document(Path::new(source))
    }
}

fn read_document(path: &Path) -> Result<Value> {
    tracing::info!("reading {}", path.display());
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("{} is not valid JSON", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_is_remote() {
        assert!(is_remote("https://api.marburg.freifunk.net/nodes.json"));
        assert!(is_remote("http://localhost/graph.json"));
        assert!(!is_remote("/var/lib/ffmap/nodes.json"));
        assert!(!is_remote("nodes.json"));
    }

    #[test]
    fn test_local_document() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"version": 1, "nodes": {{}}}}"#).unwrap();

        let http = Client::new();
        let value = fetch_document(&http, file.path().to_str().unwrap()).unwrap();
        assert_eq!(value["version"], 1);
        assert!(value["nodes"].is_object());
    }

    #[test]
    fn test_local_document_invalid_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "<html>not json</html>").unwrap();

        let err = read_document(file.path()).unwrap_err();
        assert!(err.to_string().contains("is not valid JSON"));
    }

    #[test]
    fn test_missing_local_document() {
        let err = read_document(Path::new("/nonexistent/nodes.json")).unwrap_err();
        assert!(err.to_string().contains("failed to read"));
    }
}
