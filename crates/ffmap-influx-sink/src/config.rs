// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! YAML configuration for the exporter.
//!
//! Every key is optional; a missing section or field falls back to the
//! defaults the Marburg deployment runs with.

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

pub const DEFAULT_NODES_URL: &str = "https://api.marburg.freifunk.net/nodes.json";
pub const DEFAULT_GRAPH_URL: &str = "https://api.marburg.freifunk.net/graph.json";

/// Top-level exporter configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExportConfig {
    /// InfluxDB connection settings.
    pub influxdb: InfluxDbConfig,
    /// Credentials used by `setup-db`.
    pub admin: AdminConfig,
    /// Where the snapshot documents come from.
    pub sources: SourcesConfig,
}

/// InfluxDB 1.x connection configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InfluxDbConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
}

impl Default for InfluxDbConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8086,
            user: "ffmr".to_string(),
            password: "ffmr".to_string(),
            database: "ffmr".to_string(),
        }
    }
}

impl InfluxDbConfig {
    /// Base URL of the HTTP API, e.g. `http://localhost:8086`.
    pub fn base_url(&self) -> String {
        if self.host.starts_with("http://") || self.host.starts_with("https://") {
            format!("{}:{}", self.host.trim_end_matches('/'), self.port)
        } else {
            format!("http://{}:{}", self.host, self.port)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AdminConfig {
    pub user: String,
    pub password: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            user: "root".to_string(),
            password: "root".to_string(),
        }
    }
}

/// Document locations: `http(s)://` URLs or local file paths.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourcesConfig {
    pub nodes_url: String,
    pub graph_url: String,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            nodes_url: DEFAULT_NODES_URL.to_string(),
            graph_url: DEFAULT_GRAPH_URL.to_string(),
        }
    }
}

/// Configuration parsing errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExportConfig {
    /// Parse configuration from a YAML string. An empty document yields the
    /// defaults.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: ExportConfig = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Parse configuration from a YAML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }
}
