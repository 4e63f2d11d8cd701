// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! InfluxDB 1.x HTTP API client.
//!
//! - `POST /write?db=..` takes a Line Protocol body, answers `204 No Content`
//! - `POST /query?q=..` runs InfluxQL, errors come back inside the JSON body

use anyhow::{bail, Context, Result};
use ffmap_influx_sink::config::{AdminConfig, InfluxDbConfig};
use ffmap_influx_sink::influx::encode_batch;
use ffmap_influx_sink::{MetricPoint, PointWriter, WriteError};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::Deserialize;

/// Writes point batches to one database as the unprivileged user.
pub struct InfluxDbClient {
    http: Client,
    base_url: String,
    database: String,
    user: String,
    password: String,
}

impl InfluxDbClient {
    pub fn new(http: Client, config: &InfluxDbConfig) -> Self {
        Self {
            http,
            base_url: config.base_url(),
            database: config.database.clone(),
            user: config.user.clone(),
            password: config.password.clone(),
        }
    }
}

impl PointWriter for InfluxDbClient {
    fn write_points(&mut self, points: &[MetricPoint]) -> Result<(), WriteError> {
        let response = self
            .http
            .post(format!("{}/write", self.base_url))
            .query(&[
                ("db", self.database.as_str()),
                ("u", self.user.as_str()),
                ("p", self.password.as_str()),
                ("precision", "ns"),
            ])
            .body(encode_batch(points))
            .send()
            .map_err(|e| WriteError::Connection(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!("wrote {} points", points.len());
            return Ok(());
        }

        let message = format!(
            "{}: {}",
            status,
            error_message(&response.text().unwrap_or_default())
        );
        match status {
            // Every later batch would fail the same way.
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => {
                Err(WriteError::Connection(message))
            }
            _ => Err(WriteError::Rejected(message)),
        }
    }
}

/// What InfluxDB made of one administrative statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatementOutcome {
    Applied,
    AlreadyExists(String),
    Failed(String),
}

/// Runs InfluxQL with admin credentials.
pub struct AdminClient {
    http: Client,
    base_url: String,
    user: String,
    password: String,
}

impl AdminClient {
    pub fn new(http: Client, influx: &InfluxDbConfig, admin: &AdminConfig) -> Self {
        Self {
            http,
            base_url: influx.base_url(),
            user: admin.user.clone(),
            password: admin.password.clone(),
        }
    }

    /// Execute one statement. Only transport and authentication problems
    /// are errors; statement failures come back as an outcome.
    pub fn execute(&self, statement: &str) -> Result<StatementOutcome> {
        let response = self
            .http
            .post(format!("{}/query", self.base_url))
            .query(&[
                ("u", self.user.as_str()),
                ("p", self.password.as_str()),
                ("q", statement),
            ])
            .send()
            .with_context(|| format!("InfluxDB at {} is unreachable", self.base_url))?;

        let status = response.status();
        let body = response.text().context("failed to read query response")?;
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            bail!(
                "admin authentication failed for '{}': {}",
                self.user,
                error_message(&body)
            );
        }
        Ok(statement_outcome(&body))
    }
}

/// One provisioning step: a label for the log and its InfluxQL.
pub struct ProvisioningStep {
    pub label: String,
    pub statement: String,
}

/// Database, retention policy, unprivileged user, grant. In that order.
pub fn provisioning_steps(influx: &InfluxDbConfig) -> Vec<ProvisioningStep> {
    let db = quote_identifier(&influx.database);
    let user = quote_identifier(&influx.user);
    vec![
        ProvisioningStep {
            label: format!("database {}", influx.database),
            statement: format!("CREATE DATABASE {}", db),
        },
        ProvisioningStep {
            label: format!("retention policy {}", influx.database),
            statement: format!(
                "CREATE RETENTION POLICY {} ON {} DURATION INF REPLICATION 1 DEFAULT",
                db, db
            ),
        },
        ProvisioningStep {
            label: format!("user {}", influx.user),
            statement: format!(
                "CREATE USER {} WITH PASSWORD {}",
                user,
                quote_string(&influx.password)
            ),
        },
        ProvisioningStep {
            label: format!("grant on {} to {}", influx.database, influx.user),
            statement: format!("GRANT ALL ON {} TO {}", db, user),
        },
    ]
}

/// Quote an InfluxQL identifier.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Quote an InfluxQL string literal.
pub fn quote_string(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

#[derive(Debug, Default, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    results: Vec<StatementResult>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct StatementResult {
    #[serde(default)]
    error: Option<String>,
}

/// Classify a `/query` response body.
pub fn statement_outcome(body: &str) -> StatementOutcome {
    let response: QueryResponse = match serde_json::from_str(body) {
        Ok(response) => response,
        Err(_) => return StatementOutcome::Failed(error_message(body)),
    };

    let error = response
        .error
        .or_else(|| response.results.into_iter().find_map(|r| r.error));
    match error {
        None => StatementOutcome::Applied,
        Some(e) if e.contains("already exists") => StatementOutcome::AlreadyExists(e),
        Some(e) => StatementOutcome::Failed(e),
    }
}

/// Pull the message out of an `{"error": ".."}` body.
pub fn error_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: String,
    }

    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => parsed.error,
        Err(_) if body.trim().is_empty() => "empty response".to_string(),
        Err(_) => body.trim().to_string(),
    }
}
