// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! ffmap InfluxDB Exporter
//!
//! Export data from ffmap-backend `nodes.json` and `graph.json` to InfluxDB.
//!
//! # Usage
//!
//! ```bash
//! # Create database, retention policy and unprivileged user
//! ffmap-export setup-db --admin-user root --admin-password root
//!
//! # Export one snapshot
//! ffmap-export insert-data
//!
//! # Print Line Protocol instead of writing it
//! ffmap-export insert-data --dry-run --nodes-url nodes.json --graph-url graph.json
//!
//! # Using configuration file
//! ffmap-export --config ffmap-export.yaml insert-data
//! ```

mod fetch;
mod influxdb;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use ffmap_influx_sink::config::{AdminConfig, InfluxDbConfig, SourcesConfig};
use ffmap_influx_sink::{export, ExportConfig, LineProtocolWriter, NodesDocument, TopologyGraph};
use reqwest::blocking::Client;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use crate::influxdb::{AdminClient, InfluxDbClient, StatementOutcome};

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Export data from ffmap-backend nodes.json to InfluxDB
#[derive(Parser, Debug)]
#[command(name = "ffmap-export")]
#[command(author = "naskel.com")]
#[command(version)]
#[command(about = "Export data from ffmap-backend nodes.json to InfluxDB")]
struct Cli {
    /// Configuration file path (YAML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Setup unprivileged user, database and retention policy
    SetupDb {
        #[command(flatten)]
        db: DbArgs,

        /// Administrative InfluxDB user
        #[arg(long, alias = "admin_user")]
        admin_user: Option<String>,

        /// Administrative InfluxDB password
        #[arg(long, alias = "admin_password")]
        admin_password: Option<String>,
    },

    /// Fetch nodes.json and graph.json and export them to InfluxDB
    InsertData {
        #[command(flatten)]
        db: DbArgs,

        /// URL or path of nodes.json generated by ffmap-backend
        #[arg(long, alias = "nodes_url")]
        nodes_url: Option<String>,

        /// URL or path of graph.json generated by ffmap-backend
        #[arg(long, alias = "graph_url")]
        graph_url: Option<String>,

        /// Skip link export
        #[arg(long)]
        no_links: bool,

        /// Print Line Protocol to stdout instead of writing to InfluxDB
        #[arg(long)]
        dry_run: bool,

        /// HTTP request timeout (seconds)
        #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
        timeout: u64,
    },
}

/// InfluxDB connection overrides. Unset flags keep the configured value.
#[derive(Args, Debug, Default)]
struct DbArgs {
    /// InfluxDB host
    #[arg(long, alias = "db_host")]
    db_host: Option<String>,

    /// InfluxDB port
    #[arg(long, alias = "db_port")]
    db_port: Option<u16>,

    /// Unprivileged InfluxDB user
    #[arg(long, alias = "db_user")]
    db_user: Option<String>,

    /// Unprivileged InfluxDB password
    #[arg(long, alias = "db_password")]
    db_password: Option<String>,

    /// InfluxDB database
    #[arg(long, alias = "db_name")]
    db_name: Option<String>,
}

impl DbArgs {
    fn apply(&self, config: &mut InfluxDbConfig) {
        if let Some(ref host) = self.db_host {
            config.host = host.clone();
        }
        if let Some(port) = self.db_port {
            config.port = port;
        }
        if let Some(ref user) = self.db_user {
            config.user = user.clone();
        }
        if let Some(ref password) = self.db_password {
            config.password = password.clone();
        }
        if let Some(ref name) = self.db_name {
            config.database = name.clone();
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging (RUST_LOG wins over --log-level)
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let mut config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::SetupDb {
            db,
            admin_user,
            admin_password,
        } => {
            db.apply(&mut config.influxdb);
            apply_admin(&mut config.admin, admin_user, admin_password);
            cmd_setup_db(&config)
        }
        Commands::InsertData {
            db,
            nodes_url,
            graph_url,
            no_links,
            dry_run,
            timeout,
        } => {
            db.apply(&mut config.influxdb);
            apply_sources(&mut config.sources, nodes_url, graph_url);
            cmd_insert_data(&config, !no_links, dry_run, timeout)
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<ExportConfig> {
    match path {
        Some(path) => ExportConfig::from_file(path)
            .with_context(|| format!("failed to load configuration {}", path.display())),
        None => Ok(ExportConfig::default()),
    }
}

fn apply_admin(admin: &mut AdminConfig, user: Option<String>, password: Option<String>) {
    if let Some(user) = user {
        admin.user = user;
    }
    if let Some(password) = password {
        admin.password = password;
    }
}

fn apply_sources(sources: &mut SourcesConfig, nodes_url: Option<String>, graph_url: Option<String>) {
    if let Some(url) = nodes_url {
        sources.nodes_url = url;
    }
    if let Some(url) = graph_url {
        sources.graph_url = url;
    }
}

fn http_client(timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(concat!("ffmap-export/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("failed to build HTTP client")
}

fn cmd_setup_db(config: &ExportConfig) -> Result<()> {
    let admin = AdminClient::new(
        http_client(DEFAULT_TIMEOUT_SECS)?,
        &config.influxdb,
        &config.admin,
    );

    for step in influxdb::provisioning_steps(&config.influxdb) {
        tracing::info!("creating {}", step.label);
        match admin.execute(&step.statement)? {
            StatementOutcome::Applied => {}
            StatementOutcome::AlreadyExists(_) => {
                tracing::info!("{} already exists, skipping", step.label);
            }
            StatementOutcome::Failed(e) => {
                tracing::warn!("{} failed: {}", step.label, e);
            }
        }
    }

    Ok(())
}

fn cmd_insert_data(config: &ExportConfig, with_links: bool, dry_run: bool, timeout: u64) -> Result<()> {
    let http = http_client(timeout)?;

    let nodes = fetch::fetch_document(&http, &config.sources.nodes_url)?;
    let nodes = NodesDocument::from_value(nodes)
        .with_context(|| format!("unusable node document {}", config.sources.nodes_url))?;
    tracing::info!("{} node records", nodes.nodes.len());

    let graph = if with_links {
        let graph = fetch::fetch_document(&http, &config.sources.graph_url)?;
        let graph = TopologyGraph::from_value(graph)
            .with_context(|| format!("unusable topology document {}", config.sources.graph_url))?;
        tracing::info!("{} topology links", graph.links.len());
        Some(graph)
    } else {
        None
    };

    let now = Utc::now();
    if dry_run {
        let mut writer = LineProtocolWriter::new();
        export(&mut writer, &nodes, graph.as_ref(), now)?;
        for line in writer.flush() {
            println!("{}", line);
        }
    } else {
        let mut writer = InfluxDbClient::new(http, &config.influxdb);
        export(&mut writer, &nodes, graph.as_ref(), now)?;
    }

    Ok(())
}
