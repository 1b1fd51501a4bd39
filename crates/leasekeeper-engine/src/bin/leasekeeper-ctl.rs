// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! leasekeeper-ctl - operator tool for the lease store.
//!
//! Results are printed to stdout as JSON; logs go to stderr. Lease secrets
//! are never printed.

use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::warn;

use leasekeeper_core::config::Config;
use leasekeeper_core::{
    Clock, LeaseStatus, LeaseStore, Provisioner, RenewalService, SystemClock, connect_store,
    parse_lease_text, summarize,
};
use leasekeeper_engine::config::EngineConfig;
use leasekeeper_engine::messaging::OwnerIdDirectory;
use leasekeeper_engine::notification_sweep::{NotificationSweepConfig, NotificationSweeper};
use leasekeeper_engine::status_sweep::{StatusSweepConfig, StatusSweeper};

#[derive(Parser)]
#[command(name = "leasekeeper-ctl")]
#[command(about = "Inspect and manage leased servers tracked by leasekeeper")]
#[command(version)]
struct Cli {
    /// Database connection URL (sqlite: or postgres://)
    #[arg(long, env = "LEASEKEEPER_DATABASE_URL", global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse provisioning text and store the lease for an owner
    Ingest(IngestArgs),
    /// Parse provisioning text and print the result without storing it
    Parse(InputArgs),
    /// List stored leases
    List(ListArgs),
    /// Extend a lease by one month
    Renew(PrivilegedArgs),
    /// Delete a lease and its renewal history
    Delete(PrivilegedArgs),
    /// Show the renewal history of a lease
    History(LeaseArgs),
    /// Summarize all leases by owner, system and configuration
    Summary,
    /// Run one status sweep now
    SweepStatus,
    /// Run one notification sweep now
    SweepNotify,
}

// ── Input ───────────────────────────────────────────────────────────────

#[derive(clap::Args)]
struct InputArgs {
    /// Read provisioning text from this file instead of stdin
    #[arg(long)]
    file: Option<PathBuf>,
}

impl InputArgs {
    fn read(&self) -> anyhow::Result<String> {
        match &self.file {
            Some(path) => std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display())),
            None => {
                let mut text = String::new();
                std::io::stdin()
                    .read_to_string(&mut text)
                    .context("failed to read stdin")?;
                Ok(text)
            }
        }
    }
}

#[derive(clap::Args)]
struct IngestArgs {
    /// Owner of the new lease
    owner: String,
    #[command(flatten)]
    input: InputArgs,
    /// Start of the first term (RFC 3339); defaults to now
    #[arg(long)]
    start: Option<DateTime<Utc>>,
}

#[derive(clap::Args)]
struct ListArgs {
    /// Only leases in this status
    #[arg(long)]
    status: Option<LeaseStatus>,
    /// Only leases held by this owner
    #[arg(long)]
    owner: Option<String>,
}

#[derive(clap::Args)]
struct LeaseArgs {
    /// Lease ID
    id: String,
}

#[derive(clap::Args)]
struct PrivilegedArgs {
    /// Lease ID
    id: String,
    /// Administrator secret
    #[arg(long, env = "LEASEKEEPER_ADMIN_SECRET_INPUT", hide_env_values = true)]
    admin_secret: Option<String>,
}

impl PrivilegedArgs {
    fn secret(&self) -> anyhow::Result<&str> {
        match self.admin_secret.as_deref() {
            Some(secret) if !secret.is_empty() => Ok(secret),
            _ => bail!("--admin-secret or LEASEKEEPER_ADMIN_SECRET_INPUT is required"),
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Load the core configuration (`--database-url` wins over the environment)
/// and open its store.
async fn open_store(database_url: Option<&str>) -> anyhow::Result<(Config, Arc<dyn LeaseStore>)> {
    let url = database_url.context("--database-url or LEASEKEEPER_DATABASE_URL is required")?;
    let config = Config::for_database(url)?;
    let store = connect_store(&config.database_url).await?;
    Ok((config, store))
}

/// Renewal service gated on the configured `LEASEKEEPER_ADMIN_SECRET`.
fn privileged_service(
    config: &Config,
    store: Arc<dyn LeaseStore>,
    clock: Arc<dyn Clock>,
) -> anyhow::Result<RenewalService> {
    let admin = config.require_admin_secret()?.clone();
    Ok(RenewalService::new(store, Arc::new(admin), clock))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "leasekeeper_engine=warn,leasekeeper_core=warn".into()),
        )
        .init();

    if let Err(e) = dotenvy::dotenv() {
        tracing::debug!("No .env file loaded: {}", e);
    }

    let cli = Cli::parse();
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    match cli.command {
        Command::Parse(input) => {
            let parsed = parse_lease_text(&input.read()?);
            if parsed.fields.addresses.is_empty() {
                warn!("No IPv4 address found in input");
            }
            print_json(&parsed)?;
        }

        Command::Ingest(args) => {
            let text = args.input.read()?;
            let (_, store) = open_store(cli.database_url.as_deref()).await?;
            let provisioner = Provisioner::new(store, clock);
            let lease = provisioner
                .provision_text(&args.owner, &text, args.start)
                .await?;
            print_json(&lease)?;
        }

        Command::List(args) => {
            let (_, store) = open_store(cli.database_url.as_deref()).await?;
            let mut leases = match (&args.owner, args.status) {
                (Some(owner), _) => store.list_by_owner(owner).await?,
                (None, Some(status)) => store.list_by_status(&[status]).await?,
                (None, None) => store.list_all().await?,
            };
            if let Some(status) = args.status {
                leases.retain(|lease| lease.status == status);
            }
            print_json(&leases)?;
        }

        Command::Renew(args) => {
            let (config, store) = open_store(cli.database_url.as_deref()).await?;
            let service = privileged_service(&config, store, clock)?;
            let outcome = service.renew(&args.id, args.secret()?).await?;
            print_json(&outcome)?;
        }

        Command::Delete(args) => {
            let (config, store) = open_store(cli.database_url.as_deref()).await?;
            let service = privileged_service(&config, store, clock)?;
            service.delete(&args.id, args.secret()?).await?;
            print_json(&serde_json::json!({ "deleted": args.id }))?;
        }

        Command::History(args) => {
            let (config, store) = open_store(cli.database_url.as_deref()).await?;
            let service = RenewalService::new(store, Arc::new(config.admin_secret), clock);
            print_json(&service.history(&args.id).await?)?;
        }

        Command::Summary => {
            let (_, store) = open_store(cli.database_url.as_deref()).await?;
            print_json(&summarize(&store.list_all().await?))?;
        }

        Command::SweepStatus => {
            let (_, store) = open_store(cli.database_url.as_deref()).await?;
            let sweeper = StatusSweeper::new(store, clock, StatusSweepConfig::default());
            print_json(&sweeper.sweep_once().await?)?;
        }

        Command::SweepNotify => {
            let engine = EngineConfig::from_env()?;
            let (_, store) = open_store(cli.database_url.as_deref()).await?;
            let sweeper = NotificationSweeper::new(
                store,
                engine.messaging_gateway(),
                Arc::new(OwnerIdDirectory),
                clock,
                NotificationSweepConfig {
                    schedule: engine.notification_schedule(),
                    concurrency: engine.notify_concurrency,
                    offset: engine.utc_offset,
                },
            );
            print_json(&sweeper.sweep_once().await?)?;
        }
    }

    Ok(())
}
