// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Fallow - Project Expiry and Archival Engine
//!
//! Runs the expiry engine against a JSON state snapshot. The default is a
//! dry run: every transition is evaluated and logged, nothing is changed.
//! With `--no-dry-run` the engine applies its decisions and the resulting
//! state is written back to the snapshot file.
//!
//! Real deployments embed the engine crate and wire their own service
//! clients into [`fallow_engine::Services`]; this binary is the rehearsal
//! and operations harness around the same code path.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use clap::Parser;
use tracing::{error, info};

use fallow_clients::fixture::FixtureState;
use fallow_core::{Clock, FixedClock, SystemClock};
use fallow_engine::{
    BatchRunner, Config, EngineError, LogNotifier, PolicyFamily, RunOptions, Services,
    build_expirer, read_project_id_file,
};

#[derive(Parser)]
#[command(name = "fallow")]
#[command(version, about = "Project expiry and archival engine", long_about = None)]
struct Cli {
    /// Process every project in the snapshot
    #[arg(long)]
    all: bool,

    /// Process a single project by id
    #[arg(long, value_name = "ID")]
    project_id: Option<String>,

    /// Print a census of projects per expiry status and exit
    #[arg(long)]
    status: bool,

    /// Policy family to evaluate: allocation or usage
    #[arg(long, default_value = "allocation", value_name = "FAMILY")]
    family: PolicyFamily,

    /// State snapshot to operate on (falls back to FALLOW_STATE_FILE)
    #[arg(long, value_name = "PATH")]
    state_file: Option<PathBuf>,

    /// Apply decisions and write the snapshot back instead of only logging
    #[arg(long)]
    no_dry_run: bool,

    /// Stop the sweep after this many projects advanced a rung
    #[arg(long, value_name = "N")]
    limit: Option<usize>,

    /// Restrict the sweep to ids listed in this file, one per line
    #[arg(long, value_name = "PATH")]
    project_id_file: Option<PathBuf>,

    /// Evaluate as if today were this date
    #[arg(long, value_name = "YYYY-MM-DD")]
    as_of: Option<NaiveDate>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (from crate directory or parent directories)
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("fallow=info".parse().unwrap())
                .add_directive("fallow_engine=info".parse().unwrap()),
        )
        .init();

    run(Cli::parse()).await
}

async fn run(cli: Cli) -> Result<()> {
    let modes = [cli.all, cli.project_id.is_some(), cli.status];
    if modes.iter().filter(|m| **m).count() != 1 {
        bail!("choose exactly one of --all, --project-id or --status");
    }

    let mut config = Config::from_env()?;
    if cli.no_dry_run {
        config.live = true;
    }

    let state_path = cli
        .state_file
        .or(config.state_file.clone())
        .context("no state snapshot: pass --state-file or set FALLOW_STATE_FILE")?;
    let raw = std::fs::read_to_string(&state_path)
        .with_context(|| format!("cannot read state snapshot {}", state_path.display()))?;
    let fixture = FixtureState::from_json(&raw)
        .with_context(|| format!("cannot parse state snapshot {}", state_path.display()))?;
    let backends = fixture.seed().await;

    let clock: Arc<dyn Clock> = match cli.as_of {
        Some(date) => Arc::new(FixedClock::at_date(date)),
        None => Arc::new(SystemClock),
    };
    let services = Services::from_fixture(&backends, Arc::new(LogNotifier), clock);

    info!(
        family = %cli.family,
        live = config.live,
        state_file = %state_path.display(),
        "starting run"
    );

    let ids = match &cli.project_id_file {
        Some(path) => Some(
            read_project_id_file(path)
                .with_context(|| format!("cannot read id file {}", path.display()))?,
        ),
        None => None,
    };
    let expirer = build_expirer(cli.family, &services, &config);
    let runner = BatchRunner::new(
        services.identity.clone(),
        expirer,
        RunOptions {
            limit: cli.limit,
            ids,
        },
    );

    if cli.status {
        let counts = runner.status_report().await?;
        println!("{:<20} {:>6}", "status", "count");
        for (status, count) in &counts {
            println!("{status:<20} {count:>6}");
        }
    } else if let Some(project_id) = &cli.project_id {
        match runner.run_one(project_id).await {
            Ok(outcome) if outcome.advanced => {
                let next = outcome
                    .next_step
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| "none".to_string());
                println!("{project_id}: advanced to {} (next step {next})", outcome.status);
            }
            Ok(outcome) => {
                println!("{project_id}: unchanged at {}", outcome.status);
            }
            Err(EngineError::NotApplicable { reason }) => {
                println!("{project_id}: skipped ({reason})");
            }
            Err(EngineError::FatalSetup(message)) => bail!(message),
            Err(err) => {
                error!(%project_id, error = %err, "project failed");
                println!("{project_id}: failed ({err})");
            }
        }
    } else {
        let summary = runner.run().await?;
        println!(
            "{} processed, {} advanced, {} skipped, {} errored",
            summary.processed, summary.advanced, summary.skipped, summary.errored
        );
    }

    if config.live {
        let state = FixtureState::capture(&backends).await?;
        std::fs::write(&state_path, state.to_json_pretty()?)
            .with_context(|| format!("cannot write state snapshot {}", state_path.display()))?;
        info!(state_file = %state_path.display(), "state snapshot written back");
    }

    Ok(())
}
