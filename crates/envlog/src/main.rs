//! envlog
//!
//! Samples the sensors of one profile and records the readings.

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use envlog::schema::{format_timestamp, hours_before};
use envlog::{BatchRunner, Config, LinuxHardware, RunConfiguration, SqliteStore, ERROR_SENTINEL};
use envlog_hw::ThermalZone;
use std::collections::BTreeSet;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "envlog")]
#[command(about = "Record environmental sensor readings")]
#[command(version)]
struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = "/etc/envlog/config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sample every sensor of a profile once
    Run {
        /// Profile name (default: default_profile from the configuration)
        #[arg(short, long)]
        profile: Option<String>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show recently stored readings
    Recent {
        /// Profile name (default: default_profile from the configuration)
        #[arg(short, long)]
        profile: Option<String>,

        /// How far back to look
        #[arg(long, default_value_t = 24)]
        hours: i64,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging; stdout is reserved for the report
    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.parse()?))
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    info!("Loaded configuration from: {}", cli.config.display());

    match cli.command {
        Commands::Run { profile, json } => {
            let run = config
                .run_configuration(profile.as_deref())
                .context("Invalid configuration")?;
            handle_run(run, json)
        }
        Commands::Recent { profile, hours } => {
            let run = config
                .run_configuration(profile.as_deref())
                .context("Invalid configuration")?;
            handle_recent(&run, hours)
        }
    }
}

fn handle_run(run: RunConfiguration, json: bool) -> Result<()> {
    let store = SqliteStore::new(&run.datastore_dir, &run.table);
    let mut hardware = LinuxHardware::new(&run.i2c_bus, ThermalZone::new(&run.thermal_zone));

    let report = BatchRunner::new(run).run(&mut hardware, &store);

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialize report")?
        );
    } else {
        println!("{}", report);
    }
    Ok(())
}

fn handle_recent(run: &RunConfiguration, hours: i64) -> Result<()> {
    let store = SqliteStore::new(&run.datastore_dir, &run.table);
    let since = hours_before(&Local::now().naive_local(), hours)
        .with_context(|| format!("--hours {} is out of range", hours))?;
    let since = format_timestamp(&since);

    let mut seen = BTreeSet::new();
    for name in &run.sensors {
        if !seen.insert(name.as_str()) {
            continue;
        }

        let rows = store
            .recent_rows(name, &since)
            .with_context(|| format!("Failed to read datastore {}", name))?;
        println!("{} ({} rows)", name, rows.len());

        for row in rows {
            let values = row
                .columns
                .iter()
                .zip(&row.values)
                .map(|(column, value)| match value {
                    Some(v) if *v != ERROR_SENTINEL => format!("{}={:.2}", column, v),
                    _ => format!("{}=n/a", column),
                })
                .collect::<Vec<_>>()
                .join(" ");
            println!("  {}  {}", row.datetime, values);
        }
    }
    Ok(())
}
