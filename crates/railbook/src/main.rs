// SPDX-FileCopyrightText: 2026 Railbook Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Railbook - railway seat inventory and booking engine.
//!
//! This is the binary entry point: the chart scheduler daemon plus
//! administrative commands over the same database.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod admin;
mod engine;
mod seed;
mod serve;
mod shutdown;

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};

use railbook_config::RailbookConfig;
use railbook_core::types::{CoachClass, FareQuota};

/// Railbook - railway seat inventory and booking engine.
#[derive(Parser, Debug)]
#[command(name = "railbook", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the chart scheduler until interrupted.
    Serve,
    /// Run a chart stage for one train and journey date now.
    Chart {
        train: String,
        date: NaiveDate,
        #[arg(value_enum)]
        stage: ChartStage,
    },
    /// Show seat availability for a journey.
    Availability {
        train: String,
        from: String,
        to: String,
        date: NaiveDate,
        #[arg(long, default_value = "SL", value_parser = parse_class)]
        class: CoachClass,
        #[arg(long, default_value = "standard", value_parser = parse_quota)]
        quota: FareQuota,
        /// Output JSON.
        #[arg(long)]
        json: bool,
        /// Disable colors.
        #[arg(long)]
        plain: bool,
    },
    /// Register trains and routes from a TOML file.
    Seed { file: PathBuf },
    /// Show a reservation by locator code.
    Lookup {
        locator: String,
        #[arg(long)]
        json: bool,
    },
    /// Cancel a reservation by locator code.
    Cancel { locator: String },
    /// Manage urgent-quota windows and the override.
    Urgent {
        #[command(subcommand)]
        action: UrgentAction,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum ChartStage {
    Preliminary,
    Final,
}

#[derive(Subcommand, Debug)]
enum UrgentAction {
    /// Print stored windows and the override.
    Show,
    /// Add or replace a named window.
    Window {
        name: String,
        /// Comma-separated coach class codes, e.g. `2A,3A`.
        #[arg(long, value_delimiter = ',', value_parser = parse_class, required = true)]
        classes: Vec<CoachClass>,
        /// Local opening time, `HH:MM`.
        #[arg(long)]
        opens: String,
        /// Local closing time (exclusive), `HH:MM`.
        #[arg(long)]
        closes: String,
        #[arg(long, default_value_t = 1)]
        days_before: u32,
    },
    /// Delete a named window.
    RemoveWindow { name: String },
    /// Open the urgent quota regardless of windows.
    Override {
        /// Restrict to these classes (default: all).
        #[arg(long, value_delimiter = ',', value_parser = parse_class)]
        classes: Vec<CoachClass>,
        /// Restrict to these trains (default: all).
        #[arg(long, value_delimiter = ',')]
        trains: Vec<String>,
        /// Expire after this many hours.
        #[arg(long)]
        hours: Option<u32>,
    },
    /// Remove the override.
    Clear,
}

fn parse_class(value: &str) -> Result<CoachClass, String> {
    value
        .to_ascii_uppercase()
        .parse()
        .map_err(|_| format!("unknown coach class `{value}`"))
}

fn parse_quota(value: &str) -> Result<FareQuota, String> {
    value
        .to_ascii_lowercase()
        .parse()
        .map_err(|_| format!("unknown fare quota `{value}` (standard or urgent)"))
}

fn load_config(path: Option<&PathBuf>) -> RailbookConfig {
    let loaded = match path {
        Some(path) => railbook_config::load_and_validate_path(path),
        None => railbook_config::load_and_validate(),
    };
    match loaded {
        Ok(config) => config,
        Err(errors) => {
            railbook_config::render_errors(&errors);
            std::process::exit(1);
        }
    }
}

/// Installs the global tracing subscriber. `RUST_LOG` wins over the config.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("railbook={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref());
    init_tracing(&config.service.log_level);

    let result = match cli.command {
        Some(Commands::Serve) => serve::run_serve(config).await,
        Some(Commands::Chart { train, date, stage }) => {
            admin::run_chart(&config, &train, date, stage).await
        }
        Some(Commands::Availability {
            train,
            from,
            to,
            date,
            class,
            quota,
            json,
            plain,
        }) => {
            let query = admin::AvailabilityQuery {
                train,
                from,
                to,
                date,
                class,
                quota,
            };
            admin::run_availability(&config, query, json, plain).await
        }
        Some(Commands::Seed { file }) => admin::run_seed(&config, &file).await,
        Some(Commands::Lookup { locator, json }) => {
            admin::run_lookup(&config, &locator, json).await
        }
        Some(Commands::Cancel { locator }) => admin::run_cancel(&config, &locator).await,
        Some(Commands::Urgent { action }) => admin::run_urgent(&config, action).await,
        None => {
            println!("railbook: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("railbook: {e}");
        std::process::exit(if e.is_user_facing() { 2 } else { 1 });
    }
}
