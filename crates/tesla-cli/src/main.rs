//! Tesla CLI - Command-line tool for the Tesla owner API
//!
//! Lists vehicles, reads their state, sends remote commands and prints live
//! telemetry from the streaming endpoint.

mod commands;
mod config;
mod output;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tesla_client::{ParseMode, TeslaClient};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::commands::{StateKind, VehicleCommand};
use crate::config::{Config, MergedConfig, Overrides};
use crate::output::{OutputContext, OutputFormat};

#[derive(Parser)]
#[command(name = "tesla-cli")]
#[command(author, version, about = "Tesla owner API CLI")]
#[command(propagate_version = true)]
struct Cli {
    /// OAuth client id
    #[arg(long, env = "TESLA_CLIENT_ID", hide_env_values = true)]
    client_id: Option<String>,

    /// OAuth client secret
    #[arg(long, env = "TESLA_CLIENT_SECRET", hide_env_values = true)]
    client_secret: Option<String>,

    /// Account email
    #[arg(short = 'u', long, env = "TESLA_USERNAME")]
    username: Option<String>,

    /// Account password
    #[arg(long, env = "TESLA_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Owner API base URL
    #[arg(long, env = "TESLA_API_URL")]
    api_url: Option<String>,

    /// Configuration file path
    #[arg(short, long, env = "TESLA_CONFIG")]
    config: Option<PathBuf>,

    /// Vehicle to use: list index, VIN or display name
    #[arg(long, global = true)]
    vehicle: Option<String>,

    /// Output format
    #[arg(short, long, value_enum)]
    output: Option<OutputFormat>,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Minimal output (for scripting)
    #[arg(short, long)]
    quiet: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the vehicles on the account
    Vehicles,

    /// Show a vehicle state
    State {
        #[arg(value_enum)]
        kind: StateKind,
    },

    /// Send a remote command
    Command {
        #[command(subcommand)]
        action: VehicleCommand,
    },

    /// Wake the vehicle up
    Wake,

    /// Print live telemetry (Ctrl+C to stop)
    Stream {
        /// Stop after this many events
        #[arg(long)]
        count: Option<usize>,

        /// Reject records with malformed fields instead of zeroing them
        #[arg(long)]
        strict: bool,

        /// End the session after this many seconds without data
        #[arg(long)]
        idle_timeout: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();

    // Load config file
    let config = if let Some(config_path) = &cli.config {
        Config::load_from(config_path)?
    } else {
        Config::load().unwrap_or_default()
    };

    // Merge CLI args with config
    let mut merged = config.merge_with_args(&Overrides {
        client_id: cli.client_id.as_deref(),
        client_secret: cli.client_secret.as_deref(),
        email: cli.username.as_deref(),
        password: cli.password.as_deref(),
        base_url: cli.api_url.as_deref(),
        vehicle: cli.vehicle.as_deref(),
        output: cli.output,
        no_color: cli.no_color,
    });

    // Create output context
    let ctx = OutputContext::new(merged.output, merged.no_color, cli.quiet);

    // Execute command
    match &cli.command {
        Commands::Vehicles => {
            let client = create_client(&merged).await?;
            commands::vehicles(&client, &ctx).await?;
        }

        Commands::State { kind } => {
            let client = create_client(&merged).await?;
            let vehicle = commands::select_vehicle(&client, merged.vehicle.as_deref()).await?;
            commands::state(&client, &vehicle, *kind, &ctx).await?;
        }

        Commands::Command { action } => {
            let client = create_client(&merged).await?;
            let vehicle = commands::select_vehicle(&client, merged.vehicle.as_deref()).await?;
            commands::command(&client, &vehicle, action, merged.password.as_deref(), &ctx)
                .await?;
        }

        Commands::Wake => {
            let client = create_client(&merged).await?;
            let vehicle = commands::select_vehicle(&client, merged.vehicle.as_deref()).await?;
            commands::wake(&client, &vehicle, &ctx).await?;
        }

        Commands::Stream {
            count,
            strict,
            idle_timeout,
        } => {
            if *strict {
                merged.client.stream.parse_mode = ParseMode::Strict;
            }
            if let Some(seconds) = idle_timeout {
                merged.client.stream.idle_timeout_ms = Some(seconds * 1000);
            }

            let client = create_client(&merged).await?;
            let vehicle = commands::select_vehicle(&client, merged.vehicle.as_deref()).await?;
            commands::stream(&client, &vehicle, *count, &ctx).await?;
        }
    }

    Ok(())
}

/// Authenticate with the merged credentials
async fn create_client(merged: &MergedConfig) -> Result<TeslaClient> {
    let credentials = merged.credentials()?;
    TeslaClient::authenticate(merged.client.clone(), credentials)
        .await
        .context("Failed to authenticate with the Tesla API")
}
