//! Configuration file handling for tesla-cli

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tesla_client::{ClientConfig, Credentials, StreamOptions};

use crate::output::OutputFormat;

/// Configuration for the CLI tool
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// OAuth client id
    pub client_id: Option<String>,
    /// OAuth client secret
    pub client_secret: Option<String>,
    /// Account email
    pub email: Option<String>,
    /// Account password
    pub password: Option<String>,
    /// Owner API base URL
    pub base_url: Option<String>,
    /// Streaming endpoint base URL
    pub stream_url: Option<String>,
    /// Default vehicle (index or VIN)
    pub vehicle: Option<String>,
    /// Default output format
    pub output: Option<String>,
    /// Disable colored output
    pub no_color: Option<bool>,
    /// Telemetry stream settings
    pub stream: Option<StreamOptions>,
}

/// Values given on the command line or through the environment
#[derive(Debug, Default)]
pub struct Overrides<'a> {
    pub client_id: Option<&'a str>,
    pub client_secret: Option<&'a str>,
    pub email: Option<&'a str>,
    pub password: Option<&'a str>,
    pub base_url: Option<&'a str>,
    pub vehicle: Option<&'a str>,
    pub output: Option<OutputFormat>,
    pub no_color: bool,
}

impl Config {
    /// Load configuration from the default config file
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Get the default config file path
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?
            .join("tesla-cli");

        Ok(config_dir.join("config.toml"))
    }

    /// Merge CLI arguments over config file values
    pub fn merge_with_args(&self, args: &Overrides<'_>) -> MergedConfig {
        let pick = |arg: Option<&str>, file: &Option<String>| {
            arg.map(String::from).or_else(|| file.clone())
        };

        let mut client = ClientConfig::default();
        if let Some(base_url) = pick(args.base_url, &self.base_url) {
            client.base_url = base_url;
        }
        if let Some(stream_url) = &self.stream_url {
            client.stream_url = stream_url.clone();
        }
        if let Some(stream) = &self.stream {
            client.stream = stream.clone();
        }

        let output = args
            .output
            .or_else(|| {
                self.output
                    .as_deref()
                    .and_then(|s| OutputFormat::from_str(s, true).ok())
            })
            .unwrap_or_default();

        MergedConfig {
            client_id: pick(args.client_id, &self.client_id),
            client_secret: pick(args.client_secret, &self.client_secret),
            email: pick(args.email, &self.email),
            password: pick(args.password, &self.password),
            vehicle: pick(args.vehicle, &self.vehicle),
            client,
            output,
            no_color: args.no_color || self.no_color.unwrap_or(false),
        }
    }
}

/// Fully resolved configuration after merging CLI args
#[derive(Debug, Clone)]
pub struct MergedConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub vehicle: Option<String>,
    pub client: ClientConfig,
    pub output: OutputFormat,
    pub no_color: bool,
}

impl MergedConfig {
    /// Account credentials; every field is required
    pub fn credentials(&self) -> Result<Credentials> {
        let required = |value: &Option<String>, what: &str, env: &str| {
            value.clone().with_context(|| {
                format!("Missing {}: pass it as a flag, set {} or add it to the config file", what, env)
            })
        };

        Ok(Credentials::new(
            required(&self.client_id, "client id", "TESLA_CLIENT_ID")?,
            required(&self.client_secret, "client secret", "TESLA_CLIENT_SECRET")?,
            required(&self.email, "account email", "TESLA_USERNAME")?,
            required(&self.password, "password", "TESLA_PASSWORD")?,
        ))
    }
}
