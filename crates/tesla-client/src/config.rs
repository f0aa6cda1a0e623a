//! Client and stream configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::streaming::{ParseMode, DEFAULT_MAX_LINE_LENGTH};

/// Owner API base URL
pub const DEFAULT_BASE_URL: &str = "https://owner-api.teslamotors.com/api/1";
/// Streaming endpoint base URL
pub const DEFAULT_STREAM_URL: &str = "https://streaming.vn.teslamotors.com";

/// Settings for a [`TeslaClient`](crate::TeslaClient)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// REST API base URL, including the `/api/1` prefix
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Streaming endpoint base URL
    #[serde(default = "default_stream_url")]
    pub stream_url: String,
    /// Total request timeout for REST calls in milliseconds
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,
    /// Connection timeout in milliseconds (REST and streaming)
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,
    /// Telemetry stream settings
    #[serde(default)]
    pub stream: StreamOptions,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_stream_url() -> String {
    DEFAULT_STREAM_URL.to_string()
}

fn default_timeout() -> u64 {
    30_000
}

fn default_connect_timeout() -> u64 {
    10_000
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            stream_url: default_stream_url(),
            timeout_ms: default_timeout(),
            connect_timeout_ms: default_connect_timeout(),
            stream: StreamOptions::default(),
        }
    }
}

impl ClientConfig {
    /// Point both the REST and streaming endpoints at a single server
    ///
    /// The REST API is served under `/api/1` of `origin`.
    pub fn for_origin(origin: &str) -> Self {
        let origin = origin.trim_end_matches('/');
        Self {
            base_url: format!("{}/api/1", origin),
            stream_url: origin.to_string(),
            ..Self::default()
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

/// Settings for the telemetry stream reader
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamOptions {
    /// Longest line buffered before it is discarded
    #[serde(default = "default_max_line_length")]
    pub max_line_length: usize,
    /// End the session when no bytes arrive for this long (milliseconds)
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_ms: Option<u64>,
    /// Field conversion policy for records
    #[serde(default)]
    pub parse_mode: ParseMode,
}

fn default_max_line_length() -> usize {
    DEFAULT_MAX_LINE_LENGTH
}

fn default_idle_timeout() -> Option<u64> {
    Some(60_000)
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            max_line_length: default_max_line_length(),
            idle_timeout_ms: default_idle_timeout(),
            parse_mode: ParseMode::default(),
        }
    }
}

impl StreamOptions {
    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout_ms.map(Duration::from_millis)
    }
}
