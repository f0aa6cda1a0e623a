//! Types for the telemetry stream

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One telemetry record received from the streaming endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryEvent {
    /// Time the vehicle sampled the record
    pub timestamp: DateTime<Utc>,

    /// Vehicle speed (mph)
    pub speed: i32,

    /// Odometer reading (miles)
    pub odometer: f64,

    /// State of charge in percent
    #[serde(rename = "soc")]
    pub state_of_charge: i32,

    /// Elevation (meters)
    pub elevation: i32,

    /// Estimated heading in degrees
    #[serde(rename = "est_heading")]
    pub estimated_heading: i32,

    /// Estimated latitude in degrees
    #[serde(rename = "est_lat")]
    pub estimated_latitude: f64,

    /// Estimated longitude in degrees
    #[serde(rename = "est_lng")]
    pub estimated_longitude: f64,

    /// Power in kW, negative while regenerating
    pub power: i32,

    /// Gear selector token (`P`, `R`, `N`, `D`), empty when unknown
    pub shift_state: String,

    /// Rated range (miles)
    pub range: i32,

    /// Estimated range (miles)
    #[serde(rename = "est_range")]
    pub estimated_range: i32,

    /// Heading in degrees
    pub heading: i32,
}

/// How individual field conversions are treated while parsing a record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseMode {
    /// Fields that fail to convert become zero (or the epoch for the timestamp)
    #[default]
    Lenient,
    /// Any field that fails to convert rejects the whole record
    Strict,
}

/// Reasons a single telemetry record is rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The record did not split into the expected number of fields
    #[error("invalid message from stream: expected {expected} fields, found {found}")]
    InvalidFieldCount { expected: usize, found: usize },

    /// A field could not be converted (strict mode only)
    #[error("invalid value for field {field}: {value:?}")]
    InvalidField { field: &'static str, value: String },
}

/// Errors that can occur while opening or consuming a telemetry stream
#[derive(Debug, Error)]
pub enum StreamError {
    /// HTTP/connection error
    #[error("Connection error: {0}")]
    Connection(#[from] reqwest::Error),

    /// Server returned an error
    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// The vehicle carries no streaming token
    #[error("Vehicle {vehicle_id} has no streaming token")]
    MissingToken { vehicle_id: u64 },

    /// Stream URL could not be built
    #[error("Invalid stream URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// A record could not be parsed; the stream keeps going
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// A line exceeded the configured limit and was discarded
    #[error("Line exceeds {limit} bytes")]
    LineTooLong { limit: usize },

    /// The stream ended; nothing else will arrive from this session
    #[error("Stream closed")]
    Closed,
}

impl StreamError {
    /// Whether this error ends the session
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

/// Result type for streaming operations
pub type StreamResult<T> = std::result::Result<T, StreamError>;
