//! Tesla Owner API Client Library
//!
//! Provides a typed HTTP client for the Tesla owner API: authentication,
//! vehicle metadata and state, remote commands, and the live telemetry stream.
//!
//! # Example
//!
//! ```rust,no_run
//! use tesla_client::{ClientConfig, Credentials, TeslaClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let credentials = Credentials::new("client-id", "client-secret", "me@example.com", "hunter2");
//!     let client = TeslaClient::authenticate(ClientConfig::default(), credentials).await?;
//!
//!     // List vehicles
//!     let vehicles = client.vehicles().await?;
//!     let car = &vehicles[0];
//!
//!     // Read state
//!     let charge = client.charge_state(car).await?;
//!     println!("{}: {}%", car.name(), charge.battery_level);
//!
//!     // Send a command
//!     client.flash_lights(car).await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Streaming
//!
//! See the [`streaming`] module for consuming live telemetry.
//!
//! # Testing
//!
//! The `testing` module provides an in-process mock of the owner API:
//!
//! ```rust,ignore
//! use tesla_client::testing::{MockTeslaApi, TestServer};
//!
//! let server = TestServer::start(MockTeslaApi::new().router()).await?;
//! let client = server.connect().await?;
//! ```

mod auth;
mod client;
mod commands;
mod config;
mod error;
pub mod streaming;
pub mod testing;
mod types;

pub use auth::{Credentials, Token};
pub use client::TeslaClient;
pub use config::{ClientConfig, StreamOptions, DEFAULT_BASE_URL, DEFAULT_STREAM_URL};
pub use error::{Result, TeslaClientError};
pub use types::*;

// Re-export streaming types for convenience
pub use streaming::{
    ParseError, ParseMode, StreamCloser, StreamError, TelemetryEvent, TelemetryStream,
};
