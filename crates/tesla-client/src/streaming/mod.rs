//! Live telemetry streaming
//!
//! The streaming endpoint keeps one HTTP response open and writes a
//! comma-separated record per line. A background reader parses each line and
//! hands the result to the caller over two channels: events and errors.
//!
//! # Example
//!
//! ```no_run
//! use tesla_client::{ClientConfig, Credentials, StreamError, TeslaClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let credentials = Credentials::new("client-id", "client-secret", "me@example.com", "hunter2");
//! let client = TeslaClient::authenticate(ClientConfig::default(), credentials).await?;
//! let vehicle = client.vehicles().await?.remove(0);
//!
//! let mut stream = client.stream(&vehicle).await?;
//!
//! while let Some(item) = stream.next().await {
//!     match item {
//!         Ok(event) => println!("{} mph, {}%", event.speed, event.state_of_charge),
//!         Err(StreamError::Closed) => break,
//!         Err(e) => eprintln!("Skipped record: {}", e),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod lines;
mod parser;
mod reader;
mod session;
mod types;

pub use lines::{LineBuffer, DEFAULT_MAX_LINE_LENGTH};
pub use parser::{parse_record, parse_record_with, RECORD_FIELD_COUNT};
pub use session::{StreamCloser, StreamItem, StreamRequest, TelemetryStream, STREAM_FIELDS};
pub use types::{ParseError, ParseMode, StreamError, StreamResult, TelemetryEvent};
