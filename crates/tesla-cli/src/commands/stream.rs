//! Stream command - live telemetry

use anyhow::{Context, Result};
use tesla_client::{StreamError, TelemetryEvent, TelemetryStream, TeslaClient, Vehicle};

use crate::output::{print_csv_row, OutputContext, OutputFormat, TelemetryRow};

const CSV_HEADERS: [&str; 10] = [
    "time",
    "speed",
    "shift_state",
    "soc",
    "power",
    "range",
    "odometer",
    "latitude",
    "longitude",
    "heading",
];

/// Print telemetry until the stream ends, Ctrl+C, or `limit` events
pub async fn stream(
    client: &TeslaClient,
    vehicle: &Vehicle,
    limit: Option<usize>,
    ctx: &OutputContext,
) -> Result<()> {
    ctx.info(&format!("Streaming telemetry from {}...", vehicle.name()));
    ctx.info("Press Ctrl+C to stop");

    let mut stream = client
        .stream(vehicle)
        .await
        .with_context(|| format!("Failed to open telemetry stream for {}", vehicle.name()))?;

    // Set up Ctrl+C handler
    let closer = stream.closer();
    ctrlc::set_handler(move || closer.close())?;

    if ctx.format == OutputFormat::Csv {
        println!("{}", CSV_HEADERS.join(","));
    }

    let received = consume(&mut stream, limit, |event| print_event(event, ctx), ctx).await;
    stream.close().await;

    ctx.info(&format!("Stream closed after {} event(s)", received));
    Ok(())
}

/// Feed events to `on_event` until the stream closes or `limit` is reached
async fn consume(
    stream: &mut TelemetryStream,
    limit: Option<usize>,
    mut on_event: impl FnMut(&TelemetryEvent),
    ctx: &OutputContext,
) -> usize {
    let mut received = 0usize;
    if limit == Some(0) {
        return received;
    }

    while let Some(item) = stream.next().await {
        match item {
            Ok(event) => {
                on_event(&event);
                received += 1;
                if limit.is_some_and(|limit| received >= limit) {
                    break;
                }
            }
            Err(StreamError::Closed) => break,
            Err(e) => ctx.warn(&format!("Skipped record: {}", e)),
        }
    }
    received
}

fn print_event(event: &TelemetryEvent, ctx: &OutputContext) {
    let row = TelemetryRow::from(event);
    match ctx.format {
        OutputFormat::Table => {
            // Simple inline display for streaming
            println!(
                "[{}] {:>3} mph  {}  {:>3}%  {:>4} kW  {} mi  ({:.5}, {:.5})",
                row.time,
                row.speed,
                row.shift_state,
                row.soc,
                row.power,
                row.range,
                row.latitude,
                row.longitude
            );
        }
        OutputFormat::Json => {
            if let Ok(json) = serde_json::to_string(event) {
                println!("{}", json);
            }
        }
        OutputFormat::Csv => print_csv_row(&row, &CSV_HEADERS),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use pretty_assertions::assert_eq;
    use std::convert::Infallible;
    use tesla_client::StreamOptions;

    fn records(speeds: &[i32]) -> TelemetryStream {
        let body: String = speeds
            .iter()
            .map(|speed| {
                format!(
                    "1452491619000,{},1234.5,90,100,45,37.1,-122.2,10,D,200,210,60\n",
                    speed
                )
            })
            .collect();
        let body = futures::stream::iter(vec![Ok::<_, Infallible>(Bytes::from(body))]);
        TelemetryStream::from_byte_stream(body, &StreamOptions::default())
    }

    fn quiet() -> OutputContext {
        OutputContext::new(OutputFormat::Json, true, true)
    }

    #[tokio::test]
    async fn test_consume_stops_at_limit() {
        let mut stream = records(&[10, 20, 30]);
        let mut seen = Vec::new();

        let received = consume(&mut stream, Some(2), |e| seen.push(e.speed), &quiet()).await;

        assert_eq!(received, 2);
        assert_eq!(seen, vec![10, 20]);
        stream.close().await;
    }

    #[tokio::test]
    async fn test_consume_until_closed() {
        let mut stream = records(&[10, 20, 30]);
        let mut seen = Vec::new();

        let received = consume(&mut stream, None, |e| seen.push(e.speed), &quiet()).await;

        assert_eq!(received, 3);
        assert_eq!(seen, vec![10, 20, 30]);
    }
}
