//! Telemetry stream session

use std::fmt::Display;

use bytes::Bytes;
use futures::stream::Stream;
use reqwest::Client;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::debug;
use url::Url;

use super::reader::StreamReader;
use super::types::{StreamError, StreamResult, TelemetryEvent};
use crate::config::StreamOptions;
use crate::types::Vehicle;

/// Values requested from the streaming endpoint, in query order
pub const STREAM_FIELDS: [&str; 12] = [
    "speed",
    "odometer",
    "soc",
    "elevation",
    "est_heading",
    "est_lat",
    "est_lng",
    "power",
    "shift_state",
    "range",
    "est_range",
    "heading",
];

/// Everything needed to open one streaming connection
#[derive(Debug, Clone)]
pub struct StreamRequest {
    pub vehicle_id: u64,
    pub url: Url,
    pub email: String,
    pub token: String,
}

impl StreamRequest {
    /// Build the request for a vehicle
    ///
    /// The stream authenticates with basic auth: the account email and the
    /// vehicle's first token.
    pub fn for_vehicle(stream_base: &str, email: &str, vehicle: &Vehicle) -> StreamResult<Self> {
        let token = vehicle
            .tokens
            .first()
            .ok_or(StreamError::MissingToken {
                vehicle_id: vehicle.vehicle_id,
            })?
            .clone();

        let url = Url::parse(&format!(
            "{}/stream/{}/?values={}",
            stream_base.trim_end_matches('/'),
            vehicle.vehicle_id,
            STREAM_FIELDS.join(",")
        ))?;

        Ok(Self {
            vehicle_id: vehicle.vehicle_id,
            url,
            email: email.to_string(),
            token,
        })
    }
}

/// Item produced by [`TelemetryStream::next`]
pub type StreamItem = StreamResult<TelemetryEvent>;

/// A live telemetry stream
///
/// Events and errors arrive on two separate channels, each in the order their
/// lines were read. Parse failures are delivered on the errors channel and the
/// stream keeps going. The session ends with exactly one [`StreamError::Closed`];
/// after that both channels yield `None`.
///
/// Each item is handed over only when the consumer receives it, and the next line
/// is not read until then. A consumer of the raw channels must keep receiving
/// from both, since an unreceived error holds back later events.
///
/// # Lifecycle
///
/// - Opened via `TeslaClient::stream()`
/// - Call `close()` to stop the reader and release the connection
/// - Dropping the stream also stops the reader
/// - `into_channels()` hands out the raw receivers and leaves the reader running
///   until the connection ends or both receivers are dropped
pub struct TelemetryStream {
    events: mpsc::Receiver<TelemetryEvent>,
    errors: mpsc::Receiver<StreamError>,
    cancel: CancellationToken,
    guard: DropGuard,
    task: JoinHandle<()>,
    events_open: bool,
    errors_open: bool,
}

impl TelemetryStream {
    /// Connect to the streaming endpoint and start the reader
    ///
    /// Fails without starting a reader if the connection cannot be opened or the
    /// server answers with a non-success status.
    pub(crate) async fn open(
        http: &Client,
        request: StreamRequest,
        options: &StreamOptions,
    ) -> StreamResult<Self> {
        debug!(
            vehicle_id = request.vehicle_id,
            "Connecting to telemetry stream: {}", request.url
        );

        let response = http
            .get(request.url)
            .basic_auth(&request.email, Some(&request.token))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(StreamError::Server { status, message });
        }

        Ok(Self::from_byte_stream(
            Box::pin(response.bytes_stream()),
            options,
        ))
    }

    /// Run a reader over an already-open byte stream
    ///
    /// Must be called inside a Tokio runtime.
    pub fn from_byte_stream<S, E>(body: S, options: &StreamOptions) -> Self
    where
        S: Stream<Item = Result<Bytes, E>> + Send + Unpin + 'static,
        E: Display + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let (reader, events, errors) = StreamReader::new(options, cancel.clone());
        let task = tokio::spawn(async move {
            reader.run(body).await;
        });

        Self {
            events,
            errors,
            guard: cancel.clone().drop_guard(),
            cancel,
            task,
            events_open: true,
            errors_open: true,
        }
    }

    /// Receive the next event
    pub async fn recv_event(&mut self) -> Option<TelemetryEvent> {
        self.events.recv().await
    }

    /// Receive the next error
    pub async fn recv_error(&mut self) -> Option<StreamError> {
        self.errors.recv().await
    }

    /// Receive from whichever channel is ready, events first
    ///
    /// Returns the terminal [`StreamError::Closed`] once, then `None`. Every event
    /// read before the stream ended is returned before `Closed`.
    pub async fn next(&mut self) -> Option<StreamItem> {
        loop {
            if !self.events_open && !self.errors_open {
                return None;
            }

            tokio::select! {
                biased;

                event = self.events.recv(), if self.events_open => match event {
                    Some(event) => return Some(Ok(event)),
                    None => self.events_open = false,
                },
                error = self.errors.recv(), if self.errors_open => match error {
                    Some(error) => return Some(Err(error)),
                    None => self.errors_open = false,
                },
            }
        }
    }

    /// Handle that stops this stream from elsewhere (e.g. a signal handler)
    pub fn closer(&self) -> StreamCloser {
        StreamCloser {
            cancel: self.cancel.clone(),
        }
    }

    /// Whether the reader task has exited
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop the reader, release the connection, and wait for the task to exit
    pub async fn close(self) {
        let Self {
            events,
            errors,
            cancel,
            guard,
            task,
            ..
        } = self;

        // Receivers go first so the terminal send cannot block
        drop(events);
        drop(errors);
        cancel.cancel();
        drop(guard);

        if let Err(e) = task.await {
            debug!("Telemetry stream reader ended abnormally: {}", e);
        }
    }

    /// Detach the reader and return the raw event and error receivers
    pub fn into_channels(
        self,
    ) -> (
        mpsc::Receiver<TelemetryEvent>,
        mpsc::Receiver<StreamError>,
    ) {
        let Self {
            events,
            errors,
            guard,
            ..
        } = self;
        let _ = guard.disarm();
        (events, errors)
    }
}

/// Clonable handle that stops a [`TelemetryStream`]
#[derive(Debug, Clone)]
pub struct StreamCloser {
    cancel: CancellationToken,
}

impl StreamCloser {
    /// Signal the reader to stop; the connection is released on its next step
    pub fn close(&self) {
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use std::time::Duration;

    fn vehicle(tokens: &[&str]) -> Vehicle {
        Vehicle {
            id: 123,
            vehicle_id: 456,
            tokens: tokens.iter().map(|t| t.to_string()).collect(),
            ..Vehicle::default()
        }
    }

    #[test]
    fn test_stream_request_url() {
        let request = StreamRequest::for_vehicle(
            "https://streaming.vn.teslamotors.com/",
            "nobody@example.com",
            &vehicle(&["456", "789"]),
        )
        .unwrap();

        assert_eq!(
            request.url.as_str(),
            "https://streaming.vn.teslamotors.com/stream/456/?values=speed,odometer,soc,elevation,est_heading,est_lat,est_lng,power,shift_state,range,est_range,heading"
        );
        assert_eq!(request.email, "nobody@example.com");
        assert_eq!(request.token, "456");
    }

    #[test]
    fn test_stream_request_without_token() {
        let result = StreamRequest::for_vehicle("http://localhost", "a@b.c", &vehicle(&[]));
        assert!(matches!(
            result,
            Err(StreamError::MissingToken { vehicle_id: 456 })
        ));
    }

    #[tokio::test]
    async fn test_next_ends_after_closed() {
        let body = futures::stream::iter(vec![
            Ok::<_, Infallible>(Bytes::from_static(
                b"1452491619000,65,1234.5,90,100,45,37.1,-122.2,10,D,200,210,60\nbad\n",
            )),
        ]);
        let mut stream = TelemetryStream::from_byte_stream(body, &StreamOptions::default());

        let mut events = 0;
        let mut errors = Vec::new();
        while let Some(item) = stream.next().await {
            match item {
                Ok(_) => events += 1,
                Err(e) => errors.push(e),
            }
        }

        assert_eq!(events, 1);
        assert_eq!(errors.len(), 2);
        assert!(errors.last().unwrap().is_terminal());
        assert!(stream.next().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_never_overtakes_last_event() {
        let body = futures::stream::iter(vec![Ok::<_, Infallible>(Bytes::from_static(
            b"1452491619000,65,1234.5,90,100,45,37.1,-122.2,10,D,200,210,60\n",
        ))]);
        let mut stream = TelemetryStream::from_byte_stream(body, &StreamOptions::default());

        // The event is still unread, so the session cannot have ended
        let early = tokio::time::timeout(Duration::from_secs(1), stream.recv_error()).await;
        assert!(early.is_err());
        assert!(!stream.is_finished());

        assert_eq!(stream.recv_event().await.unwrap().speed, 65);
        assert!(matches!(stream.recv_error().await, Some(StreamError::Closed)));
        assert!(stream.recv_event().await.is_none());
    }

    #[tokio::test]
    async fn test_stop_at_closed_keeps_last_event() {
        for _ in 0..200 {
            let body = futures::stream::iter(vec![Ok::<_, Infallible>(Bytes::from_static(
                b"1452491619000,65,1234.5,90,100,45,37.1,-122.2,10,D,200,210,60\n",
            ))]);
            let mut stream = TelemetryStream::from_byte_stream(body, &StreamOptions::default());

            let mut speeds = Vec::new();
            while let Some(item) = stream.next().await {
                match item {
                    Ok(event) => speeds.push(event.speed),
                    Err(StreamError::Closed) => break,
                    Err(e) => panic!("Unexpected stream error: {}", e),
                }
            }
            assert_eq!(speeds, vec![65]);
        }
    }

    #[tokio::test]
    async fn test_close_stops_reader() {
        let body = futures::stream::pending::<Result<Bytes, Infallible>>();
        let stream = TelemetryStream::from_byte_stream(body, &StreamOptions::default());
        assert!(!stream.is_finished());

        let closer = stream.closer();
        stream.close().await;
        assert!(closer.is_closed());
    }

    #[tokio::test]
    async fn test_closer_delivers_terminal_error() {
        let body = futures::stream::pending::<Result<Bytes, Infallible>>();
        let mut stream = TelemetryStream::from_byte_stream(body, &StreamOptions::default());

        stream.closer().close();

        assert!(matches!(stream.recv_error().await, Some(StreamError::Closed)));
        assert!(stream.recv_error().await.is_none());
        assert!(stream.recv_event().await.is_none());
    }

    #[tokio::test]
    async fn test_into_channels_keeps_reader_running() {
        let (tx, rx) = mpsc::channel::<Result<Bytes, Infallible>>(1);
        let body = channel_body(rx);
        let stream = TelemetryStream::from_byte_stream(body, &StreamOptions::default());
        let (mut events, mut errors) = stream.into_channels();

        tx.send(Ok(Bytes::from_static(
            b"1452491619000,30,1234.5,90,100,45,37.1,-122.2,10,D,200,210,60\n",
        )))
        .await
        .unwrap();
        assert_eq!(events.recv().await.unwrap().speed, 30);

        drop(tx);
        assert!(matches!(errors.recv().await, Some(StreamError::Closed)));
    }

    fn channel_body<T: Send + 'static>(
        rx: mpsc::Receiver<T>,
    ) -> impl Stream<Item = T> + Send + Unpin {
        Box::pin(futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        }))
    }
}
