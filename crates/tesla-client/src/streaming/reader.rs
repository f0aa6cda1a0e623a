//! Background task that turns the stream body into events

use std::fmt::Display;
use std::time::Duration;

use bytes::Bytes;
use futures::stream::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::lines::LineBuffer;
use super::parser::parse_record_with;
use super::types::{ParseMode, StreamError, StreamResult, TelemetryEvent};
use crate::config::StreamOptions;

/// One slot per channel; a send is complete once the slot is free again
const HANDOFF_CAPACITY: usize = 1;

/// Why the read loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReadExit {
    EndOfStream,
    Transport,
    IdleTimeout,
    Cancelled,
    ConsumerGone,
}

/// Reads one connection body until it ends
///
/// Every complete line is parsed and handed to the consumer on the events or
/// errors channel, one at a time. The body is not polled again until the consumer
/// has received the previous item, so nothing is read ahead of it. When
/// the loop stops for any reason the body is dropped and a single
/// [`StreamError::Closed`] goes out on the errors channel.
pub(crate) struct StreamReader {
    events: mpsc::Sender<TelemetryEvent>,
    errors: mpsc::Sender<StreamError>,
    cancel: CancellationToken,
    lines: LineBuffer,
    parse_mode: ParseMode,
    idle_timeout: Option<Duration>,
}

impl StreamReader {
    /// Create a reader and the receiving ends of its two channels
    pub(crate) fn new(
        options: &StreamOptions,
        cancel: CancellationToken,
    ) -> (
        Self,
        mpsc::Receiver<TelemetryEvent>,
        mpsc::Receiver<StreamError>,
    ) {
        let (events, event_rx) = mpsc::channel(HANDOFF_CAPACITY);
        let (errors, error_rx) = mpsc::channel(HANDOFF_CAPACITY);

        let reader = Self {
            events,
            errors,
            cancel,
            lines: LineBuffer::new(options.max_line_length),
            parse_mode: options.parse_mode,
            idle_timeout: options.idle_timeout(),
        };
        (reader, event_rx, error_rx)
    }

    pub(crate) async fn run<S, E>(mut self, body: S) -> ReadExit
    where
        S: Stream<Item = Result<Bytes, E>> + Unpin,
        E: Display,
    {
        let mut body = body;
        let exit = self.read_loop(&mut body).await;
        drop(body);

        debug!(?exit, "Telemetry stream reader stopped");

        // Fails immediately if the consumer already dropped the receiver
        let _ = self.errors.send(StreamError::Closed).await;
        exit
    }

    async fn read_loop<S, E>(&mut self, body: &mut S) -> ReadExit
    where
        S: Stream<Item = Result<Bytes, E>> + Unpin,
        E: Display,
    {
        loop {
            let next = tokio::select! {
                _ = self.cancel.cancelled() => return ReadExit::Cancelled,
                next = next_chunk(body, self.idle_timeout) => next,
            };

            let chunk = match next {
                Ok(Some(Ok(chunk))) => chunk,
                Ok(Some(Err(e))) => {
                    warn!("Telemetry stream read failed: {}", e);
                    return ReadExit::Transport;
                }
                Ok(None) => {
                    if let Some(line) = self.lines.finish() {
                        if let Err(exit) = self.deliver(Ok(line)).await {
                            return exit;
                        }
                    }
                    return ReadExit::EndOfStream;
                }
                Err(idle) => {
                    warn!("No telemetry received for {:?}, closing stream", idle);
                    return ReadExit::IdleTimeout;
                }
            };

            for line in self.lines.push(&chunk) {
                if let Err(exit) = self.deliver(line).await {
                    return exit;
                }
            }
        }
    }

    async fn deliver(&self, line: StreamResult<String>) -> Result<(), ReadExit> {
        let parsed = line.and_then(|line| {
            trace!(line = %line, "Telemetry record");
            parse_record_with(&line, self.parse_mode).map_err(StreamError::from)
        });

        match parsed {
            Ok(event) => send(&self.events, event, &self.cancel).await,
            Err(e) => send(&self.errors, e, &self.cancel).await,
        }
    }
}

/// Hand one item to the consumer and wait until it has been received
async fn send<T>(
    tx: &mpsc::Sender<T>,
    item: T,
    cancel: &CancellationToken,
) -> Result<(), ReadExit> {
    let handoff = async {
        tx.send(item).await.map_err(|_| ReadExit::ConsumerGone)?;
        // The only slot frees when the receiver takes the item
        let permit = tx.reserve().await.map_err(|_| ReadExit::ConsumerGone)?;
        drop(permit);
        Ok(())
    };

    tokio::select! {
        _ = cancel.cancelled() => Err(ReadExit::Cancelled),
        sent = handoff => sent,
    }
}

/// Next body chunk, or the idle limit that elapsed first
async fn next_chunk<S, E>(
    body: &mut S,
    idle_timeout: Option<Duration>,
) -> Result<Option<Result<Bytes, E>>, Duration>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
{
    match idle_timeout {
        Some(limit) => tokio::time::timeout(limit, body.next())
            .await
            .map_err(|_| limit),
        None => Ok(body.next().await),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streaming::ParseError;
    use std::convert::Infallible;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const RECORD: &str = "1452491619000,65,1234.5,90,100,45,37.1,-122.2,10,D,200,210,60";

    fn reader(
        options: StreamOptions,
    ) -> (
        StreamReader,
        mpsc::Receiver<TelemetryEvent>,
        mpsc::Receiver<StreamError>,
        CancellationToken,
    ) {
        let cancel = CancellationToken::new();
        let (reader, events, errors) = StreamReader::new(&options, cancel.clone());
        (reader, events, errors, cancel)
    }

    fn chunks(parts: &[&'static str]) -> impl Stream<Item = Result<Bytes, Infallible>> + Send + Unpin {
        futures::stream::iter(
            parts
                .iter()
                .map(|p| Ok(Bytes::from_static(p.as_bytes())))
                .collect::<Vec<_>>(),
        )
    }

    #[tokio::test]
    async fn test_end_of_stream_sends_closed() {
        let (reader, mut events, mut errors, _cancel) = reader(StreamOptions::default());
        let body = chunks(&["1452491619000,65,1234.5,90,100,45", ",37.1,-122.2,10,D,200,210,60\n"]);
        let task = tokio::spawn(reader.run(body));

        assert_eq!(events.recv().await.unwrap().speed, 65);
        assert!(matches!(errors.recv().await, Some(StreamError::Closed)));
        assert!(errors.recv().await.is_none());
        assert!(events.recv().await.is_none());
        assert_eq!(task.await.unwrap(), ReadExit::EndOfStream);
    }

    #[tokio::test]
    async fn test_unterminated_final_line_is_parsed() {
        let (reader, mut events, _errors, _cancel) = reader(StreamOptions::default());
        tokio::spawn(reader.run(chunks(&[RECORD])));
        assert_eq!(events.recv().await.unwrap().heading, 60);
    }

    #[tokio::test]
    async fn test_transport_error_ends_stream() {
        let (reader, mut events, mut errors, _cancel) = reader(StreamOptions::default());
        let body = futures::stream::iter(vec![
            Ok(Bytes::from(format!("{}\n", RECORD))),
            Err("connection reset"),
            Ok(Bytes::from(format!("{}\n", RECORD))),
        ]);
        let task = tokio::spawn(reader.run(body));

        assert!(events.recv().await.is_some());
        assert!(matches!(errors.recv().await, Some(StreamError::Closed)));
        assert!(events.recv().await.is_none());
        assert_eq!(task.await.unwrap(), ReadExit::Transport);
    }

    #[tokio::test]
    async fn test_cancel_stops_pending_read() {
        let (reader, _events, mut errors, cancel) = reader(StreamOptions::default());
        let body = futures::stream::pending::<Result<Bytes, Infallible>>();

        let task = tokio::spawn(reader.run(body));
        cancel.cancel();

        assert_eq!(task.await.unwrap(), ReadExit::Cancelled);
        assert!(matches!(errors.recv().await, Some(StreamError::Closed)));
    }

    #[tokio::test]
    async fn test_cancel_stops_pending_handoff() {
        let (reader, _events, mut errors, cancel) = reader(StreamOptions::default());
        let body = chunks(&["1,2,3\n"]);

        let task = tokio::spawn(reader.run(body));
        // Nobody receives the parse error, so the reader waits on the handoff
        for _ in 0..50 {
            tokio::task::yield_now().await;
        }
        cancel.cancel();

        assert!(matches!(
            errors.recv().await,
            Some(StreamError::Parse(ParseError::InvalidFieldCount { found: 3, .. }))
        ));
        assert!(matches!(errors.recv().await, Some(StreamError::Closed)));
        assert_eq!(task.await.unwrap(), ReadExit::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_timeout() {
        let options = StreamOptions {
            idle_timeout_ms: Some(500),
            ..StreamOptions::default()
        };
        let (reader, _events, mut errors, _cancel) = reader(options);
        let body = futures::stream::pending::<Result<Bytes, Infallible>>();

        assert_eq!(reader.run(body).await, ReadExit::IdleTimeout);
        assert!(matches!(errors.recv().await, Some(StreamError::Closed)));
    }

    #[tokio::test]
    async fn test_dropped_consumer_stops_reader() {
        let (reader, events, errors, _cancel) = reader(StreamOptions::default());
        drop(events);
        drop(errors);

        let exit = reader.run(chunks(&["1,2,3\n", "4,5,6\n"])).await;
        assert_eq!(exit, ReadExit::ConsumerGone);
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_waits_for_last_event() {
        let (reader, mut events, mut errors, _cancel) = reader(StreamOptions::default());
        let task = tokio::spawn(reader.run(chunks(&[
            "1452491619000,65,1234.5,90,100,45,37.1,-122.2,10,D,200,210,60\n",
        ])));

        // Closed must not be visible while the event is still unread
        let early = tokio::time::timeout(Duration::from_secs(1), errors.recv()).await;
        assert!(early.is_err());
        assert!(!task.is_finished());

        assert_eq!(events.recv().await.unwrap().speed, 65);
        assert!(matches!(errors.recv().await, Some(StreamError::Closed)));
        assert!(events.recv().await.is_none());
        assert_eq!(task.await.unwrap(), ReadExit::EndOfStream);
    }

    #[tokio::test]
    async fn test_no_read_ahead_of_consumer() {
        let (reader, mut events, _errors, _cancel) = reader(StreamOptions::default());
        let polled = Arc::new(AtomicUsize::new(0));
        let counter = polled.clone();
        let line = format!("{}\n", RECORD);
        let body = futures::stream::iter(vec![
            Ok::<_, Infallible>(Bytes::from(line.clone())),
            Ok(Bytes::from(line.clone())),
            Ok(Bytes::from(line)),
        ])
        .inspect(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        tokio::spawn(reader.run(body));

        for _ in 0..50 {
            tokio::task::yield_now().await;
        }
        assert_eq!(polled.load(Ordering::SeqCst), 1);

        // Each receive releases exactly one more chunk
        assert!(events.recv().await.is_some());
        for _ in 0..50 {
            tokio::task::yield_now().await;
        }
        assert_eq!(polled.load(Ordering::SeqCst), 2);
    }
}
