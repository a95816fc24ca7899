//! Outbound event sinks for push channels.
//!
//! A sink is the write side of one SSE stream. Writes never block: the
//! channel sink pushes into an unbounded queue that the HTTP response drains.

use axum::response::sse::Event;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::mpsc;

/// Event type announcing the per-session submission address.
pub const ENDPOINT_EVENT: &str = "endpoint";

/// Event type carrying a serialized protocol message.
pub const MESSAGE_EVENT: &str = "message";

/// One server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushEvent {
    pub id: Option<String>,
    pub event: &'static str,
    pub data: String,
}

impl PushEvent {
    pub fn endpoint(token: &str, address: String) -> Self {
        Self {
            id: Some(token.to_string()),
            event: ENDPOINT_EVENT,
            data: address,
        }
    }

    pub fn message(token: &str, data: String) -> Self {
        Self {
            id: Some(token.to_string()),
            event: MESSAGE_EVENT,
            data,
        }
    }

    /// Convert into an axum SSE event.
    pub fn into_sse(self) -> Event {
        let event = Event::default().event(self.event).data(self.data);
        match self.id {
            Some(id) => event.id(id),
            None => event,
        }
    }
}

/// Failure writing to a push channel.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SinkError {
    #[error("push channel is closed")]
    Closed,
    #[error("push channel write failed: {0}")]
    Write(String),
}

/// Write side of a push channel.
pub trait EventSink: Send + Sync {
    /// Write one event.
    fn send(&self, event: PushEvent) -> Result<(), SinkError>;

    /// Terminate the stream with an error. The stream ends after this call.
    fn fail(&self, error: SinkError);

    /// Complete the stream normally.
    fn complete(&self) -> Result<(), SinkError>;
}

/// Item type of the stream handed to the SSE response.
pub type StreamItem = Result<Event, SinkError>;

/// Sink backed by an unbounded tokio channel.
pub struct ChannelSink {
    tx: Mutex<Option<mpsc::UnboundedSender<StreamItem>>>,
}

impl ChannelSink {
    /// Create a sink and the receiver the SSE response will drain.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<StreamItem>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx: Mutex::new(Some(tx)),
            },
            rx,
        )
    }
}

impl EventSink for ChannelSink {
    fn send(&self, event: PushEvent) -> Result<(), SinkError> {
        let guard = self.tx.lock();
        let tx = guard.as_ref().ok_or(SinkError::Closed)?;
        tx.send(Ok(event.into_sse())).map_err(|_| SinkError::Closed)
    }

    fn fail(&self, error: SinkError) {
        if let Some(tx) = self.tx.lock().take() {
            // Receiver may already be gone; nothing else to report to.
            let _ = tx.send(Err(error));
        }
    }

    fn complete(&self) -> Result<(), SinkError> {
        // Dropping the last sender ends the receiving stream.
        match self.tx.lock().take() {
            Some(_) => Ok(()),
            None => Err(SinkError::Closed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_sink_delivers_until_completed() {
        let (sink, mut rx) = ChannelSink::new();
        sink.send(PushEvent::message("a", "{}".into())).unwrap();
        assert!(rx.try_recv().unwrap().is_ok());

        sink.complete().unwrap();
        assert_eq!(
            sink.send(PushEvent::message("a", "{}".into())),
            Err(SinkError::Closed)
        );
        assert_eq!(sink.complete(), Err(SinkError::Closed));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_send_after_receiver_dropped_fails() {
        let (sink, rx) = ChannelSink::new();
        drop(rx);
        assert_eq!(
            sink.send(PushEvent::endpoint("t", "/m/t".into())),
            Err(SinkError::Closed)
        );
    }

    #[test]
    fn test_fail_emits_terminal_error() {
        let (sink, mut rx) = ChannelSink::new();
        sink.fail(SinkError::Write("boom".into()));
        assert_eq!(
            rx.try_recv().unwrap().unwrap_err(),
            SinkError::Write("boom".into())
        );
        assert!(sink.send(PushEvent::message("a", "x".into())).is_err());
    }
}
