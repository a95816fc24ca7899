//! Session registry and broadcast dispatcher.
//!
//! [`SseTransport`] owns every live push channel, keyed by the caller's
//! token, together with the process-wide closing flag. Opening a session
//! under a token that is already registered replaces the old entry.

use futures::Stream;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, error, info};
use uuid::Uuid;

use super::error::TransportError;
use super::protocol::ProtocolMessage;
use super::session::{Session, SessionState};
use super::sink::{ChannelSink, EventSink, StreamItem};

/// Outcome of one broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Registry of push-channel sessions.
pub struct SseTransport {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
    closing: AtomicBool,
    message_prefix: String,
}

impl SseTransport {
    /// Create a transport whose clients submit to `<message_prefix>/<token>`.
    pub fn new(message_prefix: impl Into<String>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            closing: AtomicBool::new(false),
            message_prefix: message_prefix.into().trim_end_matches('/').to_string(),
        }
    }

    /// Submission address announced to the session for `token`.
    pub fn endpoint_for(&self, token: &str) -> String {
        format!("{}/{}", self.message_prefix, token)
    }

    pub fn is_closing(&self) -> bool {
        self.closing.load(Ordering::SeqCst)
    }

    /// Open a push channel and return the event stream for the SSE response.
    ///
    /// Dropping the stream (client disconnect) removes the session, unless it
    /// has already been replaced by a newer one under the same token.
    pub fn open_session(self: &Arc<Self>, token: &str) -> Result<SessionStream, TransportError> {
        let (sink, rx) = ChannelSink::new();
        let session = self.register(token, Box::new(sink))?;
        Ok(SessionStream {
            inner: UnboundedReceiverStream::new(rx),
            transport: Arc::clone(self),
            token: session.token.clone(),
            connection_id: session.connection_id,
        })
    }

    /// Register a session writing to `sink` and send its handshake.
    ///
    /// The closing flag is checked under the registry lock, so a session is
    /// either registered before [`shutdown`](Self::shutdown) drains the
    /// registry or rejected.
    pub fn register(
        &self,
        token: &str,
        sink: Box<dyn EventSink>,
    ) -> Result<Arc<Session>, TransportError> {
        debug!("Creating new SSE connection for token: {}", token);
        let session = Arc::new(Session::new(token, sink));
        let previous = {
            let mut sessions = self.sessions.write();
            if self.is_closing() {
                return Err(TransportError::ConnectionRejected);
            }
            sessions.insert(token.to_string(), Arc::clone(&session))
        };
        if let Some(previous) = previous {
            debug!(
                "Session {} replaced connection {}",
                token, previous.connection_id
            );
        }

        if let Err(source) = session.handshake(self.endpoint_for(token)) {
            error!(
                "Failed to send initial endpoint event to session {}: {}",
                token, source
            );
            session.fail(source.clone());
            self.release(token, session.connection_id);
            return Err(TransportError::DeliveryFailure {
                token: token.to_string(),
                source,
            });
        }

        info!("Push channel opened for session {}", token);
        Ok(session)
    }

    /// Close the session for `token`. Returns false if none was registered.
    pub fn close_session(&self, token: &str) -> bool {
        let Some(session) = self.sessions.read().get(token).cloned() else {
            return false;
        };
        session.close();
        self.remove_if_current(token, session.connection_id);
        true
    }

    /// Drop the registry entry for a connection that went away.
    fn release(&self, token: &str, connection_id: Uuid) {
        if let Some(session) = self.remove_if_current(token, connection_id) {
            session.close();
            debug!("Session {} disconnected after {}s", token, session.age_secs());
        }
    }

    fn remove_if_current(&self, token: &str, connection_id: Uuid) -> Option<Arc<Session>> {
        let mut sessions = self.sessions.write();
        match sessions.get(token) {
            Some(current) if current.connection_id == connection_id => sessions.remove(token),
            _ => None,
        }
    }

    /// Send `message` to every open session.
    ///
    /// A failed write is reported to that session's channel and logged;
    /// delivery to the remaining sessions is unaffected.
    pub fn broadcast(&self, message: &ProtocolMessage) -> DeliveryReport {
        let sessions: Vec<Arc<Session>> = self.sessions.read().values().cloned().collect();
        if sessions.is_empty() {
            debug!("No active sessions to broadcast message to");
            return DeliveryReport::default();
        }

        let json = match serde_json::to_string(message) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize message: {}", e);
                return DeliveryReport::default();
            }
        };

        debug!(
            "Attempting to broadcast message to {} active sessions",
            sessions.len()
        );
        let mut report = DeliveryReport::default();
        for session in sessions.iter().filter(|s| s.is_open()) {
            match session.deliver(json.clone()) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    error!("Failed to send message to session {}: {}", session.token, e);
                    session.fail(e);
                    report.failed += 1;
                }
            }
        }
        report
    }

    /// Reject new work, close every session and clear the registry.
    pub fn shutdown(&self) {
        self.closing.store(true, Ordering::SeqCst);
        let sessions = std::mem::take(&mut *self.sessions.write());
        info!(
            "Initiating graceful shutdown with {} active sessions",
            sessions.len()
        );

        for session in sessions.values() {
            session.close();
        }
        info!("Graceful shutdown completed");
    }

    pub fn session_count(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn contains(&self, token: &str) -> bool {
        self.sessions.read().contains_key(token)
    }

    pub fn session_state(&self, token: &str) -> Option<SessionState> {
        self.sessions.read().get(token).map(|s| s.state())
    }
}

/// Event stream of one session, handed to the SSE response.
pub struct SessionStream {
    inner: UnboundedReceiverStream<StreamItem>,
    transport: Arc<SseTransport>,
    token: String,
    connection_id: Uuid,
}

impl Stream for SessionStream {
    type Item = StreamItem;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

impl Drop for SessionStream {
    fn drop(&mut self) {
        self.transport.release(&self.token, self.connection_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::session::test_support::RecordingSink;
    use crate::mcp::sink::{PushEvent, SinkError};
    use futures::StreamExt;
    use serde_json::json;

    fn transport() -> Arc<SseTransport> {
        Arc::new(SseTransport::new("/mcp/message"))
    }

    fn open(transport: &SseTransport, token: &str) -> RecordingSink {
        let sink = RecordingSink::default();
        transport.register(token, Box::new(sink.clone())).unwrap();
        sink
    }

    fn message() -> ProtocolMessage {
        ProtocolMessage::from_value(json!({"id": 1, "result": {}})).unwrap()
    }

    #[test]
    fn test_open_sends_endpoint_event() {
        let transport = transport();
        let sink = open(&transport, "abc");
        assert_eq!(
            sink.events(),
            vec![PushEvent::endpoint("abc", "/mcp/message/abc".into())]
        );
        assert_eq!(transport.session_state("abc"), Some(SessionState::Open));
    }

    #[test]
    fn test_distinct_tokens_are_independent() {
        let transport = transport();
        let _a = open(&transport, "t1");
        let b = open(&transport, "t2");
        assert_eq!(transport.session_count(), 2);

        assert!(transport.close_session("t1"));
        assert!(!transport.contains("t1"));
        assert!(transport.contains("t2"));
        assert!(!b.completed());
        assert_eq!(transport.broadcast(&message()).delivered, 1);
    }

    #[test]
    fn test_same_token_replaces_previous_session() {
        let transport = transport();
        let first = open(&transport, "t");
        let second = open(&transport, "t");
        assert_eq!(transport.session_count(), 1);

        transport.broadcast(&message());
        assert!(first.messages().is_empty());
        assert_eq!(second.messages().len(), 1);
    }

    #[test]
    fn test_broadcast_without_sessions_is_noop() {
        let transport = transport();
        assert_eq!(transport.broadcast(&message()), DeliveryReport::default());
    }

    #[test]
    fn test_broadcast_isolates_failed_session() {
        let transport = transport();
        let a = open(&transport, "a");
        let b = open(&transport, "b");
        a.fail_writes();

        let report = transport.broadcast(&message());
        assert_eq!(
            report,
            DeliveryReport {
                delivered: 1,
                failed: 1
            }
        );
        assert_eq!(b.messages().len(), 1);
        assert_eq!(
            a.failed_with(),
            Some(SinkError::Write("connection reset".into()))
        );
        assert_eq!(transport.session_state("a"), Some(SessionState::Closing));

        // The failed session is skipped from now on.
        let report = transport.broadcast(&message());
        assert_eq!(report.delivered, 1);
        assert_eq!(report.failed, 0);
    }

    #[test]
    fn test_broadcast_then_shutdown_scenario() {
        let transport = transport();
        let a = open(&transport, "a");
        let b = open(&transport, "b");

        let msg = ProtocolMessage::from_value(json!({"id": 1, "result": null})).unwrap();
        transport.broadcast(&msg);

        let expected_data = serde_json::to_string(&msg).unwrap();
        for (sink, token) in [(&a, "a"), (&b, "b")] {
            let messages = sink.messages();
            assert_eq!(messages.len(), 1);
            assert_eq!(messages[0].id.as_deref(), Some(token));
            assert_eq!(messages[0].data, expected_data);
            let payload: serde_json::Value = serde_json::from_str(&messages[0].data).unwrap();
            assert_eq!(payload["id"], json!(1));
        }

        transport.shutdown();
        assert_eq!(transport.session_count(), 0);
        assert!(a.completed() && b.completed());
        assert_eq!(transport.broadcast(&msg), DeliveryReport::default());
        assert_eq!(a.messages().len(), 1);
    }

    #[test]
    fn test_open_after_shutdown_is_rejected() {
        let transport = transport();
        transport.shutdown();
        assert!(transport.is_closing());
        let err = transport
            .register("late", Box::new(RecordingSink::default()))
            .unwrap_err();
        assert!(matches!(err, TransportError::ConnectionRejected));
        assert_eq!(transport.session_count(), 0);

        // Shutting down twice is harmless.
        transport.shutdown();
    }

    #[test]
    fn test_failed_handshake_is_not_registered() {
        let transport = transport();
        let err = transport
            .register("t", Box::new(RecordingSink::failing()))
            .unwrap_err();
        assert!(matches!(err, TransportError::DeliveryFailure { .. }));
        assert!(!transport.contains("t"));
    }

    #[tokio::test]
    async fn test_dropping_stream_removes_session() {
        let transport = transport();
        let mut stream = transport.open_session("t").unwrap();
        assert!(stream.next().await.unwrap().is_ok());
        assert!(transport.contains("t"));

        drop(stream);
        assert!(!transport.contains("t"));
    }

    #[tokio::test]
    async fn test_dropping_replaced_stream_keeps_successor() {
        let transport = transport();
        let old = transport.open_session("t").unwrap();
        let _new = transport.open_session("t").unwrap();

        drop(old);
        assert!(transport.contains("t"));
        assert_eq!(transport.session_state("t"), Some(SessionState::Open));
    }

    #[tokio::test]
    async fn test_close_session_ends_stream() {
        let transport = transport();
        let mut stream = transport.open_session("t").unwrap();
        assert!(transport.close_session("t"));

        // Endpoint event, then end of stream.
        assert!(stream.next().await.unwrap().is_ok());
        assert!(stream.next().await.is_none());
        assert!(!transport.close_session("t"));
    }

    #[test]
    fn test_register_racing_shutdown_leaves_no_session() {
        for _ in 0..50 {
            let transport = transport();
            let workers: Vec<_> = (0..4)
                .map(|n| {
                    let transport = Arc::clone(&transport);
                    std::thread::spawn(move || {
                        for i in 0..100 {
                            let token = format!("w{}-{}", n, i);
                            if transport
                                .register(&token, Box::new(RecordingSink::default()))
                                .is_err()
                            {
                                break;
                            }
                        }
                    })
                })
                .collect();

            std::thread::yield_now();
            transport.shutdown();
            for worker in workers {
                worker.join().unwrap();
            }

            assert_eq!(transport.session_count(), 0);
            assert!(transport
                .register("late", Box::new(RecordingSink::default()))
                .is_err());
        }
    }
}
