//! Push-channel sessions.
//!
//! A session owns the write side of one SSE stream and walks a one-way state
//! machine: `Init -> Open -> Closing -> Closed`.

use parking_lot::Mutex;
use std::fmt;
use std::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

use super::sink::{EventSink, PushEvent, SinkError};

/// Lifecycle state of a push channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SessionState {
    /// Channel allocated, handshake not yet sent.
    Init,
    /// Handshake sent, message events may flow.
    Open,
    /// Close requested or a write error observed.
    Closing,
    /// Removed from the registry.
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Init => "init",
            Self::Open => "open",
            Self::Closing => "closing",
            Self::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// One open push channel.
pub struct Session {
    /// Caller-supplied token.
    pub token: String,
    /// Identifies this connection among successive sessions for one token.
    pub connection_id: Uuid,
    /// When the session was created.
    pub created_at: Instant,
    state: Mutex<SessionState>,
    sink: Box<dyn EventSink>,
}

impl Session {
    pub fn new(token: impl Into<String>, sink: Box<dyn EventSink>) -> Self {
        let token = token.into();
        let connection_id = Uuid::new_v4();
        debug!("Session {} initialized (connection {})", token, connection_id);
        Self {
            token,
            connection_id,
            created_at: Instant::now(),
            state: Mutex::new(SessionState::Init),
            sink,
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    pub fn is_open(&self) -> bool {
        self.state() == SessionState::Open
    }

    /// Move forward to `next`. Returns false if that would go backwards.
    fn advance(&self, next: SessionState) -> bool {
        let mut state = self.state.lock();
        if next < *state {
            return false;
        }
        *state = next;
        true
    }

    /// Send the endpoint event and open the session.
    pub fn handshake(&self, address: String) -> Result<(), SinkError> {
        self.sink.send(PushEvent::endpoint(&self.token, address))?;
        self.advance(SessionState::Open);
        Ok(())
    }

    /// Write one message event.
    pub fn deliver(&self, data: String) -> Result<(), SinkError> {
        if !self.is_open() {
            return Err(SinkError::Closed);
        }
        self.sink.send(PushEvent::message(&self.token, data))
    }

    /// Report a terminal error to the client and stop accepting messages.
    pub fn fail(&self, error: SinkError) {
        {
            let mut state = self.state.lock();
            if *state >= SessionState::Closing {
                return;
            }
            *state = SessionState::Closing;
        }
        self.sink.fail(error);
    }

    /// Complete the stream. Completion failures are logged, never returned.
    pub fn close(&self) {
        debug!("Closing session: {}", self.token);
        self.advance(SessionState::Closing);
        match self.sink.complete() {
            Ok(()) => debug!("Completed push channel for session {}", self.token),
            Err(e) => warn!(
                "Failed to complete push channel for session {}: {}",
                self.token, e
            ),
        }
        self.advance(SessionState::Closed);
    }

    /// Get the session age in seconds.
    pub fn age_secs(&self) -> u64 {
        self.created_at.elapsed().as_secs()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("token", &self.token)
            .field("connection_id", &self.connection_id)
            .field("state", &self.state())
            .finish()
    }
}
