//! MCP (Model Context Protocol) over Server-Sent Events.
//!
//! Clients open a push channel with `GET <sse-prefix>/{token}`, receive an
//! `endpoint` event naming where to submit messages, and POST JSON-RPC
//! messages to `<message-prefix>/{token}`. Replies travel back as `message`
//! events on every open session.
//!
//! The tools offered over the channel are derived from the REST API's
//! OpenAPI description by the [`CapabilityBridge`].

pub mod bridge;
pub mod error;
pub mod handler;
pub mod protocol;
pub mod router;
pub mod session;
pub mod sink;
pub mod transport;

pub use bridge::{CapabilityBridge, RouteBinding};
pub use error::TransportError;
pub use handler::{McpHandler, ServerInfo};
pub use protocol::ProtocolMessage;
pub use router::{MessageHandler, MessageRouter};
pub use session::{Session, SessionState};
pub use transport::{SessionStream, SseTransport};
