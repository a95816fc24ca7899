//! MCP push-channel endpoint handlers.
//!
//! - `GET <sse-prefix>/{token}` - Open the SSE stream for a session
//! - `POST <message-prefix>/{token}` - Submit one JSON-RPC message

use axum::{
    body::Bytes,
    extract::Path,
    http::StatusCode,
    response::{
        sse::{KeepAlive, Sse},
        IntoResponse, Response,
    },
    Extension,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::mcp::{MessageRouter, TransportError};

/// SSE keep-alive interval.
const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// Closing wins over every other rejection, then the token must be non-blank.
fn check_request(router: &MessageRouter, token: &str) -> Result<(), TransportError> {
    if router.transport().is_closing() {
        return Err(TransportError::ConnectionRejected);
    }
    if token.trim().is_empty() {
        return Err(TransportError::BlankToken);
    }
    Ok(())
}

/// Handle GET requests - open a push channel for `token`.
///
/// The first event on the stream is `endpoint`, carrying the address the
/// client submits its messages to.
pub async fn sse_connect(
    Extension(router): Extension<Arc<MessageRouter>>,
    Path(token): Path<String>,
) -> Result<Response, TransportError> {
    check_request(&router, &token)?;

    let stream = router.transport().open_session(&token)?;
    info!("MCP: SSE stream opened for session {}", token);

    Ok(Sse::new(stream)
        .keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL))
        .into_response())
}

/// Handle POST requests - run one submitted message through the pipeline.
///
/// The body is taken as raw bytes so that non-UTF-8 input is reported as a
/// malformed message. The response is an empty acknowledgement; any reply is
/// pushed to the open sessions.
pub async fn post_message(
    Extension(router): Extension<Arc<MessageRouter>>,
    Path(token): Path<String>,
    body: Bytes,
) -> Result<StatusCode, TransportError> {
    check_request(&router, &token)?;
    debug!("MCP: POST from session {} ({} bytes)", token, body.len());

    router.receive(&token, &body).await?;
    Ok(StatusCode::OK)
}
