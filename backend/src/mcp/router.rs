//! Inbound message router.
//!
//! Ingestion is request/response, delivery is push: a submitted message is
//! run through the handler pipeline on the request task, the HTTP caller
//! only gets an acknowledgement, and any reply goes out through
//! [`SseTransport::broadcast`].

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

use super::error::TransportError;
use super::protocol::ProtocolMessage;
use super::transport::SseTransport;
use crate::identity::{CallerContext, IdentityBinder, IdentityGuard};

/// The handler pipeline: one inbound message to at most one reply.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(
        &self,
        ctx: &CallerContext,
        message: ProtocolMessage,
    ) -> anyhow::Result<Option<ProtocolMessage>>;
}

/// Routes submitted messages into the handler pipeline.
pub struct MessageRouter {
    transport: Arc<SseTransport>,
    identity: Arc<dyn IdentityBinder>,
    handler: Arc<dyn MessageHandler>,
    timeout: Option<Duration>,
}

impl MessageRouter {
    pub fn new(
        transport: Arc<SseTransport>,
        identity: Arc<dyn IdentityBinder>,
        handler: Arc<dyn MessageHandler>,
    ) -> Self {
        Self {
            transport,
            identity,
            handler,
            timeout: None,
        }
    }

    /// Bound the wait for the pipeline. Without it a stuck handler holds
    /// its request open indefinitely.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn transport(&self) -> &Arc<SseTransport> {
        &self.transport
    }

    /// Process one submitted body for `token`.
    pub async fn receive(&self, token: &str, body: &[u8]) -> Result<(), TransportError> {
        if self.transport.is_closing() {
            return Err(TransportError::ConnectionRejected);
        }

        let guard = IdentityGuard::bind(Arc::clone(&self.identity), token);

        let message = ProtocolMessage::parse(body).map_err(|e| {
            error!("Failed to deserialize message: {}", e);
            TransportError::from(e)
        })?;
        debug!("Session {}: received {}", token, message);

        let reply = self.run_pipeline(guard.context(), message).await?;
        drop(guard);

        if let Some(reply) = reply {
            let report = self.transport.broadcast(&reply);
            debug!(
                "Reply delivered to {} sessions ({} failed)",
                report.delivered, report.failed
            );
        }
        Ok(())
    }

    async fn run_pipeline(
        &self,
        ctx: &CallerContext,
        message: ProtocolMessage,
    ) -> Result<Option<ProtocolMessage>, TransportError> {
        let pending = self.handler.handle(ctx, message);
        let outcome = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, pending).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    warn!("Handler timed out after {:?}", limit);
                    return Err(TransportError::HandlerFailure(format!(
                        "Handler timed out after {}ms",
                        limit.as_millis()
                    )));
                }
            },
            None => pending.await,
        };

        outcome.map_err(|e| {
            error!("Error handling message: {:#}", e);
            TransportError::HandlerFailure(e.to_string())
        })
    }
}
