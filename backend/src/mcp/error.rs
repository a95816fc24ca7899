//! Transport errors and their HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use restmcp_types::ErrorResponse;
use thiserror::Error;

use super::protocol::ParseError;
use super::sink::SinkError;

/// Failures surfaced to the immediate HTTP caller.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The transport is shutting down.
    #[error("Server is shutting down")]
    ConnectionRejected,

    /// The `{token}` path segment was empty or whitespace.
    #[error("Session token must not be blank")]
    BlankToken,

    /// The submitted body is not a valid protocol message.
    #[error("Invalid message format: {0}")]
    MalformedMessage(#[from] ParseError),

    /// The handler pipeline failed or timed out.
    #[error("{0}")]
    HandlerFailure(String),

    /// Writing to a push channel failed.
    #[error("Failed to deliver to session {token}: {source}")]
    DeliveryFailure {
        token: String,
        #[source]
        source: SinkError,
    },
}

impl TransportError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::ConnectionRejected => StatusCode::SERVICE_UNAVAILABLE,
            Self::BlankToken | Self::MalformedMessage(_) => StatusCode::BAD_REQUEST,
            Self::HandlerFailure(_) | Self::DeliveryFailure { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn body(&self) -> ErrorResponse {
        match self {
            Self::MalformedMessage(e) => {
                ErrorResponse::with_details("Invalid message format", e.to_string())
            }
            other => ErrorResponse::new(other.to_string()),
        }
    }
}

impl IntoResponse for TransportError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            TransportError::ConnectionRejected.status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            TransportError::MalformedMessage(ParseError::UnknownShape).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            TransportError::HandlerFailure("boom".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_malformed_body_carries_details() {
        let body = TransportError::MalformedMessage(ParseError::NotAnObject).body();
        assert_eq!(body.error, "Invalid message format");
        assert_eq!(body.details.as_deref(), Some("message must be a JSON object"));
    }

    #[test]
    fn test_handler_failure_body_is_the_message() {
        let body = TransportError::HandlerFailure("database offline".into()).body();
        assert_eq!(body.error, "database offline");
        assert!(body.details.is_none());
    }
}
