//! JSON-RPC 2.0 message types.
//!
//! Inbound bodies are classified by shape only: a `method` with an `id` is a
//! request, a `method` without one is a notification, an `id` with `result`
//! or `error` is a response. Method semantics are left to the handler.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// JSON-RPC protocol version string.
pub const JSONRPC_VERSION: &str = "2.0";

/// Standard JSON-RPC error codes.
pub mod error_codes {
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
}

/// Why an inbound body could not be turned into a [`ProtocolMessage`].
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("message must be a JSON object")]
    NotAnObject,
    #[error("field `method` must be a string")]
    InvalidMethod,
    #[error("message has neither `method` nor `id` with `result`/`error`")]
    UnknownShape,
    #[error("invalid error object: {0}")]
    InvalidError(serde_json::Error),
}

/// JSON-RPC 2.0 Request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: Value,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

/// JSON-RPC 2.0 Notification (a request without an id).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JsonRpcNotification {
    pub jsonrpc: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

/// JSON-RPC 2.0 successful Response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    pub result: Value,
}

/// JSON-RPC 2.0 Error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// JSON-RPC 2.0 error Response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JsonRpcErrorResponse {
    pub jsonrpc: String,
    pub id: Value,
    pub error: JsonRpcError,
}

/// Any message exchanged over the bridge.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ProtocolMessage {
    Request(JsonRpcRequest),
    Notification(JsonRpcNotification),
    Response(JsonRpcResponse),
    Error(JsonRpcErrorResponse),
}

impl ProtocolMessage {
    /// Parse a raw message body. Bytes that are not UTF-8 are a JSON error.
    pub fn parse(body: &[u8]) -> Result<Self, ParseError> {
        let value: Value = serde_json::from_slice(body)?;
        Self::from_value(value)
    }

    /// Classify an already decoded JSON value.
    pub fn from_value(value: Value) -> Result<Self, ParseError> {
        let Value::Object(mut obj) = value else {
            return Err(ParseError::NotAnObject);
        };

        let jsonrpc = match obj.remove("jsonrpc") {
            Some(Value::String(v)) => v,
            _ => JSONRPC_VERSION.to_string(),
        };
        let id = obj.remove("id");

        if let Some(method) = obj.remove("method") {
            let Value::String(method) = method else {
                return Err(ParseError::InvalidMethod);
            };
            let params = obj.remove("params");
            return Ok(match id {
                Some(id) => Self::Request(JsonRpcRequest {
                    jsonrpc,
                    id,
                    method,
                    params,
                }),
                None => Self::Notification(JsonRpcNotification {
                    jsonrpc,
                    method,
                    params,
                }),
            });
        }

        let Some(id) = id else {
            return Err(ParseError::UnknownShape);
        };

        if let Some(error) = obj.remove("error") {
            let error: JsonRpcError =
                serde_json::from_value(error).map_err(ParseError::InvalidError)?;
            return Ok(Self::Error(JsonRpcErrorResponse { jsonrpc, id, error }));
        }

        // `"result": null` is a legal success value, so presence is checked on the key.
        match obj.remove("result") {
            Some(result) => Ok(Self::Response(JsonRpcResponse {
                jsonrpc,
                id,
                result,
            })),
            None => Err(ParseError::UnknownShape),
        }
    }

    /// Create a success response.
    pub fn success(id: Value, result: Value) -> Self {
        Self::Response(JsonRpcResponse {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result,
        })
    }

    /// Create an error response.
    pub fn error(id: Value, code: i32, message: impl Into<String>) -> Self {
        Self::Error(JsonRpcErrorResponse {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            error: JsonRpcError {
                code,
                message: message.into(),
                data: None,
            },
        })
    }

    /// The message id, if the message carries one.
    pub fn id(&self) -> Option<&Value> {
        match self {
            Self::Request(r) => Some(&r.id),
            Self::Response(r) => Some(&r.id),
            Self::Error(e) => Some(&e.id),
            Self::Notification(_) => None,
        }
    }
}

impl<'de> Deserialize<'de> for ProtocolMessage {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(value).map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for ProtocolMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Request(r) => write!(f, "request {} ({})", r.method, r.id),
            Self::Notification(n) => write!(f, "notification {}", n.method),
            Self::Response(r) => write!(f, "response ({})", r.id),
            Self::Error(e) => write!(f, "error {} ({})", e.error.code, e.id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_request() {
        let msg = ProtocolMessage::parse(br#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#).unwrap();
        assert_eq!(msg.id(), Some(&json!(1)));
        match msg {
            ProtocolMessage::Request(r) => assert_eq!(r.method, "ping"),
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_parse_notification_without_id() {
        let msg =
            ProtocolMessage::parse(br#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
                .unwrap();
        assert!(matches!(msg, ProtocolMessage::Notification(_)));
        assert!(msg.id().is_none());
    }

    #[test]
    fn test_parse_response_with_null_result() {
        let msg = ProtocolMessage::parse(br#"{"jsonrpc":"2.0","id":"a","result":null}"#).unwrap();
        assert_eq!(msg, ProtocolMessage::success(json!("a"), Value::Null));
    }

    #[test]
    fn test_parse_error_response() {
        let msg = ProtocolMessage::parse(
            br#"{"jsonrpc":"2.0","id":7,"error":{"code":-32601,"message":"nope"}}"#,
        )
        .unwrap();
        match msg {
            ProtocolMessage::Error(e) => {
                assert_eq!(e.error.code, error_codes::METHOD_NOT_FOUND);
                assert_eq!(e.error.message, "nope");
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_missing_method_and_result_is_rejected() {
        let err = ProtocolMessage::parse(br#"{"jsonrpc":"2.0","id":3}"#).unwrap_err();
        assert!(matches!(err, ParseError::UnknownShape));
    }

    #[test]
    fn test_result_without_id_is_rejected() {
        let err = ProtocolMessage::parse(br#"{"jsonrpc":"2.0","result":{}}"#).unwrap_err();
        assert!(matches!(err, ParseError::UnknownShape));
    }

    #[test]
    fn test_non_object_and_invalid_json_are_rejected() {
        assert!(matches!(
            ProtocolMessage::parse(b"[1,2]").unwrap_err(),
            ParseError::NotAnObject
        ));
        assert!(matches!(
            ProtocolMessage::parse(b"{not json").unwrap_err(),
            ParseError::Json(_)
        ));
    }

    #[test]
    fn test_invalid_utf8_is_a_json_error() {
        let err = ProtocolMessage::parse(b"{\"method\":\"\xff\xfe\"}").unwrap_err();
        assert!(matches!(err, ParseError::Json(_)));
    }

    #[test]
    fn test_numeric_method_is_rejected() {
        let err = ProtocolMessage::parse(br#"{"id":1,"method":5}"#).unwrap_err();
        assert!(matches!(err, ParseError::InvalidMethod));
    }

    #[test]
    fn test_serialized_messages_carry_version() {
        let json = serde_json::to_value(ProtocolMessage::error(
            json!(2),
            error_codes::INVALID_PARAMS,
            "bad",
        ))
        .unwrap();
        assert_eq!(
            json,
            json!({"jsonrpc":"2.0","id":2,"error":{"code":-32602,"message":"bad"}})
        );
    }

    #[test]
    fn test_deserialize_impl_uses_shape_rules() {
        let msg: ProtocolMessage = serde_json::from_value(json!({"id": 1, "result": [1]})).unwrap();
        assert!(matches!(msg, ProtocolMessage::Response(_)));
        assert!(serde_json::from_value::<ProtocolMessage>(json!({"foo": 1})).is_err());
    }
}
