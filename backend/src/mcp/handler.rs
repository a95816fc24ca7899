//! MCP JSON-RPC request handler.
//!
//! Handles MCP protocol methods and dispatches tool calls to the
//! capability bridge.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::bridge::CapabilityBridge;
use super::protocol::{error_codes, JsonRpcRequest, ProtocolMessage};
use super::router::MessageHandler;
use crate::identity::CallerContext;

/// MCP protocol version we support.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Name and version reported by `initialize`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

impl Default for ServerInfo {
    fn default() -> Self {
        Self {
            name: "MCP Server".to_string(),
            version: "1.0.0".to_string(),
        }
    }
}

/// Tool call parameters from MCP.
#[derive(Debug, Deserialize)]
struct ToolCallParams {
    name: String,
    #[serde(default)]
    arguments: Option<Value>,
}

/// The MCP handler pipeline.
pub struct McpHandler {
    bridge: Arc<CapabilityBridge>,
    server_info: ServerInfo,
}

impl McpHandler {
    pub fn new(bridge: Arc<CapabilityBridge>, server_info: ServerInfo) -> Self {
        Self {
            bridge,
            server_info,
        }
    }

    async fn handle_request(&self, ctx: &CallerContext, request: JsonRpcRequest) -> ProtocolMessage {
        let id = request.id;
        debug!("MCP: Handling method: {}", request.method);

        match request.method.as_str() {
            "initialize" => ProtocolMessage::success(id, self.initialize_result()),
            "ping" => ProtocolMessage::success(id, json!({})),
            "tools/list" => ProtocolMessage::success(id, self.list_tools()),
            "tools/call" => self.call_tool(ctx, id, request.params).await,
            "logging/setLevel" => {
                let level = request
                    .params
                    .as_ref()
                    .and_then(|p| p.get("level"))
                    .and_then(Value::as_str)
                    .unwrap_or("info");
                debug!("MCP: Client {} requested log level {}", ctx.token, level);
                ProtocolMessage::success(id, json!({}))
            }
            _ => ProtocolMessage::error(
                id,
                error_codes::METHOD_NOT_FOUND,
                format!("Method not found: {}", request.method),
            ),
        }
    }

    fn initialize_result(&self) -> Value {
        json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {
                "tools": { "listChanged": true },
                "logging": {}
            },
            "serverInfo": {
                "name": self.server_info.name,
                "version": self.server_info.version
            }
        })
    }

    fn list_tools(&self) -> Value {
        let tools: Vec<Value> = self.bridge.list().iter().map(|c| c.descriptor()).collect();
        json!({ "tools": tools })
    }

    async fn call_tool(&self, ctx: &CallerContext, id: Value, params: Option<Value>) -> ProtocolMessage {
        let params: ToolCallParams = match serde_json::from_value(params.unwrap_or(json!({}))) {
            Ok(p) => p,
            Err(e) => {
                return ProtocolMessage::error(
                    id,
                    error_codes::INVALID_PARAMS,
                    format!("Invalid tool call parameters: {}", e),
                )
            }
        };

        info!("MCP: Calling tool {} for {}", params.name, ctx.display_name());
        let arguments = params.arguments.unwrap_or(json!({}));
        match self.bridge.invoke(ctx, &params.name, arguments).await {
            Some(result) => ProtocolMessage::success(id, result.to_tool_result()),
            None => {
                warn!("MCP: Unknown tool: {}", params.name);
                ProtocolMessage::error(
                    id,
                    error_codes::INVALID_PARAMS,
                    format!("Unknown tool: {}", params.name),
                )
            }
        }
    }
}

#[async_trait]
impl MessageHandler for McpHandler {
    async fn handle(
        &self,
        ctx: &CallerContext,
        message: ProtocolMessage,
    ) -> anyhow::Result<Option<ProtocolMessage>> {
        match message {
            ProtocolMessage::Request(request) => Ok(Some(self.handle_request(ctx, request).await)),
            ProtocolMessage::Notification(n) => {
                // Notifications (initialized, cancelled, ...) need no response
                debug!("MCP: Notification {} from {}", n.method, ctx.token);
                Ok(None)
            }
            ProtocolMessage::Response(_) | ProtocolMessage::Error(_) => {
                debug!("MCP: Ignoring client {} from {}", message, ctx.token);
                Ok(None)
            }
        }
    }
}
