//! restmcp backend library.
//!
//! This module exposes the application builder for use in tests.

use axum::http::{header, HeaderValue, Method};
use axum::{
    routing::{get, post},
    Extension, Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod api;
pub mod config;
pub mod identity;
pub mod mcp;
pub mod openapi;
pub mod state;

use config::Config;
use identity::TokenIdentityBinder;
use mcp::{CapabilityBridge, McpHandler, MessageRouter, ServerInfo, SseTransport};
use state::AppState;

/// Create the Axum application router with default configuration and a fresh
/// in-memory ledger.
pub fn create_app() -> Router {
    let state = AppState::default();
    let config = Config::default();
    let mcp = create_mcp_router(&state, &config);
    create_app_with_config(state, &config, mcp)
}

/// Wire the MCP side: transport, identity binding, and a handler whose tools
/// are the ledger API as described by its OpenAPI document.
pub fn create_mcp_router(state: &AppState, config: &Config) -> Arc<MessageRouter> {
    let bridge =
        CapabilityBridge::introspect(api::ledger::bindings(state), &openapi::ApiDoc::openapi());
    tracing::info!("MCP: {} tools available", bridge.len());

    let defaults = ServerInfo::default();
    let server_info = ServerInfo {
        name: config.server_name.clone().unwrap_or(defaults.name),
        version: config.server_version.clone().unwrap_or(defaults.version),
    };

    let transport = Arc::new(SseTransport::new(config.message_prefix.clone()));
    let identity = Arc::new(TokenIdentityBinder::new(config.principals.clone()));
    let handler = Arc::new(McpHandler::new(Arc::new(bridge), server_info));

    Arc::new(
        MessageRouter::new(transport, identity, handler).with_timeout(config.handler_timeout),
    )
}

/// Create the Axum application router with a given state, configuration and
/// MCP router.
///
/// If `config.cors_allowed_origins` is empty, any origin is allowed.
/// Otherwise, only the specified origins are allowed.
pub fn create_app_with_config(
    state: AppState,
    config: &Config,
    mcp: Arc<MessageRouter>,
) -> Router {
    let api_router = Router::new()
        .route("/accounts", post(api::ledger::create_account))
        .route("/accounts/search", post(api::ledger::search_accounts))
        .route("/accounts/{id}", get(api::ledger::get_account))
        .route("/entries", post(api::ledger::record_entry))
        .route("/entries/search", post(api::ledger::search_entries))
        .with_state(state);

    let sse_path = format!("{}/{{token}}", config.sse_prefix.trim_end_matches('/'));
    let message_path = format!("{}/{{token}}", config.message_prefix.trim_end_matches('/'));
    let mcp_router = Router::new()
        .route(&sse_path, get(api::mcp::sse_connect))
        .route(&message_path, post(api::mcp::post_message))
        .layer(Extension(mcp));

    let cors = {
        let cors = CorsLayer::new()
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT]);

        if config.cors_allowed_origins.is_empty() {
            cors.allow_origin(Any)
        } else {
            let origins: Vec<HeaderValue> = config
                .cors_allowed_origins
                .iter()
                .filter_map(|o| o.parse::<HeaderValue>().ok())
                .collect();
            cors.allow_origin(origins).allow_credentials(true)
        }
    };

    Router::new()
        .route("/health", get(health))
        .merge(
            SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi::ApiDoc::openapi()),
        )
        .nest("/api", api_router)
        .merge(mcp_router)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Health check endpoint.
async fn health() -> &'static str {
    "OK"
}
