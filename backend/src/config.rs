//! Configuration management.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Default path prefix of the SSE push channel.
pub const DEFAULT_SSE_PREFIX: &str = "/mcp/sse";

/// Default path prefix for message submission.
pub const DEFAULT_MESSAGE_PREFIX: &str = "/mcp/message";

/// Configuration structure that matches the TOML file format.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    server: ServerConfig,
    #[serde(default)]
    mcp: McpConfig,
    #[serde(default)]
    identity: IdentityConfig,
    #[serde(default)]
    logging: LoggingConfig,
    #[serde(default)]
    cors: CorsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ServerConfig {
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default = "default_host")]
    host: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct McpConfig {
    #[serde(default = "default_sse_prefix")]
    sse_prefix: String,
    #[serde(default = "default_message_prefix")]
    message_prefix: String,
    /// Upper bound on one pipeline run, in seconds. Unbounded if unset.
    handler_timeout_secs: Option<u64>,
    server_name: Option<String>,
    server_version: Option<String>,
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            sse_prefix: default_sse_prefix(),
            message_prefix: default_message_prefix(),
            handler_timeout_secs: None,
            server_name: None,
            server_version: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct IdentityConfig {
    /// Session token -> principal name
    #[serde(default)]
    principals: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct LoggingConfig {
    /// Path to log file (if set, logs will be written to file in addition to stdout)
    log_file: Option<PathBuf>,
    /// Log level (trace, debug, info, warn, error)
    /// If not set, uses RUST_LOG environment variable or defaults to "info"
    log_level: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct CorsConfig {
    #[serde(default)]
    allowed_origins: Vec<String>,
}

fn default_port() -> u16 {
    restmcp_types::DEFAULT_PORT
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_sse_prefix() -> String {
    DEFAULT_SSE_PREFIX.to_string()
}

fn default_message_prefix() -> String {
    DEFAULT_MESSAGE_PREFIX.to_string()
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Port to listen on
    pub port: u16,
    /// Address to bind
    pub host: String,
    /// Path prefix of the SSE push channel (`<prefix>/{token}`)
    pub sse_prefix: String,
    /// Path prefix for message submission (`<prefix>/{token}`)
    pub message_prefix: String,
    /// Bound on one handler pipeline run
    pub handler_timeout: Option<Duration>,
    /// Name reported to MCP clients on `initialize`
    pub server_name: Option<String>,
    /// Version reported to MCP clients on `initialize`
    pub server_version: Option<String>,
    /// Session token -> principal name
    pub principals: HashMap<String, String>,
    /// Path to log file (if set, logs will be written to file in addition to stdout)
    pub log_file: Option<PathBuf>,
    /// Log level (if set, overrides RUST_LOG environment variable)
    pub log_level: Option<String>,
    /// Allowed CORS origins; empty allows any origin
    pub cors_allowed_origins: Vec<String>,
}

impl Config {
    /// Load configuration with full priority chain: CLI args > env vars > config files > defaults.
    ///
    /// Config files are searched in this order:
    /// 1. `.restmcp.toml` in current directory
    /// 2. `config.toml` in user config directory (~/.config/restmcp/ on Linux)
    ///
    /// Environment variables use the `RESTMCP_` prefix with `__` between
    /// section and key, e.g. `RESTMCP_SERVER__PORT=9000`.
    pub fn from_figment(
        port: Option<u16>,
        host: Option<String>,
        log_level: Option<String>,
    ) -> anyhow::Result<Self> {
        let local_config = std::env::current_dir()
            .ok()
            .map(|d| d.join(".restmcp.toml"));
        let user_config = directories::ProjectDirs::from("", "", "restmcp")
            .map(|dirs| dirs.config_dir().join("config.toml"));

        // Priority: defaults < user config < local config < env vars < CLI args
        let mut figment = Figment::new().merge(Serialized::defaults(ConfigFile::default()));

        if let Some(ref path) = user_config {
            if path.exists() {
                figment = figment.merge(Toml::file(path));
            }
        }

        if let Some(ref path) = local_config {
            if path.exists() {
                figment = figment.merge(Toml::file(path));
            }
        }

        figment = figment.merge(Env::prefixed("RESTMCP_").split("__"));

        if let Some(p) = port {
            figment = figment.merge(Serialized::default("server.port", p));
        }
        if let Some(ref h) = host {
            figment = figment.merge(Serialized::default("server.host", h));
        }
        if let Some(ref level) = log_level {
            figment = figment.merge(Serialized::default("logging.log_level", level));
        }

        let config_file: ConfigFile = figment.extract()?;
        Ok(Self::from_file(config_file))
    }

    fn from_file(file: ConfigFile) -> Self {
        Self {
            port: file.server.port,
            host: file.server.host,
            sse_prefix: file.mcp.sse_prefix,
            message_prefix: file.mcp.message_prefix,
            handler_timeout: file
                .mcp
                .handler_timeout_secs
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            server_name: file.mcp.server_name,
            server_version: file.mcp.server_version,
            principals: file.identity.principals,
            log_file: file.logging.log_file,
            log_level: file.logging.log_level,
            cors_allowed_origins: file.cors.allowed_origins,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_file(ConfigFile::default())
    }
}
