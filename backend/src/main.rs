//! restmcp server.

use clap::Parser;
use std::net::SocketAddr;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use restmcp::{config::Config, create_app_with_config, create_mcp_router, state::AppState};

/// restmcp - drive a REST API through MCP over Server-Sent Events
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "RESTMCP_PORT")]
    port: Option<u16>,

    /// Address to bind
    #[arg(long, env = "RESTMCP_HOST")]
    host: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

/// Initialize logging.
///
/// RUST_LOG wins, then the configured level, then `info`. With a log file
/// configured, output is also written there through a non-blocking writer;
/// the returned guard must live until shutdown to flush it.
fn init_logging(config: &Config) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(config.log_level.as_deref().unwrap_or("info"))
    });

    let (file_layer, guard) = match &config.log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| std::path::Path::new("."));
            let name = path
                .file_name()
                .map(|n| n.to_os_string())
                .unwrap_or_else(|| "restmcp.log".into());
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .with(file_layer)
        .init();

    guard
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = Config::from_figment(args.port, args.host, args.log_level)?;
    let _log_guard = init_logging(&config);
    info!("Starting restmcp server...");
    info!("Configuration loaded");

    let state = AppState::new();
    let mcp = create_mcp_router(&state, &config);
    let transport = mcp.transport().clone();
    let app = create_app_with_config(state, &config, mcp);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Server listening on {}", addr);
    info!(
        "MCP endpoints: GET {}/{{token}}, POST {}/{{token}}",
        config.sse_prefix, config.message_prefix
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Close every push channel first so open SSE responses end and the
    // graceful shutdown can complete.
    let shutdown_signal = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
        }
        info!("Received Ctrl+C, shutting down gracefully...");
        transport.shutdown();
        info!("Server shutting down");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    Ok(())
}
