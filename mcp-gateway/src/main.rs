//! # MCP Gateway Binary
//!
//! Entry point for the gateway server: parses CLI arguments, loads and
//! validates configuration, builds the router via
//! [`mcp_gateway::server::create_server`], and serves it with graceful
//! shutdown on `Ctrl+C`/`SIGTERM`.
//!
//! ## Usage
//!
//! ```bash
//! mcp-gateway --config gateway.toml
//! mcp-gateway --host 0.0.0.0 --port 8080
//! mcp-gateway --log-level debug
//! ```

use clap::Parser;
use mcp_gateway::config::Config;
use mcp_gateway::server::{create_server, shutdown_signal};
use std::net::SocketAddr;

/// Command line arguments for the gateway binary.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "gateway.toml")]
    config: String,

    /// Port number to bind, overriding the configuration file.
    #[arg(short, long)]
    port: Option<u16>,

    /// Host address to bind, overriding the configuration file.
    #[arg(long)]
    host: Option<String>,

    /// Logging level: trace, debug, info, warn, error.
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt().with_env_filter(&args.log_level).init();

    let mut config = Config::load(&args.config)?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    config.validate()?;

    let addr = SocketAddr::new(config.server.host.parse()?, config.server.port);
    let app = create_server(config).await?;

    tracing::info!(%addr, "starting mcp-gateway");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
