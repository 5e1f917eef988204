use std::net::SocketAddr;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use dataiku_mcp::logging::{init_logging, LoggingConfig};
use dataiku_mcp::{DataikuMcpServer, McpServerState};
use rmcp::transport::streamable_http_server::{
    session::local::LocalSessionManager, StreamableHttpService,
};
use rmcp::ServiceExt;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Transport {
    Stdio,
    Http,
}

/// MCP server for Dataiku DSS project management.
///
/// Connection settings are read from DSS_HOST and DSS_API_KEY.
#[derive(Debug, Parser)]
#[command(name = "dataiku-mcp", version)]
struct Cli {
    /// Transport to serve MCP over
    #[arg(long, value_enum, default_value = "stdio")]
    transport: Transport,

    /// Address to bind for the http transport
    #[arg(long, default_value = "localhost")]
    host: String,

    /// Port to bind for the http transport
    #[arg(long, default_value_t = 8000)]
    port: u16,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,

    /// Log level for this server (overrides RUST_LOG and --verbose)
    #[arg(long, env = "DATAIKU_MCP_LOG_LEVEL")]
    log_level: Option<String>,
}

impl Cli {
    fn logging(&self) -> LoggingConfig {
        let config = LoggingConfig::from_env();
        match (&self.log_level, self.verbose) {
            (Some(level), _) => config.with_level(level),
            (None, true) => config.with_level("debug"),
            (None, false) => config,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.logging())?;

    let server = DataikuMcpServer::new(McpServerState::new());
    info!(
        transport = ?cli.transport,
        tools = server.tool_names().len(),
        "starting dataiku-mcp {}",
        env!("CARGO_PKG_VERSION")
    );

    match cli.transport {
        Transport::Stdio => serve_stdio(server).await,
        Transport::Http => serve_http(server, &cli.host, cli.port).await,
    }
}

async fn serve_stdio(server: DataikuMcpServer) -> Result<()> {
    let running = server
        .serve(rmcp::transport::stdio())
        .await
        .context("failed to start MCP session on stdio")?;
    let reason = running.waiting().await?;
    info!(?reason, "MCP session ended");
    Ok(())
}

async fn serve_http(server: DataikuMcpServer, host: &str, port: u16) -> Result<()> {
    let service = StreamableHttpService::new(
        move || Ok::<_, std::io::Error>(server.clone()),
        LocalSessionManager::default().into(),
        Default::default(),
    );
    let router = axum::Router::new().nest_service("/mcp", service);

    let listener = tokio::net::TcpListener::bind((host, port))
        .await
        .with_context(|| format!("failed to bind {host}:{port}"))?;
    let addr: SocketAddr = listener.local_addr()?;
    info!(%addr, "serving MCP over streamable HTTP at /mcp");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %err, "failed to listen for ctrl-c");
            }
            info!("shutting down");
        })
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_defaults() {
        let cli = Cli::parse_from(["dataiku-mcp"]);
        assert_eq!(cli.transport, Transport::Stdio);
        assert_eq!(cli.host, "localhost");
        assert_eq!(cli.port, 8000);
        assert!(!cli.verbose);
    }

    #[test]
    fn explicit_level_beats_verbose() {
        let cli = Cli::parse_from(["dataiku-mcp", "-v", "--log-level", "warn"]);
        assert_eq!(cli.logging().directives, "dataiku_mcp=warn,dataiku_client=warn");

        let cli = Cli::parse_from(["dataiku-mcp", "--verbose", "--transport", "http"]);
        assert_eq!(cli.transport, Transport::Http);
        assert_eq!(cli.logging().directives, "dataiku_mcp=debug,dataiku_client=debug");
    }
}
