//! Pollinations MCP: Model Context Protocol relay for image and text generation
//!
//! Exposes three tools (`generate_image`, `generate_text`, `list_models`)
//! over JSON-RPC 2.0. Clients open an SSE stream at `/sse` and POST requests
//! to `/message?connectionId=<id>`; responses arrive on the stream.
//!
//! Usage:
//!   pollinations-mcp                              # Default port 3000
//!   pollinations-mcp --port 8080                  # Custom port
//!   pollinations-mcp --unrouted broadcast         # Fan out responses without a target
//!   pollinations-mcp --log-file /tmp/mcp.log      # Log to a file

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use pmcp_server::{McpServer, ServerConfig};
use pmcp_tools::ToolRegistry;
use pmcp_transport::{TransportConfig, TransportServer, UnroutedPolicy};
use pmcp_upstream::{DEFAULT_IMAGE_BASE, DEFAULT_TEXT_BASE, PollinationsClient, UpstreamConfig};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "pollinations-mcp", version, about = "Pollinations MCP Server: image and text generation tools")]
struct Cli {
    /// Port to listen on (0 for OS-assigned)
    #[arg(long, env = "PORT", default_value = "3000")]
    port: u16,

    /// Hostname to bind to
    #[arg(long, env = "HOST", default_value = "127.0.0.1")]
    hostname: String,

    /// Base URL of the image generation service
    #[arg(long, env = "POLLINATIONS_IMAGE_BASE", default_value = DEFAULT_IMAGE_BASE)]
    image_base: String,

    /// Base URL of the text generation service
    #[arg(long, env = "POLLINATIONS_TEXT_BASE", default_value = DEFAULT_TEXT_BASE)]
    text_base: String,

    /// Where to send responses whose request named no connection (direct, broadcast)
    #[arg(long, env = "MCP_UNROUTED", default_value = "direct")]
    unrouted: UnroutedPolicy,

    /// Allow tool calls on a stream before it has sent `initialize`
    #[arg(long)]
    no_require_initialize: bool,

    /// Maximum concurrent streams
    #[arg(long, env = "MCP_MAX_CONNECTIONS")]
    max_connections: Option<usize>,

    /// Enable permissive CORS
    #[arg(long)]
    cors: bool,

    /// Development mode (panic details in 500 responses)
    #[arg(long, env = "MCP_DEV")]
    dev: bool,

    /// Enable verbose logging
    #[arg(long)]
    verbose: bool,

    /// Write logs to a file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Log output format
    #[arg(long, value_enum, default_value = "text")]
    log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

fn init_tracing(cli: &Cli) -> Result<(), std::io::Error> {
    // RUST_LOG wins over --verbose
    let default = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match (&cli.log_file, cli.log_format) {
        (Some(log_path), format) => {
            if let Some(parent) = log_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(log_path)?;
            let builder = builder.with_writer(std::sync::Mutex::new(file)).with_ansi(false);
            match format {
                LogFormat::Json => builder.json().init(),
                LogFormat::Text => builder.init(),
            }
            eprintln!("Logging to {}", log_path.display());
        }
        (None, LogFormat::Json) => builder.json().init(),
        (None, LogFormat::Text) => builder.init(),
    }
    Ok(())
}

/// Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(&cli) {
        eprintln!("Failed to open log file: {e}");
        return ExitCode::FAILURE;
    }

    let upstream = UpstreamConfig {
        image_base: cli.image_base.clone(),
        text_base: cli.text_base.clone(),
        ..UpstreamConfig::default()
    };
    let client = match PollinationsClient::new(upstream) {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to build upstream client: {e}");
            return ExitCode::FAILURE;
        }
    };

    let tools = ToolRegistry::new(Arc::new(client));
    let server = Arc::new(McpServer::new(
        tools,
        ServerConfig {
            require_initialize: !cli.no_require_initialize,
            ..ServerConfig::default()
        },
    ));

    let config = TransportConfig {
        port: cli.port,
        hostname: cli.hostname.clone(),
        enable_cors: cli.cors,
        max_connections: cli.max_connections,
        unrouted: cli.unrouted,
        dev_mode: cli.dev,
        ..TransportConfig::default()
    };

    let mut transport = match TransportServer::start(config, server).await {
        Ok(t) => t,
        Err(e) => {
            error!("Failed to start transport server on {}:{}: {e}", cli.hostname, cli.port);
            return ExitCode::FAILURE;
        }
    };
    let base_url = format!("http://{}:{}", cli.hostname, transport.port());

    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                    Pollinations MCP Server                   ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
    println!("  Port:       {}", transport.port());
    println!("  Binding:    {}", cli.hostname);
    println!("  Images:     {}", cli.image_base);
    println!("  Text:       {}", cli.text_base);
    println!("  Unrouted:   {}", cli.unrouted);
    println!(
        "  Handshake:  {}",
        if cli.no_require_initialize { "optional" } else { "required per stream" }
    );
    println!();
    println!("────────────────────────────────────────────────────────────────");
    println!();
    println!("  SSE endpoint:      {base_url}/sse");
    println!("  Message endpoint:  {base_url}/message?connectionId=<id>");
    println!("  Health:            {base_url}/health");
    println!();
    println!("  Press Ctrl+C to stop.");
    println!();

    shutdown_signal().await;

    println!();
    println!("  Shutting down...");
    info!("Shutdown requested, closing {} stream(s)", transport.registry().count());
    transport.stop().await;
    println!("  Server stopped.");

    ExitCode::SUCCESS
}
