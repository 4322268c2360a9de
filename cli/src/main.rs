//! Tollgate: bearer-gated MCP tool server.
//!
//! Two subcommands:
//! - `tollgate serve`: Streamable HTTP MCP server behind the auth/host-rewrite pipeline
//! - `tollgate check-config`: resolve and validate configuration, print it (token redacted)

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tollgate::{build_pipeline, ConfigOverrides, LifespanEvent, ServerConfig};
use tracing_subscriber::EnvFilter;

/// Tollgate: bearer-gated MCP tool server.
#[derive(Parser)]
#[command(name = "tollgate", version, about = "Tollgate: bearer-gated MCP tool server")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the built-in tools over Streamable HTTP
    Serve(Overrides),
    /// Resolve configuration from file, environment and flags, validate it and print it
    CheckConfig(Overrides),
}

/// Flags shared by both subcommands. They win over file and environment.
#[derive(Args)]
struct Overrides {
    /// Path to tollgate.toml [default: ./tollgate.toml or ~/.config/tollgate/tollgate.toml]
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// HTTP port to listen on [default: 8888, env: MCP_SERVER_PORT]
    #[arg(short, long)]
    port: Option<u16>,
    /// Bind address [default: 0.0.0.0]
    #[arg(long)]
    bind: Option<IpAddr>,
    /// Shared bearer secret [default: test-secret-token, env: MCP_AUTH_TOKEN]
    #[arg(long)]
    token: Option<String>,
    /// Disable bearer-token authentication. Only for trusted local deployments.
    #[arg(long)]
    no_auth: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // RUST_LOG controls verbosity; info by default so auth outcomes are visible
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve(overrides) => {
            let config = resolve_config(&overrides)?;
            let cancel = CancellationToken::new();

            // Ctrl-C handler cancels the root token for graceful shutdown
            let cancel_for_signal = cancel.clone();
            tokio::spawn(async move {
                tokio::signal::ctrl_c().await.ok();
                tracing::info!("Shutting down Tollgate...");
                cancel_for_signal.cancel();
            });

            print_banner(&config);
            run_serve(config, cancel).await?;
        }
        Commands::CheckConfig(overrides) => {
            let config = resolve_config(&overrides)?;
            println!("{:#?}", config);
        }
    }

    Ok(())
}

/// Serve the composed pipeline until `cancel` fires, then drain and emit shutdown.
async fn run_serve(config: ServerConfig, cancel: CancellationToken) -> Result<()> {
    let pipeline = build_pipeline(&config, cancel.child_token())
        .map_err(|e| anyhow::anyhow!("Failed to build Tollgate pipeline: {}", e))?;

    let addr = SocketAddr::new(config.bind, config.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", addr, e))?;

    pipeline.lifespan(LifespanEvent::Startup).await;

    tracing::info!(
        bind = %config.bind,
        port = %config.port,
        auth = config.auth.enabled,
        canonical_host = %config.canonical_host(),
        "Tollgate HTTP server listening"
    );
    tracing::info!(
        "Connect your MCP client to http://{}:{}{}",
        config.bind,
        config.port,
        config.endpoint_path
    );

    let served = axum::serve(listener, pipeline.clone().into_router())
        .with_graceful_shutdown(cancel.clone().cancelled_owned())
        .await;

    pipeline.lifespan(LifespanEvent::Shutdown).await;

    served.map_err(|e| anyhow::anyhow!("Tollgate HTTP server error: {}", e))?;
    tracing::info!("Tollgate HTTP server stopped");
    Ok(())
}

/// Build the effective config: defaults < TOML file < environment < flags.
fn resolve_config(overrides: &Overrides) -> Result<ServerConfig> {
    let file = locate_config(overrides.config.clone())?;
    if let Some(path) = &file {
        tracing::debug!(path = %path.display(), "loading config file");
    }

    let flags = ConfigOverrides {
        port: overrides.port,
        bind: overrides.bind,
        token: overrides.token.clone(),
        no_auth: overrides.no_auth,
    };
    ServerConfig::resolve(file.as_deref(), |key| std::env::var(key).ok(), &flags)
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))
}

/// Resolve config file path: explicit flag → ./tollgate.toml → ~/.config/tollgate/tollgate.toml.
///
/// Unlike an explicit `--config`, the implicit locations are optional.
fn locate_config(explicit: Option<PathBuf>) -> Result<Option<PathBuf>> {
    if let Some(path) = explicit {
        if !path.exists() {
            return Err(anyhow::anyhow!("Config file {:?} does not exist", path));
        }
        return Ok(Some(path));
    }

    let local = Path::new("tollgate.toml");
    if local.exists() {
        return Ok(Some(local.to_path_buf()));
    }

    if let Some(config_dir) = dirs::config_dir() {
        let xdg = config_dir.join("tollgate").join("tollgate.toml");
        if xdg.exists() {
            return Ok(Some(xdg));
        }
    }

    Ok(None)
}

/// Print a short startup banner to stderr. Skipped when stderr is not a terminal.
fn print_banner(config: &ServerConfig) {
    use std::io::IsTerminal;

    if !std::io::stderr().is_terminal() {
        return;
    }

    let title = format!("Tollgate MCP Server v{}", env!("CARGO_PKG_VERSION"));
    let detail = format!(
        "port {}  ·  auth {}",
        config.port,
        if config.auth.enabled { "on" } else { "OFF" }
    );
    let width = title.chars().count().max(detail.chars().count()) + 4;

    eprintln!();
    eprintln!("╔{}╗", "═".repeat(width));
    eprintln!("║  {:<w$}  ║", title, w = width - 4);
    eprintln!("║  {:<w$}  ║", detail, w = width - 4);
    eprintln!("╚{}╝", "═".repeat(width));
    eprintln!();
}
