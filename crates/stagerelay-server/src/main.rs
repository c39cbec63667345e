//! StageRelay Server
//!
//! Runs either role of the staged analysis pipeline, or both:
//! - `emitter`: streams canned progress stages with injected faults on /analyze
//! - `relay`: consumes the emitter stream and re-frames it with phases on /analysis
//! - `serve` (default): both roles in one process
//!
//! Usage:
//! ```bash
//! # Both roles with defaults (emitter on :3002, relay on :3001)
//! stagerelay-server
//!
//! # Relay only, pointed at a remote emitter
//! STAGERELAY_UPSTREAM_URL=http://emitter:3002 stagerelay-server relay
//!
//! # With config file (env vars override it)
//! ERROR_RATE=0.05 stagerelay-server --config config.yaml
//! ```
//!
//! Test with:
//! ```bash
//! curl -N http://localhost:3001/analysis \
//!   -H "Content-Type: application/json" \
//!   -d '{"text": "분석할 문장"}'
//! ```

mod app;
mod config;

use axum::Router;
use clap::{Parser, Subcommand};
use config::{LoggingConfig, ServerConfig};
use stagerelay_observability::Metrics;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{Level, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// StageRelay Server - staged analysis emitter and phase relay
#[derive(Parser)]
#[command(name = "stagerelay-server")]
#[command(about = "Staged analysis event emitter and relay", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to configuration file (YAML or TOML)
    #[arg(
        short,
        long,
        value_name = "FILE",
        env = "STAGERELAY_CONFIG",
        global = true
    )]
    config: Option<String>,
}

#[derive(Subcommand, Clone, Copy)]
enum Commands {
    /// Run only the emitter
    Emitter,
    /// Run only the relay
    Relay,
    /// Run emitter and relay together (default if no command specified)
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ServerConfig::from_file(path)?,
        None => ServerConfig::default(),
    };

    // Merge environment variables (they override config file)
    config.merge_env();

    init_tracing(&config.logging)?;

    match &cli.config {
        Some(path) => info!("📁 Loaded configuration from: {}", path),
        None => info!("📁 Using default configuration"),
    }
    if config.logging.log_requests {
        info!("📋 Request logging enabled");
    }

    let metrics = Arc::new(Metrics::new()?);

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Emitter => {
            let app = app::emitter_app(&config, metrics)?;
            serve("Emitter", &config.host, config.emitter.port, app).await?;
        }
        Commands::Relay => {
            let app = app::relay_app(&config, metrics)?;
            serve("Relay", &config.host, config.relay.port, app).await?;
        }
        Commands::Serve => {
            let emitter = app::emitter_app(&config, metrics.clone())?;
            let relay = app::relay_app(&config, metrics)?;
            tokio::try_join!(
                serve("Emitter", &config.host, config.emitter.port, emitter),
                serve("Relay", &config.host, config.relay.port, relay),
            )?;
        }
    }

    Ok(())
}

fn init_tracing(logging: &LoggingConfig) -> anyhow::Result<()> {
    let log_level = match logging.level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // Build EnvFilter with base level
    let mut filter = EnvFilter::new(format!("{}", log_level));

    // Per-request spans from TraceLayer only when asked for
    let tower_http = if logging.log_requests {
        "tower_http=debug"
    } else {
        "tower_http=warn"
    };
    match tower_http.parse() {
        Ok(directive) => filter = filter.add_directive(directive),
        Err(e) => eprintln!("Failed to set tower_http log filter: {}", e),
    }

    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

async fn serve(role: &str, host: &str, port: u16, app: Router) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    let listener = TcpListener::bind(addr).await?;

    info!("✅ {} listening on http://{}", role, addr);
    info!("   - Health check:       http://{}/healthz", addr);
    info!("   - Readiness check:    http://{}/readyz", addr);
    info!("   - Prometheus metrics: http://{}/metrics", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("{} stopped", role);
    Ok(())
}

/// Wait for shutdown signal (SIGINT or SIGTERM)
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
