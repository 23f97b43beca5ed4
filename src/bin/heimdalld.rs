//! heimdalld: the Heimdall daemon.
//!
//! Serves the [`DecisionPlane`](heimdall::DecisionPlane) over HTTP so
//! inference front-ends can share one set of routing decisions.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;

use heimdall::HeimdallError;
use heimdall::server::config::Config;
use heimdall::server::{AppState, router};

/// Heimdall daemon, the LLM inference decision plane.
#[derive(Parser)]
#[command(name = "heimdalld")]
#[command(version = heimdall::PKG_VERSION)]
#[command(about = "Heimdall inference decision plane daemon")]
struct Args {
    /// Path to configuration file.
    #[arg(short, long, env = "HEIMDALL_CONFIG")]
    config: Option<std::path::PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    // Load configuration
    let config = Config::load(args.config.as_deref())?;

    let plane = config.plane_builder()?.build()?;

    // Parse address
    let addr: SocketAddr = config
        .server
        .address
        .parse()
        .map_err(|e| HeimdallError::Configuration(format!("Invalid address: {e}")))?;

    info!(
        version = heimdall::version_string(),
        environment = %config.environment,
        %addr,
        "heimdalld starting"
    );

    let state = AppState::new(
        Arc::new(plane),
        Duration::from_secs(config.server.limits.request_timeout_secs),
    );
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, router(state)).await?;

    Ok(())
}
