//! auth-gateway - A minimal authentication gateway
//!
//! This is the main entry point for the auth-gateway application.

use std::sync::Arc;

use clap::Parser;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info};

use auth_gateway::audit::AuditLogger;
use auth_gateway::auth::{AuthManager, AuthManagerConfig, LockoutConfig, SessionConfig};
use auth_gateway::config::Config;
use auth_gateway::database::SqliteAuditStore;
use auth_gateway::otel::{init_tracing, GatewayMetrics, OtelProvider};
use auth_gateway::server::{AppState, Server};

/// auth-gateway - A minimal authentication gateway
#[derive(Parser, Debug)]
#[command(name = "auth-gateway")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, env = "AUTH_GATEWAY_CONFIG")]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Missing or invalid configuration aborts before anything is served
    let config = load_config(&args)?;
    let credentials = config
        .validate()
        .map_err(|e| anyhow::anyhow!("CRITICAL: {}", e))?;

    let otel_provider = OtelProvider::new(&config.otel)?;
    init_tracing(&otel_provider, &config.logging)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting auth-gateway"
    );

    let metrics = Arc::new(GatewayMetrics::new(&otel_provider.meter()));

    // Schema setup failure is fatal
    let store = SqliteAuditStore::new(&credentials.connection_string, &credentials.target_db)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to initialize audit store: {}", e))?;
    let audit = Arc::new(AuditLogger::new(Arc::new(store), Arc::clone(&metrics)));

    let auth_manager = AuthManager::new(AuthManagerConfig {
        username: credentials.username.clone(),
        password: credentials.password.clone(),
        auto_login_secret: credentials.auto_login_secret.clone(),
        lockout: LockoutConfig {
            max_failures: config.lockout.max_failures,
            lockout_duration: config.lockout.lockout_duration(),
        },
        session: SessionConfig {
            ttl: config.session.ttl(),
            sweep_interval: config.session.sweep_interval(),
        },
    })
    .with_metrics(Arc::clone(&metrics));
    let auth_manager = Arc::new(auth_manager);
    info!(
        max_failures = config.lockout.max_failures,
        lockout_secs = config.lockout.lockout_duration_secs,
        session_ttl_secs = config.session.ttl_secs,
        "Authentication manager initialized"
    );

    // Expired-session sweeper
    let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);
    let sweeper = tokio::spawn(Arc::clone(auth_manager.sessions()).run_sweeper(shutdown_rx));

    let state = AppState {
        auth_manager,
        audit,
        metrics,
    };

    let server = Server::new(config.server.clone(), state);
    info!(
        host = %config.server.host,
        port = %config.server.port,
        "Starting HTTP server"
    );

    let result = server.run(shutdown_signal()).await;

    let _ = shutdown_tx.send(());
    if let Err(e) = sweeper.await {
        error!(error = %e, "Session sweeper task failed");
    }

    if let Err(e) = otel_provider.shutdown() {
        error!(error = %e, "Failed to shutdown OpenTelemetry");
    }

    info!("auth-gateway shutdown complete");

    result.map_err(Into::into)
}

/// Load configuration from file or environment
fn load_config(args: &Args) -> anyhow::Result<Config> {
    match &args.config {
        Some(path) => {
            // Use eprintln! since tracing is not yet initialized
            eprintln!("Loading configuration from file: {}", path);
            Config::from_file(path).map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
        }
        None => {
            eprintln!("Loading configuration from environment variables");
            Config::from_env().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
        }
    }
}

/// Create a future that resolves when a shutdown signal is received
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
