//! HTTP server components for auth-gateway
//!
//! This module provides the login endpoints, their middleware and the
//! server lifecycle.

pub mod middleware;
pub mod router;

pub use middleware::{AuthResponse, BearerToken, ConnectionId, ProblemDetails};
pub use router::{build_router, AppState, HealthResponse};

use std::future::Future;
use std::net::{Ipv4Addr, SocketAddr};

use tokio::net::TcpListener;

use crate::config::ServerConfig;
use crate::database::AuditStore;

/// HTTP Server for auth-gateway
///
/// Binds the configured address, records peer addresses for the audit trail
/// and shuts down gracefully when the shutdown future resolves.
pub struct Server<D: AuditStore + 'static> {
    config: ServerConfig,
    state: AppState<D>,
}

impl<D: AuditStore + 'static> Server<D> {
    /// Create a new server instance
    pub fn new(config: ServerConfig, state: AppState<D>) -> Self {
        Self { config, state }
    }

    /// Get the configured bind address
    ///
    /// An unparsable host falls back to the loopback address.
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(
            self.config
                .host
                .parse()
                .unwrap_or(Ipv4Addr::LOCALHOST.into()),
            self.config.port,
        )
    }

    /// Run the server until `shutdown` resolves
    pub async fn run(
        self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), ServerError> {
        let addr = self.bind_addr();
        let app = build_router(self.state).layer(tower_http::trace::TraceLayer::new_for_http());

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| ServerError::Bind { addr, source })?;

        tracing::info!(addr = %local_addr, "Server listening");

        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(ServerError::Serve)?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }
}

/// Server error types
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind to {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Serve(#[source] std::io::Error),
}
