//! Common test utilities and helpers for integration tests

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use auth_gateway::audit::AuditLogger;
use auth_gateway::auth::{AuthManager, AuthManagerConfig, LockoutConfig, SessionConfig};
use auth_gateway::database::{AuditStore, SqliteAuditStore};
use auth_gateway::error::DbError;
use auth_gateway::models::LogRecord;
use auth_gateway::otel::GatewayMetrics;
use auth_gateway::server::{build_router, AppState};
use tempfile::TempDir;

pub const TEST_USERNAME: &str = "admin";
pub const TEST_PASSWORD: &str = "admin_password";
pub const TEST_SECRET: &str = "shared_secret";
pub const TEST_TARGET_DB: &str = "AuditDb";

/// Audit store that fails every operation, standing in for an outage
#[derive(Debug, Default)]
pub struct FailingAuditStore {
    pub attempts: AtomicU64,
}

#[async_trait]
impl AuditStore for FailingAuditStore {
    async fn insert_log(&self, _record: &LogRecord) -> Result<(), DbError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(DbError::Connection(tokio_rusqlite::Error::ConnectionClosed))
    }

    async fn get_logs(&self, _limit: u32, _offset: u32) -> Result<Vec<LogRecord>, DbError> {
        Err(DbError::Connection(tokio_rusqlite::Error::ConnectionClosed))
    }

    async fn get_logs_count(&self) -> Result<u64, DbError> {
        Err(DbError::Connection(tokio_rusqlite::Error::ConnectionClosed))
    }
}

/// Auth manager configuration with the test credentials
pub fn create_test_auth_config() -> AuthManagerConfig {
    AuthManagerConfig {
        username: TEST_USERNAME.to_string(),
        password: TEST_PASSWORD.to_string(),
        auto_login_secret: TEST_SECRET.to_string(),
        lockout: LockoutConfig::default(),
        session: SessionConfig::default(),
    }
}

/// Create a SQLite audit store in a fresh temporary directory
///
/// The directory is returned so it outlives the store.
pub async fn create_test_store() -> (Arc<SqliteAuditStore>, TempDir) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let default = dir.path().join("master.db");
    let store = SqliteAuditStore::new(
        default.to_str().expect("temp path is valid UTF-8"),
        TEST_TARGET_DB,
    )
    .await
    .expect("Failed to create test audit store");
    (Arc::new(store), dir)
}

/// Create an application state around any audit store
pub fn create_state_with_store<D: AuditStore>(
    store: Arc<D>,
    auth_config: AuthManagerConfig,
) -> AppState<D> {
    let metrics = Arc::new(GatewayMetrics::global());
    AppState {
        auth_manager: Arc::new(AuthManager::new(auth_config).with_metrics(Arc::clone(&metrics))),
        audit: Arc::new(AuditLogger::new(store, Arc::clone(&metrics))),
        metrics,
    }
}

/// Create a test application state backed by SQLite
pub async fn create_test_state() -> (AppState<SqliteAuditStore>, TempDir) {
    let (store, dir) = create_test_store().await;
    (create_state_with_store(store, create_test_auth_config()), dir)
}

/// Run a test server in the background and return the address
/// The server will be shut down when the returned shutdown sender is dropped or sent
pub async fn run_test_server<D: AuditStore + 'static>(
    state: AppState<D>,
) -> (SocketAddr, tokio::sync::oneshot::Sender<()>) {
    use tokio::net::TcpListener;

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test server");
    let addr = listener.local_addr().expect("Failed to get local address");

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

    let app = build_router(state).layer(tower_http::trace::TraceLayer::new_for_http());

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.await;
        })
        .await
        .expect("Server error");
    });

    // Give the server a moment to start
    tokio::time::sleep(Duration::from_millis(100)).await;

    (addr, shutdown_tx)
}

/// POST `/login`
pub async fn post_login(addr: SocketAddr, user: &str, pass: &str) -> reqwest::Response {
    reqwest::Client::new()
        .post(format!("http://{}/login", addr))
        .json(&serde_json::json!({ "User": user, "Pass": pass }))
        .send()
        .await
        .expect("Failed to send login request")
}

/// POST `/auth-secret`
pub async fn post_secret(addr: SocketAddr, secret: &str) -> reqwest::Response {
    reqwest::Client::new()
        .post(format!("http://{}/auth-secret", addr))
        .json(&serde_json::json!({ "Secret": secret }))
        .send()
        .await
        .expect("Failed to send secret login request")
}
