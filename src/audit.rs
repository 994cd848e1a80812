//! Best-effort audit trail
//!
//! [`AuditLogger::log`] never fails from the caller's point of view: a write
//! error is swallowed, but counted, exported as a metric and logged, so a
//! store outage is visible to operators without affecting login responses.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::database::AuditStore;
use crate::models::{LogLevel, LogRecord};
use crate::otel::GatewayMetrics;

/// Writes audit records to an [`AuditStore`]
pub struct AuditLogger<D: AuditStore> {
    store: Arc<D>,
    metrics: Arc<GatewayMetrics>,
    failures: AtomicU64,
}

impl<D: AuditStore> AuditLogger<D> {
    pub fn new(store: Arc<D>, metrics: Arc<GatewayMetrics>) -> Self {
        Self {
            store,
            metrics,
            failures: AtomicU64::new(0),
        }
    }

    /// Append one record, swallowing any store error
    pub async fn log(&self, level: LogLevel, message: &str, connection_id: Option<&str>) {
        let record = LogRecord::new(level, message).with_connection_id(connection_id);

        if let Err(e) = self.store.insert_log(&record).await {
            let failures = self.failures.fetch_add(1, Ordering::Relaxed) + 1;
            self.metrics.record_audit_failure();
            tracing::warn!(
                error = %e,
                level = %record.level,
                failures,
                "Failed to write audit record"
            );
        }
    }

    pub async fn info(&self, message: &str, connection_id: Option<&str>) {
        self.log(LogLevel::Info, message, connection_id).await;
    }

    pub async fn warning(&self, message: &str, connection_id: Option<&str>) {
        self.log(LogLevel::Warning, message, connection_id).await;
    }

    pub async fn error(&self, message: &str, connection_id: Option<&str>) {
        self.log(LogLevel::Error, message, connection_id).await;
    }

    /// Number of records that could not be written since startup
    pub fn failure_count(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Underlying store
    pub fn store(&self) -> &Arc<D> {
        &self.store
    }
}
