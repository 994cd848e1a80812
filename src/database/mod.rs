//! Database layer for auth-gateway
//!
//! This module defines the audit store trait and its SQLite implementation.

pub mod schema;
pub mod sqlite;

pub use sqlite::SqliteAuditStore;

use async_trait::async_trait;

use crate::error::DbError;
use crate::models::LogRecord;

/// Append-only store for audit records
///
/// It uses `async_trait` for async methods and `mockall::automock` for testing.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Append one record; `id` and `timestamp` are assigned by the store
    async fn insert_log(&self, record: &LogRecord) -> Result<(), DbError>;

    /// Get records, newest first, with pagination
    async fn get_logs(&self, limit: u32, offset: u32) -> Result<Vec<LogRecord>, DbError>;

    /// Get total count of records
    async fn get_logs_count(&self) -> Result<u64, DbError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LogLevel;

    // Test 1: MockAuditStore insert_log receives the record
    #[tokio::test]
    async fn test_mock_store_insert_log() {
        let mut mock = MockAuditStore::new();

        mock.expect_insert_log()
            .withf(|record| record.level == LogLevel::Info && record.connection_id == "-")
            .times(1)
            .returning(|_| Ok(()));

        let record = LogRecord::new(LogLevel::Info, "User admin logged in successfully.");
        assert!(mock.insert_log(&record).await.is_ok());
    }

    // Test 2: MockAuditStore pagination and count
    #[tokio::test]
    async fn test_mock_store_get_logs() {
        let mut mock = MockAuditStore::new();

        mock.expect_get_logs()
            .withf(|limit, offset| *limit == 10 && *offset == 0)
            .returning(|_, _| Ok(vec![LogRecord::new(LogLevel::Error, "Failed login")]));
        mock.expect_get_logs_count().returning(|| Ok(42));

        let logs = mock.get_logs(10, 0).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].level, LogLevel::Error);

        assert_eq!(mock.get_logs_count().await.unwrap(), 42);
    }

    // Test 3: MockAuditStore error handling
    #[tokio::test]
    async fn test_mock_store_error_handling() {
        let mut mock = MockAuditStore::new();

        mock.expect_insert_log()
            .returning(|_| Err(DbError::Connection(tokio_rusqlite::Error::ConnectionClosed)));

        let record = LogRecord::new(LogLevel::Warning, "Locked out");
        match mock.insert_log(&record).await {
            Err(DbError::Connection(_)) => (),
            other => panic!("Expected DbError::Connection, got {:?}", other),
        }
    }
}
