//! SQLite implementation of the AuditStore trait
//!
//! The connection string names the default database. The target database is
//! a sibling file `<target_db>.db` next to it, attached to each connection
//! as schema `audit` (SQLite creates the file on first attach). Every
//! operation opens a fresh connection and drops it afterwards.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_rusqlite::Connection;

use super::schema::{verify_columns, CREATE_INDEXES, CREATE_TABLE};
use super::AuditStore;
use crate::config::is_valid_database_name;
use crate::error::DbError;
use crate::models::{LogLevel, LogRecord};

/// SQLite audit store
#[derive(Debug, Clone)]
pub struct SqliteAuditStore {
    default_path: PathBuf,
    target_path: PathBuf,
    target_db: String,
}

impl SqliteAuditStore {
    /// Connect to the default database, create the target database and the
    /// audit table if absent, and check the table layout
    ///
    /// The connection string is either a file path or `Data Source=<path>`.
    pub async fn new(connection_string: &str, target_db: &str) -> Result<Self, DbError> {
        if !is_valid_database_name(target_db) {
            return Err(DbError::InvalidDatabaseName(target_db.to_string()));
        }

        let default_path = parse_connection_string(connection_string);
        let target_path = default_path
            .parent()
            .unwrap_or_else(|| Path::new(""))
            .join(format!("{}.db", target_db));

        let store = Self {
            default_path,
            target_path,
            target_db: target_db.to_string(),
        };

        let conn = store.connect().await?;
        let columns = conn
            .call(|conn| {
                conn.execute_batch(CREATE_TABLE)?;

                let mut stmt = conn.prepare("PRAGMA audit.table_info(AppLogging)")?;
                let columns = stmt
                    .query_map([], |row| row.get::<_, String>(1))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(columns)
            })
            .await?;
        verify_columns(&columns)?;

        conn.call(|conn| {
            conn.execute_batch(CREATE_INDEXES)?;
            Ok(())
        })
        .await?;

        tracing::info!(
            default_db = %store.default_path.display(),
            target_db = %store.target_db,
            target_path = %store.target_path.display(),
            "Audit store ready"
        );

        Ok(store)
    }

    /// Name of the target database
    pub fn target_db(&self) -> &str {
        &self.target_db
    }

    /// File backing the target database
    pub fn target_path(&self) -> &Path {
        &self.target_path
    }

    /// Open the default database and switch to the target database
    async fn connect(&self) -> Result<Connection, DbError> {
        let conn = Connection::open(&self.default_path).await?;
        let target = self.target_path.to_string_lossy().into_owned();

        conn.call(move |conn| {
            conn.execute("ATTACH DATABASE ?1 AS audit", [target])?;
            Ok(())
        })
        .await?;

        Ok(conn)
    }
}

#[async_trait]
impl AuditStore for SqliteAuditStore {
    async fn insert_log(&self, record: &LogRecord) -> Result<(), DbError> {
        let level = record.level.to_string();
        let message = record.message.clone();
        let connection_id = record.connection_id.clone();

        self.connect()
            .await?
            .call(move |conn| {
                conn.execute(
                    r#"
                    INSERT INTO audit.AppLogging (Level, Message, ConnectionId)
                    VALUES (?1, ?2, ?3)
                    "#,
                    rusqlite::params![level, message, connection_id],
                )?;
                Ok(())
            })
            .await?;

        Ok(())
    }

    async fn get_logs(&self, limit: u32, offset: u32) -> Result<Vec<LogRecord>, DbError> {
        self.connect()
            .await?
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    r#"
                    SELECT Id, Timestamp, Level, Message, ConnectionId
                    FROM audit.AppLogging
                    ORDER BY Id DESC
                    LIMIT ?1 OFFSET ?2
                    "#,
                )?;

                let logs = stmt
                    .query_map(rusqlite::params![limit, offset], |row| {
                        Ok(LogRecord {
                            id: Some(row.get(0)?),
                            timestamp: parse_datetime(row.get::<_, Option<String>>(1)?),
                            level: level_column(row, 2)?,
                            message: row.get(3)?,
                            connection_id: row.get(4)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;

                Ok(logs)
            })
            .await
            .map_err(Into::into)
    }

    async fn get_logs_count(&self) -> Result<u64, DbError> {
        self.connect()
            .await?
            .call(|conn| {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM audit.AppLogging", [], |row| row.get(0))?;
                Ok(count as u64)
            })
            .await
            .map_err(Into::into)
    }
}

/// Read a `Level` column, rejecting values outside the known levels
fn level_column(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<LogLevel> {
    row.get::<_, String>(idx)?.parse::<LogLevel>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, e.into())
    })
}

/// Extract the database path from a connection string
fn parse_connection_string(connection_string: &str) -> PathBuf {
    let trimmed = connection_string.trim();

    if !trimmed.contains('=') {
        let path = trimmed
            .strip_prefix("sqlite://")
            .or_else(|| trimmed.strip_prefix("sqlite:"))
            .unwrap_or(trimmed);
        return PathBuf::from(path);
    }

    trimmed
        .split(';')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| {
            let key = key.trim();
            key.eq_ignore_ascii_case("Data Source")
                || key.eq_ignore_ascii_case("DataSource")
                || key.eq_ignore_ascii_case("Filename")
        })
        .map(|(_, value)| PathBuf::from(value.trim()))
        .unwrap_or_else(|| PathBuf::from(trimmed))
}

/// Parse a datetime string to DateTime<Utc>
fn parse_datetime(s: Option<String>) -> Option<DateTime<Utc>> {
    s.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
            .or_else(|| {
                // SQLite CURRENT_TIMESTAMP format, always UTC
                chrono::NaiveDateTime::parse_from_str(&s, "%Y-%m-%d %H:%M:%S")
                    .ok()
                    .map(|dt| dt.and_utc())
            })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn create_test_store(dir: &TempDir) -> SqliteAuditStore {
        let default = dir.path().join("master.db");
        SqliteAuditStore::new(default.to_str().unwrap(), "AuditDb")
            .await
            .unwrap()
    }

    // Test 1: Construction creates the target database file
    #[tokio::test]
    async fn test_new_creates_target_database() {
        let dir = TempDir::new().unwrap();
        let store = create_test_store(&dir).await;

        assert_eq!(store.target_db(), "AuditDb");
        assert_eq!(store.target_path(), dir.path().join("AuditDb.db"));
        assert!(dir.path().join("AuditDb.db").exists());
        assert_eq!(store.get_logs_count().await.unwrap(), 0);
    }

    // Test 2: Construction is idempotent
    #[tokio::test]
    async fn test_new_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = create_test_store(&dir).await;
        store
            .insert_log(&LogRecord::new(LogLevel::Info, "first"))
            .await
            .unwrap();

        let store = create_test_store(&dir).await;

        assert_eq!(store.get_logs_count().await.unwrap(), 1);
    }

    // Test 3: Insert and read back records
    #[tokio::test]
    async fn test_insert_and_get_logs() {
        let dir = TempDir::new().unwrap();
        let store = create_test_store(&dir).await;

        store
            .insert_log(&LogRecord::new(LogLevel::Error, "Failed login attempt"))
            .await
            .unwrap();
        store
            .insert_log(
                &LogRecord::new(LogLevel::Info, "User admin logged in successfully.")
                    .with_connection_id(Some("127.0.0.1:50000")),
            )
            .await
            .unwrap();

        let logs = store.get_logs(10, 0).await.unwrap();
        assert_eq!(logs.len(), 2);

        // Newest first
        assert_eq!(logs[0].level, LogLevel::Info);
        assert_eq!(logs[0].connection_id, "127.0.0.1:50000");
        assert_eq!(logs[1].level, LogLevel::Error);
        assert_eq!(logs[1].message, "Failed login attempt");
        assert_eq!(logs[1].connection_id, "-");

        for log in &logs {
            assert!(log.id.is_some());
            let ts = log.timestamp.expect("timestamp assigned by the store");
            assert!((Utc::now() - ts).num_seconds().abs() < 60);
        }

        assert_eq!(store.get_logs_count().await.unwrap(), 2);
    }

    // Test 4: Pagination
    #[tokio::test]
    async fn test_get_logs_pagination() {
        let dir = TempDir::new().unwrap();
        let store = create_test_store(&dir).await;

        for i in 0..5 {
            store
                .insert_log(&LogRecord::new(LogLevel::Info, format!("entry {}", i)))
                .await
                .unwrap();
        }

        let page = store.get_logs(2, 1).await.unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].message, "entry 3");
        assert_eq!(page[1].message, "entry 2");
    }

    // Test 5: Unsafe target database names are rejected
    #[tokio::test]
    async fn test_invalid_database_name() {
        let dir = TempDir::new().unwrap();
        let default = dir.path().join("master.db");

        let result = SqliteAuditStore::new(default.to_str().unwrap(), "../escape").await;
        assert!(matches!(result, Err(DbError::InvalidDatabaseName(_))));

        let result = SqliteAuditStore::new(default.to_str().unwrap(), "").await;
        assert!(matches!(result, Err(DbError::InvalidDatabaseName(_))));
    }

    // Test 6: Existing table with a different layout is a schema error
    #[tokio::test]
    async fn test_schema_mismatch_detected() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("AuditDb.db");
        {
            let conn = rusqlite::Connection::open(&target).unwrap();
            conn.execute_batch(
                "CREATE TABLE AppLogging (Id INTEGER PRIMARY KEY, Level TEXT, Message TEXT)",
            )
            .unwrap();
        }

        let default = dir.path().join("master.db");
        let result = SqliteAuditStore::new(default.to_str().unwrap(), "AuditDb").await;

        match result {
            Err(DbError::Schema(msg)) => assert!(msg.contains("Timestamp")),
            other => panic!("Expected DbError::Schema, got {:?}", other),
        }
    }

    // Test 7: A stored level outside the known levels is an error, not INFO
    #[tokio::test]
    async fn test_unknown_level_is_conversion_error() {
        let dir = TempDir::new().unwrap();
        let store = create_test_store(&dir).await;
        {
            let conn = rusqlite::Connection::open(store.target_path()).unwrap();
            conn.execute(
                "INSERT INTO AppLogging (Level, Message, ConnectionId) VALUES ('Bogus', 'x', '-')",
                [],
            )
            .unwrap();
        }

        let result = store.get_logs(10, 0).await;

        assert!(matches!(
            result,
            Err(DbError::Connection(tokio_rusqlite::Error::Rusqlite(
                rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, _)
            )))
        ));
        assert_eq!(store.get_logs_count().await.unwrap(), 1);
    }

    // Test 8: Unreachable default database fails on construction
    #[tokio::test]
    async fn test_unreachable_database() {
        let dir = TempDir::new().unwrap();
        let default = dir.path().join("missing").join("master.db");

        let result = SqliteAuditStore::new(default.to_str().unwrap(), "AuditDb").await;
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_connection_string() {
        assert_eq!(
            parse_connection_string("/var/lib/gw/master.db"),
            PathBuf::from("/var/lib/gw/master.db")
        );
        assert_eq!(
            parse_connection_string("sqlite:///tmp/master.db"),
            PathBuf::from("/tmp/master.db")
        );
        assert_eq!(
            parse_connection_string("Data Source=/tmp/master.db;Cache=Shared"),
            PathBuf::from("/tmp/master.db")
        );
        assert_eq!(
            parse_connection_string("Mode=ReadWrite; filename = master.db"),
            PathBuf::from("master.db")
        );
    }

    #[test]
    fn test_parse_datetime_formats() {
        let dt = parse_datetime(Some("2024-01-02 03:04:05".to_string())).unwrap();
        assert_eq!(dt.to_rfc3339(), "2024-01-02T03:04:05+00:00");

        let dt = parse_datetime(Some("2024-01-02T03:04:05Z".to_string())).unwrap();
        assert_eq!(dt.to_rfc3339(), "2024-01-02T03:04:05+00:00");

        assert!(parse_datetime(None).is_none());
        assert!(parse_datetime(Some("garbage".to_string())).is_none());
    }
}
