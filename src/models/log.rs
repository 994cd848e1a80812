//! Audit log domain models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Placeholder stored when a record has no connection identifier
pub const NO_CONNECTION_ID: &str = "-";

/// Severity of an audit record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    /// Successful authentication
    Info,
    /// Attempt rejected by the lockout
    Warning,
    /// Failed authentication
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warning => write!(f, "WARNING"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "INFO" => Ok(LogLevel::Info),
            "WARNING" | "WARN" => Ok(LogLevel::Warning),
            "ERROR" => Ok(LogLevel::Error),
            _ => Err(format!("Invalid log level: {}", s)),
        }
    }
}

/// One row of the `AppLogging` table
///
/// Records are append-only. `id` and `timestamp` are assigned by the store
/// on insertion and are only populated on records read back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Database ID (set after insertion)
    pub id: Option<i64>,

    /// Insertion time (UTC, set by the store)
    pub timestamp: Option<DateTime<Utc>>,

    /// Severity
    pub level: LogLevel,

    /// Free-text message
    pub message: String,

    /// Connection identifier, `-` when unknown
    pub connection_id: String,
}

impl LogRecord {
    /// Create a new record without a connection identifier
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            id: None,
            timestamp: None,
            level,
            message: message.into(),
            connection_id: NO_CONNECTION_ID.to_string(),
        }
    }

    /// Set the connection identifier; `None` keeps the placeholder
    pub fn with_connection_id(mut self, connection_id: Option<&str>) -> Self {
        self.connection_id = connection_id
            .filter(|id| !id.is_empty())
            .unwrap_or(NO_CONNECTION_ID)
            .to_string();
        self
    }
}
