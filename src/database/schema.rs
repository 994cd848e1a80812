//! Audit table layout
//!
//! The target database is attached to every connection under the schema
//! name [`AUDIT_SCHEMA`]; statements here address it explicitly.

use crate::error::DbError;

/// Schema name the target database is attached as
pub const AUDIT_SCHEMA: &str = "audit";

/// Name of the audit table
pub const TABLE_NAME: &str = "AppLogging";

/// Columns the audit table must have, in order
pub const EXPECTED_COLUMNS: [&str; 5] = ["Id", "Timestamp", "Level", "Message", "ConnectionId"];

/// Idempotent table setup, run once at startup
pub const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS audit.AppLogging (
    Id INTEGER PRIMARY KEY AUTOINCREMENT,
    Timestamp DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
    Level TEXT NOT NULL,
    Message TEXT NOT NULL,
    ConnectionId TEXT NOT NULL DEFAULT '-'
);
"#;

/// Indexes, created only once the table layout has been verified
pub const CREATE_INDEXES: &str = r#"
CREATE INDEX IF NOT EXISTS audit.idx_applogging_timestamp ON AppLogging(Timestamp);
"#;

/// Check the column names reported by `PRAGMA table_info`
///
/// Names are compared case-insensitively, matching SQLite identifier rules.
pub fn verify_columns(columns: &[String]) -> Result<(), DbError> {
    if columns.is_empty() {
        return Err(DbError::Schema(format!("table {} does not exist", TABLE_NAME)));
    }

    for expected in EXPECTED_COLUMNS {
        if !columns.iter().any(|c| c.eq_ignore_ascii_case(expected)) {
            return Err(DbError::Schema(format!(
                "{} is missing column {}",
                TABLE_NAME, expected
            )));
        }
    }

    if let Some(extra) = columns
        .iter()
        .find(|c| !EXPECTED_COLUMNS.iter().any(|e| e.eq_ignore_ascii_case(c)))
    {
        return Err(DbError::Schema(format!(
            "{} has unexpected column {}",
            TABLE_NAME, extra
        )));
    }

    Ok(())
}
