///
/// Database error types.
///
/// Every failure the accessor can report: opening the connection, running a
/// statement, the execute callback, transaction control, and config loading.
/// Reads that match no rows are not errors and never produce one of these.
///

use std::path::PathBuf;
use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("Failed to connect to {dsn}: {message}")]
    Connection {
        dsn: String,
        message: String,
        code: i64,
    },

    #[error("SQL: {sql}\n{message}")]
    Query {
        sql: String,
        message: String,
        code: i64,
    },

    #[error("Execute callback failed for SQL: {sql}")]
    Callback {
        sql: String,
        #[source]
        source: BoxError,
    },

    #[error("Transaction {operation} failed: {message}")]
    Transaction {
        operation: &'static str,
        message: String,
        code: i64,
    },

    #[error("Not connected. Call setup() first.")]
    NotConnected,

    #[error("Column {position} out of range (statement has {count} columns)")]
    ColumnOutOfRange { position: usize, count: usize },

    #[error("Invalid DSN '{0}': expected 'sqlite::memory:' or 'sqlite:<path>'")]
    InvalidDsn(String),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Config not found at {path}")]
    ConfigNotFound { path: PathBuf },

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl DbError {
    /// Driver-native error code, when the failure came from the driver.
    pub fn code(&self) -> Option<i64> {
        match self {
            DbError::Connection { code, .. }
            | DbError::Query { code, .. }
            | DbError::Transaction { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// SQL text of the failing statement.
    pub fn sql(&self) -> Option<&str> {
        match self {
            DbError::Query { sql, .. } | DbError::Callback { sql, .. } => Some(sql),
            _ => None,
        }
    }
}

pub(crate) fn sqlite_error_code(e: &rusqlite::Error) -> i64 {
    match e {
        rusqlite::Error::SqliteFailure(err, _) => err.extended_code as i64,
        _ => -1,
    }
}
