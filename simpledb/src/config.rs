///
/// # Connection Configuration
///
/// Types and functions for the four-key connection config. All keys are
/// required and none has a default.
///
/// ## Example simpledb.toml
///
/// ```toml
/// dsn = "sqlite:/var/lib/app/app.db"
/// username = "app"
/// password = "secret"
/// charset = "utf8"
/// ```
///
/// ## DSN
///
/// - `sqlite::memory:` opens a private in-memory database.
/// - `sqlite:<path>` opens (or creates) the database file at `<path>`.
///
/// ## Charset
///
/// The charset is sent as `PRAGMA encoding` when the connection opens.
/// MySQL-style names are accepted (`utf8`, `utf8mb4`) and normalized to
/// SQLite's encoding names. `username` and `password` are kept for
/// interface compatibility; SQLite has no authentication and ignores them.
///

use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::errors::DbError;

const MEMORY_DSN: &str = "sqlite::memory:";
const DSN_PREFIX: &str = "sqlite:";

#[derive(Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DbConfig {
    pub dsn: String,
    pub username: String,
    pub password: String,
    pub charset: String,
}

impl fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbConfig")
            .field("dsn", &self.dsn)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("charset", &self.charset)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dsn {
    Memory,
    File(PathBuf),
}

impl DbConfig {
    pub fn new(
        dsn: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        charset: impl Into<String>,
    ) -> Self {
        Self {
            dsn: dsn.into(),
            username: username.into(),
            password: password.into(),
            charset: charset.into(),
        }
    }

    pub fn validate(&self) -> Result<(), DbError> {
        if self.dsn.trim().is_empty() {
            return Err(DbError::InvalidConfig("'dsn' must not be empty".to_string()));
        }
        if self.charset.trim().is_empty() {
            return Err(DbError::InvalidConfig(
                "'charset' must not be empty".to_string(),
            ));
        }
        self.parsed_dsn()?;
        Ok(())
    }

    pub fn parsed_dsn(&self) -> Result<Dsn, DbError> {
        parse_dsn(&self.dsn)
    }

    /// SQLite encoding name for the configured charset, if it has one.
    pub fn sqlite_encoding(&self) -> Option<&'static str> {
        match self.charset.trim().to_ascii_lowercase().as_str() {
            "utf8" | "utf-8" | "utf8mb4" | "utf8mb3" => Some("UTF-8"),
            "utf16" | "utf-16" => Some("UTF-16"),
            "utf16le" | "utf-16le" => Some("UTF-16le"),
            "utf16be" | "utf-16be" => Some("UTF-16be"),
            _ => None,
        }
    }
}

pub fn parse_dsn(dsn: &str) -> Result<Dsn, DbError> {
    let dsn = dsn.trim();
    if dsn == MEMORY_DSN {
        return Ok(Dsn::Memory);
    }
    match dsn.strip_prefix(DSN_PREFIX) {
        Some(path) if !path.is_empty() => Ok(Dsn::File(PathBuf::from(path))),
        _ => Err(DbError::InvalidDsn(dsn.to_string())),
    }
}

pub fn load_config(path: &Path) -> Result<DbConfig, DbError> {
    if !path.exists() {
        return Err(DbError::ConfigNotFound {
            path: path.to_path_buf(),
        });
    }
    let content = std::fs::read_to_string(path)?;
    parse_config_str(&content)
}

pub fn parse_config_str(content: &str) -> Result<DbConfig, DbError> {
    let config: DbConfig = toml::from_str(content)?;
    config.validate()?;
    Ok(config)
}
