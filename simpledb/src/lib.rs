///
/// # simpledb - A thin SQL access helper
///
/// Wraps one native SQLite connection (through rusqlite, bundled SQLite)
/// and offers parameter-bound execution plus small SELECT/INSERT/UPDATE
/// conveniences. Nothing here pools, retries, or plans queries: every call
/// blocks until the driver returns and every failure surfaces immediately.
///
/// Architecture:
/// - `DataAccessor` owns the connection (explicit Unconfigured → Connected
///   state) and the statement of the most recent execution.
/// - Results are materialized when a statement runs, so the retained
///   `Statement` never borrows the connection. Reads drain its `Cursor`.
/// - `builder` holds the pure SQL text builders and identifier quoting.
/// - Failures are `DbError` values; zero-row reads are not failures.
///
/// ## Library Usage
///
/// ```rust,ignore
/// use simpledb::{params, Condition, DataAccessor, DbConfig};
///
/// let mut db = DataAccessor::new();
/// db.setup(DbConfig::new("sqlite:app.db", "app", "secret", "utf8"))?;
///
/// let id = db.insert("users", &params! { "name" => "ada" })?;
/// let changed = db.update(
///     "users",
///     &params! { "name" => "grace" },
///     params! { "id" => id.as_i64() },
/// )?;
/// let rows = db.fetch_all("SELECT * FROM users WHERE id > :id", &params! { "id" => 0 })?;
/// ```
///

pub mod accessor;
pub mod builder;
pub mod config;
pub mod errors;
pub mod statement;
pub mod value;

pub use accessor::{DataAccessor, ExecuteCallback, Inserted};
pub use builder::{format_table_name, Condition};
pub use config::{load_config, parse_config_str, DbConfig, Dsn};
pub use errors::{BoxError, DbError};
pub use statement::{Cursor, ErrorInfo, FetchMode, Fetched, Statement};
pub use value::{Params, Row, Value};
