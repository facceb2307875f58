///
/// # DataAccessor
///
/// Owns one SQLite connection and the statement of the most recent
/// execution. Every public read and write funnels through `execute`:
///
/// 1. the previous statement is replaced by one built from the new SQL,
/// 2. the SQL is prepared,
/// 3. the execute callback (if any) sees the SQL and parameters,
/// 4. parameters are bound by name and the statement runs,
/// 5. a failure at any step becomes `DbError::Query` carrying the SQL text
///    and the driver's message and code.
///
/// The connection moves once from `Unconfigured` to `Connected` in `setup`
/// and stays open for the accessor's lifetime. Mutating calls take
/// `&mut self`, which is the only serialization this type needs: one caller
/// at a time, one current statement.
///

use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, warn};

use crate::builder::{build_insert, build_update, Condition};
use crate::config::{DbConfig, Dsn};
use crate::errors::{sqlite_error_code, BoxError, DbError};
use crate::statement::{ErrorInfo, FetchMode, Fetched, Prepared, Statement};
use crate::value::{Params, Row, Value};

pub type ExecuteCallback = Box<dyn FnMut(&str, &Params) -> Result<(), BoxError> + Send>;

enum ConnectionState {
    Unconfigured,
    Connected { config: DbConfig, conn: Connection },
}

/// Result of `DataAccessor::insert`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inserted {
    /// The rowid the driver generated for the new row.
    Id(i64),
    /// No id was generated (e.g. a `WITHOUT ROWID` table); rows inserted.
    Rows(u64),
}

impl Inserted {
    pub fn as_i64(&self) -> i64 {
        match self {
            Inserted::Id(id) => *id,
            Inserted::Rows(count) => *count as i64,
        }
    }

    pub fn id(&self) -> Option<i64> {
        match self {
            Inserted::Id(id) => Some(*id),
            Inserted::Rows(_) => None,
        }
    }
}

pub struct DataAccessor {
    state: ConnectionState,
    statement: Option<Statement>,
    callback: Option<ExecuteCallback>,
}

impl Default for DataAccessor {
    fn default() -> Self {
        Self::new()
    }
}

impl DataAccessor {
    pub fn new() -> Self {
        Self {
            state: ConnectionState::Unconfigured,
            statement: None,
            callback: None,
        }
    }

    /// Creates an accessor and connects it in one step.
    pub fn connect(config: DbConfig) -> Result<Self, DbError> {
        let mut accessor = Self::new();
        accessor.setup(config)?;
        Ok(accessor)
    }

    /// Stores `config` and opens the connection. Once connected, further
    /// calls keep the open connection and its config.
    pub fn setup(&mut self, config: DbConfig) -> Result<(), DbError> {
        if let ConnectionState::Connected { config: current, .. } = &self.state {
            warn!(dsn = %current.dsn, ignored_dsn = %config.dsn, "already connected, setup ignored");
            return Ok(());
        }

        config.validate().map_err(|e| DbError::Connection {
            dsn: config.dsn.clone(),
            message: e.to_string(),
            code: -1,
        })?;
        let conn = open_connection(&config)?;
        debug!(dsn = %config.dsn, "connected");
        self.state = ConnectionState::Connected { config, conn };
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.state, ConnectionState::Connected { .. })
    }

    pub fn config(&self) -> Option<&DbConfig> {
        match &self.state {
            ConnectionState::Connected { config, .. } => Some(config),
            ConnectionState::Unconfigured => None,
        }
    }

    /// Registers a hook called with the SQL and parameters before every
    /// execution. Replaces any earlier hook. An `Err` from the hook aborts
    /// the execution.
    pub fn set_execute_callback<F>(&mut self, callback: F)
    where
        F: FnMut(&str, &Params) -> Result<(), BoxError> + Send + 'static,
    {
        self.callback = Some(Box::new(callback));
    }

    pub fn clear_execute_callback(&mut self) {
        self.callback = None;
    }

    /// SQL text of the most recent execution, `""` before the first one.
    pub fn last_sql(&self) -> &str {
        self.statement.as_ref().map_or("", Statement::sql)
    }

    fn connection(&self) -> Result<&Connection, DbError> {
        match &self.state {
            ConnectionState::Connected { conn, .. } => Ok(conn),
            ConnectionState::Unconfigured => Err(DbError::NotConnected),
        }
    }

    /// Runs `sql`, keeping at most `max_rows` rows of its result.
    fn execute(
        &mut self,
        sql: &str,
        params: &Params,
        max_rows: Option<usize>,
    ) -> Result<&mut Statement, DbError> {
        let conn = match &self.state {
            ConnectionState::Connected { conn, .. } => conn,
            ConnectionState::Unconfigured => return Err(DbError::NotConnected),
        };

        debug!(sql = %sql, params = params.len(), "execute");

        let statement = match Prepared::new(conn, sql) {
            Ok(prepared) => {
                if let Some(callback) = self.callback.as_mut()
                    && let Err(source) = callback(sql, params)
                {
                    self.statement = Some(prepared.unexecuted());
                    return Err(DbError::Callback {
                        sql: sql.to_string(),
                        source,
                    });
                }
                prepared.run(params, max_rows)
            }
            Err(failed) => failed,
        };

        let statement = self.statement.insert(statement);
        if !statement.error_info().is_ok() {
            debug!(sql = %sql, code = statement.error_code(), "execute failed");
            return Err(statement.to_query_error());
        }
        Ok(statement)
    }

    pub fn fetch_all(&mut self, sql: &str, params: &Params) -> Result<Vec<Row>, DbError> {
        let statement = self.execute(sql, params, None)?;
        Ok(statement.cursor().collect())
    }

    pub fn fetch_column_all(
        &mut self,
        sql: &str,
        params: &Params,
        position: usize,
    ) -> Result<Vec<Value>, DbError> {
        let cursor = self.execute(sql, params, None)?.cursor();
        let mut values = Vec::with_capacity(cursor.remaining());
        while let Some(value) = cursor.next_column(position)? {
            values.push(value);
        }
        Ok(values)
    }

    pub fn fetch(&mut self, sql: &str, params: &Params) -> Result<Option<Row>, DbError> {
        let statement = self.execute(sql, params, Some(1))?;
        Ok(statement.cursor().next_row())
    }

    pub fn fetch_as(
        &mut self,
        sql: &str,
        params: &Params,
        mode: FetchMode,
    ) -> Result<Option<Fetched>, DbError> {
        self.execute(sql, params, Some(1))?.cursor().next_as(mode)
    }

    pub fn fetch_column(
        &mut self,
        sql: &str,
        params: &Params,
        position: usize,
    ) -> Result<Option<Value>, DbError> {
        self.execute(sql, params, Some(1))?.cursor().next_column(position)
    }

    pub fn exists(&mut self, sql: &str, params: &Params) -> Result<bool, DbError> {
        Ok(self.fetch(sql, params)?.is_some_and(|row| !row.is_empty()))
    }

    /// Runs `sql` and returns the driver's row count for it.
    pub fn query(&mut self, sql: &str, params: &Params) -> Result<u64, DbError> {
        Ok(self.execute(sql, params, None)?.row_count())
    }

    pub fn update(
        &mut self,
        table: &str,
        fields: &Params,
        condition: impl Into<Condition>,
    ) -> Result<u64, DbError> {
        let built = build_update(table, fields, &condition.into());
        self.query(&built.sql, &built.params)
    }

    pub fn insert(&mut self, table: &str, fields: &Params) -> Result<Inserted, DbError> {
        let built = build_insert(table, fields);
        let previous_id = self.connection()?.last_insert_rowid();
        let row_count = self.execute(&built.sql, &built.params, None)?.row_count();

        // SQLite keeps the last rowid across statements, so an unchanged id
        // only counts when the table really has rowids (a reused rowid).
        let conn = self.connection()?;
        let id = conn.last_insert_rowid();
        if id != 0 && (id != previous_id || has_rowid(conn, table)?) {
            Ok(Inserted::Id(id))
        } else {
            Ok(Inserted::Rows(row_count))
        }
    }

    pub fn begin_transaction(&mut self) -> Result<(), DbError> {
        self.transaction_control("begin", "BEGIN")
    }

    pub fn commit(&mut self) -> Result<(), DbError> {
        self.transaction_control("commit", "COMMIT")
    }

    pub fn roll_back(&mut self) -> Result<(), DbError> {
        self.transaction_control("rollback", "ROLLBACK")
    }

    pub fn in_transaction(&self) -> Result<bool, DbError> {
        Ok(!self.connection()?.is_autocommit())
    }

    fn transaction_control(&mut self, operation: &'static str, sql: &str) -> Result<(), DbError> {
        debug!(operation, "transaction");
        self.connection()?
            .execute_batch(sql)
            .map_err(|e| DbError::Transaction {
                operation,
                message: e.to_string(),
                code: sqlite_error_code(&e),
            })
    }

    /// Error details of the most recent execution, `None` before the first.
    pub fn error_info(&self) -> Option<&ErrorInfo> {
        self.statement.as_ref().map(Statement::error_info)
    }

    pub fn error_code(&self) -> Option<i64> {
        self.statement.as_ref().map(Statement::error_code)
    }
}

/// False for `WITHOUT ROWID` tables. `table` may be `schema.table`.
fn has_rowid(conn: &Connection, table: &str) -> Result<bool, DbError> {
    const SQL: &str = "SELECT wr FROM pragma_table_list \
        WHERE name = ?1 COLLATE NOCASE AND (?2 IS NULL OR schema = ?2 COLLATE NOCASE)";

    let (schema, name) = match table.split_once('.') {
        Some((schema, name)) => (Some(schema), name),
        None => (None, table),
    };

    let without_rowid: Option<bool> = conn
        .query_row(SQL, rusqlite::params![name, schema], |row| row.get(0))
        .optional()
        .map_err(|e| DbError::Query {
            sql: SQL.to_string(),
            message: e.to_string(),
            code: sqlite_error_code(&e),
        })?;
    Ok(!without_rowid.unwrap_or(false))
}

fn open_connection(config: &DbConfig) -> Result<Connection, DbError> {
    let connection_error = |e: rusqlite::Error| DbError::Connection {
        dsn: config.dsn.clone(),
        message: e.to_string(),
        code: sqlite_error_code(&e),
    };

    let encoding = config.sqlite_encoding().ok_or_else(|| DbError::Connection {
        dsn: config.dsn.clone(),
        message: format!("unsupported charset '{}'", config.charset),
        code: -1,
    })?;

    let conn = match config.parsed_dsn()? {
        Dsn::Memory => Connection::open_in_memory(),
        Dsn::File(path) => Connection::open(path),
    }
    .map_err(connection_error)?;

    conn.pragma_update(None, "encoding", encoding)
        .map_err(connection_error)?;

    Ok(conn)
}
