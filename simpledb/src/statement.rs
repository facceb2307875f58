///
/// The retained statement of the most recent execution.
///
/// rusqlite's `Statement` and `Rows` borrow the connection, so the result set
/// is materialized while the prepared statement is alive and then kept here
/// as owned data. A `Statement` carries:
/// - the SQL text it was prepared from (the accessor's `last_sql`),
/// - the column names and rows, read through a `Cursor`,
/// - the driver row count,
/// - the driver error info of the execution (code 0 on success).
///
/// Running a statement binds every parameter by name. A parameter that has
/// no placeholder, or a placeholder with no parameter, fails the execution
/// instead of silently binding NULL.
///

use crate::errors::{sqlite_error_code, DbError};
use crate::value::{Params, Row, Value};

/// Driver error details of an execution. `code` 0 means success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    pub code: i64,
    pub message: Option<String>,
}

impl ErrorInfo {
    pub fn ok() -> Self {
        Self {
            code: 0,
            message: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.code == 0
    }
}

impl From<&rusqlite::Error> for ErrorInfo {
    fn from(e: &rusqlite::Error) -> Self {
        Self {
            code: sqlite_error_code(e),
            message: Some(e.to_string()),
        }
    }
}

/// How a fetched row is represented.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FetchMode {
    /// Column name → value.
    #[default]
    Assoc,
    /// Values in column order.
    Num,
    /// The single value at a column position.
    Column(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Fetched {
    Assoc(Row),
    Num(Vec<Value>),
    Column(Value),
}

/// Bounded, forward-only cursor over a materialized result set.
#[derive(Debug, Clone, Default)]
pub struct Cursor {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
    position: usize,
}

impl Cursor {
    pub(crate) fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self {
            columns,
            rows,
            position: 0,
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn has_next(&self) -> bool {
        self.position < self.rows.len()
    }

    pub fn remaining(&self) -> usize {
        self.rows.len() - self.position
    }

    /// Advances past the next row and returns it as a name → value map.
    pub fn next_row(&mut self) -> Option<Row> {
        let values = self.advance()?;
        Some(self.columns.iter().cloned().zip(values).collect())
    }

    /// Advances past the next row and returns the value at `position`.
    /// With no row left this is `Ok(None)` for any position. The row is not
    /// consumed when the position is out of range.
    pub fn next_column(&mut self, position: usize) -> Result<Option<Value>, DbError> {
        if !self.has_next() {
            return Ok(None);
        }
        self.check_column(position)?;
        Ok(self.advance().map(|mut values| values.swap_remove(position)))
    }

    pub fn next_as(&mut self, mode: FetchMode) -> Result<Option<Fetched>, DbError> {
        match mode {
            FetchMode::Assoc => Ok(self.next_row().map(Fetched::Assoc)),
            FetchMode::Num => Ok(self.advance().map(Fetched::Num)),
            FetchMode::Column(position) => {
                Ok(self.next_column(position)?.map(Fetched::Column))
            }
        }
    }

    fn check_column(&self, position: usize) -> Result<(), DbError> {
        if position >= self.columns.len() {
            return Err(DbError::ColumnOutOfRange {
                position,
                count: self.columns.len(),
            });
        }
        Ok(())
    }

    fn advance(&mut self) -> Option<Vec<Value>> {
        let values = self.rows.get_mut(self.position).map(std::mem::take)?;
        self.position += 1;
        Some(values)
    }
}

impl Iterator for Cursor {
    type Item = Row;

    fn next(&mut self) -> Option<Row> {
        self.next_row()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining(), Some(self.remaining()))
    }
}

impl ExactSizeIterator for Cursor {}

#[derive(Debug, Clone)]
pub struct Statement {
    sql: String,
    cursor: Cursor,
    row_count: u64,
    error: ErrorInfo,
}

impl Statement {
    fn failed(sql: &str, error: ErrorInfo) -> Self {
        Self {
            sql: sql.to_string(),
            cursor: Cursor::default(),
            row_count: 0,
            error,
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn cursor(&mut self) -> &mut Cursor {
        &mut self.cursor
    }

    /// Rows affected by a DML statement, or rows returned by a query.
    pub fn row_count(&self) -> u64 {
        self.row_count
    }

    pub fn error_info(&self) -> &ErrorInfo {
        &self.error
    }

    pub fn error_code(&self) -> i64 {
        self.error.code
    }

    pub(crate) fn to_query_error(&self) -> DbError {
        DbError::Query {
            sql: self.sql.clone(),
            message: self.error.message.clone().unwrap_or_default(),
            code: self.error.code,
        }
    }
}

/// A prepared statement that has not run yet.
pub(crate) struct Prepared<'conn> {
    sql: String,
    inner: rusqlite::Statement<'conn>,
}

impl<'conn> Prepared<'conn> {
    /// Prepares `sql`. On failure, returns the failed `Statement` to retain.
    pub(crate) fn new(conn: &'conn rusqlite::Connection, sql: &str) -> Result<Self, Statement> {
        match conn.prepare(sql) {
            Ok(inner) => Ok(Self {
                sql: sql.to_string(),
                inner,
            }),
            Err(e) => Err(Statement::failed(sql, ErrorInfo::from(&e))),
        }
    }

    /// The statement retained when execution is abandoned before it runs.
    pub(crate) fn unexecuted(self) -> Statement {
        Statement {
            sql: self.sql,
            cursor: Cursor::default(),
            row_count: 0,
            error: ErrorInfo::ok(),
        }
    }

    /// Binds `params` by name, runs the statement, and materializes its rows,
    /// stopping after `max_rows` when given. The returned `Statement` is
    /// retained whether or not execution succeeded.
    pub(crate) fn run(mut self, params: &Params, max_rows: Option<usize>) -> Statement {
        let outcome =
            bind_named(&mut self.inner, params).and_then(|_| self.materialize(max_rows));
        match outcome {
            Ok((cursor, row_count)) => Statement {
                sql: self.sql,
                cursor,
                row_count,
                error: ErrorInfo::ok(),
            },
            Err(error) => Statement::failed(&self.sql, error),
        }
    }

    fn materialize(&mut self, max_rows: Option<usize>) -> Result<(Cursor, u64), ErrorInfo> {
        let column_count = self.inner.column_count();

        if column_count == 0 {
            let changed = self.inner.raw_execute().map_err(|e| ErrorInfo::from(&e))?;
            return Ok((Cursor::default(), changed as u64));
        }

        let columns: Vec<String> = self
            .inner
            .column_names()
            .into_iter()
            .map(str::to_string)
            .collect();

        let mut rows_vec = Vec::new();
        let mut rows = self.inner.raw_query();
        while max_rows.is_none_or(|max| rows_vec.len() < max)
            && let Some(row) = rows.next().map_err(|e| ErrorInfo::from(&e))?
        {
            let mut values = Vec::with_capacity(column_count);
            for i in 0..column_count {
                values.push(row.get::<_, Value>(i).map_err(|e| ErrorInfo::from(&e))?);
            }
            rows_vec.push(values);
        }

        let row_count = rows_vec.len() as u64;
        Ok((Cursor::new(columns, rows_vec), row_count))
    }
}

fn placeholder_name(key: &str) -> String {
    if key.starts_with([':', '@', '$']) {
        key.to_string()
    } else {
        format!(":{}", key)
    }
}

fn bind_named(stmt: &mut rusqlite::Statement<'_>, params: &Params) -> Result<(), ErrorInfo> {
    let mut bound = vec![false; stmt.parameter_count()];

    for (key, value) in params {
        let name = placeholder_name(key);
        let index = stmt
            .parameter_index(&name)
            .map_err(|e| ErrorInfo::from(&e))?
            .ok_or_else(|| ErrorInfo::from(&rusqlite::Error::InvalidParameterName(name.clone())))?;
        stmt.raw_bind_parameter(index, value)
            .map_err(|e| ErrorInfo::from(&e))?;
        bound[index - 1] = true;
    }

    if let Some(missing) = bound.iter().position(|b| !b) {
        let index = missing + 1;
        let name = stmt
            .parameter_name(index)
            .map(str::to_string)
            .unwrap_or_else(|| format!("?{}", index));
        return Err(ErrorInfo {
            code: -1,
            message: Some(format!("No value bound for parameter {}", name)),
        });
    }

    Ok(())
}
