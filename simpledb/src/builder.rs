///
/// # SQL Statement Builders
///
/// Pure text builders behind `DataAccessor::update` and `DataAccessor::insert`.
/// Nothing here touches a connection; each builder returns the SQL text plus
/// the parameter map that must be bound to it.
///
/// ## Quoting
///
/// Field and table identifiers are wrapped in backticks. A table name with a
/// dot is treated as `schema.table` and only the part after the first dot is
/// quoted, so `main.users` becomes ``main.`users` ``.
///
/// ## Parameter Naming
///
/// UPDATE binds SET values as `:field_<name>` and WHERE equalities as
/// `:condition_<name>`, so the same column may appear on both sides.
/// INSERT binds each value under its own field name.
///

use crate::value::Params;

/// The WHERE part of an UPDATE.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Condition {
    /// No WHERE clause; every row is updated.
    #[default]
    None,
    /// A literal WHERE clause, emitted verbatim and never parameterized.
    Raw(String),
    /// AND-ed `field = value` equalities, each bound as `:condition_<field>`.
    Fields(Params),
}

impl Condition {
    pub fn is_empty(&self) -> bool {
        match self {
            Condition::None => true,
            Condition::Raw(clause) => clause.trim().is_empty(),
            Condition::Fields(fields) => fields.is_empty(),
        }
    }
}

impl From<&str> for Condition {
    fn from(clause: &str) -> Self {
        Condition::Raw(clause.to_string())
    }
}

impl From<String> for Condition {
    fn from(clause: String) -> Self {
        Condition::Raw(clause)
    }
}

impl From<Params> for Condition {
    fn from(fields: Params) -> Self {
        Condition::Fields(fields)
    }
}

impl<T: Into<Condition>> From<Option<T>> for Condition {
    fn from(condition: Option<T>) -> Self {
        condition.map_or(Condition::None, Into::into)
    }
}

/// SQL text and the parameters to bind to it.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltStatement {
    pub sql: String,
    pub params: Params,
}

pub fn format_table_name(table: &str) -> String {
    match table.split_once('.') {
        Some((schema, name)) => format!("{}.`{}`", schema, name),
        None => format!("`{}`", table),
    }
}

fn quote_field(field: &str) -> String {
    format!("`{}`", field)
}

pub fn build_update(table: &str, fields: &Params, condition: &Condition) -> BuiltStatement {
    let mut params = Params::with_capacity(fields.len());

    let assignments: Vec<String> = fields
        .iter()
        .map(|(field, value)| {
            params.insert(format!("field_{}", field), value.clone());
            format!("{}=:field_{}", quote_field(field), field)
        })
        .collect();

    let mut sql = format!(
        "UPDATE {} SET {}",
        format_table_name(table),
        assignments.join(",")
    );

    let clause = match condition {
        Condition::None => String::new(),
        Condition::Raw(clause) => clause.clone(),
        Condition::Fields(equalities) => equalities
            .iter()
            .map(|(field, value)| {
                params.insert(format!("condition_{}", field), value.clone());
                format!("{}=:condition_{}", quote_field(field), field)
            })
            .collect::<Vec<_>>()
            .join(" AND "),
    };

    if !clause.trim().is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clause);
    }

    BuiltStatement { sql, params }
}

pub fn build_insert(table: &str, fields: &Params) -> BuiltStatement {
    let columns: Vec<String> = fields.keys().map(|f| quote_field(f)).collect();
    let placeholders: Vec<String> = fields.keys().map(|f| format!(":{}", f)).collect();

    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        format_table_name(table),
        columns.join(","),
        placeholders.join(",")
    );

    BuiltStatement {
        sql,
        params: fields.clone(),
    }
}
