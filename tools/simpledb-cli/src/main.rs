///
/// simpledb CLI - Run statements against a configured database
///
/// Commands:
/// - simpledb query <sql>: print each matching row as one JSON object per line
/// - simpledb exec <sql>: print the driver row count
/// - simpledb insert <table>: insert one row, print the new id or row count
/// - simpledb update <table>: update rows, print the changed row count
///
/// Parameters are passed as `--param name=value`. Values parse as an
/// integer, then a real, then `null`; anything else binds as text.
///

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result, WrapErr};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use simpledb::{load_config, Condition, DataAccessor, Inserted, Params, Value};

#[derive(Parser)]
#[command(name = "simpledb")]
#[command(author, version, about = "Run SQL through a simpledb connection", long_about = None)]
struct Cli {
    /// Connection config (dsn, username, password, charset)
    #[arg(long, short, default_value = "simpledb.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the rows a statement returns, one JSON object per line
    Query {
        sql: String,

        /// Named parameter, `name=value`
        #[arg(long = "param", short, value_parser = parse_pair)]
        params: Vec<(String, Value)>,
    },

    /// Run a statement and print its row count
    Exec {
        sql: String,

        /// Named parameter, `name=value`
        #[arg(long = "param", short, value_parser = parse_pair)]
        params: Vec<(String, Value)>,
    },

    /// Insert one row
    Insert {
        table: String,

        /// Column value, `column=value`
        #[arg(long = "field", short, value_parser = parse_pair, required = true)]
        fields: Vec<(String, Value)>,
    },

    /// Update rows
    Update {
        table: String,

        /// New column value, `column=value`
        #[arg(long = "field", short, value_parser = parse_pair, required = true)]
        fields: Vec<(String, Value)>,

        /// Equality condition, `column=value` (AND-ed)
        #[arg(long = "where-field", value_parser = parse_pair, conflicts_with = "where_clause")]
        where_fields: Vec<(String, Value)>,

        /// Literal WHERE clause, used verbatim
        #[arg(long = "where")]
        where_clause: Option<String>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let config = load_config(&cli.config)
        .into_diagnostic()
        .wrap_err_with(|| format!("loading {}", cli.config.display()))?;
    let mut db = DataAccessor::connect(config).into_diagnostic()?;

    match cli.command {
        Commands::Query { sql, params } => {
            let rows = db.fetch_all(&sql, &collect_params(params)).into_diagnostic()?;
            for row in rows {
                println!("{}", serde_json::to_string(&row).into_diagnostic()?);
            }
        }
        Commands::Exec { sql, params } => {
            let count = db.query(&sql, &collect_params(params)).into_diagnostic()?;
            println!("{}", count);
        }
        Commands::Insert { table, fields } => {
            match db.insert(&table, &collect_params(fields)).into_diagnostic()? {
                Inserted::Id(id) => println!("id {}", id),
                Inserted::Rows(count) => println!("rows {}", count),
            }
        }
        Commands::Update {
            table,
            fields,
            where_fields,
            where_clause,
        } => {
            let condition = match where_clause {
                Some(clause) => Condition::Raw(clause),
                None if where_fields.is_empty() => Condition::None,
                None => Condition::Fields(collect_params(where_fields)),
            };
            let count = db
                .update(&table, &collect_params(fields), condition)
                .into_diagnostic()?;
            println!("{}", count);
        }
    }

    Ok(())
}

fn collect_params(pairs: Vec<(String, Value)>) -> Params {
    pairs.into_iter().collect()
}

fn parse_pair(arg: &str) -> Result<(String, Value), String> {
    let (name, raw) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got '{}'", arg))?;
    if name.is_empty() {
        return Err(format!("missing name in '{}'", arg));
    }
    Ok((name.to_string(), parse_value(raw)))
}

fn parse_value(raw: &str) -> Value {
    if let Ok(i) = raw.parse::<i64>() {
        Value::Integer(i)
    } else if let Some(f) = raw
        .parse::<f64>()
        .ok()
        .filter(|_| raw.bytes().any(|b| b.is_ascii_digit()))
    {
        Value::Real(f)
    } else if raw == "null" {
        Value::Null
    } else {
        Value::Text(raw.to_string())
    }
}
