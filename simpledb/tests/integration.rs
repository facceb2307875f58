///
/// # Integration Tests for simpledb
///
/// End-to-end tests against real SQLite databases: in-memory for most
/// behavior, file-backed in a temp directory where persistence or the
/// connection handle itself matters.
///

use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use simpledb::{
    load_config, params, Condition, DataAccessor, DbConfig, DbError, FetchMode, Fetched,
    Inserted, Params, Value,
};

fn memory_db() -> DataAccessor {
    let mut db = DataAccessor::new();
    db.setup(DbConfig::new("sqlite::memory:", "app", "secret", "utf8"))
        .expect("Failed to open in-memory database");
    db
}

fn users_db() -> DataAccessor {
    let mut db = memory_db();
    db.query(
        "CREATE TABLE users (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT NOT NULL, x INTEGER)",
        &params! {},
    )
    .expect("Failed to create users table");
    for name in ["ada", "grace", "barbara"] {
        db.insert("users", &params! { "name" => name }).expect("Failed to insert user");
    }
    db
}

#[test]
fn test_setup_then_reads_use_same_connection() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let db_path = temp_dir.path().join("app.db");
    let config = DbConfig::new(
        format!("sqlite:{}", db_path.display()),
        "app",
        "secret",
        "utf8",
    );

    let mut db = DataAccessor::connect(config.clone()).expect("Failed to connect");
    assert!(db_path.exists(), "setup should open the database eagerly");

    // Temp tables are private to one connection, so they vanish on reopen.
    db.query("CREATE TEMP TABLE session_marker (id INTEGER)", &params! {}).unwrap();
    db.setup(config).unwrap();
    db.fetch_all("SELECT 1", &params! {}).unwrap();

    assert!(db
        .exists(
            "SELECT name FROM sqlite_temp_master WHERE name = :name",
            &params! { "name" => "session_marker" },
        )
        .unwrap());
}

#[test]
fn test_connection_error_on_unopenable_path() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let bad_path = temp_dir.path().join("missing-dir").join("app.db");

    let result = DataAccessor::connect(DbConfig::new(
        format!("sqlite:{}", bad_path.display()),
        "app",
        "secret",
        "utf8",
    ));

    match result {
        Err(DbError::Connection { dsn, code, .. }) => {
            assert!(dsn.contains("missing-dir"));
            assert_ne!(code, 0);
        }
        Err(other) => panic!("Expected Connection error, got {:?}", other),
        Ok(_) => panic!("Expected Connection error, got a connection"),
    }
}

#[test]
fn test_fetch_all_with_no_rows_is_empty() {
    let mut db = users_db();

    let rows = db
        .fetch_all("SELECT * FROM users WHERE id > :id", &params! { "id" => 100 })
        .expect("Zero-row reads must not fail");
    assert!(rows.is_empty());

    assert_eq!(db.fetch("SELECT * FROM users WHERE id = 100", &params! {}).unwrap(), None);
    assert_eq!(db.fetch_column("SELECT name FROM users WHERE id = 100", &params! {}, 0).unwrap(), None);
    assert!(!db.exists("SELECT * FROM users WHERE id = 100", &params! {}).unwrap());

    assert_eq!(db.fetch_column("SELECT name FROM users WHERE id = 100", &params! {}, 3).unwrap(), None);
    assert_eq!(
        db.fetch_as("SELECT name FROM users WHERE id = 100", &params! {}, FetchMode::Column(3))
            .unwrap(),
        None
    );
}

#[test]
fn test_column_reads_of_a_statement_without_columns_are_empty() {
    let mut db = users_db();

    assert_eq!(db.fetch_column("DELETE FROM users WHERE id = 100", &params! {}, 0).unwrap(), None);
    assert!(db
        .fetch_column_all("DELETE FROM users WHERE id = 100", &params! {}, 0)
        .unwrap()
        .is_empty());
    assert_eq!(db.fetch("DELETE FROM users WHERE id = 100", &params! {}).unwrap(), None);
}

#[test]
fn test_fetch_all_returns_every_row_in_order() {
    let mut db = users_db();

    let rows = db.fetch_all("SELECT id, name FROM users ORDER BY id", &params! {}).unwrap();

    assert_eq!(rows.len(), 3);
    let names: Vec<&str> = rows.iter().map(|r| r["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["ada", "grace", "barbara"]);
    let columns: Vec<&str> = rows[0].keys().map(String::as_str).collect();
    assert_eq!(columns, vec!["id", "name"]);
}

#[test]
fn test_fetch_column_all_keeps_falsy_values() {
    let mut db = memory_db();
    db.query("CREATE TABLE t (n INTEGER, s TEXT)", &params! {}).unwrap();
    db.query(
        "INSERT INTO t (n, s) VALUES (1, 'a'), (0, ''), (NULL, NULL), (2, 'b')",
        &params! {},
    )
    .unwrap();

    let numbers = db.fetch_column_all("SELECT n, s FROM t ORDER BY rowid", &params! {}, 0).unwrap();
    assert_eq!(
        numbers,
        vec![Value::Integer(1), Value::Integer(0), Value::Null, Value::Integer(2)]
    );

    let strings = db.fetch_column_all("SELECT n, s FROM t ORDER BY rowid", &params! {}, 1).unwrap();
    assert_eq!(strings.len(), 4);
    assert_eq!(strings[1], Value::from(""));

    assert!(matches!(
        db.fetch_column_all("SELECT n FROM t", &params! {}, 1),
        Err(DbError::ColumnOutOfRange { position: 1, count: 1 })
    ));
}

#[test]
fn test_fetch_returns_first_row_only() {
    let mut db = users_db();

    let row = db
        .fetch("SELECT id, name FROM users ORDER BY id DESC", &params! {})
        .unwrap()
        .expect("Expected a row");
    assert_eq!(row["name"], Value::from("barbara"));

    let fetched = db
        .fetch_as("SELECT id, name FROM users ORDER BY id", &params! {}, FetchMode::Num)
        .unwrap();
    assert_eq!(fetched, Some(Fetched::Num(vec![Value::Integer(1), Value::from("ada")])));

    let fetched = db
        .fetch_as("SELECT id, name FROM users ORDER BY id", &params! {}, FetchMode::Column(1))
        .unwrap();
    assert_eq!(fetched, Some(Fetched::Column(Value::from("ada"))));

    assert_eq!(
        db.fetch_column("SELECT COUNT(*) FROM users", &params! {}, 0).unwrap(),
        Some(Value::Integer(3))
    );
}

#[test]
fn test_query_returns_row_counts() {
    let mut db = users_db();

    let changed = db
        .query("UPDATE users SET x = :x WHERE id >= :id", &params! { "x" => 1, "id" => 2 })
        .unwrap();
    assert_eq!(changed, 2);

    let deleted = db.query("DELETE FROM users WHERE id = 99", &params! {}).unwrap();
    assert_eq!(deleted, 0);

    let selected = db.query("SELECT * FROM users", &params! {}).unwrap();
    assert_eq!(selected, 3);
}

#[test]
fn test_insert_returns_id_or_row_count() {
    let mut db = users_db();

    let inserted = db.insert("users", &params! { "name" => "linus", "x" => 2 }).unwrap();
    assert_eq!(inserted, Inserted::Id(4));

    db.query(
        "CREATE TABLE tags (a INTEGER, b INTEGER, PRIMARY KEY (a, b)) WITHOUT ROWID",
        &params! {},
    )
    .unwrap();
    let inserted = db.insert("tags", &params! { "a" => 1, "b" => 2 }).unwrap();
    assert_eq!(inserted, Inserted::Rows(1));
    assert_eq!(db.last_sql(), "INSERT INTO `tags` (`a`,`b`) VALUES (:a,:b)");

    let inserted = db.insert("main.tags", &params! { "a" => 1, "b" => 3 }).unwrap();
    assert_eq!(inserted, Inserted::Rows(1));
}

#[test]
fn test_insert_after_many_rowid_inserts_reports_row_count() {
    let mut db = memory_db();
    db.query("CREATE TABLE a (id INTEGER PRIMARY KEY AUTOINCREMENT, n INTEGER)", &params! {})
        .unwrap();
    db.query(
        "CREATE TABLE tags (a INTEGER, b INTEGER, PRIMARY KEY (a, b)) WITHOUT ROWID",
        &params! {},
    )
    .unwrap();
    for n in 0..5 {
        db.insert("a", &params! { "n" => n }).unwrap();
    }

    let inserted = db.insert("tags", &params! { "a" => 1, "b" => 2 }).unwrap();
    assert_eq!(inserted, Inserted::Rows(1));
}

#[test]
fn test_insert_reusing_the_last_rowid_reports_the_id() {
    let mut db = memory_db();
    db.query("CREATE TABLE notes (id INTEGER PRIMARY KEY, body TEXT)", &params! {})
        .unwrap();

    assert_eq!(db.insert("notes", &params! { "body" => "a" }).unwrap(), Inserted::Id(1));
    db.query("DELETE FROM notes", &params! {}).unwrap();
    assert_eq!(db.insert("notes", &params! { "body" => "b" }).unwrap(), Inserted::Id(1));
}

#[test]
fn test_insert_into_schema_qualified_table() {
    let mut db = users_db();

    let inserted = db.insert("main.users", &params! { "name" => "edsger" }).unwrap();

    assert!(inserted.id().is_some());
    assert_eq!(db.last_sql(), "INSERT INTO main.`users` (`name`) VALUES (:name)");
}

#[test]
fn test_update_with_field_condition() {
    let mut db = users_db();
    let seen: Arc<Mutex<Vec<(String, Params)>>> = Arc::default();
    let sink = Arc::clone(&seen);
    db.set_execute_callback(move |sql, params| {
        sink.lock().unwrap().push((sql.to_string(), params.clone()));
        Ok(())
    });

    let changed = db.update("users", &params! { "x" => 5 }, params! { "id" => 3 }).unwrap();
    assert_eq!(changed, 1);

    let missing = db.update("users", &params! { "x" => 5 }, params! { "id" => 42 }).unwrap();
    assert_eq!(missing, 0);

    let seen = seen.lock().unwrap();
    assert_eq!(seen[0].0, "UPDATE `users` SET `x`=:field_x WHERE `id`=:condition_id");
    assert_eq!(seen[0].1, params! { "field_x" => 5, "condition_id" => 3 });
}

#[test]
fn test_update_with_raw_and_empty_condition() {
    let mut db = users_db();

    let changed = db.update("users", &params! { "x" => 7 }, "id > 1").unwrap();
    assert_eq!(changed, 2);
    assert_eq!(db.last_sql(), "UPDATE `users` SET `x`=:field_x WHERE id > 1");

    let changed = db.update("users", &params! { "x" => 8 }, Condition::None).unwrap();
    assert_eq!(changed, 3);
    assert_eq!(db.last_sql(), "UPDATE `users` SET `x`=:field_x");

    assert_eq!(
        db.fetch_column_all("SELECT x FROM users", &params! {}, 0).unwrap(),
        vec![Value::Integer(8); 3]
    );
}

#[test]
fn test_failing_execution_reports_sql_and_error() {
    let mut db = users_db();

    let err = db.fetch_all("SELECT * FROM no_such_table", &params! {}).unwrap_err();
    match &err {
        DbError::Query { sql, message, code } => {
            assert_eq!(sql, "SELECT * FROM no_such_table");
            assert!(message.contains("no such table"));
            assert_eq!(*code, 1);
        }
        other => panic!("Expected Query error, got {:?}", other),
    }
    assert!(err.to_string().starts_with("SQL: SELECT * FROM no_such_table\n"));

    assert_eq!(db.last_sql(), "SELECT * FROM no_such_table");
    assert_eq!(db.error_code(), Some(1));
    assert!(db.error_info().unwrap().message.as_deref().unwrap().contains("no such table"));

    db.fetch_all("SELECT 1", &params! {}).unwrap();
    assert_eq!(db.error_code(), Some(0));
    assert_eq!(db.error_info().unwrap().message, None);
}

#[test]
fn test_constraint_violation_is_a_query_error() {
    let mut db = users_db();

    let err = db.insert("users", &params! { "id" => 1, "name" => "dup" }).unwrap_err();

    assert!(matches!(err, DbError::Query { .. }));
    // SQLITE_CONSTRAINT_PRIMARYKEY
    assert_eq!(err.code(), Some(1555));
}

#[test]
fn test_parameter_mismatch_is_a_query_error() {
    let mut db = users_db();

    let err = db
        .fetch_all("SELECT * FROM users WHERE id = :id", &params! { "id" => 1, "extra" => 2 })
        .unwrap_err();
    assert!(matches!(err, DbError::Query { .. }));

    let err = db.fetch_all("SELECT * FROM users WHERE id = :id", &params! {}).unwrap_err();
    assert!(err.to_string().contains(":id"));
}

#[test]
fn test_callback_runs_once_per_execution_before_statement() {
    let mut db = users_db();
    let calls: Arc<Mutex<Vec<(String, Params)>>> = Arc::default();
    let sink = Arc::clone(&calls);
    db.set_execute_callback(move |sql, params| {
        sink.lock().unwrap().push((sql.to_string(), params.clone()));
        Ok(())
    });

    db.fetch_all("SELECT * FROM users WHERE id = :id", &params! { "id" => 1 }).unwrap();
    db.query("DELETE FROM users WHERE id = :id", &params! { "id" => 2 }).unwrap();
    let _ = db.fetch_all("SELECT * FROM nowhere", &params! {});

    let calls = calls.lock().unwrap();
    assert_eq!(calls.len(), 2, "prepare failures never reach the callback");
    assert_eq!(calls[0], ("SELECT * FROM users WHERE id = :id".to_string(), params! { "id" => 1 }));
    assert_eq!(calls[1], ("DELETE FROM users WHERE id = :id".to_string(), params! { "id" => 2 }));
}

#[test]
fn test_last_callback_registration_wins() {
    let mut db = users_db();
    let first = Arc::new(Mutex::new(0));
    let second = Arc::new(Mutex::new(0));

    let counter = Arc::clone(&first);
    db.set_execute_callback(move |_, _| {
        *counter.lock().unwrap() += 1;
        Ok(())
    });
    let counter = Arc::clone(&second);
    db.set_execute_callback(move |_, _| {
        *counter.lock().unwrap() += 1;
        Ok(())
    });

    db.fetch_all("SELECT 1", &params! {}).unwrap();

    assert_eq!(*first.lock().unwrap(), 0);
    assert_eq!(*second.lock().unwrap(), 1);
}

#[test]
fn test_callback_error_stops_the_statement() {
    let mut db = users_db();
    db.set_execute_callback(|sql, _| {
        if sql.starts_with("DELETE") {
            return Err("deletes are disabled".into());
        }
        Ok(())
    });

    let err = db.query("DELETE FROM users", &params! {}).unwrap_err();
    assert!(matches!(err, DbError::Callback { ref sql, .. } if sql == "DELETE FROM users"));

    assert_eq!(db.fetch_column("SELECT COUNT(*) FROM users", &params! {}, 0).unwrap(), Some(Value::Integer(3)));
}

#[test]
fn test_transactions_pass_through() {
    let mut db = users_db();

    assert!(!db.in_transaction().unwrap());
    db.begin_transaction().unwrap();
    assert!(db.in_transaction().unwrap());
    db.query("DELETE FROM users", &params! {}).unwrap();
    db.roll_back().unwrap();
    assert!(!db.in_transaction().unwrap());
    assert_eq!(db.query("SELECT * FROM users", &params! {}).unwrap(), 3);

    db.begin_transaction().unwrap();
    db.insert("users", &params! { "name" => "alan" }).unwrap();
    db.commit().unwrap();
    assert_eq!(db.query("SELECT * FROM users", &params! {}).unwrap(), 4);

    match db.commit() {
        Err(DbError::Transaction { operation, .. }) => assert_eq!(operation, "commit"),
        other => panic!("Expected Transaction error, got {:?}", other),
    }

    db.begin_transaction().unwrap();
    assert!(matches!(db.begin_transaction(), Err(DbError::Transaction { operation: "begin", .. })));
    db.roll_back().unwrap();
}

#[test]
fn test_independent_accessors_do_not_share_state() {
    let mut a = users_db();
    let mut b = memory_db();

    a.fetch_all("SELECT * FROM users", &params! {}).unwrap();
    assert!(b.fetch_all("SELECT * FROM users", &params! {}).is_err());

    assert_eq!(a.last_sql(), "SELECT * FROM users");
    assert_eq!(a.error_code(), Some(0));
    assert_eq!(b.error_code(), Some(1));
}

#[test]
fn test_config_file_round_trip_to_connection() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let db_path = temp_dir.path().join("data.db");
    let config_path = temp_dir.path().join("simpledb.toml");
    std::fs::write(
        &config_path,
        format!(
            "dsn = \"sqlite:{}\"\nusername = \"app\"\npassword = \"secret\"\ncharset = \"utf8mb4\"\n",
            db_path.display()
        ),
    )
    .unwrap();

    let config = load_config(&config_path).expect("Failed to load config");
    {
        let mut db = DataAccessor::connect(config.clone()).unwrap();
        db.query("CREATE TABLE notes (id INTEGER PRIMARY KEY, body TEXT)", &params! {}).unwrap();
        db.insert("notes", &params! { "body" => "persisted" }).unwrap();
    }

    let mut db = DataAccessor::connect(config).unwrap();
    assert_eq!(
        db.fetch_column("SELECT body FROM notes", &params! {}, 0).unwrap(),
        Some(Value::from("persisted"))
    );
    assert_eq!(
        db.fetch_column("PRAGMA encoding", &params! {}, 0).unwrap(),
        Some(Value::from("UTF-8"))
    );
}
