//! Integration tests for sql-agent-chat
//!
//! Exercises the connector, schema introspection, the SQL tool and the
//! command layer against a real SQLite file.

use sql_agent_chat::agent::tools::SqlExecutionTool;
use sql_agent_chat::cli::commands::{handle_command, Command, CommandType};
use sql_agent_chat::config::{create_shared_state, AppConfig};
use sql_agent_chat::database::{CellValue, ConnectionConfig, DatabaseBackend, DatabaseManager};
use sql_agent_chat::error::SqlAgentError;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

async fn create_shop_db() -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shop.db");

    let options = SqliteConnectOptions::new()
        .filename(&path)
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(options).await.unwrap();

    for statement in [
        "CREATE TABLE customers (id INTEGER PRIMARY KEY, name TEXT NOT NULL, created_at TEXT)",
        "CREATE TABLE orders (id INTEGER PRIMARY KEY, customer_id INTEGER REFERENCES customers(id), total REAL)",
        "CREATE VIEW big_orders AS SELECT * FROM orders WHERE total > 100",
        "INSERT INTO customers (name, created_at) VALUES ('Ada', '2024-01-02'), ('Grace', '2024-02-03')",
        "INSERT INTO orders (customer_id, total) VALUES (1, 50.5), (1, 150.0), (2, 20.0)",
    ] {
        sqlx::query(statement).execute(&pool).await.unwrap();
    }
    pool.close().await;

    (dir, path)
}

#[tokio::test]
async fn test_connect_and_introspect() {
    let (_dir, path) = create_shop_db().await;
    let manager = DatabaseManager::connect(ConnectionConfig::Sqlite { path })
        .await
        .unwrap();

    assert_eq!(manager.backend(), DatabaseBackend::SQLite);
    assert!(manager.is_connected().await);

    let tables = manager.list_tables(false).await.unwrap();
    assert_eq!(tables, vec!["big_orders", "customers", "orders"]);

    // The built-in catalog only shows up when asked for
    let all_tables = manager.list_tables(true).await.unwrap();
    assert!(all_tables.iter().any(|t| t == "sqlite_schema"));
    assert!(!tables.iter().any(|t| t.starts_with("sqlite_")));

    let schema = manager.schema_context().await;
    assert!(schema.contains("customers"));
    assert!(schema.contains("created_at"));

    let index = manager.schema_index().await;
    let customers = index.get_table("customers").unwrap();
    assert_eq!(customers.primary_keys(), vec!["id"]);
}

#[tokio::test]
async fn test_sqlite_connection_is_read_only() {
    let (_dir, path) = create_shop_db().await;
    let manager = DatabaseManager::connect(ConnectionConfig::Sqlite { path })
        .await
        .unwrap();

    // Even bypassing the guard, the connection refuses writes
    let err = manager
        .execute("DELETE FROM orders")
        .await
        .unwrap_err();
    assert!(matches!(err, SqlAgentError::Query { .. }));
}

#[tokio::test]
async fn test_tool_guards_and_executes() {
    let (_dir, path) = create_shop_db().await;
    let manager = Arc::new(
        DatabaseManager::connect(ConnectionConfig::Sqlite { path })
            .await
            .unwrap(),
    );
    let tool = SqlExecutionTool::new(Arc::clone(&manager), 10);

    let step = tool
        .run("SELECT c.name, SUM(o.total) AS spent FROM customers c JOIN orders o ON o.customer_id = c.id GROUP BY c.name ORDER BY spent DESC;")
        .await;
    assert!(!step.error, "{}", step.output);
    assert!(step.output.starts_with("QUERY: SELECT c.name"));
    assert!(step.output.contains("ORDER BY spent DESC LIMIT 10\n\nRESULT:\n"));
    let result = step.result.unwrap();
    assert_eq!(result.columns, vec!["name", "spent"]);
    assert_eq!(result.rows[0][0], CellValue::Text("Ada".to_string()));
    assert_eq!(result.rows[0][1], CellValue::Float(200.5));

    let step = tool.run("DROP TABLE orders").await;
    assert_eq!(step.output, "Error: only SELECT statements are allowed.");

    let step = tool.run("SELECT 1; DELETE FROM orders").await;
    assert_eq!(step.output, "Error: multiple statements are not allowed.");

    let step = tool.run("SELECT * FROM missing_table").await;
    assert!(step.error);
    assert!(step.output.starts_with("Error: no such table"));

    let count = manager.execute("SELECT COUNT(*) FROM orders").await.unwrap();
    assert_eq!(count.rows[0][0], CellValue::Int(3));
}

#[tokio::test]
async fn test_trailing_comment_keeps_row_cap() {
    let (_dir, path) = create_shop_db().await;
    let manager = Arc::new(
        DatabaseManager::connect(ConnectionConfig::Sqlite { path })
            .await
            .unwrap(),
    );
    let tool = SqlExecutionTool::new(manager, 1);

    let step = tool.run("SELECT id FROM orders -- every order").await;
    assert!(!step.error, "{}", step.output);
    assert!(step.output.starts_with("QUERY: SELECT id FROM orders LIMIT 1\n"));
    assert_eq!(step.result.unwrap().row_count(), 1);

    let step = tool.run("SELECT id FROM orders /* every order").await;
    assert_eq!(step.result.unwrap().row_count(), 1);
    assert_eq!(tool.log().lock().await.len(), 2);
}

#[tokio::test]
async fn test_empty_result_formatting() {
    let (_dir, path) = create_shop_db().await;
    let manager = Arc::new(
        DatabaseManager::connect(ConnectionConfig::Sqlite { path })
            .await
            .unwrap(),
    );
    let tool = SqlExecutionTool::new(manager, 10);

    let step = tool.run("SELECT * FROM customers WHERE name = 'Nobody'").await;
    assert!(!step.error);
    assert!(step.output.ends_with("RESULT:\nNo data returned"));
}

#[tokio::test]
async fn test_connection_failures() {
    let err = ConnectionConfig::parse("not a database").unwrap_err();
    assert!(matches!(err, SqlAgentError::Connection { .. }));

    let missing = ConnectionConfig::parse("sqlite:///no/such/dir/shop.db").unwrap();
    let err = DatabaseManager::connect(missing).await.err().unwrap();
    assert!(err.user_message().starts_with("Could not connect to the database"));
}

#[tokio::test]
async fn test_command_session_flow() {
    let (_dir, path) = create_shop_db().await;
    let state = create_shared_state(AppConfig::from_lookup(|_| None).unwrap());

    let connect = Command::parse(&format!("/connect sqlite://{}", path.display())).unwrap();
    assert!(matches!(connect.command_type, CommandType::Connect { .. }));
    let msg = handle_command(&connect, state.clone()).await.unwrap();
    assert!(msg.starts_with("✓ Connected to SQLite"));
    assert!(msg.contains("GROQ_API_KEY is not set"));

    let tables = handle_command(&Command::parse("/tables --all").unwrap(), state.clone())
        .await
        .unwrap();
    assert!(tables.contains("sqlite_schema"));

    // A table created behind the session's back shows up after a refresh
    let writer = SqlitePool::connect_with(SqliteConnectOptions::new().filename(&path))
        .await
        .unwrap();
    sqlx::query("CREATE TABLE refunds (id INTEGER PRIMARY KEY, amount REAL)")
        .execute(&writer)
        .await
        .unwrap();
    writer.close().await;

    let schema = handle_command(&Command::parse("/schema").unwrap(), state.clone())
        .await
        .unwrap();
    assert!(!schema.contains("refunds"));
    let schema = handle_command(&Command::parse("/schema --refresh").unwrap(), state.clone())
        .await
        .unwrap();
    assert!(schema.contains("CREATE TABLE refunds"));

    let test = handle_command(
        &Command::parse("/test SELECT name FROM customers ORDER BY id").unwrap(),
        state.clone(),
    )
    .await
    .unwrap();
    assert!(test.contains("Ada"));
    assert!(test.contains("(2 rows)"));

    // Without an API key, questions show the setup guide
    let answer = handle_command(&Command::parse("Who spent the most?").unwrap(), state.clone())
        .await
        .unwrap();
    assert!(answer.starts_with("Setup required (GROQ_API_KEY is not set)"));

    let msg = handle_command(&Command::parse("/disconnect").unwrap(), state.clone())
        .await
        .unwrap();
    assert_eq!(msg, "✓ Disconnected");
    assert!(!state.read().await.is_connected());
}
