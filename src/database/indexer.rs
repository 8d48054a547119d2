//! Schema Indexer
//!
//! Schema introspection for each database backend. Every backend answers two
//! questions: which tables exist (optionally including the built-in system
//! catalogs) and which columns each user table has.

use crate::database::connection::DatabasePool;
use crate::database::schema::{Column, SchemaIndex, Table};
use crate::error::{Result, SqlAgentError};
use sqlx::{mysql::MySqlPool, postgres::PgPool, sqlite::SqlitePool, Row};

/// List table and view names
///
/// With `include_system`, the database's own catalog tables are listed too.
pub async fn list_tables(pool: &DatabasePool, include_system: bool) -> Result<Vec<String>> {
    match pool {
        DatabasePool::Sqlite(pool) => list_tables_sqlite(pool, include_system).await,
        DatabasePool::Postgres(pool) => list_tables_postgresql(pool, include_system).await,
        DatabasePool::MySql(pool) => list_tables_mysql(pool, include_system).await,
    }
}

/// Build the schema index of user tables
pub async fn index(pool: &DatabasePool) -> Result<SchemaIndex> {
    match pool {
        DatabasePool::Sqlite(pool) => index_sqlite(pool).await,
        DatabasePool::Postgres(pool) => index_postgresql(pool).await,
        DatabasePool::MySql(pool) => index_mysql(pool).await,
    }
}

async fn list_tables_sqlite(pool: &SqlitePool, include_system: bool) -> Result<Vec<String>> {
    // pragma_table_list also reports sqlite_schema and sqlite_temp_schema
    let query = r#"
        SELECT name
        FROM pragma_table_list
        WHERE type IN ('table', 'view')
            AND (?1 OR name NOT LIKE 'sqlite_%')
        ORDER BY name
    "#;

    let rows = sqlx::query(query)
        .bind(include_system)
        .fetch_all(pool)
        .await
        .map_err(|e| SqlAgentError::query(query, e))?;

    rows.iter()
        .map(|row| row.try_get::<String, _>("name"))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| SqlAgentError::query(query, e))
}

async fn list_tables_postgresql(pool: &PgPool, include_system: bool) -> Result<Vec<String>> {
    let query = r#"
        SELECT
            CASE WHEN table_schema = 'public' THEN table_name::text
                 ELSE table_schema::text || '.' || table_name::text END AS name
        FROM information_schema.tables
        WHERE table_schema = 'public'
            OR ($1 AND table_schema IN ('pg_catalog', 'information_schema'))
        ORDER BY table_schema <> 'public', name
    "#;

    let rows = sqlx::query(query)
        .bind(include_system)
        .fetch_all(pool)
        .await
        .map_err(|e| SqlAgentError::query(query, e))?;

    rows.iter()
        .map(|row| row.try_get::<String, _>("name"))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| SqlAgentError::query(query, e))
}

async fn list_tables_mysql(pool: &MySqlPool, include_system: bool) -> Result<Vec<String>> {
    let query = r#"
        SELECT
            CAST(CASE WHEN TABLE_SCHEMA = DATABASE() THEN TABLE_NAME
                 ELSE CONCAT(TABLE_SCHEMA, '.', TABLE_NAME) END AS CHAR) AS name
        FROM information_schema.TABLES
        WHERE TABLE_SCHEMA = DATABASE()
            OR (? AND TABLE_SCHEMA IN ('information_schema', 'mysql', 'performance_schema', 'sys'))
        ORDER BY TABLE_SCHEMA <> DATABASE(), name
    "#;

    let rows = sqlx::query(query)
        .bind(include_system)
        .fetch_all(pool)
        .await
        .map_err(|e| SqlAgentError::query(query, e))?;

    rows.iter()
        .map(|row| row.try_get::<String, _>("name"))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| SqlAgentError::query(query, e))
}

/// Index SQLite database schema
async fn index_sqlite(pool: &SqlitePool) -> Result<SchemaIndex> {
    let mut schema_index = SchemaIndex::new();
    schema_index.database_name = Some("main".to_string());

    let tables_query = r#"
        SELECT name, type
        FROM sqlite_master
        WHERE type IN ('table', 'view')
            AND name NOT LIKE 'sqlite_%'
        ORDER BY name
    "#;

    let tables_rows = sqlx::query(tables_query)
        .fetch_all(pool)
        .await
        .map_err(|e| SqlAgentError::query(tables_query, e))?;

    let columns_query = r#"
        SELECT name, type, "notnull" AS not_null, pk
        FROM pragma_table_info(?1)
        ORDER BY cid
    "#;

    for row in tables_rows {
        let table_name: String = row.get("name");
        let table_type: String = row.get("type");
        let mut table = if table_type == "view" {
            Table::new_view(&table_name)
        } else {
            Table::new(&table_name)
        };

        let columns_rows = sqlx::query(columns_query)
            .bind(&table_name)
            .fetch_all(pool)
            .await
            .map_err(|e| SqlAgentError::query(columns_query, e))?;

        for col_row in columns_rows {
            let not_null: i64 = col_row.get("not_null");
            let pk: i64 = col_row.get("pk");
            table.add_column(Column {
                name: col_row.get("name"),
                data_type: col_row.get("type"),
                nullable: not_null == 0,
                is_primary_key: pk > 0,
            });
        }

        schema_index.add_table(table);
    }

    Ok(schema_index)
}

/// Index PostgreSQL database schema
async fn index_postgresql(pool: &PgPool) -> Result<SchemaIndex> {
    let mut schema_index = SchemaIndex::new();

    let db_row: Option<(String,)> = sqlx::query_as("SELECT current_database()::text")
        .fetch_optional(pool)
        .await
        .map_err(|e| SqlAgentError::query("SELECT current_database()", e))?;
    schema_index.database_name = db_row.map(|(name,)| name);

    let tables_query = r#"
        SELECT table_name::text AS table_name, table_type::text AS table_type
        FROM information_schema.tables
        WHERE table_schema = 'public'
        ORDER BY table_name
    "#;

    let tables_rows = sqlx::query(tables_query)
        .fetch_all(pool)
        .await
        .map_err(|e| SqlAgentError::query(tables_query, e))?;

    let columns_query = r#"
        SELECT
            c.column_name::text AS column_name,
            c.data_type::text AS data_type,
            c.is_nullable::text AS is_nullable,
            EXISTS (
                SELECT 1
                FROM information_schema.table_constraints tc
                JOIN information_schema.key_column_usage kcu
                    ON tc.constraint_name = kcu.constraint_name
                    AND tc.table_schema = kcu.table_schema
                WHERE tc.constraint_type = 'PRIMARY KEY'
                    AND tc.table_schema = c.table_schema
                    AND tc.table_name = c.table_name
                    AND kcu.column_name = c.column_name
            ) AS is_primary_key
        FROM information_schema.columns c
        WHERE c.table_schema = 'public'
            AND c.table_name = $1
        ORDER BY c.ordinal_position
    "#;

    for row in tables_rows {
        let table_name: String = row.get("table_name");
        let table_type: String = row.get("table_type");
        let mut table = if table_type == "VIEW" {
            Table::new_view(&table_name)
        } else {
            Table::new(&table_name)
        };

        let columns_rows = sqlx::query(columns_query)
            .bind(&table_name)
            .fetch_all(pool)
            .await
            .map_err(|e| SqlAgentError::query(columns_query, e))?;

        for col_row in columns_rows {
            let is_nullable: String = col_row.get("is_nullable");
            table.add_column(Column {
                name: col_row.get("column_name"),
                data_type: col_row.get("data_type"),
                nullable: is_nullable == "YES",
                is_primary_key: col_row.get("is_primary_key"),
            });
        }

        schema_index.add_table(table);
    }

    Ok(schema_index)
}

/// Index MySQL database schema
async fn index_mysql(pool: &MySqlPool) -> Result<SchemaIndex> {
    let mut schema_index = SchemaIndex::new();

    let db_row: Option<(Option<String>,)> = sqlx::query_as("SELECT DATABASE()")
        .fetch_optional(pool)
        .await
        .map_err(|e| SqlAgentError::query("SELECT DATABASE()", e))?;
    schema_index.database_name = db_row.and_then(|(name,)| name);

    let tables_query = r#"
        SELECT
            CAST(TABLE_NAME AS CHAR) AS table_name,
            CAST(TABLE_TYPE AS CHAR) AS table_type
        FROM information_schema.TABLES
        WHERE TABLE_SCHEMA = DATABASE()
            AND TABLE_TYPE IN ('BASE TABLE', 'VIEW')
        ORDER BY TABLE_NAME
    "#;

    let tables_rows = sqlx::query(tables_query)
        .fetch_all(pool)
        .await
        .map_err(|e| SqlAgentError::query(tables_query, e))?;

    let columns_query = r#"
        SELECT
            CAST(COLUMN_NAME AS CHAR) AS column_name,
            CAST(COLUMN_TYPE AS CHAR) AS data_type,
            CAST(IS_NULLABLE AS CHAR) AS is_nullable,
            CAST(COLUMN_KEY AS CHAR) AS column_key
        FROM information_schema.COLUMNS
        WHERE TABLE_SCHEMA = DATABASE()
            AND TABLE_NAME = ?
        ORDER BY ORDINAL_POSITION
    "#;

    for row in tables_rows {
        let table_name: String = row.get("table_name");
        let table_type: String = row.get("table_type");
        let mut table = if table_type == "VIEW" {
            Table::new_view(&table_name)
        } else {
            Table::new(&table_name)
        };

        let columns_rows = sqlx::query(columns_query)
            .bind(&table_name)
            .fetch_all(pool)
            .await
            .map_err(|e| SqlAgentError::query(columns_query, e))?;

        for col_row in columns_rows {
            let is_nullable: String = col_row.get("is_nullable");
            let column_key: Option<String> = col_row.get("column_key");
            table.add_column(Column {
                name: col_row.get("column_name"),
                data_type: col_row.get("data_type"),
                nullable: is_nullable == "YES",
                is_primary_key: column_key.as_deref() == Some("PRI"),
            });
        }

        schema_index.add_table(table);
    }

    Ok(schema_index)
}
