//! Database Manager
//!
//! This module implements the DatabaseManager struct which owns a session's
//! connection pool together with the cached schema index.

use crate::database::connection::{ConnectionConfig, DatabaseBackend, DatabasePool};
use crate::database::executor::{self, QueryResult};
use crate::database::indexer;
use crate::database::schema::SchemaIndex;
use crate::error::Result;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Database Manager
///
/// Handles the connection pool, schema introspection and statement execution
/// for one chat session.
pub struct DatabaseManager {
    /// Database connection pool
    pool: DatabasePool,
    /// Connection parameters the pool was opened with
    config: ConnectionConfig,
    /// Schema index (cached database metadata)
    schema_index: RwLock<SchemaIndex>,
}

impl DatabaseManager {
    /// Connect, verify the connection and index the schema
    ///
    /// # Example
    /// ```no_run
    /// use sql_agent_chat::database::{ConnectionConfig, DatabaseManager};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let config = ConnectionConfig::parse("sqlite://shop.db")?;
    ///     let manager = DatabaseManager::connect(config).await?;
    ///     println!("{}", manager.schema_context().await);
    ///     Ok(())
    /// }
    /// ```
    pub async fn connect(config: ConnectionConfig) -> Result<Self> {
        info!(
            backend = %config.backend(),
            target = %config.display_target(),
            "connecting to database"
        );

        let pool = DatabasePool::connect(&config).await?;
        pool.test_connection().await?;

        let schema = indexer::index(&pool).await?;
        info!(tables = schema.tables.len(), "schema indexed");

        Ok(Self {
            pool,
            config,
            schema_index: RwLock::new(schema),
        })
    }

    /// Re-scan the database and replace the cached schema index
    pub async fn reindex(&self) -> Result<()> {
        let new_index = indexer::index(&self.pool).await?;
        *self.schema_index.write().await = new_index;
        Ok(())
    }

    /// Schema text for the agent's system prompt
    pub async fn schema_context(&self) -> String {
        self.schema_index.read().await.format_for_llm()
    }

    /// Get a copy of the current schema index
    pub async fn schema_index(&self) -> SchemaIndex {
        self.schema_index.read().await.clone()
    }

    /// List table names, optionally including the system catalog
    pub async fn list_tables(&self, include_system: bool) -> Result<Vec<String>> {
        indexer::list_tables(&self.pool, include_system).await
    }

    /// Execute a statement as given; callers are responsible for guarding it
    pub async fn execute(&self, sql: &str) -> Result<QueryResult> {
        debug!(sql, "executing statement");
        executor::execute(&self.pool, sql).await
    }

    /// Get the database backend type
    pub fn backend(&self) -> DatabaseBackend {
        self.pool.backend()
    }

    /// Where we are connected, without credentials
    pub fn target(&self) -> String {
        self.config.display_target()
    }

    /// Check if the connection is still usable
    pub async fn is_connected(&self) -> bool {
        self.pool.test_connection().await.is_ok()
    }

    /// Close the pool
    pub async fn close(&self) {
        info!(target = %self.target(), "closing database connection");
        self.pool.close().await;
    }
}
