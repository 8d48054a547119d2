//! Database module
//!
//! This module provides database connection management,
//! schema introspection and query execution.

pub mod connection;
pub mod executor;
pub mod indexer;
pub mod manager;
pub mod schema;

// Re-exports
pub use connection::{ConnectionConfig, DatabaseBackend, DatabasePool};
pub use executor::{CellValue, QueryResult};
pub use manager::DatabaseManager;
pub use schema::{Column, SchemaIndex, Table};
