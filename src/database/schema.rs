//! Schema data structures
//!
//! Tables, columns and the schema index built from database introspection,
//! plus the text rendering used as context in the agent's system prompt.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A column in a database table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Column name
    pub name: String,
    /// Declared data type as reported by the database
    pub data_type: String,
    /// Whether the column is nullable
    pub nullable: bool,
    /// Whether this column is part of the primary key
    pub is_primary_key: bool,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable: true,
            is_primary_key: false,
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data_type = if self.data_type.is_empty() {
            "ANY"
        } else {
            &self.data_type
        };
        write!(f, "{} {}", self.name, data_type)?;
        if self.is_primary_key {
            write!(f, " PRIMARY KEY")?;
        }
        if !self.nullable {
            write!(f, " NOT NULL")?;
        }
        Ok(())
    }
}

/// A database table or view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    /// Table or view name
    pub name: String,
    /// Whether this is a view (vs a table)
    pub is_view: bool,
    /// Columns in ordinal order
    pub columns: Vec<Column>,
}

impl Table {
    /// Create a new table
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_view: false,
            columns: Vec::new(),
        }
    }

    /// Create a new view
    pub fn new_view(name: impl Into<String>) -> Self {
        let mut table = Self::new(name);
        table.is_view = true;
        table
    }

    /// Add a column to the table
    pub fn add_column(&mut self, column: Column) {
        self.columns.push(column);
    }

    /// Names of the primary key columns
    pub fn primary_keys(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.is_primary_key)
            .map(|c| c.name.as_str())
            .collect()
    }

    /// Render as a CREATE-style block, the shape LLMs read most reliably
    pub fn format_schema(&self) -> String {
        let keyword = if self.is_view { "VIEW" } else { "TABLE" };
        let columns: Vec<String> = self.columns.iter().map(|c| format!("\t{}", c)).collect();
        format!("CREATE {} {} (\n{}\n)", keyword, self.name, columns.join(",\n"))
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_schema())
    }
}

/// Complete database schema index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaIndex {
    /// Database name (if available)
    pub database_name: Option<String>,
    /// Tables and views indexed by name
    pub tables: BTreeMap<String, Table>,
    /// Index timestamp
    pub indexed_at: chrono::DateTime<chrono::Utc>,
}

impl SchemaIndex {
    /// Create a new schema index
    pub fn new() -> Self {
        Self {
            database_name: None,
            tables: BTreeMap::new(),
            indexed_at: chrono::Utc::now(),
        }
    }

    /// Add a table to the index
    pub fn add_table(&mut self, table: Table) {
        self.tables.insert(table.name.clone(), table);
    }

    /// Get a table by name
    pub fn get_table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    /// Number of tables, excluding views
    pub fn table_count(&self) -> usize {
        self.tables.values().filter(|t| !t.is_view).count()
    }

    /// Format the entire schema for the system prompt
    pub fn format_for_llm(&self) -> String {
        if self.tables.is_empty() {
            return "(no user tables found)".to_string();
        }

        let mut result = String::new();
        if let Some(ref db_name) = self.database_name {
            result.push_str(&format!("-- database: {}\n\n", db_name));
        }

        let blocks: Vec<String> = self.tables.values().map(Table::format_schema).collect();
        result.push_str(&blocks.join("\n\n"));
        result
    }
}

impl Default for SchemaIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SchemaIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_for_llm())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users_table() -> Table {
        let mut table = Table::new("users");
        table.add_column(Column {
            name: "id".to_string(),
            data_type: "INTEGER".to_string(),
            nullable: false,
            is_primary_key: true,
        });
        table.add_column(Column::new("email", "TEXT"));
        table
    }

    #[test]
    fn test_column_display() {
        let column = Column {
            name: "id".to_string(),
            data_type: "integer".to_string(),
            nullable: false,
            is_primary_key: true,
        };
        assert_eq!(column.to_string(), "id integer PRIMARY KEY NOT NULL");
        assert_eq!(Column::new("misc", "").to_string(), "misc ANY");
    }

    #[test]
    fn test_table_schema_block() {
        let table = users_table();
        assert_eq!(table.primary_keys(), vec!["id"]);
        assert_eq!(
            table.format_schema(),
            "CREATE TABLE users (\n\tid INTEGER PRIMARY KEY NOT NULL,\n\temail TEXT\n)"
        );
    }

    #[test]
    fn test_schema_index() {
        let mut index = SchemaIndex::new();
        index.database_name = Some("shop".to_string());
        index.add_table(users_table());
        index.add_table(Table::new_view("active_users"));

        assert_eq!(index.table_count(), 1);

        let formatted = index.format_for_llm();
        assert!(formatted.starts_with("-- database: shop"));
        assert!(formatted.contains("CREATE VIEW active_users"));
        assert!(formatted.contains("CREATE TABLE users"));
    }

    #[test]
    fn test_empty_schema() {
        assert_eq!(SchemaIndex::new().format_for_llm(), "(no user tables found)");
    }
}
