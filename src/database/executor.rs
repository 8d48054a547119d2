//! Query execution
//!
//! Runs a single statement against the connected pool and decodes the rows
//! into backend-independent cells for display.

use crate::database::connection::DatabasePool;
use crate::error::{Result, SqlAgentError};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use comfy_table::{presets, ContentArrangement, Table as TextTable};
use sqlx::mysql::MySqlRow;
use sqlx::postgres::PgRow;
use sqlx::sqlite::SqliteRow;
use sqlx::types::Decimal;
use sqlx::{Column, Row, TypeInfo};
use std::fmt;

/// Rows rendered into the markdown handed back to the LLM
const MAX_MARKDOWN_ROWS: usize = 100;

/// A single decoded value
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    /// NUMERIC/DECIMAL, kept exact
    Decimal(Decimal),
    Text(String),
    Bytes(Vec<u8>),
    /// A value whose type we do not decode; holds the database type name
    Unsupported(String),
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Null => write!(f, "NULL"),
            CellValue::Bool(v) => write!(f, "{}", v),
            CellValue::Int(v) => write!(f, "{}", v),
            CellValue::UInt(v) => write!(f, "{}", v),
            CellValue::Float(v) => write!(f, "{}", v),
            CellValue::Decimal(v) => write!(f, "{}", v),
            CellValue::Text(v) => write!(f, "{}", v),
            CellValue::Bytes(bytes) => {
                write!(f, "0x")?;
                for byte in bytes.iter().take(16) {
                    write!(f, "{:02x}", byte)?;
                }
                if bytes.len() > 16 {
                    write!(f, "... ({} bytes)", bytes.len())?;
                }
                Ok(())
            }
            CellValue::Unsupported(type_name) => write!(f, "<{}>", type_name),
        }
    }
}

/// Tabular result of one statement
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl QueryResult {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Pipe-table markdown, as returned to the LLM by the SQL tool
    pub fn to_markdown(&self) -> String {
        if self.is_empty() {
            return "No data returned".to_string();
        }

        let mut table = self.build_table(MAX_MARKDOWN_ROWS);
        table.load_preset(presets::ASCII_MARKDOWN);
        let mut rendered = table.to_string();

        if self.rows.len() > MAX_MARKDOWN_ROWS {
            rendered.push_str(&format!(
                "\n... and {} more rows",
                self.rows.len() - MAX_MARKDOWN_ROWS
            ));
        }
        rendered
    }

    /// Terminal table for the chat transcript
    pub fn to_table(&self) -> String {
        if self.is_empty() {
            return "No data returned".to_string();
        }

        let mut table = self.build_table(self.rows.len());
        table
            .load_preset(presets::UTF8_FULL_CONDENSED)
            .set_content_arrangement(ContentArrangement::Dynamic);
        table.to_string()
    }

    fn build_table(&self, max_rows: usize) -> TextTable {
        let mut table = TextTable::new();
        table.set_header(self.columns.iter());
        for row in self.rows.iter().take(max_rows) {
            table.add_row(row.iter().map(|cell| cell.to_string()));
        }
        table
    }
}

/// Execute one statement and collect every row
pub async fn execute(pool: &DatabasePool, sql: &str) -> Result<QueryResult> {
    match pool {
        DatabasePool::Sqlite(pool) => {
            let rows = sqlx::query(sql)
                .fetch_all(pool)
                .await
                .map_err(|e| SqlAgentError::query(sql, e))?;
            Ok(collect_rows(&rows, sqlite_cell))
        }
        DatabasePool::Postgres(pool) => {
            let rows = sqlx::query(sql)
                .fetch_all(pool)
                .await
                .map_err(|e| SqlAgentError::query(sql, e))?;
            Ok(collect_rows(&rows, postgres_cell))
        }
        DatabasePool::MySql(pool) => {
            let rows = sqlx::query(sql)
                .fetch_all(pool)
                .await
                .map_err(|e| SqlAgentError::query(sql, e))?;
            Ok(collect_rows(&rows, mysql_cell))
        }
    }
}

fn collect_rows<R: Row>(rows: &[R], decode: fn(&R, usize) -> CellValue) -> QueryResult {
    let columns = rows
        .first()
        .map(|row| row.columns().iter().map(|c| c.name().to_string()).collect())
        .unwrap_or_default();

    let rows = rows
        .iter()
        .map(|row| (0..row.len()).map(|idx| decode(row, idx)).collect())
        .collect();

    QueryResult { columns, rows }
}

/// Try each Rust type in order until the driver accepts one
///
/// NULL decodes successfully as `None` for any candidate type.
macro_rules! decode_first {
    ($row:expr, $idx:expr, { $($ty:ty => $wrap:expr),+ $(,)? }) => {{
        let row = $row;
        let idx = $idx;
        let mut cell: Option<CellValue> = None;
        $(
            if cell.is_none() {
                if let Ok(value) = row.try_get::<Option<$ty>, _>(idx) {
                    cell = Some(value.map($wrap).unwrap_or(CellValue::Null));
                }
            }
        )+
        cell.unwrap_or_else(|| {
            CellValue::Unsupported(row.column(idx).type_info().name().to_string())
        })
    }};
}

fn sqlite_cell(row: &SqliteRow, idx: usize) -> CellValue {
    decode_first!(row, idx, {
        i64 => CellValue::Int,
        f64 => CellValue::Float,
        String => CellValue::Text,
        bool => CellValue::Bool,
        Vec<u8> => CellValue::Bytes,
    })
}

fn postgres_cell(row: &PgRow, idx: usize) -> CellValue {
    decode_first!(row, idx, {
        i64 => CellValue::Int,
        i32 => |v: i32| CellValue::Int(v.into()),
        i16 => |v: i16| CellValue::Int(v.into()),
        f64 => CellValue::Float,
        f32 => |v: f32| CellValue::Float(v.into()),
        Decimal => CellValue::Decimal,
        bool => CellValue::Bool,
        String => CellValue::Text,
        NaiveDateTime => |v: NaiveDateTime| CellValue::Text(v.to_string()),
        DateTime<Utc> => |v: DateTime<Utc>| CellValue::Text(v.to_rfc3339()),
        NaiveDate => |v: NaiveDate| CellValue::Text(v.to_string()),
        NaiveTime => |v: NaiveTime| CellValue::Text(v.to_string()),
        serde_json::Value => |v: serde_json::Value| CellValue::Text(v.to_string()),
        Vec<u8> => CellValue::Bytes,
    })
}

fn mysql_cell(row: &MySqlRow, idx: usize) -> CellValue {
    decode_first!(row, idx, {
        i64 => CellValue::Int,
        u64 => CellValue::UInt,
        f64 => CellValue::Float,
        f32 => |v: f32| CellValue::Float(v.into()),
        Decimal => CellValue::Decimal,
        bool => CellValue::Bool,
        String => CellValue::Text,
        NaiveDateTime => |v: NaiveDateTime| CellValue::Text(v.to_string()),
        DateTime<Utc> => |v: DateTime<Utc>| CellValue::Text(v.to_rfc3339()),
        NaiveDate => |v: NaiveDate| CellValue::Text(v.to_string()),
        NaiveTime => |v: NaiveTime| CellValue::Text(v.to_string()),
        serde_json::Value => |v: serde_json::Value| CellValue::Text(v.to_string()),
        Vec<u8> => CellValue::Bytes,
    })
}
