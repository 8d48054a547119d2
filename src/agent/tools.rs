//! SQL execution tool
//!
//! The single tool exposed to the model. Every statement goes through the
//! guard before it reaches the database, and every failure is returned as
//! `Error: ...` text so the model can revise and retry.

use crate::agent::guard::{GuardRejection, SqlGuard};
use crate::database::{DatabaseBackend, DatabaseManager, QueryResult};
use crate::error::SqlAgentError;
use crate::llm::ToolDefinition;
use chrono::{DateTime, Local};
use serde_json::json;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info};

/// Name the model uses to call the tool
pub const SQL_TOOL_NAME: &str = "execute_sql";

/// Executions kept in the query log
pub const QUERY_LOG_CAPACITY: usize = 50;

/// Characters kept in a log entry's result preview
const PREVIEW_CHARS: usize = 200;

/// Query log shared by everything that executes on one connection
pub type SharedQueryLog = Arc<Mutex<QueryLog>>;

/// One tool invocation made while answering a question
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionStep {
    /// Tool the model called
    pub tool: String,
    /// SQL as the model sent it
    pub sql: String,
    /// Text handed back to the model
    pub output: String,
    /// Rows, when the statement ran
    pub result: Option<QueryResult>,
    pub error: bool,
    /// Set when the guard refused the statement
    pub rejection: Option<GuardRejection>,
}

impl ExecutionStep {
    /// Step that never reached the database
    pub fn failed(
        tool: impl Into<String>,
        input: impl Into<String>,
        message: impl std::fmt::Display,
    ) -> Self {
        Self {
            tool: tool.into(),
            sql: input.into(),
            output: format!("Error: {}", message),
            result: None,
            error: true,
            rejection: None,
        }
    }

    /// Step for a tool call we do not provide
    pub fn unknown_tool(tool: impl Into<String>, input: impl Into<String>) -> Self {
        let tool = tool.into();
        let message = format!("unknown tool '{}'", tool);
        Self::failed(tool, input, message)
    }
}

/// Guarded statement execution against the session's database
pub struct SqlExecutionTool {
    manager: Arc<DatabaseManager>,
    guard: SqlGuard,
    log: SharedQueryLog,
}

impl SqlExecutionTool {
    /// Tool with a log of its own
    pub fn new(manager: Arc<DatabaseManager>, max_results: u32) -> Self {
        Self {
            manager,
            guard: SqlGuard::new(max_results),
            log: SharedQueryLog::default(),
        }
    }

    /// Record executions into an existing log
    pub fn with_log(mut self, log: SharedQueryLog) -> Self {
        self.log = log;
        self
    }

    pub fn log(&self) -> &SharedQueryLog {
        &self.log
    }

    /// Add a finished step to the query log
    pub async fn record(&self, step: &ExecutionStep) {
        self.log.lock().await.record(step, self.backend());
    }

    /// Tool schema advertised to the model
    pub fn definition() -> ToolDefinition {
        ToolDefinition {
            name: SQL_TOOL_NAME.to_string(),
            description: "Execute a READ-ONLY SQL query and return results.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "A single SELECT statement"
                    }
                },
                "required": ["query"]
            }),
        }
    }

    pub fn backend(&self) -> DatabaseBackend {
        self.manager.backend()
    }

    /// Guard, execute and format one statement, then log it
    pub async fn run(&self, sql: &str) -> ExecutionStep {
        let step = self.execute(sql).await;
        self.record(&step).await;
        step
    }

    async fn execute(&self, sql: &str) -> ExecutionStep {
        let mut step = ExecutionStep {
            tool: SQL_TOOL_NAME.to_string(),
            sql: sql.to_string(),
            output: String::new(),
            result: None,
            error: false,
            rejection: None,
        };

        let safe_sql = match self.guard.check(sql) {
            Ok(safe_sql) => safe_sql,
            Err(rejection) => {
                step.output = format!("Error: {}", rejection);
                step.error = true;
                step.rejection = Some(rejection);
                return step;
            }
        };

        match self.manager.execute(&safe_sql).await {
            Ok(result) => {
                let formatted = result.to_markdown();
                info!(
                    rows = result.row_count(),
                    length = formatted.len(),
                    "query executed successfully"
                );
                step.output = format!("QUERY: {}\n\nRESULT:\n{}", safe_sql, formatted);
                step.result = Some(result);
            }
            Err(e) => {
                error!(error = %e, "query execution failed");
                step.output = match e {
                    SqlAgentError::Query { message, .. } => {
                        format!("Error: {}", message)
                    }
                    other => format!("Error: {}", other),
                };
                step.error = true;
            }
        }
        step
    }
}

/// One row of the query log
#[derive(Debug, Clone, PartialEq)]
pub struct QueryLogEntry {
    pub timestamp: DateTime<Local>,
    pub query: String,
    pub result_preview: String,
    /// Length of the full tool output, in characters
    pub result_length: usize,
    pub error: bool,
    pub db_type: DatabaseBackend,
}

impl QueryLogEntry {
    pub fn new(step: &ExecutionStep, db_type: DatabaseBackend) -> Self {
        let result_length = step.output.chars().count();
        let result_preview = if result_length > PREVIEW_CHARS {
            let head: String = step.output.chars().take(PREVIEW_CHARS).collect();
            format!("{}...", head)
        } else {
            step.output.clone()
        };

        Self {
            timestamp: Local::now(),
            query: step.sql.clone(),
            result_preview,
            result_length,
            error: step.error,
            db_type,
        }
    }
}

/// Bounded, oldest-first log of executed statements
#[derive(Debug, Clone)]
pub struct QueryLog {
    entries: VecDeque<QueryLogEntry>,
    capacity: usize,
}

impl Default for QueryLog {
    fn default() -> Self {
        Self::with_capacity(QUERY_LOG_CAPACITY)
    }
}

impl QueryLog {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn record(&mut self, step: &ExecutionStep, db_type: DatabaseBackend) {
        if step.error {
            error!(query = %step.sql, result = %step.output, "query failed");
        } else {
            info!(query = %step.sql, length = step.output.len(), "query logged");
        }

        self.entries.push_back(QueryLogEntry::new(step, db_type));
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The `n` most recent entries, newest first
    pub fn recent(&self, n: usize) -> impl Iterator<Item = &QueryLogEntry> {
        self.entries.iter().rev().take(n)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
