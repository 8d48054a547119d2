//! Transcript rendering
//!
//! Turns agent replies and the query log into terminal text.

use crate::agent::tools::{ExecutionStep, QueryLog};
use crate::agent::AgentReply;

/// Log entries shown by `/logs`
pub const LOGS_SHOWN: usize = 10;

/// Answer followed by the statements that produced it
pub fn format_reply(reply: &AgentReply) -> String {
    let mut out = reply.answer.trim_end().to_string();
    if reply.steps.is_empty() {
        return out;
    }

    out.push_str("\n\n── Execution details ──");
    for (i, step) in reply.steps.iter().enumerate() {
        out.push_str(&format!("\n\nStep {} ({})\n", i + 1, step.tool));
        out.push_str(&format_step(step));
    }
    out
}

/// SQL plus either the result table or the error text
pub fn format_step(step: &ExecutionStep) -> String {
    let mut out = format!("SQL: {}\n", step.sql.trim());
    match &step.result {
        Some(result) => {
            out.push_str(&result.to_table());
            out.push_str(&format!("\n({} rows)", result.row_count()));
        }
        None => out.push_str(&step.output),
    }
    out
}

/// The most recent log entries, newest first
pub fn format_logs(log: &QueryLog) -> String {
    if log.is_empty() {
        return "No queries executed yet.".to_string();
    }

    let mut out = format!("Recent queries ({} of {}):", log.len().min(LOGS_SHOWN), log.len());
    for entry in log.recent(LOGS_SHOWN) {
        let status = if entry.error { "✗" } else { "✓" };
        out.push_str(&format!(
            "\n\n{} [{}] {}\n  {}\n  → {} ({} chars)",
            status,
            entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
            entry.db_type,
            entry.query.trim(),
            entry.result_preview.replace('\n', "\n    "),
            entry.result_length,
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::tools::SQL_TOOL_NAME;
    use crate::database::{CellValue, DatabaseBackend, QueryResult};

    fn ok_step() -> ExecutionStep {
        ExecutionStep {
            tool: SQL_TOOL_NAME.to_string(),
            sql: "SELECT name FROM users".to_string(),
            output: "QUERY: SELECT name FROM users LIMIT 10\n\nRESULT:\n...".to_string(),
            result: Some(QueryResult {
                columns: vec!["name".to_string()],
                rows: vec![vec![CellValue::Text("Ada".to_string())]],
            }),
            error: false,
            rejection: None,
        }
    }

    #[test]
    fn test_reply_without_steps() {
        let reply = AgentReply {
            answer: "Hello there.\n".to_string(),
            steps: Vec::new(),
        };
        assert_eq!(format_reply(&reply), "Hello there.");
    }

    #[test]
    fn test_reply_with_steps() {
        let failed = ExecutionStep::failed(SQL_TOOL_NAME, "DROP TABLE users", "only SELECT statements are allowed.");
        let reply = AgentReply {
            answer: "One user: Ada.".to_string(),
            steps: vec![failed, ok_step()],
        };
        let text = format_reply(&reply);
        assert!(text.starts_with("One user: Ada."));
        assert!(text.contains("Step 1 (execute_sql)"));
        assert!(text.contains("Error: only SELECT statements are allowed."));
        assert!(text.contains("Step 2 (execute_sql)"));
        assert!(text.contains("Ada"));
        assert!(text.contains("(1 rows)"));
    }

    #[test]
    fn test_logs_newest_first() {
        let mut log = QueryLog::default();
        assert_eq!(format_logs(&log), "No queries executed yet.");

        let mut first = ok_step();
        first.sql = "SELECT 1".to_string();
        log.record(&first, DatabaseBackend::SQLite);
        log.record(&ok_step(), DatabaseBackend::SQLite);

        let text = format_logs(&log);
        let newest = text.find("SELECT name FROM users").unwrap();
        let oldest = text.find("SELECT 1").unwrap();
        assert!(newest < oldest);
        assert!(text.starts_with("Recent queries (2 of 2):"));
    }
}
