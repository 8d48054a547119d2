//! SQL agent
//!
//! Drives the tool-calling loop: the model sees the schema and the
//! `execute_sql` tool, asks for statements, reads their results and finally
//! answers in prose.

pub mod guard;
pub mod prompts;
pub mod tools;

use crate::database::{DatabaseBackend, DatabaseManager};
use crate::error::{Result, SqlAgentError};
use crate::llm::{GenerationParams, LLMProvider, Message, ToolCall};
use std::sync::Arc;
use std::time::Duration;
use tools::{ExecutionStep, SharedQueryLog, SqlExecutionTool, SQL_TOOL_NAME};
use tracing::{error, info, warn};

pub use guard::{GuardRejection, SqlGuard};
pub use tools::QueryLogEntry;

/// Model round-trips allowed per question
pub const MAX_ITERATIONS: usize = 5;

/// Wall-clock budget per question
pub const MAX_EXECUTION_SECS: u64 = 60;

/// Answer used when the loop runs out of rounds
const ITERATION_LIMIT_ANSWER: &str = "Agent stopped due to iteration limit or time limit.";

/// Outcome of one question
#[derive(Debug, Clone)]
pub struct AgentReply {
    pub answer: String,
    pub steps: Vec<ExecutionStep>,
}

/// Connection facts shown by `/status`
#[derive(Debug, Clone, PartialEq)]
pub struct DbInfo {
    pub backend: DatabaseBackend,
    pub target: String,
    pub table_count: usize,
}

/// Tool-calling SQL analyst bound to one connection
pub struct SqlAgent {
    provider: Arc<dyn LLMProvider>,
    manager: Arc<DatabaseManager>,
    tool: SqlExecutionTool,
    max_results: u32,
    max_iterations: usize,
    timeout: Duration,
    /// Prior user/assistant turns
    history: Vec<Message>,
}

impl SqlAgent {
    pub fn new(
        provider: Arc<dyn LLMProvider>,
        manager: Arc<DatabaseManager>,
        max_results: u32,
    ) -> Self {
        info!(
            provider = provider.provider_name(),
            model = provider.model(),
            backend = %manager.backend(),
            "SQL agent created"
        );
        Self {
            tool: SqlExecutionTool::new(Arc::clone(&manager), max_results),
            provider,
            manager,
            max_results,
            max_iterations: MAX_ITERATIONS,
            timeout: Duration::from_secs(MAX_EXECUTION_SECS),
            history: Vec::new(),
        }
    }

    /// Log executions into a log shared with the rest of the session
    pub fn with_query_log(mut self, log: SharedQueryLog) -> Self {
        self.tool = SqlExecutionTool::new(Arc::clone(&self.manager), self.max_results).with_log(log);
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Answer a question, running whatever statements the model asks for
    ///
    /// Never fails: provider and transport errors become an
    /// `Error during chat: ...` answer.
    pub async fn chat(&mut self, question: &str) -> AgentReply {
        info!(question, "processing user question");

        let mut steps = Vec::new();
        let outcome =
            tokio::time::timeout(self.timeout, self.run_loop(question, &mut steps)).await;

        let answer = match outcome {
            Ok(Ok(Some(answer))) => {
                self.history.push(Message::user(question));
                self.history.push(Message::assistant(answer.clone()));
                answer
            }
            Ok(Ok(None)) => {
                warn!(rounds = self.max_iterations, "agent hit the iteration limit");
                ITERATION_LIMIT_ANSWER.to_string()
            }
            Ok(Err(e)) => {
                error!(error = %e, "chat failed");
                format!("Error during chat: {}", e)
            }
            Err(_) => {
                let e = SqlAgentError::Timeout(self.timeout.as_secs());
                warn!(error = %e, "chat timed out");
                ITERATION_LIMIT_ANSWER.to_string()
            }
        };

        info!(length = answer.len(), steps = steps.len(), "agent completed processing");
        AgentReply { answer, steps }
    }

    /// Returns `None` when the round budget runs out before a final answer
    async fn run_loop(
        &self,
        question: &str,
        steps: &mut Vec<ExecutionStep>,
    ) -> Result<Option<String>> {
        let schema = self.manager.schema_context().await;
        let mut messages = Vec::with_capacity(self.history.len() + 2);
        messages.push(Message::system(prompts::system_prompt(
            self.manager.backend(),
            &schema,
            self.max_results,
        )));
        messages.extend(self.history.iter().cloned());
        messages.push(Message::user(question));

        let tools = [SqlExecutionTool::definition()];
        let params = GenerationParams::default();

        for round in 0..self.max_iterations {
            let response = self
                .provider
                .generate(&messages, &tools, Some(&params))
                .await?;

            if response.tool_calls.is_empty() {
                if response.content.trim().is_empty() {
                    return Ok(Some("No response generated.".to_string()));
                }
                return Ok(Some(response.content));
            }

            info!(round, calls = response.tool_calls.len(), "model requested tools");
            messages.push(Message::assistant_tool_calls(
                response.content.clone(),
                response.tool_calls.clone(),
            ));

            for call in &response.tool_calls {
                let step = self.dispatch(call).await;
                messages.push(Message::tool_result(call.id.clone(), step.output.clone()));
                steps.push(step);
            }
        }

        Ok(None)
    }

    async fn dispatch(&self, call: &ToolCall) -> ExecutionStep {
        if call.name != SQL_TOOL_NAME {
            warn!(tool = %call.name, "model called an unknown tool");
            return ExecutionStep::unknown_tool(&call.name, &call.arguments);
        }

        let query = match call.parsed_arguments() {
            Ok(args) => args.get("query").and_then(|q| q.as_str()).map(str::to_string),
            Err(e) => {
                let step = ExecutionStep::failed(
                    SQL_TOOL_NAME,
                    &call.arguments,
                    format!("invalid tool arguments: {}", e),
                );
                self.tool.record(&step).await;
                return step;
            }
        };

        match query {
            Some(query) => self.tool.run(&query).await,
            None => {
                let step = ExecutionStep::failed(
                    SQL_TOOL_NAME,
                    &call.arguments,
                    "missing 'query' argument",
                );
                self.tool.record(&step).await;
                step
            }
        }
    }

    /// Run a statement through the tool directly, bypassing the model
    pub async fn test_query(&self, sql: &str) -> ExecutionStep {
        self.tool.run(sql).await
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn query_log(&self) -> &SharedQueryLog {
        self.tool.log()
    }

    pub async fn db_info(&self) -> DbInfo {
        DbInfo {
            backend: self.manager.backend(),
            target: self.manager.target(),
            table_count: self.manager.schema_index().await.table_count(),
        }
    }

    pub fn provider(&self) -> &dyn LLMProvider {
        self.provider.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{CellValue, ConnectionConfig};
    use crate::llm::{LLMResponse, MessageRole, ToolDefinition};
    use async_trait::async_trait;
    use sqlx::sqlite::{SqliteConnectOptions, SqlitePool};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned responses and records what it was sent
    struct ScriptedProvider {
        replies: Mutex<VecDeque<Result<LLMResponse>>>,
        /// Returned once the script is exhausted
        fallback: Option<LLMResponse>,
        delay: Option<Duration>,
        seen: Mutex<Vec<Vec<Message>>>,
    }

    impl ScriptedProvider {
        fn new(replies: Vec<Result<LLMResponse>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                fallback: None,
                delay: None,
                seen: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<Vec<Message>> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LLMProvider for ScriptedProvider {
        async fn generate(
            &self,
            messages: &[Message],
            tools: &[ToolDefinition],
            _params: Option<&GenerationParams>,
        ) -> Result<LLMResponse> {
            assert_eq!(tools.len(), 1);
            self.seen.lock().unwrap().push(messages.to_vec());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let next = self.replies.lock().unwrap().pop_front();
            match next {
                Some(reply) => reply,
                None => self
                    .fallback
                    .clone()
                    .ok_or_else(|| SqlAgentError::LLMProvider("script exhausted".to_string())),
            }
        }

        fn provider_name(&self) -> &str {
            "Scripted"
        }

        fn model(&self) -> &str {
            "scripted-model"
        }

        fn has_api_key(&self) -> bool {
            true
        }
    }

    fn sql_call(id: &str, sql: &str) -> LLMResponse {
        LLMResponse::with_tool_calls(vec![ToolCall {
            id: id.to_string(),
            name: SQL_TOOL_NAME.to_string(),
            arguments: serde_json::json!({ "query": sql }).to_string(),
        }])
    }

    async fn shop_db() -> (tempfile::TempDir, Arc<DatabaseManager>) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shop.db");

        let options = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options).await.unwrap();
        sqlx::query("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL)")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO users (name) VALUES ('Ada'), ('Grace'), ('Linus')")
            .execute(&pool)
            .await
            .unwrap();
        pool.close().await;

        let manager = DatabaseManager::connect(ConnectionConfig::Sqlite { path })
            .await
            .unwrap();
        (dir, Arc::new(manager))
    }

    #[tokio::test]
    async fn test_chat_runs_tool_and_answers() {
        let (_dir, manager) = shop_db().await;
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok(sql_call("call_1", "SELECT COUNT(*) AS n FROM users")),
            Ok(LLMResponse::new("There are 3 users.")),
        ]));
        let mut agent = SqlAgent::new(provider.clone(), manager, 10);

        let reply = agent.chat("How many users are there?").await;
        assert_eq!(reply.answer, "There are 3 users.");
        assert_eq!(reply.steps.len(), 1);

        let step = &reply.steps[0];
        assert!(!step.error);
        assert!(step
            .output
            .starts_with("QUERY: SELECT COUNT(*) AS n FROM users LIMIT 10\n\nRESULT:\n"));
        let result = step.result.as_ref().unwrap();
        assert_eq!(result.rows[0][0], CellValue::Int(3));

        // Second round sees the tool result tied to its call
        let calls = provider.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0][0].role, MessageRole::System);
        assert!(calls[0][0].content.contains("CREATE TABLE users"));
        let tool_msg = calls[1].last().unwrap();
        assert_eq!(tool_msg.role, MessageRole::Tool);
        assert_eq!(tool_msg.tool_call_id.as_deref(), Some("call_1"));

        assert_eq!(agent.query_log().lock().await.len(), 1);
        assert_eq!(agent.history().len(), 2);
    }

    #[tokio::test]
    async fn test_mutation_is_refused_before_execution() {
        let (_dir, manager) = shop_db().await;
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok(sql_call("call_1", "DROP TABLE users")),
            Ok(LLMResponse::new("I can only read data.")),
        ]));
        let mut agent = SqlAgent::new(provider, manager.clone(), 10);

        let reply = agent.chat("Delete the users table").await;
        assert_eq!(
            reply.steps[0].output,
            "Error: only SELECT statements are allowed."
        );
        assert!(reply.steps[0].error);
        assert!(reply.steps[0].result.is_none());

        let still_there = manager.execute("SELECT COUNT(*) FROM users").await.unwrap();
        assert_eq!(still_there.rows[0][0], CellValue::Int(3));

        let log = agent.query_log().lock().await;
        let entry = log.recent(1).next().unwrap();
        assert!(entry.error);
        assert_eq!(entry.query, "DROP TABLE users");
    }

    #[tokio::test]
    async fn test_database_error_is_fed_back() {
        let (_dir, manager) = shop_db().await;
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok(sql_call("call_1", "SELECT nope FROM users")),
            Ok(sql_call("call_2", "SELECT name FROM users")),
            Ok(LLMResponse::new("Ada, Grace and Linus.")),
        ]));
        let mut agent = SqlAgent::new(provider, manager, 10);

        let reply = agent.chat("Names?").await;
        assert_eq!(reply.steps.len(), 2);
        assert!(reply.steps[0].error);
        assert!(reply.steps[0].output.starts_with("Error: "));
        assert!(reply.steps[0].output.contains("nope"));
        assert!(!reply.steps[1].error);
        assert_eq!(reply.answer, "Ada, Grace and Linus.");
    }

    #[tokio::test]
    async fn test_iteration_limit() {
        let (_dir, manager) = shop_db().await;
        let mut provider = ScriptedProvider::new(Vec::new());
        provider.fallback = Some(sql_call("loop", "SELECT 1"));
        let mut agent = SqlAgent::new(Arc::new(provider), manager, 10);

        let reply = agent.chat("Keep going").await;
        assert_eq!(reply.steps.len(), MAX_ITERATIONS);
        assert_eq!(reply.answer, ITERATION_LIMIT_ANSWER);

        let mut agent = agent.with_max_iterations(2);
        let reply = agent.chat("Keep going").await;
        assert_eq!(reply.steps.len(), 2);
        assert_eq!(reply.answer, ITERATION_LIMIT_ANSWER);
        assert!(agent.history().is_empty());
    }

    #[tokio::test]
    async fn test_timeout_stops_the_loop() {
        let (_dir, manager) = shop_db().await;
        let mut provider = ScriptedProvider::new(vec![Ok(LLMResponse::new("late"))]);
        provider.delay = Some(Duration::from_secs(5));
        let mut agent = SqlAgent::new(Arc::new(provider), manager, 10)
            .with_timeout(Duration::from_millis(50));

        let reply = agent.chat("Anything").await;
        assert_eq!(reply.answer, ITERATION_LIMIT_ANSWER);
    }

    #[tokio::test]
    async fn test_provider_error_becomes_answer() {
        let (_dir, manager) = shop_db().await;
        let provider = Arc::new(ScriptedProvider::new(vec![Err(SqlAgentError::LLMApiError {
            provider: "Groq".to_string(),
            message: "invalid api key".to_string(),
            status: 401,
        })]));
        let mut agent = SqlAgent::new(provider, manager, 10);

        let reply = agent.chat("Hello").await;
        assert!(reply.answer.starts_with("Error during chat: "));
        assert!(reply.answer.contains("invalid api key"));
        assert!(reply.steps.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_tool_and_bad_arguments() {
        let (_dir, manager) = shop_db().await;
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok(LLMResponse::with_tool_calls(vec![
                ToolCall {
                    id: "a".to_string(),
                    name: "shell".to_string(),
                    arguments: "{}".to_string(),
                },
                ToolCall {
                    id: "b".to_string(),
                    name: SQL_TOOL_NAME.to_string(),
                    arguments: r#"{"sql": "SELECT 1"}"#.to_string(),
                },
            ])),
            Ok(LLMResponse::new("done")),
        ]));
        let mut agent = SqlAgent::new(provider, manager, 10);

        let reply = agent.chat("Try things").await;
        assert_eq!(reply.steps.len(), 2);
        assert_eq!(reply.steps[0].output, "Error: unknown tool 'shell'");
        assert_eq!(reply.steps[1].output, "Error: missing 'query' argument");
        // Only execute_sql calls are logged
        assert_eq!(agent.query_log().lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_history_carries_over_and_clears() {
        let (_dir, manager) = shop_db().await;
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok(LLMResponse::new("First answer")),
            Ok(LLMResponse::new("Second answer")),
        ]));
        let mut agent = SqlAgent::new(provider.clone(), manager, 10);

        agent.chat("first").await;
        agent.chat("second").await;

        let calls = provider.calls();
        let second = &calls[1];
        assert_eq!(second.len(), 4);
        assert_eq!(second[1].content, "first");
        assert_eq!(second[2].content, "First answer");

        agent.clear_history();
        assert!(agent.history().is_empty());
    }

    #[tokio::test]
    async fn test_query_direct() {
        let (_dir, manager) = shop_db().await;
        let provider = Arc::new(ScriptedProvider::new(Vec::new()));
        let agent = SqlAgent::new(provider, manager, 2);

        let step = agent.test_query("SELECT name FROM users ORDER BY id").await;
        assert!(step.output.contains("LIMIT 2"));
        assert_eq!(step.result.unwrap().row_count(), 2);

        let info = agent.db_info().await;
        assert_eq!(info.backend, DatabaseBackend::SQLite);
        assert_eq!(info.table_count, 1);
        assert_eq!(agent.query_log().lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_shared_query_log() {
        let (_dir, manager) = shop_db().await;
        let log = SharedQueryLog::default();
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok(sql_call("call_1", "SELECT name FROM users")),
            Ok(LLMResponse::new("Three users.")),
        ]));
        let mut agent =
            SqlAgent::new(provider, Arc::clone(&manager), 10).with_query_log(Arc::clone(&log));

        agent.chat("Who are the users?").await;
        agent.test_query("SELECT 1").await;
        SqlExecutionTool::new(manager, 10)
            .with_log(Arc::clone(&log))
            .run("DELETE FROM users")
            .await;

        let log = log.lock().await;
        assert_eq!(log.len(), 3);
        let newest = log.recent(1).next().unwrap();
        assert_eq!(newest.query, "DELETE FROM users");
        assert!(newest.error);
    }
}
