//! Configuration module
//!
//! Environment-driven settings plus the per-session state the REPL works
//! against: the open connection, the agent bound to it and the transcript.

pub mod env;

pub use env::{AppConfig, ConfigValidation, ServerDefaults};

use crate::agent::tools::{ExecutionStep, SharedQueryLog};
use crate::agent::SqlAgent;
use crate::database::{ConnectionConfig, DatabaseManager};
use crate::error::{Result, SqlAgentError};
use crate::llm::{GroqProvider, LLMProvider};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// Who said a transcript line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    User,
    Assistant,
}

/// One line of the chat transcript
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub text: String,
    /// Statements run while producing an assistant message
    pub steps: Vec<ExecutionStep>,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            text: text.into(),
            steps: Vec::new(),
        }
    }

    pub fn assistant(text: impl Into<String>, steps: Vec<ExecutionStep>) -> Self {
        Self {
            role: ChatRole::Assistant,
            text: text.into(),
            steps,
        }
    }
}

/// Application state
pub struct AppState {
    /// Settings read from the environment at start-up
    pub config: AppConfig,
    /// Database manager (not connected until /connect)
    pub database_manager: Option<Arc<DatabaseManager>>,
    /// Agent for the current connection; needs an API key
    pub agent: Option<SqlAgent>,
    /// Statements executed on the current connection, by the agent or `/test`
    pub query_log: SharedQueryLog,
    /// Messages exchanged this session
    pub transcript: Vec<ChatMessage>,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            database_manager: None,
            agent: None,
            query_log: SharedQueryLog::default(),
            transcript: Vec::new(),
        }
    }

    /// Open a connection, replacing any current one
    ///
    /// On failure the previous connection is left untouched.
    pub async fn connect(&mut self, connection: ConnectionConfig) -> Result<Arc<DatabaseManager>> {
        // Nothing after the pool opens can fail
        let provider = self.build_provider()?;
        let manager = Arc::new(DatabaseManager::connect(connection).await?);
        self.disconnect().await;

        let query_log = SharedQueryLog::default();
        self.agent = provider.map(|provider| {
            SqlAgent::new(provider, Arc::clone(&manager), self.config.max_query_results)
                .with_query_log(Arc::clone(&query_log))
        });
        self.query_log = query_log;
        self.database_manager = Some(Arc::clone(&manager));
        info!(target = %manager.target(), agent = self.agent.is_some(), "session connected");
        Ok(manager)
    }

    fn build_provider(&self) -> Result<Option<Arc<dyn LLMProvider>>> {
        let Some(api_key) = self.config.groq_api_key.as_deref() else {
            return Ok(None);
        };
        let provider = GroqProvider::new(
            api_key,
            Some(self.config.groq_model.clone()),
            Some(self.config.groq_base_url.clone()),
        )?;
        Ok(Some(Arc::new(provider)))
    }

    /// Close the current connection, if any
    pub async fn disconnect(&mut self) {
        self.agent = None;
        self.query_log = SharedQueryLog::default();
        if let Some(manager) = self.database_manager.take() {
            manager.close().await;
        }
    }

    /// Check if database is connected
    pub fn is_connected(&self) -> bool {
        self.database_manager.is_some()
    }

    /// The agent, or why there is none
    pub fn require_agent(&mut self) -> Result<&mut SqlAgent> {
        if self.database_manager.is_none() {
            return Err(SqlAgentError::NotConnected);
        }
        self.agent
            .as_mut()
            .ok_or_else(|| SqlAgentError::LLMApiKeyMissing("Groq".to_string()))
    }

    /// Forget the transcript and the agent's conversation memory
    pub fn clear_chat(&mut self) {
        self.transcript.clear();
        if let Some(agent) = self.agent.as_mut() {
            agent.clear_history();
        }
    }
}

/// Shared application state
pub type SharedState = Arc<RwLock<AppState>>;

/// Create a new shared state from the loaded configuration
pub fn create_shared_state(config: AppConfig) -> SharedState {
    Arc::new(RwLock::new(AppState::new(config)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::{SqliteConnectOptions, SqlitePool};

    fn config(api_key: Option<&str>) -> AppConfig {
        AppConfig::from_lookup(|name| match name {
            "GROQ_API_KEY" => api_key.map(str::to_string),
            _ => None,
        })
        .unwrap()
    }

    async fn sqlite_file(dir: &tempfile::TempDir) -> ConnectionConfig {
        let path = dir.path().join("notes.db");
        let options = SqliteConnectOptions::new().filename(&path).create_if_missing(true);
        let pool = SqlitePool::connect_with(options).await.unwrap();
        sqlx::query("CREATE TABLE notes (id INTEGER PRIMARY KEY, body TEXT)")
            .execute(&pool)
            .await
            .unwrap();
        pool.close().await;
        ConnectionConfig::Sqlite { path }
    }

    #[tokio::test]
    async fn test_failed_connect_keeps_state() {
        let mut state = AppState::new(config(Some("key")));
        let missing = ConnectionConfig::Sqlite {
            path: "/definitely/not/here.db".into(),
        };
        assert!(state.connect(missing).await.is_err());
        assert!(!state.is_connected());
        assert!(matches!(state.require_agent(), Err(SqlAgentError::NotConnected)));
    }

    #[tokio::test]
    async fn test_connect_without_api_key() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = AppState::new(config(None));
        state.connect(sqlite_file(&dir).await).await.unwrap();

        assert!(state.is_connected());
        assert!(matches!(
            state.require_agent(),
            Err(SqlAgentError::LLMApiKeyMissing(_))
        ));
    }

    #[tokio::test]
    async fn test_connect_builds_agent_and_disconnects() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = AppState::new(config(Some("gsk_test")));
        state.connect(sqlite_file(&dir).await).await.unwrap();

        let agent = state.require_agent().unwrap();
        assert_eq!(agent.provider().provider_name(), "Groq");

        state.transcript.push(ChatMessage::user("hi"));
        state.clear_chat();
        assert!(state.transcript.is_empty());

        state.disconnect().await;
        assert!(!state.is_connected());
        assert!(state.agent.is_none());
    }

    #[tokio::test]
    async fn test_reconnect_closes_old_pool_and_resets_log() {
        let first_dir = tempfile::tempdir().unwrap();
        let second_dir = tempfile::tempdir().unwrap();
        let mut state = AppState::new(config(Some("gsk_test")));

        let first = state.connect(sqlite_file(&first_dir).await).await.unwrap();
        let agent = state.require_agent().unwrap();
        agent.test_query("SELECT body FROM notes").await;
        assert_eq!(state.query_log.lock().await.len(), 1);

        // A failed reconnect leaves the session as it was
        let missing = ConnectionConfig::Sqlite {
            path: "/definitely/not/here.db".into(),
        };
        assert!(state.connect(missing).await.is_err());
        assert!(first.is_connected().await);
        assert_eq!(state.query_log.lock().await.len(), 1);

        let second = state.connect(sqlite_file(&second_dir).await).await.unwrap();
        assert!(!first.is_connected().await);
        assert!(second.is_connected().await);
        assert!(state.query_log.lock().await.is_empty());

        // The new agent writes to the session's log
        state
            .require_agent()
            .unwrap()
            .test_query("SELECT 1")
            .await;
        assert_eq!(state.query_log.lock().await.len(), 1);
    }
}
