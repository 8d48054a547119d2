//! Error types for the SQL agent
//!
//! This module defines the error types used throughout the application and
//! maps them onto the three messages a user ever sees: a connection failure,
//! a refused statement, or an execution error.

use thiserror::Error;

/// Result type alias for the SQL agent
pub type Result<T> = std::result::Result<T, SqlAgentError>;

/// Main error type for the SQL agent
#[derive(Error, Debug)]
pub enum SqlAgentError {
    /// Could not open or test a database connection
    #[error("Connection failed for {target}: {message}")]
    Connection { target: String, message: String },

    /// The database driver rejected or failed a statement
    #[error("Query failed: {message}")]
    Query { query: String, message: String },

    /// A statement was refused before reaching the database
    #[error("Refused: {0}")]
    Rejected(String),

    /// Operation requires a database connection
    #[error("Not connected to a database. Use /connect first.")]
    NotConnected,

    /// IO-related errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP-related errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// LLM API key missing
    #[error("API key not configured for {0}. Set GROQ_API_KEY in your .env file")]
    LLMApiKeyMissing(String),

    /// LLM API returned a non-success status
    #[error("{provider} API error (status {status}): {message}")]
    LLMApiError {
        provider: String,
        message: String,
        status: u16,
    },

    /// LLM provider errors
    #[error("LLM provider error: {0}")]
    LLMProvider(String),

    /// Invalid HTTP header value
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    /// Agent exceeded its time budget
    #[error("Timed out after {0} seconds")]
    Timeout(u64),

    /// Unknown slash command
    #[error("Unknown command: {0}. Type /help for available commands")]
    UnknownCommand(String),

    /// Slash command with wrong arguments
    #[error("Invalid syntax for {command}. Expected: {expected}")]
    InvalidCommandSyntax { command: String, expected: String },

    /// Unsupported database type
    #[error("Unsupported database type: {0}")]
    UnsupportedDatabaseType(String),
}

impl SqlAgentError {
    /// Build a connection error from a driver error
    pub fn connection(target: impl Into<String>, err: impl std::fmt::Display) -> Self {
        SqlAgentError::Connection {
            target: target.into(),
            message: err.to_string(),
        }
    }

    /// Build a query error from a driver error
    pub fn query(query: impl Into<String>, err: sqlx::Error) -> Self {
        let message = match &err {
            sqlx::Error::Database(db_err) => db_err.message().to_string(),
            other => other.to_string(),
        };
        SqlAgentError::Query {
            query: query.into(),
            message,
        }
    }

    /// Message shown in the chat transcript
    pub fn user_message(&self) -> String {
        match self {
            SqlAgentError::Connection { message, .. } => {
                format!("Could not connect to the database: {}", message)
            }
            SqlAgentError::Rejected(reason) => {
                format!("I can't run that statement: {}", reason)
            }
            SqlAgentError::Query { message, .. } => {
                format!("The database returned an error: {}", message)
            }
            other => format!("Error: {}", other),
        }
    }
}
