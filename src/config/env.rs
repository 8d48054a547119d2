//! Environment configuration
//!
//! Reads the application settings from environment variables, after loading
//! an optional `.env` file from the working directory.

use crate::error::{Result, SqlAgentError};
use std::fmt;
use std::path::PathBuf;

/// Default Groq model
pub const DEFAULT_GROQ_MODEL: &str = "llama3-70b-8192";

/// Groq chat completions endpoint (OpenAI-compatible)
pub const DEFAULT_GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1/chat/completions";

/// Default row cap for LIMIT injection
pub const DEFAULT_MAX_QUERY_RESULTS: u32 = 10;

/// Connection defaults for a server database (MySQL or PostgreSQL)
#[derive(Clone, PartialEq)]
pub struct ServerDefaults {
    pub host: String,
    pub port: u16,
    pub user: Option<String>,
    pub password: Option<String>,
    pub database: Option<String>,
}

impl ServerDefaults {
    /// User, password and database are all present
    pub fn is_complete(&self) -> bool {
        self.user.is_some() && self.password.is_some() && self.database.is_some()
    }
}

impl fmt::Debug for ServerDefaults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerDefaults")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("database", &self.database)
            .finish()
    }
}

/// Application configuration
#[derive(Clone)]
pub struct AppConfig {
    /// Groq API key
    pub groq_api_key: Option<String>,
    /// Model used for the agent
    pub groq_model: String,
    /// Chat completions endpoint
    pub groq_base_url: String,
    /// Row cap appended to SELECT statements without a LIMIT
    pub max_query_results: u32,
    pub mysql: ServerDefaults,
    pub postgres: ServerDefaults,
    /// Log filter used when RUST_LOG is not set
    pub log_level: String,
    /// Log file path
    pub log_file: PathBuf,
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("groq_api_key", &self.groq_api_key.as_ref().map(|_| "***"))
            .field("groq_model", &self.groq_model)
            .field("groq_base_url", &self.groq_base_url)
            .field("max_query_results", &self.max_query_results)
            .field("mysql", &self.mysql)
            .field("postgres", &self.postgres)
            .field("log_level", &self.log_level)
            .field("log_file", &self.log_file)
            .finish()
    }
}

/// Which parts of the configuration are usable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigValidation {
    pub groq_api_key: bool,
    pub mysql_complete: bool,
    pub postgres_complete: bool,
}

impl AppConfig {
    /// Load `.env` (if present) and read the process environment
    pub fn from_env() -> Result<Self> {
        // A missing .env file is fine
        let _ = dotenv::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Empty values count as unset
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let max_query_results = parse_or(get("MAX_QUERY_RESULTS"), "MAX_QUERY_RESULTS", DEFAULT_MAX_QUERY_RESULTS)?;
        if max_query_results == 0 {
            return Err(SqlAgentError::Config(
                "MAX_QUERY_RESULTS must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            groq_api_key: get("GROQ_API_KEY"),
            groq_model: get("GROQ_MODEL").unwrap_or_else(|| DEFAULT_GROQ_MODEL.to_string()),
            groq_base_url: get("GROQ_BASE_URL").unwrap_or_else(|| DEFAULT_GROQ_BASE_URL.to_string()),
            max_query_results,
            mysql: ServerDefaults {
                host: get("MYSQL_HOST").unwrap_or_else(|| "localhost".to_string()),
                port: parse_or(get("MYSQL_PORT"), "MYSQL_PORT", 3306)?,
                user: get("MYSQL_USER"),
                password: get("MYSQL_PASSWORD"),
                database: get("MYSQL_DATABASE"),
            },
            postgres: ServerDefaults {
                host: get("POSTGRES_HOST").unwrap_or_else(|| "localhost".to_string()),
                port: parse_or(get("POSTGRES_PORT"), "POSTGRES_PORT", 5432)?,
                user: get("POSTGRES_USER"),
                password: get("POSTGRES_PASSWORD"),
                database: get("POSTGRES_DATABASE"),
            },
            log_level: get("LOG_LEVEL")
                .map(|l| l.to_lowercase())
                .unwrap_or_else(|| "info".to_string()),
            log_file: get("LOG_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("sql_agent.log")),
        })
    }

    /// Report which parts of the configuration are usable
    pub fn validate(&self) -> ConfigValidation {
        ConfigValidation {
            groq_api_key: self.groq_api_key.is_some(),
            mysql_complete: self.mysql.is_complete(),
            postgres_complete: self.postgres.is_complete(),
        }
    }

    /// The API key, or an error telling the user where to set it
    pub fn require_api_key(&self) -> Result<&str> {
        self.groq_api_key
            .as_deref()
            .ok_or_else(|| SqlAgentError::LLMApiKeyMissing("Groq".to_string()))
    }

    /// Environment status for display (secrets are never included)
    pub fn status_lines(&self) -> Vec<String> {
        let mut lines = vec![
            format!(
                "GROQ_API_KEY: {}",
                if self.groq_api_key.is_some() { "set" } else { "not set" }
            ),
            format!("GROQ_MODEL: {}", self.groq_model),
            format!("MAX_QUERY_RESULTS: {}", self.max_query_results),
        ];
        if let Some(ref user) = self.mysql.user {
            lines.push(format!(
                "MySQL defaults: {}@{}:{}",
                user, self.mysql.host, self.mysql.port
            ));
        }
        if let Some(ref user) = self.postgres.user {
            lines.push(format!(
                "PostgreSQL defaults: {}@{}:{}",
                user, self.postgres.host, self.postgres.port
            ));
        }
        lines
    }
}

fn parse_or<T: std::str::FromStr>(value: Option<String>, key: &str, default: T) -> Result<T> {
    match value {
        Some(raw) => raw.parse::<T>().map_err(|_| {
            SqlAgentError::Config(format!("{} has an invalid value: {}", key, raw))
        }),
        None => Ok(default),
    }
}
