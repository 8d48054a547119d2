//! Command handlers for CLI
//!
//! This module implements all `/` commands and routes plain text to the
//! SQL agent.

use crate::agent::prompts::{EXAMPLE_QUESTIONS, SETUP_INSTRUCTIONS};
use crate::agent::tools::SqlExecutionTool;
use crate::cli::{connect_form, render};
use crate::config::{ChatMessage, SharedState};
use crate::database::ConnectionConfig;
use crate::error::{Result, SqlAgentError};
use std::sync::Arc;
use tracing::info;

/// Command types
#[derive(Debug, Clone, PartialEq)]
pub enum CommandType {
    /// Connect to a database; no target opens the form
    Connect { target: Option<String> },
    /// Close the current connection
    Disconnect,
    /// Show the schema handed to the agent, re-scanning first with `--refresh`
    Schema { refresh: bool },
    /// List tables
    Tables { include_system: bool },
    /// Run a statement through the SQL tool without the model
    Test { sql: String },
    /// Show recent query log entries
    Logs,
    /// Show configuration and connection status
    Status,
    /// List example questions
    Examples,
    /// Clear chat context
    Clear,
    /// Show help message
    Help,
    /// Exit the application
    Quit,
    /// Natural language question
    Query { text: String },
}

/// Parsed command
#[derive(Debug, Clone)]
pub struct Command {
    /// The type of command
    pub command_type: CommandType,
}

impl Command {
    /// Parse a command from user input
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();

        if !input.starts_with('/') {
            return Ok(Command {
                command_type: CommandType::Query {
                    text: input.to_string(),
                },
            });
        }

        let (cmd, rest) = match input.split_once(char::is_whitespace) {
            Some((cmd, rest)) => (cmd, rest.trim()),
            None => (input, ""),
        };

        let command_type = match cmd {
            "/connect" => CommandType::Connect {
                target: (!rest.is_empty()).then(|| rest.to_string()),
            },
            "/disconnect" => CommandType::Disconnect,
            "/schema" => match rest {
                "" => CommandType::Schema { refresh: false },
                "--refresh" => CommandType::Schema { refresh: true },
                _ => {
                    return Err(SqlAgentError::InvalidCommandSyntax {
                        command: cmd.to_string(),
                        expected: "/schema [--refresh]".to_string(),
                    })
                }
            },
            "/tables" => match rest {
                "" => CommandType::Tables {
                    include_system: false,
                },
                "--all" => CommandType::Tables {
                    include_system: true,
                },
                _ => {
                    return Err(SqlAgentError::InvalidCommandSyntax {
                        command: cmd.to_string(),
                        expected: "/tables [--all]".to_string(),
                    })
                }
            },
            "/test" => {
                if rest.is_empty() {
                    return Err(SqlAgentError::InvalidCommandSyntax {
                        command: cmd.to_string(),
                        expected: "/test <sql>".to_string(),
                    });
                }
                CommandType::Test {
                    sql: rest.to_string(),
                }
            }
            "/logs" => CommandType::Logs,
            "/status" => CommandType::Status,
            "/examples" => CommandType::Examples,
            "/clear" => CommandType::Clear,
            "/help" => CommandType::Help,
            "/quit" | "/exit" => CommandType::Quit,
            _ => return Err(SqlAgentError::UnknownCommand(cmd.to_string())),
        };

        Ok(Command { command_type })
    }
}

/// Handle a command and return the result message
pub async fn handle_command(command: &Command, state: SharedState) -> Result<String> {
    match &command.command_type {
        CommandType::Connect { target } => {
            let connection = match target {
                Some(target) => ConnectionConfig::parse(target)?,
                None => {
                    let config = state.read().await.config.clone();
                    connect_form::prompt_connection(&config)?
                }
            };

            let mut state = state.write().await;
            let manager = state.connect(connection).await?;
            let tables = manager.schema_index().await.table_count();

            let mut msg = format!(
                "✓ Connected to {} at {} ({} tables)",
                manager.backend(),
                manager.target(),
                tables
            );
            if state.agent.is_none() {
                msg.push_str("\n! GROQ_API_KEY is not set; questions are disabled until it is.");
            }
            Ok(msg)
        }
        CommandType::Disconnect => {
            let mut state = state.write().await;
            if !state.is_connected() {
                return Ok("Not connected.".to_string());
            }
            state.disconnect().await;
            Ok("✓ Disconnected".to_string())
        }
        CommandType::Schema { refresh } => {
            let state = state.read().await;
            let manager = state
                .database_manager
                .as_ref()
                .ok_or(SqlAgentError::NotConnected)?;
            if *refresh {
                manager.reindex().await?;
            }
            Ok(manager.schema_context().await)
        }
        CommandType::Tables { include_system } => {
            let state = state.read().await;
            let manager = state
                .database_manager
                .as_ref()
                .ok_or(SqlAgentError::NotConnected)?;
            let tables = manager.list_tables(*include_system).await?;
            if tables.is_empty() {
                return Ok("No tables found.".to_string());
            }
            Ok(format!(
                "{} tables:\n{}",
                tables.len(),
                tables
                    .iter()
                    .map(|t| format!("  {}", t))
                    .collect::<Vec<_>>()
                    .join("\n")
            ))
        }
        CommandType::Test { sql } => {
            let state = state.read().await;
            let manager = state
                .database_manager
                .clone()
                .ok_or(SqlAgentError::NotConnected)?;

            let step = match state.agent.as_ref() {
                Some(agent) => agent.test_query(sql).await,
                // No API key: run the tool on its own
                None => {
                    SqlExecutionTool::new(manager, state.config.max_query_results)
                        .with_log(Arc::clone(&state.query_log))
                        .run(sql)
                        .await
                }
            };
            if let Some(rejection) = step.rejection {
                return Err(SqlAgentError::Rejected(rejection.to_string()));
            }
            Ok(render::format_step(&step))
        }
        CommandType::Logs => {
            let state = state.read().await;
            let log = state.query_log.lock().await;
            Ok(render::format_logs(&log))
        }
        CommandType::Status => {
            let state = state.read().await;
            let mut lines = state.config.status_lines();
            match state.database_manager.as_ref() {
                Some(manager) => {
                    let tables = manager.schema_index().await.table_count();
                    lines.push(format!(
                        "Database: {} at {} ({} tables)",
                        manager.backend(),
                        manager.target(),
                        tables
                    ));
                }
                None => lines.push("Database: not connected".to_string()),
            }
            if let Some(agent) = state.agent.as_ref() {
                lines.push(format!(
                    "Agent: {} / {} ({} turns in memory, {} queries logged)",
                    agent.provider().provider_name(),
                    agent.provider().model(),
                    agent.history().len() / 2,
                    state.query_log.lock().await.len()
                ));
            }
            Ok(lines.join("\n"))
        }
        CommandType::Examples => Ok(format!(
            "Try asking:\n{}",
            EXAMPLE_QUESTIONS
                .iter()
                .map(|q| format!("  • {}", q))
                .collect::<Vec<_>>()
                .join("\n")
        )),
        CommandType::Clear => {
            state.write().await.clear_chat();
            Ok("✓ Chat context cleared".to_string())
        }
        CommandType::Help => Ok(HELP.to_string()),
        CommandType::Quit => Ok("Goodbye!".to_string()),
        CommandType::Query { text } => {
            let mut state = state.write().await;
            if !state.is_connected() || state.agent.is_none() {
                let mut missing = Vec::new();
                if state.config.groq_api_key.is_none() {
                    missing.push("GROQ_API_KEY is not set");
                }
                if !state.is_connected() {
                    missing.push("no database connected");
                }
                return Ok(format!(
                    "Setup required ({}).\n\n{}",
                    missing.join(", "),
                    SETUP_INSTRUCTIONS
                ));
            }

            info!(question = %text, "question received");
            state.transcript.push(ChatMessage::user(text.clone()));
            let reply = state.require_agent()?.chat(text).await;
            let rendered = render::format_reply(&reply);
            state
                .transcript
                .push(ChatMessage::assistant(reply.answer, reply.steps));
            Ok(rendered)
        }
    }
}

/// Format an error for display
pub fn format_error(error: &SqlAgentError) -> String {
    error.user_message()
}

const HELP: &str = r#"
SQL Agent Chat Commands

Database:
  /connect [url|path]  Connect (sqlite://file.db, mysql://..., postgresql://...)
                       Without an argument, opens a connection form
  /disconnect          Close the current connection
  /schema [--refresh]  Show the schema given to the agent (--refresh re-scans)
  /tables [--all]      List tables (--all includes system catalogs)
  /test <sql>          Run a statement through the safety checks directly

Session:
  /status              Show configuration and connection status
  /logs                Show the last 10 executed queries
  /examples            Show example questions
  /clear               Clear chat context
  /help                Show this help message
  /quit, /exit         Exit

Questions:
  Any text without a / prefix is sent to the SQL agent.
  Only read-only SELECT statements are executed, capped at MAX_QUERY_RESULTS rows.

Examples:
  /connect postgresql://analyst@localhost/shop
  How many orders were placed last month?
"#;
