//! REPL implementation
//!
//! This module implements the interactive chat loop: questions go to the
//! SQL agent, `/` commands manage the session.

use crate::cli::command_menu::{self, MenuResult, COMMANDS};
use crate::cli::commands::{self, format_error, Command, CommandType};
use crate::config::SharedState;
use crate::error::{Result, SqlAgentError};
use rustyline::completion::Completer;
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::Validator;
use rustyline::Context;
use rustyline::Helper;
use rustyline::{CompletionType, Config, Editor};
use std::path::PathBuf;
use tracing::{debug, warn};

/// Slash-command completer
struct CommandCompleter;

impl Completer for CommandCompleter {
    type Candidate = String;

    fn complete(
        &self,
        line: &str,
        _pos: usize,
        _ctx: &Context<'_>,
    ) -> std::result::Result<(usize, Vec<String>), ReadlineError> {
        if !line.starts_with('/') || line.contains(' ') {
            return Ok((0, vec![]));
        }

        let mut matches: Vec<String> = COMMANDS
            .iter()
            .map(|cmd| cmd.name)
            .chain(std::iter::once("/exit"))
            .filter(|name| name.starts_with(line))
            .map(str::to_string)
            .collect();
        matches.sort();
        Ok((0, matches))
    }
}

impl Hinter for CommandCompleter {
    type Hint = String;
}

impl Highlighter for CommandCompleter {}

impl Validator for CommandCompleter {}

impl Helper for CommandCompleter {}

/// What to do after reading a line
enum LineOutcome {
    Continue,
    Stop,
}

/// Interactive chat REPL
pub struct Repl {
    /// The rustyline editor
    editor: Editor<CommandCompleter, DefaultHistory>,
    /// Whether the REPL should continue running
    running: bool,
    /// Shared application state
    state: SharedState,
    history_path: PathBuf,
}

impl Repl {
    /// Create a new REPL instance
    pub fn new(state: SharedState) -> Result<Self> {
        let config = Config::builder()
            .history_ignore_space(true)
            .completion_type(CompletionType::List)
            .auto_add_history(false)
            .build();

        let mut editor = Editor::<CommandCompleter, DefaultHistory>::with_config(config)
            .map_err(|e| {
                SqlAgentError::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    format!("Failed to initialize editor: {}", e),
                ))
            })?;
        editor.set_helper(Some(CommandCompleter));

        let history_path = history_path();
        if let Err(e) = editor.load_history(&history_path) {
            // First run: no history yet
            debug!(path = %history_path.display(), error = %e, "no history loaded");
        }

        Ok(Self {
            editor,
            running: true,
            state,
            history_path,
        })
    }

    /// Run the REPL loop
    pub async fn run(&mut self) -> Result<()> {
        self.print_welcome().await;

        while self.running {
            let line = match self.editor.readline("> ") {
                Ok(line) => line,
                Err(e) => {
                    self.on_readline_error(e);
                    continue;
                }
            };
            let line = line.trim();

            if line.is_empty() {
                continue;
            }

            if line == "/" {
                self.run_menu().await;
                continue;
            }

            if let LineOutcome::Stop = self.dispatch(line).await {
                self.running = false;
            }
        }

        self.save_history();
        Ok(())
    }

    /// Command menu, then an editable prompt pre-filled with the choice
    async fn run_menu(&mut self) {
        let initial = match command_menu::show_command_menu() {
            Ok(MenuResult::Command(item)) if item.takes_argument => format!("{} ", item.name),
            Ok(MenuResult::Command(item)) => item.name.to_string(),
            Ok(MenuResult::TextInput) => "/".to_string(),
            Ok(MenuResult::Cancelled) => {
                println!();
                return;
            }
            Err(e) => {
                println!("Error showing menu: {}", e);
                return;
            }
        };

        match self.editor.readline_with_initial("> ", (initial.as_str(), "")) {
            Ok(input) => {
                let input = input.trim();
                if !input.is_empty() {
                    if let LineOutcome::Stop = self.dispatch(input).await {
                        self.running = false;
                    }
                }
            }
            Err(e) => self.on_readline_error(e),
        }
    }

    async fn dispatch(&mut self, line: &str) -> LineOutcome {
        // History failure is non-critical
        let _ = self.editor.add_history_entry(line);

        let command = match Command::parse(line) {
            Ok(command) => command,
            Err(e) => {
                println!("{}", format_error(&e));
                return LineOutcome::Continue;
            }
        };

        let quitting = command.command_type == CommandType::Quit;
        if matches!(command.command_type, CommandType::Query { .. }) {
            println!("Thinking...");
        }

        match commands::handle_command(&command, self.state.clone()).await {
            Ok(msg) => println!("{}\n", msg),
            Err(e) => println!("{}\n", format_error(&e)),
        }

        if quitting {
            LineOutcome::Stop
        } else {
            LineOutcome::Continue
        }
    }

    fn on_readline_error(&mut self, err: ReadlineError) {
        match err {
            ReadlineError::Interrupted => println!("^C"),
            ReadlineError::Eof => {
                println!();
                self.running = false;
            }
            err => {
                println!("Error: {:?}", err);
                self.running = false;
            }
        }
    }

    fn save_history(&mut self) {
        if let Some(dir) = self.history_path.parent() {
            if let Err(e) = std::fs::create_dir_all(dir) {
                warn!(error = %e, "could not create history directory");
                return;
            }
        }
        if let Err(e) = self.editor.save_history(&self.history_path) {
            warn!(error = %e, "could not save history");
        }
    }

    /// Print the banner and anything that still needs setting up
    async fn print_welcome(&self) {
        println!();
        println!("SQL Agent Chat v{}", env!("CARGO_PKG_VERSION"));
        println!("Ask questions about your database in plain English.");
        println!();

        let state = self.state.read().await;
        let validation = state.config.validate();
        if !validation.groq_api_key {
            println!("! GROQ_API_KEY is not set. Run /help or see /status for setup.");
        }
        match state.database_manager.as_ref() {
            Some(manager) => println!("Connected to {} at {}", manager.backend(), manager.target()),
            None => println!("Not connected. Use /connect <url|path> to get started."),
        }
        println!();
        println!("Type / for available commands, or /help for more information.");
        println!();
    }
}

fn history_path() -> PathBuf {
    dirs::home_dir()
        .map(|p| p.join(".sql-agent-chat").join("history"))
        .unwrap_or_else(|| ".sql-agent-chat-history".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{create_shared_state, AppConfig};

    #[test]
    fn test_repl_creation() {
        let state = create_shared_state(AppConfig::from_lookup(|_| None).unwrap());
        let repl = Repl::new(state).unwrap();
        assert!(repl.running);
        assert!(repl.history_path.ends_with("history"));
    }

    #[test]
    fn test_completion() {
        let history = DefaultHistory::new();
        let ctx = Context::new(&history);
        let (_, matches) = CommandCompleter.complete("/t", 2, &ctx).unwrap();
        assert_eq!(matches, vec!["/tables".to_string(), "/test".to_string()]);

        let (_, matches) = CommandCompleter.complete("how many", 8, &ctx).unwrap();
        assert!(matches.is_empty());
    }
}
