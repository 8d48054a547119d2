//! CLI module
//!
//! This module provides the terminal chat interface, including the REPL,
//! slash-command handlers and the connection form.

pub mod command_menu;
pub mod commands;
pub mod connect_form;
pub mod render;
pub mod repl;

// Re-exports
pub use repl::Repl;
