//! Interactive connection form
//!
//! Opened by `/connect` without arguments. Server fields are pre-filled from
//! the `MYSQL_*` / `POSTGRES_*` environment defaults.

use crate::config::AppConfig;
use crate::database::{ConnectionConfig, DatabaseBackend};
use crate::error::{Result, SqlAgentError};
use dialoguer::{Input, Password, Select};
use std::path::PathBuf;

const BACKENDS: [DatabaseBackend; 3] = [
    DatabaseBackend::SQLite,
    DatabaseBackend::MySQL,
    DatabaseBackend::PostgreSQL,
];

fn form_error(e: dialoguer::Error) -> SqlAgentError {
    match e {
        dialoguer::Error::IO(io) => SqlAgentError::Io(io),
    }
}

/// Ask for connection details
pub fn prompt_connection(config: &AppConfig) -> Result<ConnectionConfig> {
    let names: Vec<&str> = BACKENDS.iter().map(|b| b.name()).collect();
    let choice = Select::new()
        .with_prompt("Database type")
        .items(&names)
        .default(0)
        .interact()
        .map_err(form_error)?;
    let backend = BACKENDS[choice];

    let defaults = ConnectionConfig::from_defaults(backend, config);
    let ConnectionConfig::Server {
        host,
        port,
        user,
        password,
        database,
        ..
    } = defaults
    else {
        let path: String = Input::new()
            .with_prompt("SQLite database file")
            .interact_text()
            .map_err(form_error)?;
        return Ok(ConnectionConfig::Sqlite {
            path: PathBuf::from(path.trim()),
        });
    };

    let host: String = Input::new()
        .with_prompt("Host")
        .default(host)
        .interact_text()
        .map_err(form_error)?;
    let port: u16 = Input::new()
        .with_prompt("Port")
        .default(port)
        .interact_text()
        .map_err(form_error)?;
    let user: String = Input::new()
        .with_prompt("Username")
        .with_initial_text(user)
        .interact_text()
        .map_err(form_error)?;

    let prompt = if password.is_empty() {
        "Password"
    } else {
        "Password (empty keeps the configured one)"
    };
    let entered = Password::new()
        .with_prompt(prompt)
        .allow_empty_password(true)
        .interact()
        .map_err(form_error)?;
    let password = if entered.is_empty() { password } else { entered };

    let database: String = Input::new()
        .with_prompt("Database")
        .with_initial_text(database)
        .interact_text()
        .map_err(form_error)?;

    Ok(ConnectionConfig::Server {
        backend,
        host,
        port,
        user,
        password,
        database,
    })
}
