// SQL Agent Chat: ask a database questions in plain English
//
// This is the main entry point for the sql-agent-chat application.

use anyhow::{Context, Result};
use clap::Parser;
use sql_agent_chat::cli::Repl;
use sql_agent_chat::config::{create_shared_state, AppConfig};
use sql_agent_chat::database::ConnectionConfig;
use sql_agent_chat::logging;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(
    name = "sql-agent-chat",
    about = "Chat with your SQL database through an LLM agent",
    version
)]
struct Args {
    /// Connect at start-up (sqlite://file.db, mysql://..., postgresql://... or a .db path)
    #[arg(short, long)]
    connect: Option<String>,

    /// Mirror logs to stderr
    #[arg(short, long)]
    verbose: bool,

    /// Write logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = AppConfig::from_env().context("invalid configuration")?;
    let _log_guard = logging::init_tracing(
        &config.log_level,
        &config.log_file,
        args.verbose,
        args.log_json,
    )?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        model = %config.groq_model,
        "starting sql-agent-chat"
    );

    let state = create_shared_state(config);

    if let Some(target) = args.connect.as_deref() {
        let connected = match ConnectionConfig::parse(target) {
            Ok(connection) => state.write().await.connect(connection).await,
            Err(e) => Err(e),
        };
        if let Err(e) = connected {
            error!(error = %e, "start-up connection failed");
            eprintln!("{}", e.user_message());
        }
    }

    let mut repl = Repl::new(state.clone())?;
    repl.run().await?;

    state.write().await.disconnect().await;
    info!("shutting down");
    Ok(())
}
