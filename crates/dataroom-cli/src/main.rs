//! Dataroom CLI
//!
//! Index a directory of documents and ask questions about it.

use anyhow::Result;
use clap::Parser;
use dataroom_core::error::exit_codes;
use dataroom_core::{Config, Dataroom, DataroomError, SqliteIndexStore};
use std::process::ExitCode;
use std::sync::Arc;

mod app;
mod commands;
mod output;
mod progress;

use app::{Cli, Commands};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::INFO
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            let code = e
                .downcast_ref::<DataroomError>()
                .map(DataroomError::exit_code)
                .unwrap_or(exit_codes::GENERAL_ERROR);
            ExitCode::from(code as u8)
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = match cli.config {
        Some(ref path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    // Open database (use DATAROOM_DB env var if set, otherwise use default)
    let db_path = std::env::var("DATAROOM_DB")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|_| SqliteIndexStore::default_path());
    let store = Arc::new(SqliteIndexStore::open(&db_path)?);

    let room = Dataroom::with_http_client(config, store)?;
    if let Err(e) = room.load_snapshot() {
        tracing::warn!("Could not load saved index from {}: {}", db_path.display(), e);
    }

    match cli.command {
        Commands::Rebuild(args) => commands::rebuild::run(args, &room, cli.format).await,
        Commands::Status => commands::status::run(&room, cli.format).await,
        Commands::Ask(args) => commands::ask::run(args, &room, cli.format).await,
        Commands::Chat => commands::chat::run(&room, cli.format).await,
        Commands::Eval(args) => commands::eval::run(args, &room, cli.format).await,
    }
}
