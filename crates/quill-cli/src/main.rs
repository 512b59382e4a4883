//! Quill CLI - Offline-first notes from the command line
//!
//! Notes go to the cloud store when signed in and online, and queue locally
//! until the next sync otherwise.

mod auth;
mod cli;
mod commands;
mod config;
mod error;
mod remote;


use clap::{CommandFactory, Parser};
use quill_core::Outcome;

use crate::cli::{Cli, Commands};
use crate::commands::add::run_add;
use crate::commands::auth_cmd::run_auth;
use crate::commands::completions::run_completions;
use crate::commands::delete::run_delete;
use crate::commands::edit::run_edit;
use crate::commands::list::run_list;
use crate::commands::reorder::run_reorder;
use crate::commands::show::run_show;
use crate::commands::status::run_status;
use crate::commands::sync::run_sync;
use crate::commands::watch::run_watch;
use crate::config::resolve_db_path;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let as_json = cli.json;

    if let Err(error) = run(cli).await {
        if as_json {
            let outcome = Outcome::<()> {
                success: false,
                data: None,
                error: Some(error.to_outcome_error()),
            };
            match serde_json::to_string_pretty(&outcome) {
                Ok(body) => println!("{body}"),
                Err(_) => eprintln!("Error: {error}"),
            }
        } else {
            eprintln!("Error: {error}");
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    init_tracing()?;

    let db_path = resolve_db_path(cli.db_path);
    let (offline, json) = (cli.offline, cli.json);

    match cli.command {
        Some(Commands::List) => run_list(offline, json, &db_path).await?,
        Some(Commands::Show { id }) => run_show(&id, offline, json, &db_path).await?,
        Some(Commands::Add { title, description }) => {
            run_add(&title, description.as_deref(), offline, json, &db_path).await?;
        }
        Some(Commands::Edit {
            id,
            title,
            description,
        }) => {
            run_edit(
                &id,
                title.as_deref(),
                description.as_deref(),
                offline,
                json,
                &db_path,
            )
            .await?;
        }
        Some(Commands::Delete { id }) => run_delete(&id, offline, json, &db_path).await?,
        Some(Commands::Reorder { ids }) => run_reorder(&ids, offline, json, &db_path).await?,
        Some(Commands::Sync) => run_sync(offline, json, &db_path).await?,
        Some(Commands::Status) => run_status(offline, json, &db_path).await?,
        Some(Commands::Watch) => run_watch(offline, &db_path).await?,
        Some(Commands::Auth { command }) => run_auth(command, offline, json).await?,
        Some(Commands::Completions { shell, output }) => {
            run_completions(shell, output.as_deref())?;
        }
        None => {
            Cli::command().print_help()?;
            println!();
        }
    }

    Ok(())
}

/// Log to stderr so `--json` output on stdout stays parseable
fn init_tracing() -> Result<(), CliError> {
    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    for directive in ["quill_core=info", "quill_cli=info"] {
        filter = filter.add_directive(
            directive
                .parse()
                .map_err(|error| CliError::Config(format!("invalid log filter: {error}")))?,
        );
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}
