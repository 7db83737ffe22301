mod cli;
mod commands;
mod config;
mod input;
mod k8s;
mod model;
mod picker;
mod shell;
mod terminal;
mod ui;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use cli::CliArgs;
use commands::{Session, Settings};
use config::KubeconfigStore;
use picker::InlinePrompt;
use std::io;
use std::time::Duration;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_tracing(&args.log_filter)?;

    let Some(command) = args.command else {
        CliArgs::command()
            .print_help()
            .context("failed to print help")?;
        return Ok(());
    };

    let store = KubeconfigStore::discover(args.kubeconfig)?;
    let settings = Settings {
        request_timeout: Duration::from_secs(args.request_timeout.max(1)),
    };
    debug!("running {command:?} with {settings:?}");

    let mut session = Session::new(&store, settings, InlinePrompt, io::stdout());
    session.run(command).await
}

fn init_tracing(level_filter: &str) -> Result<()> {
    let filter = EnvFilter::try_new(level_filter)
        .or_else(|_| EnvFilter::try_new("info"))
        .context("failed to initialize tracing filter")?;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .with_writer(io::stderr)
        .try_init();

    Ok(())
}
