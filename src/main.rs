// ABOUTME: Entry point for the ecsdeploy CLI application.
// ABOUTME: Parses arguments, resolves settings, and dispatches to command handlers.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands, RunCommands, UpdateCommands};
use ecsdeploy::config::Settings;
use ecsdeploy::error::Result;
use ecsdeploy::output::{Output, OutputMode};
use std::env;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let mut output = Output::new(OutputMode::from_flags(cli.quiet, cli.json));

    if let Err(e) = run(cli, &mut output).await {
        output.error(&e.to_string());
        std::process::exit(1);
    }
}

async fn run(cli: Cli, output: &mut Output) -> Result<()> {
    let cwd = env::current_dir()?;
    let settings = cli.overlay(Settings::discover(&cwd)?.apply_env());
    tracing::debug!(
        endpoint = %settings.endpoint,
        region = settings.region.as_deref().unwrap_or("-"),
        "resolved settings"
    );

    match cli.command {
        Commands::Update { target } => match target {
            UpdateCommands::Service(args) => commands::update_service(&settings, args, output).await,
            UpdateCommands::TaskDefinition(args) => {
                commands::update_task_definition(&settings, args, output).await
            }
            UpdateCommands::ScheduledTask(args) => {
                commands::update_scheduled_task(&settings, args, output).await
            }
        },
        Commands::Run { target } => match target {
            RunCommands::Task(args) => commands::run_task(&settings, args, output).await,
        },
    }
}
