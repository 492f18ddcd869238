use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;
mod config;

use cli::{Cli, Command};
use config::Settings;

#[tokio::main]
async fn main() -> ExitCode {
    // Logs go to stderr so stdout carries only reports.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let mut settings = Settings::load(cli.config.as_deref())?;

    match cli.command {
        Command::Process { images, remote, output } => {
            remote.apply_to(&mut settings);
            commands::process(settings, &images, &remote, output).await
        }
        Command::Decode { file, labels, output } => {
            commands::decode(&settings, &file, labels.as_deref(), output)
        }
        Command::Watch { dir, remote, output } => {
            remote.apply_to(&mut settings);
            commands::watch(settings, &dir, &remote, output).await
        }
    }
}
