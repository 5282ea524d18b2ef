//! promptgate entrypoint.

use clap::Parser;
use promptgate_trace::{init_tracer, shutdown_tracer};
use std::path::PathBuf;

mod commands;
mod config;
mod runtime;

use crate::commands::{Commands, ConfigCommands};
use crate::config::AppConfig;

#[derive(Parser)]
#[command(name = "promptgate")]
#[command(author, version, about = "Caching gateway and job queue in front of a slow model API", long_about = None)]
struct Cli {
    /// Configuration file (defaults to ./promptgate.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Config {
            command: ConfigCommands::Show,
        } => {
            println!("{}", config.render()?);
            Ok(())
        }
        Commands::Serve { with_workers } => {
            init_tracer(&config.telemetry)?;
            let result = runtime::serve(config, with_workers).await;
            shutdown_tracer();
            result
        }
        Commands::Worker => {
            init_tracer(&config.telemetry)?;
            let result = runtime::work(config).await;
            shutdown_tracer();
            result
        }
    }
}
