mod cli;
mod commands;
mod mcp;

use anyhow::{anyhow, Result};
use clap::Parser;
use cli::{Cli, Commands};
use pdf_splitter::init_global_config;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries the MCP transport, so logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    init_global_config(cli.pipeline.to_config())
        .map_err(|_| anyhow!("pipeline configuration was already initialized"))?;

    match cli.command {
        Commands::Mcp => {
            mcp::run_server().await?;
        }
        Commands::Info { path, password } => {
            commands::info::run(&path, password.as_deref())?;
        }
        Commands::Inspect { path, password } => {
            commands::inspect::run(&path, password.as_deref())?;
        }
        Commands::Split {
            path,
            output_dir,
            password,
        } => {
            commands::split::run(&path, &output_dir, password.as_deref())?;
        }
    }

    Ok(())
}
