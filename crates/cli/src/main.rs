//! SSC CLI - Main Entry Point
//!
//! Runs declarative browser scenarios against a WebDriver server and
//! validates scenario files.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;
mod config;
mod output;

use commands::{run, validate};

/// SSC - declarative browser acceptance checks
#[derive(Parser)]
#[command(name = "ssc")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file
    #[arg(long, default_value = "ssc.toml", global = true)]
    config: PathBuf,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: output::OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run scenario files
    Run(run::RunArgs),

    /// Parse scenario files and report errors
    Validate(validate::ValidateArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run(args) => {
            let config = config::SscConfig::load(&cli.config)?;
            run::execute(args, config, cli.format).await?
        }
        Commands::Validate(args) => validate::execute(args, cli.format).await?,
    }

    Ok(())
}
