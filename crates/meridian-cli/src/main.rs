//! Meridian operator CLI
//!
//! Seeds an in-memory store from a JSON resource array and evaluates one
//! request for one identity, either as a bare decision or as an applied
//! command.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod commands;
mod session;

use commands::RequestArgs;

#[derive(Parser)]
#[command(name = "meridian")]
#[command(about = "Meridian - offline authorization decisions", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file path; MERIDIAN_* variables override its values
    #[arg(short, long, global = true, default_value = "meridian.toml")]
    config: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the effective configuration
    Config,

    /// Decide a request without applying it
    Decide(RequestArgs),

    /// Authorize and apply a request, printing status code and outcome
    Execute(RequestArgs),
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = session::load_config(&cli.config)?;

    let accepted = match cli.command {
        Commands::Config => {
            print!("{}", toml::to_string_pretty(&config)?);
            true
        }
        Commands::Decide(args) => {
            let session = session::Session::open(config, &args.seed, &args.identity)?;
            commands::decide(&session, args.request).await?
        }
        Commands::Execute(args) => {
            let session = session::Session::open(config, &args.seed, &args.identity)?;
            commands::execute(&session, args.request).await?
        }
    };

    Ok(if accepted {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(2)
    })
}
