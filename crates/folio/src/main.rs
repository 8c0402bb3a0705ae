//! Folio CLI - content server.
//!
//! Provides commands for:
//! - `serve`: Start the content server
//! - `sync`: Replace a content root from its git repository

mod commands;
mod error;
mod output;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{ServeArgs, SyncArgs};
use output::Output;

/// Folio - content server.
#[derive(Parser)]
#[command(name = "folio", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the content server.
    Serve(ServeArgs),
    /// Replace a content root with a fresh checkout of its repository.
    Sync(SyncArgs),
}

impl Commands {
    fn verbose(&self) -> bool {
        match self {
            Self::Serve(args) => args.verbose,
            Self::Sync(args) => args.verbose,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    let output = Output::new();

    // --verbose enables INFO level, otherwise use RUST_LOG or default to WARN
    let filter = if cli.command.verbose() {
        EnvFilter::new("info")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let rt = tokio::runtime::Runtime::new().expect("Failed to create tokio runtime");
    let result = rt.block_on(async {
        match cli.command {
            Commands::Serve(args) => args.execute().await,
            Commands::Sync(args) => args.execute().await,
        }
    });

    if let Err(err) = result {
        output.error(&format!("Error: {err}"));
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_verbose_flag_per_command() {
        let cli = Cli::try_parse_from(["folio", "sync", "./site", "--verbose"]).unwrap();
        assert!(cli.command.verbose());

        let cli = Cli::try_parse_from(["folio", "serve"]).unwrap();
        assert!(!cli.command.verbose());
    }
}
