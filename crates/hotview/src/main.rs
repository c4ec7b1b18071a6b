//! hotview CLI - static server with live reload.
//!
//! Provides commands for:
//! - `serve`: Check required files, then start the server
//! - `check`: Check required files only

mod commands;
mod error;
mod output;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{CheckArgs, ServeArgs};
use output::Output;

/// hotview - static server with live reload.
#[derive(Parser)]
#[command(name = "hotview", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the server.
    Serve(ServeArgs),
    /// Verify that required files are present.
    Check(CheckArgs),
}

fn main() {
    let cli = Cli::parse();
    let output = Output::new();

    // Check if verbose flag is set for serve command
    let verbose = matches!(&cli.command, Commands::Serve(args) if args.verbose);

    tracing_subscriber::fmt()
        .with_env_filter(log_filter(verbose))
        .init();

    let result = match cli.command {
        Commands::Serve(args) => match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(rt) => rt.block_on(args.execute()),
            Err(err) => Err(err.into()),
        },
        Commands::Check(args) => args.execute(),
    };

    if let Err(err) = result {
        output.error(&format!("Error: {err}"));
        std::process::exit(1);
    }
}

/// Log filter: --verbose enables INFO level, otherwise use `RUST_LOG` or
/// default to WARN.
fn log_filter(verbose: bool) -> EnvFilter {
    if verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    }
}
