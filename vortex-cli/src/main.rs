//! Vortex Container Runtime CLI
//!
//! Starts container processes confined by AppArmor profiles.

use clap::Parser;
use std::process;
use tracing_subscriber::EnvFilter;

mod apparmor;
mod cli;
mod run;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Run(args) => run::execute(args).await,
        Commands::Apparmor { json } => apparmor::execute(json),
        Commands::Version => {
            print_version();
            Ok(0)
        }
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("Error: {e:#}");
            process::exit(1);
        }
    }
}

fn print_version() {
    println!("Vortex Container Runtime");
    println!("Version: {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Features:");
    println!("  • AppArmor host detection");
    println!("  • Change-on-exec profile confinement");
}
