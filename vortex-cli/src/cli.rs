//! CLI argument definitions

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "vortex")]
#[command(about = "Vortex container runtime with AppArmor confinement", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a container process under an AppArmor profile
    Run(RunArgs),

    /// Report whether AppArmor confinement is usable on this host
    Apparmor {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show version information
    Version,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Container ID (overrides the config file)
    #[arg(short, long)]
    pub id: Option<String>,

    /// AppArmor profile to confine the entrypoint under
    #[arg(long, value_name = "PROFILE")]
    pub apparmor_profile: Option<String>,

    /// JSON launch configuration
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Working directory for the entrypoint
    #[arg(long)]
    pub workdir: Option<PathBuf>,

    /// Command to run (overrides the config file)
    #[arg(last = true)]
    pub command: Vec<String>,
}
