//! Container process launch with AppArmor confinement
//!
//! The launcher forks, arms the configured profile in the child and only
//! then execs the entrypoint. A child that cannot be confined exits without
//! exec.

#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]

pub mod config;
pub mod executor;

pub use config::LaunchConfig;
pub use executor::{
    EXIT_CONFINEMENT_FAILED, EXIT_EXEC_FAILED, EXIT_SETUP_FAILED, ExecutionResult, Launcher,
};
