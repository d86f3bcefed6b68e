//! Vortex Core - shared types, errors and confinement events
//!
//! This crate provides the vocabulary used by the security, launch and CLI
//! crates.

#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod events;
pub mod types;

pub use error::{Error, Result};
pub use events::ConfinementEvent;
pub use types::{ContainerId, ProcessId};
