//! Security features for containers
//!
//! This crate provides AppArmor confinement for container processes:
//! - Host capability detection (fail closed)
//! - Arming a named profile for the next exec
//! - The start-attempt policy that refuses to run unconfined when a profile
//!   was requested

#![warn(missing_docs, clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod apparmor;
pub mod error;
pub mod manager;

pub use apparmor::{ApplyError, ProfileName, apply_profile, is_enabled};
pub use error::ConfinementError;
pub use manager::{ConfinementOutcome, SecurityManager};
