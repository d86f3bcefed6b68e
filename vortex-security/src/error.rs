//! Confinement policy errors

use thiserror::Error;

use crate::apparmor::ApplyError;

/// Reasons a start attempt cannot be confined as requested
#[derive(Debug, Error)]
pub enum ConfinementError {
    /// A profile was requested but the host cannot enforce it
    #[error("AppArmor profile {profile:?} requested but AppArmor is not enabled on this host")]
    Unsupported {
        /// Requested profile
        profile: String,
    },

    /// The kernel refused the profile
    #[error(transparent)]
    Apply(#[from] ApplyError),
}

impl ConfinementError {
    /// Profile the failed request named
    #[must_use]
    pub fn profile(&self) -> &str {
        match self {
            Self::Unsupported { profile } => profile,
            Self::Apply(e) => e.profile(),
        }
    }
}

impl From<ConfinementError> for vortex_core::Error {
    fn from(e: ConfinementError) -> Self {
        Self::Confinement {
            message: e.to_string(),
        }
    }
}
