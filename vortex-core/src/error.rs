//! Error types for Vortex

use thiserror::Error;

/// Vortex error types
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Mandatory access control confinement could not be arranged
    #[error("Confinement error: {message}")]
    Confinement {
        /// Error message
        message: String,
    },

    /// Launching the container process failed
    #[error("Launch error: {message}")]
    Launch {
        /// Error message
        message: String,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        /// Error message
        message: String,
    },

    /// System error from nix
    #[error("System error: {0}")]
    System(#[from] nix::Error),

    /// Configuration (de)serialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Shorthand for an [`Error::InvalidConfig`]
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Whether this error means a requested confinement was not put in place
    #[must_use]
    pub const fn is_confinement(&self) -> bool {
        matches!(self, Self::Confinement { .. })
    }
}

/// Result type alias for Vortex operations
pub type Result<T> = std::result::Result<T, Error>;
