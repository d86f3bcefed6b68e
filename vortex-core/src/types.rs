//! Identifiers shared across the runtime

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Container identifier
///
/// Used to tag log records and events for one start attempt. Restricted to
/// ASCII alphanumerics, `-` and `_` so it can be embedded in paths and log
/// fields without quoting.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(try_from = "String", into = "String")]
pub struct ContainerId(String);

impl ContainerId {
    /// Maximum length for container IDs
    pub const MAX_LENGTH: usize = 64;

    /// Create a new `ContainerId`
    ///
    /// # Errors
    /// Returns [`Error::InvalidConfig`] if the ID is empty, longer than
    /// [`Self::MAX_LENGTH`] or contains other characters than
    /// `[A-Za-z0-9_-]`.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();

        if id.is_empty() {
            return Err(Error::invalid_config("container ID cannot be empty"));
        }
        if id.len() > Self::MAX_LENGTH {
            return Err(Error::invalid_config(format!(
                "container ID too long ({} > {} chars)",
                id.len(),
                Self::MAX_LENGTH
            )));
        }
        if let Some(bad) = id
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
        {
            return Err(Error::invalid_config(format!(
                "container ID contains invalid character {bad:?}"
            )));
        }

        Ok(Self(id))
    }

    /// Get the container ID as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ContainerId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for ContainerId {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::new(s)
    }
}

impl From<ContainerId> for String {
    fn from(id: ContainerId) -> Self {
        id.0
    }
}

/// Process identifier of a launched container process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct ProcessId(i32);

impl ProcessId {
    /// Create from raw PID
    #[must_use]
    pub const fn from_raw(pid: i32) -> Self {
        Self(pid)
    }

    /// Get raw PID value
    #[must_use]
    pub const fn as_raw(self) -> i32 {
        self.0
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<nix::unistd::Pid> for ProcessId {
    fn from(pid: nix::unistd::Pid) -> Self {
        Self(pid.as_raw())
    }
}

impl From<ProcessId> for nix::unistd::Pid {
    fn from(pid: ProcessId) -> Self {
        Self::from_raw(pid.0)
    }
}
