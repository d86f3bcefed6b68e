//! Launch configuration

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use vortex_core::{ContainerId, Error, Result};
use vortex_security::ProfileName;

/// What to start and how to confine it
///
/// Loaded from JSON:
///
/// ```json
/// {
///   "container_id": "web",
///   "command": ["/usr/bin/nginx", "-g", "daemon off;"],
///   "apparmor_profile": "vortex-default",
///   "workdir": "/srv"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LaunchConfig {
    /// Container ID used in logs and events
    pub container_id: ContainerId,

    /// Program and arguments; resolved through `PATH`
    pub command: Vec<String>,

    /// Profile to confine the entrypoint under; empty for none
    #[serde(default)]
    pub apparmor_profile: ProfileName,

    /// Working directory for the entrypoint
    #[serde(default)]
    pub workdir: Option<PathBuf>,
}

impl LaunchConfig {
    /// Create a configuration without confinement
    #[must_use]
    pub fn new(container_id: ContainerId, command: Vec<String>) -> Self {
        Self {
            container_id,
            command,
            apparmor_profile: ProfileName::none(),
            workdir: None,
        }
    }

    /// Read a JSON configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Set the AppArmor profile
    #[must_use]
    pub fn with_apparmor_profile(mut self, profile: impl Into<ProfileName>) -> Self {
        self.apparmor_profile = profile.into();
        self
    }

    /// Set the working directory
    #[must_use]
    pub fn with_workdir(mut self, workdir: impl Into<PathBuf>) -> Self {
        self.workdir = Some(workdir.into());
        self
    }

    /// Check the configuration can be launched
    pub fn validate(&self) -> Result<()> {
        match self.command.first() {
            None => Err(Error::invalid_config("command cannot be empty")),
            Some(program) if program.is_empty() => {
                Err(Error::invalid_config("program name cannot be empty"))
            }
            Some(_) => Ok(()),
        }
    }
}
