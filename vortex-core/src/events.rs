//! Confinement lifecycle events with structured tracing
//!
//! The detector and applicator never log. Callers record what happened to a
//! start attempt by building one of these and calling
//! [`ConfinementEvent::emit_trace`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::SystemTime;

use crate::ContainerId;

/// Events emitted while confining and starting a container process
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConfinementEvent {
    /// Host AppArmor support was evaluated
    Detected {
        /// Container ID
        id: ContainerId,
        /// MAC framework probed (`apparmor`, or `none` without one)
        framework: String,
        /// Whether confinement is usable on this host
        enabled: bool,
        /// Timestamp
        #[serde(with = "systemtime_serde")]
        timestamp: SystemTime,
    },

    /// No profile was configured, the process runs with the caller's confinement
    NotRequested {
        /// Container ID
        id: ContainerId,
        /// Timestamp
        #[serde(with = "systemtime_serde")]
        timestamp: SystemTime,
    },

    /// The profile will take effect at the next exec
    Applied {
        /// Container ID
        id: ContainerId,
        /// Profile name
        profile: String,
        /// Timestamp
        #[serde(with = "systemtime_serde")]
        timestamp: SystemTime,
    },

    /// The profile could not be applied; the start attempt is aborted
    Failed {
        /// Container ID
        id: ContainerId,
        /// Profile name
        profile: String,
        /// Diagnostic from the kernel or the policy check
        message: String,
        /// Timestamp
        #[serde(with = "systemtime_serde")]
        timestamp: SystemTime,
    },

    /// Container process was forked
    Started {
        /// Container ID
        id: ContainerId,
        /// PID of the container process
        pid: i32,
        /// Timestamp
        #[serde(with = "systemtime_serde")]
        timestamp: SystemTime,
    },

    /// Container process exited
    Exited {
        /// Container ID
        id: ContainerId,
        /// Exit code
        exit_code: i32,
        /// Timestamp
        #[serde(with = "systemtime_serde")]
        timestamp: SystemTime,
    },
}

impl ConfinementEvent {
    /// Get the container ID from any event
    #[must_use]
    pub const fn container_id(&self) -> &ContainerId {
        match self {
            Self::Detected { id, .. }
            | Self::NotRequested { id, .. }
            | Self::Applied { id, .. }
            | Self::Failed { id, .. }
            | Self::Started { id, .. }
            | Self::Exited { id, .. } => id,
        }
    }

    /// Get the timestamp from any event
    #[must_use]
    pub const fn timestamp(&self) -> SystemTime {
        match self {
            Self::Detected { timestamp, .. }
            | Self::NotRequested { timestamp, .. }
            | Self::Applied { timestamp, .. }
            | Self::Failed { timestamp, .. }
            | Self::Started { timestamp, .. }
            | Self::Exited { timestamp, .. } => *timestamp,
        }
    }

    /// Check if this event aborts a start attempt
    #[must_use]
    pub const fn is_critical(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// Emit structured tracing event
    pub fn emit_trace(&self) {
        match self {
            Self::Detected {
                id,
                framework,
                enabled,
                ..
            } => {
                tracing::debug!(
                    container_id = %id,
                    framework = %framework,
                    enabled,
                    event = "detected",
                    "AppArmor support detected"
                );
            }
            Self::NotRequested { id, .. } => {
                tracing::debug!(
                    container_id = %id,
                    event = "not_requested",
                    "No AppArmor profile requested"
                );
            }
            Self::Applied { id, profile, .. } => {
                tracing::info!(
                    container_id = %id,
                    profile = %profile,
                    event = "applied",
                    "AppArmor profile armed for exec"
                );
            }
            Self::Failed {
                id,
                profile,
                message,
                ..
            } => {
                tracing::error!(
                    container_id = %id,
                    profile = %profile,
                    message = %message,
                    event = "failed",
                    "AppArmor confinement failed"
                );
            }
            Self::Started { id, pid, .. } => {
                tracing::info!(
                    container_id = %id,
                    pid,
                    event = "started",
                    "Container started"
                );
            }
            Self::Exited { id, exit_code, .. } => {
                tracing::info!(
                    container_id = %id,
                    exit_code,
                    event = "exited",
                    "Container exited"
                );
            }
        }
    }
}

impl fmt::Display for ConfinementEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Detected {
                id,
                framework,
                enabled,
                ..
            } => {
                let state = if *enabled { "enabled" } else { "disabled" };
                write!(f, "Container {id}: {framework} {state}")
            }
            Self::NotRequested { id, .. } => write!(f, "Container {id}: no profile requested"),
            Self::Applied { id, profile, .. } => {
                write!(f, "Container {id}: profile {profile} applied")
            }
            Self::Failed {
                id,
                profile,
                message,
                ..
            } => write!(f, "Container {id}: profile {profile} failed: {message}"),
            Self::Started { id, pid, .. } => write!(f, "Container {id} started as PID {pid}"),
            Self::Exited { id, exit_code, .. } => {
                write!(f, "Container {id} exited with code {exit_code}")
            }
        }
    }
}

mod systemtime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::{SystemTime, UNIX_EPOCH};

    pub fn serialize<S>(time: &SystemTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let since_epoch = time
            .duration_since(UNIX_EPOCH)
            .map_err(serde::ser::Error::custom)?;
        serializer.serialize_u64(since_epoch.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<SystemTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(UNIX_EPOCH + std::time::Duration::from_secs(secs))
    }
}
