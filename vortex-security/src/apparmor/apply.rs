//! Arming an AppArmor profile for the next exec
//!
//! The kernel interface is the per-thread `exec` attribute under procfs.
//! Writing `exec <profile>` there makes the next `execve` of the writing
//! task transition into `<profile>`. The current image keeps running
//! unconfined by it, and the request is consumed by that one exec.

use serde::{Deserialize, Serialize};
use std::ffi::{CStr, CString};
use std::fmt;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of a profile already loaded into the kernel
///
/// Opaque apart from emptiness: an empty name means "no confinement
/// requested".
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileName(String);

impl ProfileName {
    /// Wrap a profile name without any normalization
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The "no profile" sentinel
    #[must_use]
    pub const fn none() -> Self {
        Self(String::new())
    }

    /// Whether confinement was requested
    #[must_use]
    pub fn is_requested(&self) -> bool {
        !self.0.is_empty()
    }

    /// The name as given
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProfileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProfileName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for ProfileName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl From<Option<String>> for ProfileName {
    fn from(name: Option<String>) -> Self {
        name.map_or_else(Self::none, Self)
    }
}

/// Failure to arm a profile
#[derive(Debug, Error)]
pub enum ApplyError {
    /// The name contains a NUL byte and cannot be passed to the kernel
    #[error("invalid AppArmor profile name {profile:?}: contains a NUL byte")]
    InvalidName {
        /// Profile name as given
        profile: String,
    },

    /// The kernel refused the change-on-exec request
    #[error("failed to apply AppArmor profile {profile:?}: {source}")]
    Rejected {
        /// Profile name as given
        profile: String,
        /// Kernel diagnostic
        #[source]
        source: io::Error,
    },
}

impl ApplyError {
    /// Profile the failed request named
    #[must_use]
    pub fn profile(&self) -> &str {
        match self {
            Self::InvalidName { profile } | Self::Rejected { profile, .. } => profile,
        }
    }
}

/// The boundary call that asks the kernel for a change-on-exec transition
pub trait ExecTransition: Send + Sync {
    /// Request that the next exec of the calling task runs under `profile`
    ///
    /// # Errors
    /// Returns the kernel's error unchanged.
    fn change_onexec(&self, profile: &CStr) -> io::Result<()>;
}

impl<T: ExecTransition + ?Sized> ExecTransition for Box<T> {
    fn change_onexec(&self, profile: &CStr) -> io::Result<()> {
        (**self).change_onexec(profile)
    }
}

impl<T: ExecTransition + ?Sized> ExecTransition for &T {
    fn change_onexec(&self, profile: &CStr) -> io::Result<()> {
        (**self).change_onexec(profile)
    }
}

/// Linux procfs implementation of [`ExecTransition`]
#[derive(Debug, Clone)]
pub struct ProcAttrTransition {
    proc_root: PathBuf,
}

impl ProcAttrTransition {
    /// Use a procfs mounted at `proc_root`
    pub fn new(proc_root: impl Into<PathBuf>) -> Self {
        Self {
            proc_root: proc_root.into(),
        }
    }

    /// Attribute files to try, LSM-specific node first
    #[must_use]
    pub fn attr_paths(&self) -> [PathBuf; 2] {
        let attr = self.proc_root.join("thread-self").join("attr");
        [attr.join("apparmor").join("exec"), attr.join("exec")]
    }

    fn write_attr(path: &Path, payload: &[u8]) -> io::Result<()> {
        let mut file = OpenOptions::new().write(true).open(path)?;
        // The kernel parses the whole command from one write.
        file.write_all(payload)
    }
}

impl Default for ProcAttrTransition {
    fn default() -> Self {
        Self::new("/proc")
    }
}

impl ExecTransition for ProcAttrTransition {
    fn change_onexec(&self, profile: &CStr) -> io::Result<()> {
        let mut payload = b"exec ".to_vec();
        payload.extend_from_slice(profile.to_bytes());

        let [lsm_node, legacy_node] = self.attr_paths();
        match Self::write_attr(&lsm_node, &payload) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Self::write_attr(&legacy_node, &payload)
            }
            other => other,
        }
    }
}

/// [`ExecTransition`] for targets without AppArmor
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedTransition;

impl ExecTransition for UnsupportedTransition {
    fn change_onexec(&self, _profile: &CStr) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "AppArmor is not available on this platform",
        ))
    }
}

/// Boundary call for the build target
#[must_use]
pub fn host_transition() -> Box<dyn ExecTransition> {
    #[cfg(target_os = "linux")]
    {
        Box::new(ProcAttrTransition::default())
    }
    #[cfg(not(target_os = "linux"))]
    {
        Box::new(UnsupportedTransition)
    }
}

/// Applies profiles through an [`ExecTransition`]
///
/// Stateless: it neither logs nor retries. A profile name is static
/// configuration, so a second attempt cannot succeed where the first failed.
#[derive(Debug, Clone, Default)]
pub struct ProfileApplicator<T> {
    transition: T,
}

impl<T: ExecTransition> ProfileApplicator<T> {
    /// Create an applicator over `transition`
    pub const fn new(transition: T) -> Self {
        Self { transition }
    }

    /// Arm `profile` for the next exec of the calling thread
    ///
    /// An empty name returns `Ok(())` without touching the kernel.
    ///
    /// # Errors
    /// [`ApplyError::InvalidName`] for names with a NUL byte,
    /// [`ApplyError::Rejected`] when the kernel refuses the request.
    pub fn apply(&self, profile: &ProfileName) -> Result<(), ApplyError> {
        if !profile.is_requested() {
            return Ok(());
        }

        let name = CString::new(profile.as_str()).map_err(|_| ApplyError::InvalidName {
            profile: profile.to_string(),
        })?;

        self.transition
            .change_onexec(&name)
            .map_err(|source| ApplyError::Rejected {
                profile: profile.to_string(),
                source,
            })
    }
}

/// Arm `profile` for the next exec of the calling thread on this host
///
/// # Errors
/// See [`ProfileApplicator::apply`].
pub fn apply_profile(profile: &str) -> Result<(), ApplyError> {
    ProfileApplicator::new(host_transition()).apply(&ProfileName::from(profile))
}
