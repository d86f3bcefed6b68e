//! Confinement policy for a container start attempt

use crate::apparmor::{
    CachedDetector, ExecTransition, MacDetector, ProfileApplicator, ProfileName, host_detector,
    host_transition,
};
use crate::error::ConfinementError;

/// Successful end state of a start attempt's confinement step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfinementOutcome {
    /// No profile configured; the process keeps the caller's confinement
    NotRequested,
    /// The profile takes effect at the next exec
    Applied(ProfileName),
}

impl ConfinementOutcome {
    /// Profile armed for exec, if any
    #[must_use]
    pub const fn profile(&self) -> Option<&ProfileName> {
        match self {
            Self::NotRequested => None,
            Self::Applied(p) => Some(p),
        }
    }
}

/// Ties host detection to profile application
///
/// Callers must treat every error from [`SecurityManager::prepare_exec`] as
/// fatal to the start attempt and must not exec afterwards.
pub struct SecurityManager {
    detector: CachedDetector<Box<dyn MacDetector>>,
    applicator: ProfileApplicator<Box<dyn ExecTransition>>,
}

impl SecurityManager {
    /// Create a security manager for this host
    #[must_use]
    pub fn new() -> Self {
        Self::with_parts(host_detector(), host_transition())
    }

    /// Create a security manager from explicit detector and boundary call
    #[must_use]
    pub fn with_parts(
        detector: Box<dyn MacDetector>,
        transition: Box<dyn ExecTransition>,
    ) -> Self {
        Self {
            detector: CachedDetector::new(detector),
            applicator: ProfileApplicator::new(transition),
        }
    }

    /// Whether the host can confine processes
    #[must_use]
    pub fn confinement_enabled(&self) -> bool {
        self.detector.is_enabled()
    }

    /// Name of the MAC framework in use
    #[must_use]
    pub fn framework(&self) -> &'static str {
        self.detector.name()
    }

    /// Pre-flight check, run before forking
    ///
    /// # Errors
    /// [`ConfinementError::Unsupported`] when `profile` is requested and the
    /// host cannot enforce it.
    pub fn check(&self, profile: &ProfileName) -> Result<(), ConfinementError> {
        if profile.is_requested() && !self.confinement_enabled() {
            return Err(ConfinementError::Unsupported {
                profile: profile.to_string(),
            });
        }
        Ok(())
    }

    /// Confine the next exec of the calling thread under `profile`
    ///
    /// Must be the last confinement-relevant step before exec.
    ///
    /// # Errors
    /// Returns [`ConfinementError`] when the profile cannot be enforced.
    pub fn prepare_exec(
        &self,
        profile: &ProfileName,
    ) -> Result<ConfinementOutcome, ConfinementError> {
        if !profile.is_requested() {
            return Ok(ConfinementOutcome::NotRequested);
        }

        self.check(profile)?;
        self.applicator.apply(profile)?;

        Ok(ConfinementOutcome::Applied(profile.clone()))
    }
}

impl Default for SecurityManager {
    fn default() -> Self {
        Self::new()
    }
}
