//! AppArmor detection and profile application
//!
//! [`is_enabled`] answers whether the host can confine processes;
//! [`apply_profile`] arms a profile for the next exec of the calling thread.
//! Neither logs. Detection never errors, application always reports
//! failure.

mod apply;
mod detect;

use std::sync::LazyLock;

pub use apply::{
    ApplyError, ExecTransition, ProcAttrTransition, ProfileApplicator, ProfileName,
    UnsupportedTransition, apply_profile, host_transition,
};
pub use detect::{
    AppArmorDetector, AppArmorPaths, CachedDetector, CapabilityReport, MacDetector,
    NESTED_CONTAINER_ENV, UnsupportedDetector, host_detector,
};

static HOST: LazyLock<CachedDetector<Box<dyn MacDetector>>> =
    LazyLock::new(|| CachedDetector::new(host_detector()));

/// Whether AppArmor confinement is usable on this host
///
/// Evaluated once per process.
#[must_use]
pub fn is_enabled() -> bool {
    HOST.is_enabled()
}
