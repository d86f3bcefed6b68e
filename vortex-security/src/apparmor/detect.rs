//! Host AppArmor capability detection
//!
//! Detection is advisory and fails closed: every I/O problem while probing
//! the host reads as "not enabled" instead of an error.

use serde::Serialize;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Environment variable set by container managers inside a container.
///
/// Any non-empty value means an outer runtime already owns MAC decisions.
pub const NESTED_CONTAINER_ENV: &str = "container";

/// Host paths consulted during detection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppArmorPaths {
    /// securityfs directory present when the LSM is registered
    pub securityfs: PathBuf,
    /// Userspace policy compiler/loader
    pub parser: PathBuf,
    /// Kernel module parameter holding `Y` or `N`
    pub enabled_param: PathBuf,
}

impl AppArmorPaths {
    /// Default securityfs marker
    pub const SECURITYFS: &'static str = "/sys/kernel/security/apparmor";
    /// Default parser location
    pub const PARSER: &'static str = "/sbin/apparmor_parser";
    /// Default module parameter
    pub const ENABLED_PARAM: &'static str = "/sys/module/apparmor/parameters/enabled";

    /// Re-root every path under `root`
    #[must_use]
    pub fn under(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        let join = |p: &str| root.join(p.trim_start_matches('/'));
        Self {
            securityfs: join(Self::SECURITYFS),
            parser: join(Self::PARSER),
            enabled_param: join(Self::ENABLED_PARAM),
        }
    }
}

impl Default for AppArmorPaths {
    fn default() -> Self {
        Self {
            securityfs: PathBuf::from(Self::SECURITYFS),
            parser: PathBuf::from(Self::PARSER),
            enabled_param: PathBuf::from(Self::ENABLED_PARAM),
        }
    }
}

/// A mandatory access control detector
///
/// Implementations must be pure queries: no side effects and no errors.
pub trait MacDetector: Send + Sync {
    /// Short name of the MAC framework
    fn name(&self) -> &'static str;

    /// Whether confinement can be applied on this host
    fn is_enabled(&self) -> bool;
}

impl<D: MacDetector + ?Sized> MacDetector for Box<D> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn is_enabled(&self) -> bool {
        (**self).is_enabled()
    }
}

/// Evidence gathered from the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CapabilityReport {
    /// securityfs marker exists
    pub registered: bool,
    /// Running inside another container
    pub nested: bool,
    /// `apparmor_parser` exists
    pub parser_present: bool,
    /// Module parameter reads `Y`
    pub module_enabled: bool,
}

impl CapabilityReport {
    /// Overall answer derived from the evidence
    #[must_use]
    pub const fn enabled(&self) -> bool {
        self.registered && !self.nested && self.parser_present && self.module_enabled
    }
}

/// AppArmor detector for Linux hosts
#[derive(Debug, Clone)]
pub struct AppArmorDetector {
    paths: AppArmorPaths,
    nested: Option<OsString>,
}

impl AppArmorDetector {
    /// Create a detector from explicit paths and nested-container value
    #[must_use]
    pub const fn new(paths: AppArmorPaths, nested: Option<OsString>) -> Self {
        Self { paths, nested }
    }

    /// Detector for the running host, snapshotting [`NESTED_CONTAINER_ENV`]
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(
            AppArmorPaths::default(),
            std::env::var_os(NESTED_CONTAINER_ENV),
        )
    }

    /// Paths this detector probes
    #[must_use]
    pub const fn paths(&self) -> &AppArmorPaths {
        &self.paths
    }

    /// Evaluate every signal without short-circuiting
    #[must_use]
    pub fn probe(&self) -> CapabilityReport {
        CapabilityReport {
            registered: self.paths.securityfs.exists(),
            nested: self.is_nested(),
            parser_present: self.paths.parser.exists(),
            module_enabled: module_enabled(&self.paths.enabled_param),
        }
    }

    fn is_nested(&self) -> bool {
        self.nested.as_ref().is_some_and(|v| !v.is_empty())
    }
}

impl MacDetector for AppArmorDetector {
    fn name(&self) -> &'static str {
        "apparmor"
    }

    fn is_enabled(&self) -> bool {
        if !self.paths.securityfs.exists() {
            return false;
        }
        if self.is_nested() {
            return false;
        }
        if !self.paths.parser.exists() {
            return false;
        }
        module_enabled(&self.paths.enabled_param)
    }
}

/// The kernel writes `Y\n` when enabled; anything shorter or different is off.
fn module_enabled(path: &Path) -> bool {
    fs::read(path).is_ok_and(|buf| buf.len() > 1 && buf[0] == b'Y')
}

/// Fallback for targets without AppArmor
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedDetector;

impl MacDetector for UnsupportedDetector {
    fn name(&self) -> &'static str {
        "none"
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

/// Evaluates the wrapped detector once and reuses the answer
///
/// Kernel LSM state cannot change under a running process, so caching for
/// the lifetime of the wrapper is sound.
#[derive(Debug, Default)]
pub struct CachedDetector<D> {
    inner: D,
    answer: OnceLock<bool>,
}

impl<D: MacDetector> CachedDetector<D> {
    /// Wrap a detector
    pub const fn new(inner: D) -> Self {
        Self {
            inner,
            answer: OnceLock::new(),
        }
    }
}

impl<D: MacDetector> MacDetector for CachedDetector<D> {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn is_enabled(&self) -> bool {
        *self.answer.get_or_init(|| self.inner.is_enabled())
    }
}

/// Detector for the build target
#[must_use]
pub fn host_detector() -> Box<dyn MacDetector> {
    #[cfg(target_os = "linux")]
    {
        Box::new(AppArmorDetector::from_env())
    }
    #[cfg(not(target_os = "linux"))]
    {
        Box::new(UnsupportedDetector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct Host {
        root: TempDir,
    }

    impl Host {
        fn new() -> Self {
            Self {
                root: tempfile::tempdir().unwrap(),
            }
        }

        fn paths(&self) -> AppArmorPaths {
            AppArmorPaths::under(self.root.path())
        }

        fn register(self) -> Self {
            fs::create_dir_all(self.paths().securityfs).unwrap();
            self
        }

        fn parser(self) -> Self {
            let parser = self.paths().parser;
            fs::create_dir_all(parser.parent().unwrap()).unwrap();
            fs::write(parser, b"").unwrap();
            self
        }

        fn param(self, content: &[u8]) -> Self {
            let param = self.paths().enabled_param;
            fs::create_dir_all(param.parent().unwrap()).unwrap();
            fs::write(param, content).unwrap();
            self
        }

        fn full() -> Self {
            Self::new().register().parser().param(b"Y\n")
        }

        fn detector(&self, nested: Option<&str>) -> AppArmorDetector {
            AppArmorDetector::new(self.paths(), nested.map(OsString::from))
        }
    }

    #[test]
    fn under_reroots_absolute_paths() {
        let paths = AppArmorPaths::under("/tmp/host");
        assert_eq!(
            paths.securityfs,
            PathBuf::from("/tmp/host/sys/kernel/security/apparmor")
        );
        assert_eq!(paths.parser, PathBuf::from("/tmp/host/sbin/apparmor_parser"));
    }

    #[test]
    fn fully_supported_host_is_enabled() {
        let host = Host::full();
        assert!(host.detector(None).is_enabled());
        assert!(host.detector(None).probe().enabled());
    }

    #[test]
    fn missing_marker_disables() {
        let host = Host::new().parser().param(b"Y\n");
        assert!(!host.detector(None).is_enabled());
    }

    #[test]
    fn nested_container_disables() {
        let host = Host::full();
        assert!(!host.detector(Some("lxc")).is_enabled());
        assert!(!host.detector(Some("podman")).probe().enabled());
    }

    #[test]
    fn empty_nested_value_is_ignored() {
        let host = Host::full();
        assert!(host.detector(Some("")).is_enabled());
    }

    #[test]
    fn missing_parser_disables() {
        let host = Host::new().register().param(b"Y\n");
        assert!(!host.detector(None).is_enabled());
    }

    #[test]
    fn param_must_start_with_y_and_have_more_than_one_byte() {
        assert!(!Host::new().register().parser().detector(None).is_enabled());
        assert!(!Host::new().register().parser().param(b"").detector(None).is_enabled());
        assert!(!Host::new().register().parser().param(b"N\n").detector(None).is_enabled());
        assert!(!Host::new().register().parser().param(b"Y").detector(None).is_enabled());
        assert!(!Host::new().register().parser().param(b"y\n").detector(None).is_enabled());
    }

    #[test]
    fn unreadable_param_fails_closed() {
        let host = Host::new().register().parser();
        // A directory in place of the file makes the read fail.
        fs::create_dir_all(host.paths().enabled_param).unwrap();
        assert!(!host.detector(None).is_enabled());
    }

    #[test]
    fn probe_reports_each_signal() {
        let host = Host::new().parser().param(b"Y\n");
        let report = host.detector(Some("docker")).probe();
        assert_eq!(
            report,
            CapabilityReport {
                registered: false,
                nested: true,
                parser_present: true,
                module_enabled: true,
            }
        );
        assert!(!report.enabled());
    }

    #[test]
    fn from_env_probes_host_paths() {
        assert_eq!(AppArmorDetector::from_env().paths(), &AppArmorPaths::default());

        let host = Host::new();
        assert_eq!(host.detector(None).paths(), &host.paths());
    }

    #[test]
    fn capability_report_serializes_every_signal() {
        let report = Host::new().register().detector(Some("lxc")).probe();
        let json = serde_json::to_value(report).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "registered": true,
                "nested": true,
                "parser_present": false,
                "module_enabled": false,
            })
        );
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn host_detector_is_apparmor_on_linux() {
        assert_eq!(host_detector().name(), "apparmor");
    }

    #[test]
    fn unsupported_detector_is_never_enabled() {
        assert!(!UnsupportedDetector.is_enabled());
        assert_eq!(UnsupportedDetector.name(), "none");
    }

    struct Counting<'a>(&'a AtomicUsize, bool);

    impl MacDetector for Counting<'_> {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn is_enabled(&self) -> bool {
            self.0.fetch_add(1, Ordering::SeqCst);
            self.1
        }
    }

    #[test]
    fn cached_detector_evaluates_once() {
        let calls = AtomicUsize::new(0);
        let cached = CachedDetector::new(Counting(&calls, true));
        assert!(cached.is_enabled());
        assert!(cached.is_enabled());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
