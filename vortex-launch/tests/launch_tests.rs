use std::ffi::CStr;
use std::io;
use std::path::Path;

use vortex_core::{ContainerId, Error};
use vortex_launch::{EXIT_CONFINEMENT_FAILED, LaunchConfig, Launcher};
use vortex_security::SecurityManager;
use vortex_security::apparmor::{ExecTransition, MacDetector, UnsupportedDetector};

struct Enabled;

impl MacDetector for Enabled {
    fn name(&self) -> &'static str {
        "test"
    }

    fn is_enabled(&self) -> bool {
        true
    }
}

struct Refuse;

impl ExecTransition for Refuse {
    fn change_onexec(&self, _profile: &CStr) -> io::Result<()> {
        Err(io::Error::from(io::ErrorKind::NotFound))
    }
}

struct Accept;

impl ExecTransition for Accept {
    fn change_onexec(&self, _profile: &CStr) -> io::Result<()> {
        Ok(())
    }
}

fn sh(script: &str) -> LaunchConfig {
    LaunchConfig::new(
        ContainerId::new("launch-test").unwrap(),
        vec!["/bin/sh".into(), "-c".into(), script.into()],
    )
}

fn have_sh() -> bool {
    Path::new("/bin/sh").exists()
}

#[test]
fn test_unconfined_launch_reports_exit_code() {
    if !have_sh() {
        return;
    }

    let launcher = Launcher::with_security(
        sh("exit 3"),
        SecurityManager::with_parts(Box::new(UnsupportedDetector), Box::new(Refuse)),
    )
    .unwrap();

    let result = launcher.launch().unwrap();
    assert_eq!(result.exit_code, 3);
    assert!(!result.confinement_failed());
}

#[test]
fn test_refused_profile_never_execs() {
    if !have_sh() {
        return;
    }

    // The script would exit 0; 125 proves exec never happened.
    let launcher = Launcher::with_security(
        sh("exit 0").with_apparmor_profile("missing-profile"),
        SecurityManager::with_parts(Box::new(Enabled), Box::new(Refuse)),
    )
    .unwrap();

    let result = launcher.launch().unwrap();
    assert_eq!(result.exit_code, EXIT_CONFINEMENT_FAILED);
    assert!(result.confinement_failed());
}

#[test]
fn test_accepted_profile_execs() {
    if !have_sh() {
        return;
    }

    let launcher = Launcher::with_security(
        sh("exit 0").with_apparmor_profile("loaded-profile"),
        SecurityManager::with_parts(Box::new(Enabled), Box::new(Accept)),
    )
    .unwrap();

    assert!(launcher.launch().unwrap().success());
}

#[test]
fn test_requested_profile_on_unsupported_host_fails_before_fork() {
    let launcher = Launcher::with_security(
        sh("exit 0").with_apparmor_profile("web"),
        SecurityManager::with_parts(Box::new(UnsupportedDetector), Box::new(Accept)),
    )
    .unwrap();

    let err = launcher.launch().unwrap_err();
    assert!(matches!(err, Error::Confinement { .. }));
    assert!(err.to_string().contains("\"web\""), "{err}");
}

#[test]
fn test_workdir_is_applied() {
    if !have_sh() {
        return;
    }

    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("here");
    let launcher = Launcher::with_security(
        sh("touch here").with_workdir(dir.path()),
        SecurityManager::with_parts(Box::new(UnsupportedDetector), Box::new(Refuse)),
    )
    .unwrap();

    assert!(launcher.launch().unwrap().success());
    assert!(marker.exists());
}

#[test]
fn test_empty_command_is_rejected() {
    let config = LaunchConfig::new(ContainerId::new("empty").unwrap(), Vec::new());
    assert!(matches!(
        Launcher::new(config),
        Err(Error::InvalidConfig { .. })
    ));
}

#[test]
fn test_launcher_keeps_validated_config() {
    let launcher = Launcher::with_security(
        sh("true").with_apparmor_profile("web-profile"),
        SecurityManager::with_parts(Box::new(Enabled), Box::new(Accept)),
    )
    .unwrap();

    assert_eq!(launcher.config().container_id.as_str(), "launch-test");
    assert_eq!(launcher.config().apparmor_profile.as_str(), "web-profile");
}
