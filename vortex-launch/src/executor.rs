//! Confined process execution
//!
//! This module uses `unsafe` for fork(). The child arms the AppArmor profile
//! on its only thread and then execs from that same thread, which is what
//! the per-thread exec attribute requires.

#![allow(unsafe_code)]

use nix::sys::wait::{WaitStatus, waitpid};
use nix::unistd::{ForkResult, Pid, execvp, fork};
use std::ffi::CString;
use std::time::SystemTime;
use tracing::{debug, error, warn};
use vortex_core::{ConfinementEvent, ContainerId, Error, ProcessId, Result};
use vortex_security::{ProfileName, SecurityManager};

use crate::config::LaunchConfig;

/// Child exit code when the profile could not be applied; nothing was exec'd
pub const EXIT_CONFINEMENT_FAILED: i32 = 125;

/// Child exit code when the environment could not be prepared
pub const EXIT_SETUP_FAILED: i32 = 126;

/// Child exit code when exec itself failed
pub const EXIT_EXEC_FAILED: i32 = 127;

/// Outcome of a finished container process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionResult {
    /// PID the container process ran as
    pub pid: ProcessId,
    /// Exit code, `128 + n` when killed by signal `n`
    pub exit_code: i32,
}

impl ExecutionResult {
    /// Whether the child aborted because confinement could not be applied
    #[must_use]
    pub const fn confinement_failed(&self) -> bool {
        self.exit_code == EXIT_CONFINEMENT_FAILED
    }

    /// Whether the process exited successfully
    #[must_use]
    pub const fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Launches one container process under its configured profile
pub struct Launcher {
    config: LaunchConfig,
    security: SecurityManager,
}

impl Launcher {
    /// Create a launcher using this host's AppArmor support
    pub fn new(config: LaunchConfig) -> Result<Self> {
        Self::with_security(config, SecurityManager::new())
    }

    /// Create a launcher with an explicit security manager
    pub fn with_security(config: LaunchConfig, security: SecurityManager) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, security })
    }

    /// Launch configuration
    #[must_use]
    pub const fn config(&self) -> &LaunchConfig {
        &self.config
    }

    /// Fork, confine and exec the entrypoint, then wait for it
    ///
    /// Refuses before forking when a profile is requested on a host without
    /// AppArmor.
    pub fn launch(&self) -> Result<ExecutionResult> {
        let id = &self.config.container_id;

        ConfinementEvent::Detected {
            id: id.clone(),
            framework: self.security.framework().to_string(),
            enabled: self.security.confinement_enabled(),
            timestamp: SystemTime::now(),
        }
        .emit_trace();

        if let Err(e) = self.security.check(&self.config.apparmor_profile) {
            ConfinementEvent::Failed {
                id: id.clone(),
                profile: e.profile().to_string(),
                message: e.to_string(),
                timestamp: SystemTime::now(),
            }
            .emit_trace();
            return Err(e.into());
        }

        let argv = build_argv(&self.config.command)?;

        debug!(container_id = %id, command = ?self.config.command, "Forking container process");

        match unsafe { fork() } {
            Ok(ForkResult::Parent { child }) => {
                ConfinementEvent::Started {
                    id: id.clone(),
                    pid: child.as_raw(),
                    timestamp: SystemTime::now(),
                }
                .emit_trace();

                let exit_code = wait_for(child)?;

                if let Some(event) =
                    confinement_event(id, &self.config.apparmor_profile, exit_code)
                {
                    event.emit_trace();
                }

                ConfinementEvent::Exited {
                    id: id.clone(),
                    exit_code,
                    timestamp: SystemTime::now(),
                }
                .emit_trace();

                Ok(ExecutionResult {
                    pid: child.into(),
                    exit_code,
                })
            }
            Ok(ForkResult::Child) => self.child_process(&argv),
            Err(e) => Err(Error::Launch {
                message: format!("fork failed: {e}"),
            }),
        }
    }

    /// Runs in the forked child; never returns
    ///
    /// Only writes to stderr and exits; the parent reports what happened
    /// from the exit code.
    fn child_process(&self, argv: &[CString]) -> ! {
        if let Some(dir) = &self.config.workdir
            && let Err(e) = std::env::set_current_dir(dir)
        {
            eprintln!("vortex: cannot enter {}: {e}", dir.display());
            exit_child(EXIT_SETUP_FAILED);
        }

        if let Err(e) = self.security.prepare_exec(&self.config.apparmor_profile) {
            eprintln!("vortex: {e}");
            // Never exec unconfined.
            exit_child(EXIT_CONFINEMENT_FAILED);
        }

        let Err(e) = execvp(&argv[0], argv);
        eprintln!("vortex: failed to execute {:?}: {e}", argv[0]);
        exit_child(EXIT_EXEC_FAILED);
    }
}

/// Leave the forked child without running atexit handlers or flushing
/// buffers inherited from the parent
fn exit_child(code: i32) -> ! {
    unsafe { libc::_exit(code) }
}

/// Confinement event for a finished child, derived from its exit code
///
/// Returns `None` when the child failed before it reached the profile.
fn confinement_event(
    id: &ContainerId,
    profile: &ProfileName,
    exit_code: i32,
) -> Option<ConfinementEvent> {
    let timestamp = SystemTime::now();
    if !profile.is_requested() {
        return Some(ConfinementEvent::NotRequested {
            id: id.clone(),
            timestamp,
        });
    }
    match exit_code {
        EXIT_SETUP_FAILED => None,
        EXIT_CONFINEMENT_FAILED => Some(ConfinementEvent::Failed {
            id: id.clone(),
            profile: profile.to_string(),
            message: "profile could not be applied, see container stderr".to_string(),
            timestamp,
        }),
        _ => Some(ConfinementEvent::Applied {
            id: id.clone(),
            profile: profile.to_string(),
            timestamp,
        }),
    }
}

/// Convert the command to C strings before forking
fn build_argv(command: &[String]) -> Result<Vec<CString>> {
    command
        .iter()
        .map(|arg| {
            CString::new(arg.as_bytes()).map_err(|_| {
                Error::invalid_config(format!("argument {arg:?} contains a NUL byte"))
            })
        })
        .collect()
}

/// Wait for `child` to terminate and map its status to an exit code
fn wait_for(child: Pid) -> Result<i32> {
    loop {
        match waitpid(child, None) {
            Ok(WaitStatus::Exited(_, code)) => return Ok(code),
            Ok(WaitStatus::Signaled(_, signal, _)) => {
                warn!(pid = child.as_raw(), ?signal, "Container process killed by signal");
                return Ok(128 + signal as i32);
            }
            Ok(status) => debug!(?status, "Ignoring wait status"),
            Err(nix::errno::Errno::EINTR) => {}
            Err(e) => {
                error!(pid = child.as_raw(), "waitpid failed: {e}");
                return Err(Error::Launch {
                    message: format!("waitpid failed: {e}"),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_argv_keeps_program_first() {
        let argv = build_argv(&["/bin/echo".into(), "hi there".into()]).unwrap();
        assert_eq!(argv[0].as_bytes(), b"/bin/echo");
        assert_eq!(argv[1].as_bytes(), b"hi there");
    }

    #[test]
    fn build_argv_rejects_nul() {
        let err = build_argv(&["echo".into(), "a\0b".into()]).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { .. }));
    }

    fn web() -> ContainerId {
        ContainerId::new("web").unwrap()
    }

    #[test]
    fn event_for_unrequested_profile_is_not_requested() {
        let event = confinement_event(&web(), &ProfileName::none(), EXIT_CONFINEMENT_FAILED);
        assert!(matches!(event, Some(ConfinementEvent::NotRequested { .. })));
    }

    #[test]
    fn event_for_confinement_exit_is_failure() {
        let profile = ProfileName::from("web-profile");
        let event = confinement_event(&web(), &profile, EXIT_CONFINEMENT_FAILED).unwrap();
        assert!(event.is_critical());
        match event {
            ConfinementEvent::Failed { profile, .. } => assert_eq!(profile, "web-profile"),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn event_for_exec_or_program_exit_is_applied() {
        let profile = ProfileName::from("web-profile");
        for code in [0, 1, EXIT_EXEC_FAILED] {
            let event = confinement_event(&web(), &profile, code);
            assert!(matches!(event, Some(ConfinementEvent::Applied { .. })), "{code}");
        }
    }

    #[test]
    fn no_event_when_setup_failed_before_profile() {
        let profile = ProfileName::from("web-profile");
        assert!(confinement_event(&web(), &profile, EXIT_SETUP_FAILED).is_none());
    }

    #[test]
    fn confinement_failure_exit_code_is_distinct() {
        let failed = ExecutionResult {
            pid: ProcessId::from_raw(1),
            exit_code: EXIT_CONFINEMENT_FAILED,
        };
        assert!(failed.confinement_failed());
        assert!(!failed.success());
        assert_ne!(EXIT_CONFINEMENT_FAILED, EXIT_SETUP_FAILED);
        assert_ne!(EXIT_CONFINEMENT_FAILED, EXIT_EXEC_FAILED);
    }
}
