//! `vortex apparmor`: host confinement report

use anyhow::Result;
use serde::Serialize;
use std::path::Path;
use vortex_security::apparmor::{CapabilityReport, MacDetector, host_detector};

#[derive(Serialize)]
struct StatusReport<'a> {
    framework: &'static str,
    enabled: bool,
    #[serde(flatten)]
    evidence: Option<Evidence<'a>>,
}

/// Per-signal detail; only Linux hosts have any
#[derive(Serialize)]
struct Evidence<'a> {
    evidence: CapabilityReport,
    securityfs: &'a Path,
    parser: &'a Path,
    enabled_param: &'a Path,
}

/// Print the detection evidence. Detection is fail-closed, so this always succeeds.
pub fn execute(json: bool) -> Result<i32> {
    let host = host_detector();

    #[cfg(target_os = "linux")]
    let detector = vortex_security::apparmor::AppArmorDetector::from_env();
    #[cfg(target_os = "linux")]
    let evidence = {
        let paths = detector.paths();
        Some(Evidence {
            evidence: detector.probe(),
            securityfs: &paths.securityfs,
            parser: &paths.parser,
            enabled_param: &paths.enabled_param,
        })
    };
    #[cfg(not(target_os = "linux"))]
    let evidence: Option<Evidence<'_>> = None;

    let report = StatusReport {
        framework: host.name(),
        enabled: host.is_enabled(),
        evidence,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(0);
    }

    println!("\nAppArmor Confinement\n");
    println!("{:-<60}", "");
    match &report.evidence {
        Some(e) => {
            line("LSM registered", e.securityfs, e.evidence.registered);
            line("Not nested in a container", Path::new("$container"), !e.evidence.nested);
            line("Policy parser installed", e.parser, e.evidence.parser_present);
            line("Module enabled", e.enabled_param, e.evidence.module_enabled);
        }
        None => println!("❌ No AppArmor support on this platform ({})", report.framework),
    }
    println!("{:-<60}", "");

    if report.enabled {
        println!("\n✅ AppArmor profiles can be applied\n");
    } else {
        println!("\n⚠️  AppArmor unavailable: runs requesting a profile will be refused\n");
    }

    Ok(0)
}

fn line(check: &str, source: &Path, ok: bool) {
    let mark = if ok { "✅" } else { "❌" };
    println!("{mark} {check:<28} {}", source.display());
}
