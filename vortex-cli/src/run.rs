//! Container execution logic

use anyhow::{Context, Result, bail};
use tracing::{info, warn};
use vortex_core::ContainerId;
use vortex_launch::{LaunchConfig, Launcher};

use crate::cli::RunArgs;

pub async fn execute(args: RunArgs) -> Result<i32> {
    let config = resolve_config(args)?;
    let launcher = Launcher::new(config).context("Invalid launch configuration")?;

    let config = launcher.config();
    info!(
        container_id = %config.container_id,
        profile = %config.apparmor_profile,
        command = ?config.command,
        "Starting container"
    );

    // fork/waitpid block; keep them off the async workers.
    let result = tokio::task::spawn_blocking(move || launcher.launch())
        .await
        .context("Launcher task panicked")?
        .context("Failed to start container")?;

    if result.confinement_failed() {
        warn!(pid = %result.pid, "Container aborted: AppArmor profile could not be applied");
    }

    Ok(result.exit_code)
}

/// Merge the optional config file with command-line overrides
fn resolve_config(args: RunArgs) -> Result<LaunchConfig> {
    let mut config = match &args.config {
        Some(path) => Some(
            LaunchConfig::from_file(path)
                .with_context(|| format!("Failed to load {}", path.display()))?,
        ),
        None => None,
    };

    let id = match (args.id, &config) {
        (Some(id), _) => ContainerId::new(id).context("Invalid container ID")?,
        (None, Some(c)) => c.container_id.clone(),
        (None, None) => bail!("--id is required without --config"),
    };

    let command = match (args.command.is_empty(), &mut config) {
        (false, _) => args.command,
        (true, Some(c)) => std::mem::take(&mut c.command),
        (true, None) => bail!("a command is required without --config (vortex run --id ID -- CMD)"),
    };

    let mut resolved = match config {
        Some(c) => LaunchConfig {
            container_id: id,
            command,
            ..c
        },
        None => LaunchConfig::new(id, command),
    };

    if let Some(profile) = args.apparmor_profile {
        resolved = resolved.with_apparmor_profile(profile);
    }
    if let Some(dir) = args.workdir {
        resolved = resolved.with_workdir(dir);
    }

    Ok(resolved)
}
