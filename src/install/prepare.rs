use anyhow::anyhow;
use log::{debug, info};
use std::path::Path;

use crate::config::Config;
use crate::error::{InstallError, StepResult};
use crate::gate::{GateDecision, VersionGate};
use crate::materialize::ensure_dir;
use crate::permissions::PermissionPolicy;
use crate::provider::VersionProvider;
use crate::runtime::{Runtime, is_path_under, resolve_under};

/// Get the install root ready before any package is processed.
///
/// Returns the errors encountered; an empty list means the root is prepared.
#[tracing::instrument(skip_all)]
pub fn prepare_root<R: Runtime>(
    runtime: &R,
    config: &Config,
    gate: &VersionGate<'_, R>,
    provider: &dyn VersionProvider,
) -> Vec<InstallError> {
    let root = &config.install_root;
    if let Err(e) = ensure_dir(runtime, root, config.permissions.dir_mode) {
        return vec![e];
    }

    let mut errors = Vec::new();
    if let Some(trigger) = &config.upgrade.trigger
        && matches!(gate.check(provider, trigger), GateDecision::Required { .. })
    {
        info!("{} needs install, clearing obsolete content under {:?}", trigger, root);
        for path in &config.upgrade.purge {
            if let Err(e) = purge(runtime, root, path) {
                errors.push(e);
            }
        }
        if let Some(scratch) = config.scratch_dir()
            && let Err(e) = ensure_dir(runtime, &scratch, config.permissions.dir_mode)
        {
            errors.push(e);
        }
    }

    for rc in &config.rc_files {
        if let Err(e) = ensure_rc_file(runtime, &resolve_under(root, rc), &config.permissions) {
            errors.push(e);
        }
    }
    errors
}

fn purge<R: Runtime>(runtime: &R, root: &Path, path: &Path) -> StepResult<()> {
    let target = resolve_under(root, path);
    if target == *root || !is_path_under(&target, root) {
        return Err(InstallError::filesystem(
            "purge",
            target,
            anyhow!("refusing to remove a path outside the install root"),
        ));
    }

    let removed = if runtime.is_symlink(&target) {
        runtime.remove_symlink(&target)
    } else if runtime.is_dir(&target) {
        runtime.remove_dir_all(&target)
    } else if runtime.exists(&target) {
        runtime.remove_file(&target)
    } else {
        debug!("Nothing to purge at {:?}", target);
        return Ok(());
    };
    removed.map_err(|e| InstallError::filesystem("purge", &target, e))?;
    info!("Purged {:?}", target);
    Ok(())
}

fn ensure_rc_file<R: Runtime>(
    runtime: &R,
    path: &Path,
    policy: &PermissionPolicy,
) -> StepResult<()> {
    if runtime.exists(path) || runtime.is_symlink(path) {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        ensure_dir(runtime, parent, policy.dir_mode)?;
    }
    debug!("Creating rc file {:?}", path);
    runtime
        .write(path, b"")
        .map_err(|e| InstallError::filesystem("create rc file", path, e))?;
    runtime
        .set_permissions(path, policy.config_mode)
        .map_err(|e| InstallError::filesystem("set rc file permissions", path, e))
}
