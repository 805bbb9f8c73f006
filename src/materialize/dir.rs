use anyhow::anyhow;
use log::debug;
use std::path::Path;

use crate::error::{InstallError, StepResult};
use crate::runtime::Runtime;

/// Ensure `path` exists as a directory, creating missing parents first.
///
/// Every directory created here receives `mode`. Directories that already
/// exist are left untouched, including their permissions. Returns how many
/// directories were created.
#[tracing::instrument(skip(runtime))]
pub fn ensure_dir<R: Runtime>(runtime: &R, path: &Path, mode: u32) -> StepResult<usize> {
    if runtime.is_dir(path) {
        return Ok(0);
    }
    if runtime.exists(path) || runtime.is_symlink(path) {
        return Err(InstallError::filesystem(
            "create directory",
            path,
            anyhow!("path is occupied by something that is not a directory"),
        ));
    }

    let mut created = 0;
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        created += ensure_dir(runtime, parent, mode)?;
    }

    debug!("Creating directory {:?}", path);
    if let Err(e) = runtime.create_dir(path) {
        if runtime.is_dir(path) {
            // Lost a race with another writer; the directory is there now.
            return Ok(created);
        }
        return Err(InstallError::filesystem("create directory", path, e));
    }
    runtime
        .set_permissions(path, mode)
        .map_err(|e| InstallError::filesystem("set directory permissions", path, e))?;

    Ok(created + 1)
}
