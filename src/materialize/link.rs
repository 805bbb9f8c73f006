use log::{debug, warn};
use std::path::Path;

use crate::error::{InstallError, StepResult};
use crate::runtime::Runtime;

/// Make `link` a symlink to `target`, replacing whatever is there.
///
/// Runs unconditionally on every install pass. A failure to remove the old
/// entry is logged as a warning; the symlink attempt that follows reports the
/// real error if the path is still occupied.
#[tracing::instrument(skip(runtime))]
pub fn ensure_link<R: Runtime>(runtime: &R, target: &Path, link: &Path) -> StepResult<()> {
    if runtime.is_symlink(link) {
        debug!("Replacing existing symlink {:?}", link);
        if let Err(e) = runtime.remove_symlink(link) {
            warn!("Failed to remove existing symlink {:?}: {:#}", link, e);
        }
    } else if runtime.is_dir(link) {
        debug!("Replacing directory {:?} with a symlink", link);
        if let Err(e) = runtime.remove_dir_all(link) {
            warn!("Failed to remove directory {:?}: {:#}", link, e);
        }
    } else if runtime.exists(link) {
        debug!("Replacing file {:?} with a symlink", link);
        if let Err(e) = runtime.remove_file(link) {
            warn!("Failed to remove file {:?}: {:#}", link, e);
        }
    }

    runtime
        .symlink(target, link)
        .map_err(|e| InstallError::filesystem("create symlink", link, e))
}
