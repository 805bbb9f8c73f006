use log::{debug, info};
use std::path::Path;

use crate::error::{InstallError, StepResult};
use crate::runtime::Runtime;

const CHOWN: &str = "chown";

/// Recursively hand the install root over to `owner` (`user` or `user:group`).
///
/// A non-zero exit or any output on stderr is an error.
#[tracing::instrument(skip(runtime))]
pub fn apply_owner<R: Runtime>(runtime: &R, owner: &str, root: &Path) -> StepResult<()> {
    let args = vec![
        "-R".to_string(),
        owner.to_string(),
        root.to_string_lossy().into_owned(),
    ];
    debug!("Running {} {:?}", CHOWN, args);

    let output = runtime
        .run_tool(CHOWN, &args)
        .map_err(|e| InstallError::ExternalTool {
            tool: CHOWN.to_string(),
            status: None,
            stderr: format!("{:#}", e),
        })?;

    let stderr = output.stderr.trim();
    if !output.success() || !stderr.is_empty() {
        return Err(InstallError::ExternalTool {
            tool: CHOWN.to_string(),
            status: output.status,
            stderr: stderr.to_string(),
        });
    }
    info!("Changed owner of {:?} to {}", root, owner);
    Ok(())
}
