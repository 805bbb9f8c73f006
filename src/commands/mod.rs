use anyhow::Result;
use log::debug;
use std::path::PathBuf;

use crate::config::{Config, resolve_config_path};
use crate::runtime::Runtime;

mod decode;
mod install;
mod status;

pub use decode::{decode, describe};
pub use install::install;
pub use status::{gate_decisions, status};

/// Load the install plan, applying the `--root` override.
#[tracing::instrument(skip(runtime))]
pub fn load_config<R: Runtime>(
    runtime: &R,
    config_path: Option<PathBuf>,
    install_root: Option<PathBuf>,
) -> Result<Config> {
    let path = resolve_config_path(runtime, config_path)?;
    debug!("Using install plan {:?}", path);
    Ok(Config::load(runtime, &path)?.with_root_override(install_root))
}
