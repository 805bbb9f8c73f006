//! What happens once installation is complete: scratch cleanup and the launch plan.

use anyhow::{Context, Result};
use log::{debug, warn};
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::LaunchSpec;
use crate::runtime::{Runtime, resolve_under};

/// Environment variable the dynamic linker searches for shared libraries
#[cfg(target_os = "macos")]
pub const LIBRARY_PATH_VAR: &str = "DYLD_LIBRARY_PATH";
#[cfg(target_os = "windows")]
pub const LIBRARY_PATH_VAR: &str = "PATH";
#[cfg(not(any(target_os = "macos", target_os = "windows")))]
pub const LIBRARY_PATH_VAR: &str = "LD_LIBRARY_PATH";

/// Remove everything directly inside `scratch`. Returns how many entries were removed.
#[tracing::instrument(skip(runtime))]
pub fn clean_scratch<R: Runtime>(runtime: &R, scratch: &Path) -> usize {
    if !runtime.is_dir(scratch) {
        return 0;
    }
    let entries = match runtime.read_dir(scratch) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Failed to list scratch directory {:?}: {:#}", scratch, e);
            return 0;
        }
    };

    let mut removed = 0;
    for entry in entries {
        let result = if runtime.is_symlink(&entry) {
            runtime.remove_symlink(&entry)
        } else if runtime.is_dir(&entry) {
            runtime.remove_dir_all(&entry)
        } else {
            runtime.remove_file(&entry)
        };
        match result {
            Ok(()) => removed += 1,
            Err(e) => warn!("Failed to remove scratch entry {:?}: {:#}", entry, e),
        }
    }
    debug!("Removed {} scratch entries from {:?}", removed, scratch);
    removed
}

/// The program to start and the library search path it needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchPlan {
    pub program: PathBuf,
    pub library_path: OsString,
}

impl LaunchPlan {
    /// Resolve the launch section against the install root. Any library search
    /// path already set in the environment is kept after the runtime's own directories.
    pub fn resolve<R: Runtime>(
        runtime: &R,
        spec: &LaunchSpec,
        install_root: &Path,
    ) -> Result<Self> {
        let mut dirs: Vec<PathBuf> = spec
            .library_dirs
            .iter()
            .map(|dir| resolve_under(install_root, dir))
            .collect();
        if let Ok(inherited) = runtime.env_var(LIBRARY_PATH_VAR) {
            dirs.extend(std::env::split_paths(&inherited).filter(|p| !p.as_os_str().is_empty()));
        }
        let library_path = std::env::join_paths(dirs)
            .context("Library directory cannot be part of a search path")?;

        Ok(Self {
            program: resolve_under(install_root, &spec.program),
            library_path,
        })
    }

    pub fn env(&self) -> (&'static str, &OsString) {
        (LIBRARY_PATH_VAR, &self.library_path)
    }
}

impl fmt::Display for LaunchPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}={} {}",
            LIBRARY_PATH_VAR,
            self.library_path.to_string_lossy(),
            self.program.display()
        )
    }
}
