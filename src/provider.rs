//! Package version discovery.

use log::{debug, warn};
use std::collections::HashMap;
use std::path::PathBuf;

use crate::config::PackageSpec;
use crate::runtime::Runtime;

/// Name of the file a package may ship in its library directory to declare its version.
pub const VERSION_FILE: &str = "VERSION";

/// Resolves the currently available version of a package, if the package is present.
#[cfg_attr(test, mockall::automock)]
pub trait VersionProvider: Send + Sync {
    fn version_of(&self, package: &str) -> Option<String>;
}

/// Looks packages up on local storage.
///
/// A package is present when its library directory exists. Its version comes
/// from the install plan when declared there, otherwise from a `VERSION` file
/// in the library directory.
pub struct LocalVersionProvider<'a, R: Runtime> {
    runtime: &'a R,
    packages: HashMap<String, (PathBuf, Option<String>)>,
}

impl<'a, R: Runtime> LocalVersionProvider<'a, R> {
    pub fn new(runtime: &'a R, packages: &[PackageSpec]) -> Self {
        Self {
            runtime,
            packages: packages
                .iter()
                .map(|p| (p.name.clone(), (p.lib_dir.clone(), p.version.clone())))
                .collect(),
        }
    }
}

impl<R: Runtime> VersionProvider for LocalVersionProvider<'_, R> {
    fn version_of(&self, package: &str) -> Option<String> {
        let (lib_dir, declared) = self.packages.get(package)?;
        if !self.runtime.is_dir(lib_dir) {
            debug!("Package {} not present at {:?}", package, lib_dir);
            return None;
        }
        if let Some(version) = declared {
            return Some(version.clone());
        }

        let version_file = lib_dir.join(VERSION_FILE);
        match self.runtime.read_to_string(&version_file) {
            Ok(content) => {
                let version = content.trim();
                (!version.is_empty()).then(|| version.to_string())
            }
            Err(e) => {
                warn!("Package {} has no readable version: {:#}", package, e);
                None
            }
        }
    }
}
