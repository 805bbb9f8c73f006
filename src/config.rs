//! Install plan loaded from JSON.

use anyhow::{Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::naming::NamingScheme;
use crate::permissions::PermissionPolicy;
use crate::runtime::Runtime;

/// Environment variable overriding the install root
pub const ROOT_ENV: &str = "RTUNPACK_ROOT";

/// Environment variable pointing at the install plan
pub const CONFIG_ENV: &str = "RTUNPACK_CONFIG";

/// File name of the install plan inside the default root
pub const CONFIG_FILE: &str = "rtunpack.json";

/// One package to ensure-installed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageSpec {
    pub name: String,
    /// Directory holding the package's manifests, auto-link sources and archives
    pub lib_dir: PathBuf,
    /// Version of the package; when absent a `VERSION` file in `lib_dir` is used
    #[serde(default)]
    pub version: Option<String>,
}

/// Clean-up performed when the trigger package is (re)installed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpgradePolicy {
    /// Package whose pending install marks a major upgrade
    pub trigger: Option<String>,
    /// Paths under the install root removed on a major upgrade
    pub purge: Vec<PathBuf>,
    /// Scratch directory under the install root, emptied before handoff
    pub scratch_dir: Option<PathBuf>,
}

/// What the caller should launch once installation is complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchSpec {
    pub program: PathBuf,
    #[serde(default)]
    pub library_dirs: Vec<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub install_root: PathBuf,
    /// Prefix manifests were written against; defaults to the install root
    #[serde(default)]
    pub canonical_prefix: Option<PathBuf>,
    /// Where archives are unpacked; defaults to the install root
    #[serde(default)]
    pub extraction_root: Option<PathBuf>,
    #[serde(default = "default_unzipped_dir")]
    pub unzipped_dir: String,
    #[serde(default)]
    pub packages: Vec<PackageSpec>,
    #[serde(default)]
    pub permissions: PermissionPolicy,
    #[serde(default)]
    pub naming: NamingScheme,
    #[serde(default)]
    pub upgrade: UpgradePolicy,
    /// Empty files created under the install root if missing
    #[serde(default)]
    pub rc_files: Vec<PathBuf>,
    #[serde(default)]
    pub launch: Option<LaunchSpec>,
}

fn default_unzipped_dir() -> String {
    "alreadyUnzipped".to_string()
}

impl Config {
    /// A plan with defaults everywhere and no packages.
    pub fn new(install_root: impl Into<PathBuf>) -> Self {
        Self {
            install_root: install_root.into(),
            canonical_prefix: None,
            extraction_root: None,
            unzipped_dir: default_unzipped_dir(),
            packages: Vec::new(),
            permissions: PermissionPolicy::default(),
            naming: NamingScheme::default(),
            upgrade: UpgradePolicy::default(),
            rc_files: Vec::new(),
            launch: None,
        }
    }

    #[tracing::instrument(skip(runtime))]
    pub fn load<R: Runtime>(runtime: &R, path: &Path) -> Result<Self> {
        let content = runtime
            .read_to_string(path)
            .with_context(|| format!("Failed to read install plan {:?}", path))?;
        let config: Config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse install plan {:?}", path))?;
        debug!(
            "Loaded install plan with {} package(s) from {:?}",
            config.packages.len(),
            path
        );
        Ok(config)
    }

    pub fn with_root_override(mut self, root: Option<PathBuf>) -> Self {
        if let Some(root) = root {
            info!("Using install root override: {}", root.display());
            self.install_root = root;
        }
        self
    }

    pub fn canonical_prefix(&self) -> &Path {
        self.canonical_prefix.as_deref().unwrap_or(&self.install_root)
    }

    pub fn extraction_root(&self) -> &Path {
        self.extraction_root.as_deref().unwrap_or(&self.install_root)
    }

    pub fn unzipped_dir(&self) -> PathBuf {
        self.install_root.join(&self.unzipped_dir)
    }

    pub fn scratch_dir(&self) -> Option<PathBuf> {
        self.upgrade
            .scratch_dir
            .as_ref()
            .map(|dir| self.install_root.join(dir))
    }
}

/// Default install root: system-wide when privileged, per-user otherwise.
#[tracing::instrument(skip(runtime))]
pub fn default_install_root<R: Runtime>(runtime: &R) -> Result<PathBuf> {
    if runtime.is_privileged() {
        Ok(system_install_root())
    } else {
        let home_dir = runtime
            .home_dir()
            .context("Could not find home directory")?;
        Ok(home_dir.join(".rtunpack"))
    }
}

#[cfg(target_os = "windows")]
fn system_install_root() -> PathBuf {
    PathBuf::from(r"C:\ProgramData\rtunpack")
}

#[cfg(not(target_os = "windows"))]
fn system_install_root() -> PathBuf {
    PathBuf::from("/usr/local/rtunpack")
}

/// Resolve the install plan path: explicit flag/env first, then `<default root>/rtunpack.json`.
pub fn resolve_config_path<R: Runtime>(runtime: &R, explicit: Option<PathBuf>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path),
        None => Ok(default_install_root(runtime)?.join(CONFIG_FILE)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::MockRuntime;
    use crate::test_utils::{configure_mock_runtime_basics, test_home};

    const PLAN: &str = r#"{
        "install_root": "/data/data/com.octave",
        "canonical_prefix": "/data/data/com.octave/",
        "packages": [
            { "name": "com.octave", "lib_dir": "/data/app-lib/com.octave", "version": "3.8.1" },
            { "name": "com.octave.signal", "lib_dir": "/data/app-lib/com.octave.signal" }
        ],
        "permissions": { "dir_mode": "0777", "file_mode": "0755" },
        "upgrade": {
            "trigger": "com.octave",
            "purge": ["bin", "mylib", "unzippedFiles", "freeRoot"],
            "scratch_dir": "tmp"
        },
        "rc_files": [".octaverc"],
        "launch": { "program": "bin/octave", "library_dirs": ["lib"] }
    }"#;

    #[test]
    fn test_load_full_plan() {
        let mut runtime = MockRuntime::new();
        runtime
            .expect_read_to_string()
            .returning(|_| Ok(PLAN.to_string()));

        let config = Config::load(&runtime, Path::new("/etc/rtunpack.json")).unwrap();
        assert_eq!(config.packages.len(), 2);
        assert_eq!(config.packages[1].version, None);
        assert_eq!(config.permissions.dir_mode, 0o777);
        assert_eq!(config.unzipped_dir(), PathBuf::from("/data/data/com.octave/alreadyUnzipped"));
        assert_eq!(config.scratch_dir(), Some(PathBuf::from("/data/data/com.octave/tmp")));
        assert_eq!(config.extraction_root(), Path::new("/data/data/com.octave"));
        assert_eq!(config.naming, NamingScheme::default());
    }

    #[test]
    fn test_minimal_plan_defaults() {
        let mut runtime = MockRuntime::new();
        runtime
            .expect_read_to_string()
            .returning(|_| Ok(r#"{ "install_root": "/rt" }"#.to_string()));

        let config = Config::load(&runtime, Path::new("plan.json")).unwrap();
        assert_eq!(config, Config::new("/rt"));
        assert_eq!(config.canonical_prefix(), Path::new("/rt"));
    }

    #[test]
    fn test_load_invalid_json() {
        let mut runtime = MockRuntime::new();
        runtime
            .expect_read_to_string()
            .returning(|_| Ok("{ not json".to_string()));

        let err = Config::load(&runtime, Path::new("plan.json")).unwrap_err();
        assert!(err.to_string().contains("Failed to parse install plan"));
    }

    #[test]
    fn test_root_override() {
        let config = Config::new("/rt").with_root_override(Some(PathBuf::from("/tmp/rt")));
        assert_eq!(config.install_root, PathBuf::from("/tmp/rt"));
        let config = Config::new("/rt").with_root_override(None);
        assert_eq!(config.install_root, PathBuf::from("/rt"));
    }

    #[test]
    fn test_default_config_path_for_user() {
        let mut runtime = MockRuntime::new();
        configure_mock_runtime_basics(&mut runtime);

        let path = resolve_config_path(&runtime, None).unwrap();
        assert_eq!(path, test_home().join(".rtunpack").join(CONFIG_FILE));

        let explicit = resolve_config_path(&runtime, Some(PathBuf::from("/x.json"))).unwrap();
        assert_eq!(explicit, PathBuf::from("/x.json"));
    }

    #[test]
    #[cfg(not(target_os = "windows"))]
    fn test_default_root_when_privileged() {
        let mut runtime = MockRuntime::new();
        runtime.expect_is_privileged().returning(|| true);
        assert_eq!(
            default_install_root(&runtime).unwrap(),
            PathBuf::from("/usr/local/rtunpack")
        );
    }
}
