//! Per-package version markers.
//!
//! `<install_root>/<package>.<version>` is an empty file whose existence is
//! the only record that a package is installed at that version.

use log::debug;
use std::path::{Path, PathBuf};

use crate::error::{InstallError, StepResult};
use crate::provider::VersionProvider;
use crate::runtime::Runtime;

/// What the gate decided for one package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// The metadata provider does not know the package; nothing to do.
    NotPresent,
    UpToDate { version: String },
    Required { version: String },
}

pub struct VersionGate<'a, R: Runtime> {
    runtime: &'a R,
    install_root: PathBuf,
}

impl<'a, R: Runtime> VersionGate<'a, R> {
    pub fn new(runtime: &'a R, install_root: impl Into<PathBuf>) -> Self {
        Self {
            runtime,
            install_root: install_root.into(),
        }
    }

    pub fn marker_path(&self, package: &str, version: &str) -> PathBuf {
        self.install_root.join(format!("{}.{}", package, version))
    }

    /// True iff no marker exists for this exact version.
    pub fn needs_install(&self, package: &str, version: &str) -> bool {
        !self.runtime.exists(&self.marker_path(package, version))
    }

    /// Resolve the package's version and check its marker.
    #[tracing::instrument(skip(self, provider))]
    pub fn check(&self, provider: &dyn VersionProvider, package: &str) -> GateDecision {
        let Some(version) = provider.version_of(package) else {
            debug!("{} is not present, nothing to install", package);
            return GateDecision::NotPresent;
        };
        if self.needs_install(package, &version) {
            debug!("{} {} needs install", package, version);
            GateDecision::Required { version }
        } else {
            debug!("{} {} is up to date", package, version);
            GateDecision::UpToDate { version }
        }
    }

    /// Record that `package` is installed at `version`. No-op if already recorded.
    #[tracing::instrument(skip(self))]
    pub fn mark_installed(&self, package: &str, version: &str) -> StepResult<()> {
        let marker = self.marker_path(package, version);
        if self.runtime.exists(&marker) {
            return Ok(());
        }
        touch(self.runtime, &marker)
    }
}

pub(crate) fn touch<R: Runtime>(runtime: &R, path: &Path) -> StepResult<()> {
    runtime
        .write(path, b"")
        .map_err(|e| InstallError::filesystem("create marker", path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MockVersionProvider;
    use crate::runtime::{MockRuntime, RealRuntime};
    use mockall::predicate::eq;
    use tempfile::tempdir;

    #[test]
    fn test_marker_path() {
        let runtime = MockRuntime::new();
        let gate = VersionGate::new(&runtime, "/rt");
        assert_eq!(
            gate.marker_path("com.octave.signal", "1.2.0"),
            PathBuf::from("/rt/com.octave.signal.1.2.0")
        );
    }

    #[test]
    fn test_gate_lifecycle() {
        let dir = tempdir().unwrap();
        let gate = VersionGate::new(&RealRuntime, dir.path());

        assert!(gate.needs_install("com.octave", "1"));
        gate.mark_installed("com.octave", "1").unwrap();
        assert!(!gate.needs_install("com.octave", "1"));
        assert!(gate.needs_install("com.octave", "2"));

        // Idempotent
        gate.mark_installed("com.octave", "1").unwrap();
        assert_eq!(
            std::fs::metadata(dir.path().join("com.octave.1")).unwrap().len(),
            0
        );
    }

    #[test]
    fn test_check_not_present() {
        let runtime = MockRuntime::new();
        let mut provider = MockVersionProvider::new();
        provider
            .expect_version_of()
            .with(eq("com.octave.io"))
            .returning(|_| None);

        let gate = VersionGate::new(&runtime, "/rt");
        assert_eq!(
            gate.check(&provider, "com.octave.io"),
            GateDecision::NotPresent
        );
    }

    #[test]
    fn test_check_required_and_up_to_date() {
        let mut runtime = MockRuntime::new();
        runtime
            .expect_exists()
            .with(eq(PathBuf::from("/rt/a.1")))
            .returning(|_| true);
        runtime
            .expect_exists()
            .with(eq(PathBuf::from("/rt/b.1")))
            .returning(|_| false);
        let mut provider = MockVersionProvider::new();
        provider
            .expect_version_of()
            .returning(|_| Some("1".to_string()));

        let gate = VersionGate::new(&runtime, "/rt");
        assert_eq!(
            gate.check(&provider, "a"),
            GateDecision::UpToDate {
                version: "1".into()
            }
        );
        assert_eq!(
            gate.check(&provider, "b"),
            GateDecision::Required {
                version: "1".into()
            }
        );
    }

    #[test]
    fn test_mark_installed_write_failure() {
        let mut runtime = MockRuntime::new();
        runtime.expect_exists().returning(|_| false);
        runtime
            .expect_write()
            .returning(|_, _| Err(anyhow::anyhow!("no space left on device")));

        let gate = VersionGate::new(&runtime, "/rt");
        assert!(matches!(
            gate.mark_installed("a", "1"),
            Err(InstallError::Filesystem { .. })
        ));
    }
}
