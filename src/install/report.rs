use std::error::Error as _;
use std::fmt;

use crate::error::InstallError;

/// Why a package was not installed on this pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NotPresent,
    UpToDate,
}

/// What one install pass did for a package.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InstallStats {
    pub dirs_created: usize,
    pub links_created: usize,
    pub archives_extracted: usize,
    pub files_written: usize,
}

#[derive(Debug)]
pub enum PackageOutcome {
    Skipped(SkipReason),
    Installed(InstallStats),
    /// The marker was withheld; the package is retried on the next run.
    Failed(Vec<InstallError>),
}

#[derive(Debug)]
pub struct PackageReport {
    pub name: String,
    pub version: Option<String>,
    pub outcome: PackageOutcome,
}

impl PackageReport {
    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, PackageOutcome::Failed(_))
    }

    pub fn is_installed(&self) -> bool {
        matches!(self.outcome, PackageOutcome::Installed(_))
    }
}

impl fmt::Display for PackageReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(version) => write!(f, "{} {}: ", self.name, version)?,
            None => write!(f, "{}: ", self.name)?,
        }
        match &self.outcome {
            PackageOutcome::Skipped(SkipReason::NotPresent) => write!(f, "skipped (not present)"),
            PackageOutcome::Skipped(SkipReason::UpToDate) => write!(f, "skipped (up to date)"),
            PackageOutcome::Installed(stats) => write!(
                f,
                "installed ({} dirs, {} links, {} archives, {} files)",
                stats.dirs_created,
                stats.links_created,
                stats.archives_extracted,
                stats.files_written
            ),
            PackageOutcome::Failed(errors) => {
                write!(f, "failed")?;
                for error in errors {
                    write!(f, "\n    ")?;
                    write_error(f, error)?;
                }
                Ok(())
            }
        }
    }
}

/// `[kind] message: cause: cause...`
pub fn write_error(f: &mut impl fmt::Write, error: &InstallError) -> fmt::Result {
    write!(f, "[{}] {}", error.kind(), error)?;
    let mut source = error.source();
    while let Some(cause) = source {
        write!(f, ": {}", cause)?;
        source = cause.source();
    }
    Ok(())
}

/// Result of one orchestration pass.
#[derive(Debug, Default)]
pub struct RunReport {
    pub packages: Vec<PackageReport>,
    /// Errors not tied to a single package (root preparation, ownership)
    pub root_errors: Vec<InstallError>,
}

impl RunReport {
    /// True when every package is installed or skipped and nothing failed at root level.
    pub fn ready(&self) -> bool {
        self.root_errors.is_empty() && !self.packages.iter().any(PackageReport::is_failed)
    }

    pub fn any_installed(&self) -> bool {
        self.packages.iter().any(PackageReport::is_installed)
    }

    pub fn failed(&self) -> impl Iterator<Item = &PackageReport> {
        self.packages.iter().filter(|p| p.is_failed())
    }

    pub fn package(&self, name: &str) -> Option<&PackageReport> {
        self.packages.iter().find(|p| p.name == name)
    }
}
