use log::{debug, info, warn};
use std::path::{Path, PathBuf};

use crate::archive::{ArchiveExtractor, ExtractOutcome, Extractor, UnzipLedger};
use crate::config::{Config, PackageSpec};
use crate::error::{InstallError, StepResult};
use crate::gate::{GateDecision, VersionGate};
use crate::handoff::clean_scratch;
use crate::manifest::{LinkEntry, PathRewriter, read_dir_manifest, read_link_manifest};
use crate::materialize::{ensure_dir, ensure_link};
use crate::naming::FileRole;
use crate::provider::VersionProvider;
use crate::runtime::Runtime;

use super::ownership::apply_owner;
use super::prepare::prepare_root;
use super::report::{InstallStats, PackageOutcome, PackageReport, RunReport, SkipReason};

/// Runs one install pass over every package in the plan.
pub struct InstallOrchestrator<R: Runtime, P: VersionProvider, E: Extractor> {
    runtime: R,
    provider: P,
    extractor: E,
    config: Config,
}

impl<R: Runtime + 'static, P: VersionProvider, E: Extractor> InstallOrchestrator<R, P, E> {
    #[tracing::instrument(skip(runtime, provider, extractor, config))]
    pub fn new(runtime: R, provider: P, extractor: E, config: Config) -> Self {
        Self {
            runtime,
            provider,
            extractor,
            config,
        }
    }

    /// Process every package in declared order.
    ///
    /// A failing package never stops the ones after it. The pass consumes the
    /// orchestrator, so one instance cannot run twice.
    #[tracing::instrument(skip(self))]
    pub fn run(self) -> RunReport {
        let Self {
            runtime,
            provider,
            extractor,
            config,
        } = self;

        let gate = VersionGate::new(&runtime, &config.install_root);
        let mut report = RunReport {
            root_errors: prepare_root(&runtime, &config, &gate, &provider),
            ..RunReport::default()
        };

        let steps = PackageSteps {
            runtime: &runtime,
            config: &config,
            rewriter: PathRewriter::new(config.canonical_prefix(), &config.install_root),
            archives: ArchiveExtractor::new(
                &runtime,
                extractor,
                &config.naming,
                UnzipLedger::new(&runtime, config.unzipped_dir()),
                &config.permissions,
            ),
        };

        for package in &config.packages {
            let package_report = match gate.check(&provider, &package.name) {
                GateDecision::NotPresent => PackageReport {
                    name: package.name.clone(),
                    version: None,
                    outcome: PackageOutcome::Skipped(SkipReason::NotPresent),
                },
                GateDecision::UpToDate { version } => PackageReport {
                    name: package.name.clone(),
                    version: Some(version),
                    outcome: PackageOutcome::Skipped(SkipReason::UpToDate),
                },
                GateDecision::Required { version } => {
                    info!("Installing {} {}", package.name, version);
                    let outcome = match steps.install(package) {
                        Ok(stats) => match gate.mark_installed(&package.name, &version) {
                            Ok(()) => PackageOutcome::Installed(stats),
                            Err(e) => PackageOutcome::Failed(vec![e]),
                        },
                        Err(errors) => PackageOutcome::Failed(errors),
                    };
                    if let PackageOutcome::Failed(errors) = &outcome {
                        warn!(
                            "{} {} failed with {} error(s); it will be retried on the next run",
                            package.name,
                            version,
                            errors.len()
                        );
                    }
                    PackageReport {
                        name: package.name.clone(),
                        version: Some(version),
                        outcome,
                    }
                }
            };
            report.packages.push(package_report);
        }

        if let Some(owner) = &config.permissions.owner
            && report.any_installed()
            && let Err(e) = apply_owner(&runtime, owner, &config.install_root)
        {
            report.root_errors.push(e);
        }

        if report.ready()
            && let Some(scratch) = config.scratch_dir()
        {
            clean_scratch(&runtime, &scratch);
        }
        report
    }
}

/// The per-package install steps, sharing one rewriter and one archive extractor.
struct PackageSteps<'a, R: Runtime, E: Extractor> {
    runtime: &'a R,
    config: &'a Config,
    rewriter: PathRewriter,
    archives: ArchiveExtractor<'a, R, E>,
}

impl<R: Runtime + 'static, E: Extractor> PackageSteps<'_, R, E> {
    /// Directories first; if any directory fails nothing else is attempted.
    /// Link and archive errors are collected and the remaining work still runs.
    #[tracing::instrument(skip(self, package), fields(package = %package.name))]
    fn install(&self, package: &PackageSpec) -> Result<InstallStats, Vec<InstallError>> {
        let mut stats = InstallStats::default();
        let mut errors = Vec::new();

        self.materialize_dirs(package, &mut stats, &mut errors);
        if !errors.is_empty() {
            return Err(errors);
        }

        let naming = &self.config.naming;
        for manifest in [&naming.file_manifest, &naming.link_manifest] {
            self.materialize_links(&package.lib_dir.join(manifest), &mut stats, &mut errors);
        }

        match self.scan_lib_dir(&package.lib_dir) {
            Ok(files) => {
                for (path, role) in files {
                    let result = match role {
                        FileRole::AutoLink => self.auto_link(&path, &mut stats),
                        FileRole::Archive => self.extract(&path, &mut stats),
                        FileRole::Manifest | FileRole::Other => Ok(()),
                    };
                    if let Err(e) = result {
                        warn!("{}: {}", package.name, e);
                        errors.push(e);
                    }
                }
            }
            Err(e) => errors.push(e),
        }

        if errors.is_empty() {
            Ok(stats)
        } else {
            Err(errors)
        }
    }

    fn materialize_dirs(
        &self,
        package: &PackageSpec,
        stats: &mut InstallStats,
        errors: &mut Vec<InstallError>,
    ) {
        let manifest = package.lib_dir.join(&self.config.naming.dir_manifest);
        let entries = match read_dir_manifest(self.runtime, &manifest, &self.rewriter) {
            Ok(entries) => entries,
            Err(e) => {
                errors.push(e);
                return;
            }
        };

        let dir_mode = self.config.permissions.dir_mode;
        for entry in entries {
            match entry.and_then(|dir| ensure_dir(self.runtime, &dir, dir_mode)) {
                Ok(created) => stats.dirs_created += created,
                Err(e) => errors.push(e),
            }
        }
    }

    fn materialize_links(
        &self,
        manifest: &Path,
        stats: &mut InstallStats,
        errors: &mut Vec<InstallError>,
    ) {
        let entries = match read_link_manifest(self.runtime, manifest, &self.rewriter) {
            Ok(entries) => entries,
            Err(e) => {
                errors.push(e);
                return;
            }
        };

        for entry in entries {
            let linked = entry
                .and_then(|LinkEntry { target, link }| ensure_link(self.runtime, &target, &link));
            match linked {
                Ok(()) => stats.links_created += 1,
                Err(e) => errors.push(e),
            }
        }
    }

    /// Files in the library directory with a role, sorted by name.
    fn scan_lib_dir(&self, lib_dir: &Path) -> StepResult<Vec<(PathBuf, FileRole)>> {
        let mut entries = self
            .runtime
            .read_dir(lib_dir)
            .map_err(|e| InstallError::filesystem("read directory", lib_dir, e))?;
        entries.sort();

        Ok(entries
            .into_iter()
            .filter_map(|path| {
                let role = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| self.config.naming.classify(n))?;
                Some((path, role))
            })
            .collect())
    }

    fn auto_link(&self, source: &Path, stats: &mut InstallStats) -> StepResult<()> {
        let Some(filename) = source.file_name().and_then(|n| n.to_str()) else {
            return Ok(());
        };
        let name = match self.config.naming.decode_auto_link_name(filename) {
            Ok(name) => name,
            Err(e) => {
                warn!("Not creating a link for {:?}: {:#}", source, e);
                return Ok(());
            }
        };

        let link = self.config.install_root.join(name.relative_path());
        if let Some(parent) = link.parent() {
            stats.dirs_created +=
                ensure_dir(self.runtime, parent, self.config.permissions.dir_mode)?;
        }
        debug!("Auto-linking {:?} -> {:?}", link, source);
        ensure_link(self.runtime, source, &link)?;
        stats.links_created += 1;
        Ok(())
    }

    fn extract(&self, archive: &Path, stats: &mut InstallStats) -> StepResult<()> {
        match self.archives.extract(archive, self.config.extraction_root())? {
            ExtractOutcome::AlreadyExtracted => {}
            ExtractOutcome::Extracted(unpacked) => {
                stats.archives_extracted += 1;
                stats.dirs_created += unpacked.dirs_created;
                stats.files_written += unpacked.files_written;
            }
        }
        Ok(())
    }
}
