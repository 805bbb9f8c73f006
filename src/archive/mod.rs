//! Archive extraction with identity-scoped stale-content removal.

mod ledger;
mod zip;

pub use ledger::UnzipLedger;
pub use zip::{BUFFER_SIZE, ZipExtractor};

use log::{debug, info};
use std::path::Path;

use crate::error::{InstallError, StepResult};
use crate::naming::NamingScheme;
use crate::permissions::PermissionPolicy;
use crate::runtime::{Runtime, is_path_under};

/// Counters for one unpack pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnpackStats {
    pub dirs_created: usize,
    pub files_written: usize,
    pub files_skipped: usize,
}

/// Format-specific streaming of archive entries to disk.
///
/// Entries whose destination already exists are skipped, so an interrupted
/// unpack can be resumed by running it again.
#[cfg_attr(test, mockall::automock)]
pub trait Extractor: Send + Sync {
    fn unpack<R: Runtime + 'static>(
        &self,
        runtime: &R,
        archive_path: &Path,
        extract_to: &Path,
        policy: &PermissionPolicy,
    ) -> StepResult<UnpackStats>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractOutcome {
    /// The ledger says this archive was already extracted.
    AlreadyExtracted,
    Extracted(UnpackStats),
}

/// Extracts package archives at most once each.
///
/// A fresh extraction first deletes `<extraction_root>/<identity>` so content
/// left by an older archive with the same identity cannot survive. A resumed
/// extraction (one with an in-progress record) keeps what is already there.
pub struct ArchiveExtractor<'a, R: Runtime, E: Extractor> {
    runtime: &'a R,
    extractor: E,
    naming: &'a NamingScheme,
    ledger: UnzipLedger<'a, R>,
    policy: &'a PermissionPolicy,
}

impl<'a, R: Runtime + 'static, E: Extractor> ArchiveExtractor<'a, R, E> {
    pub fn new(
        runtime: &'a R,
        extractor: E,
        naming: &'a NamingScheme,
        ledger: UnzipLedger<'a, R>,
        policy: &'a PermissionPolicy,
    ) -> Self {
        Self {
            runtime,
            extractor,
            naming,
            ledger,
            policy,
        }
    }

    #[tracing::instrument(skip(self))]
    pub fn extract(
        &self,
        archive_path: &Path,
        extraction_root: &Path,
    ) -> StepResult<ExtractOutcome> {
        let archive_name = archive_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| InstallError::archive(archive_path, "archive name is not valid UTF-8"))?;

        if self.ledger.is_extracted(archive_name) {
            debug!("{} already extracted, skipping", archive_name);
            return Ok(ExtractOutcome::AlreadyExtracted);
        }

        let identity = self
            .naming
            .decode_archive_identity(archive_name)
            .map_err(|e| InstallError::archive(archive_path, format!("{:#}", e)))?;

        if self.ledger.is_in_progress(archive_name) {
            info!("Resuming interrupted extraction of {}", archive_name);
        } else {
            self.purge_identity(archive_path, &extraction_root.join(&identity))?;
            self.ledger.begin(archive_name, self.policy.dir_mode)?;
        }

        let stats = self
            .extractor
            .unpack(self.runtime, archive_path, extraction_root, self.policy)?;
        self.ledger.finish(archive_name)?;

        Ok(ExtractOutcome::Extracted(stats))
    }

    fn purge_identity(&self, archive_path: &Path, target: &Path) -> StepResult<()> {
        if is_path_under(self.ledger.dir(), target) {
            return Err(InstallError::archive(
                archive_path,
                format!("identity directory {:?} would contain the unzip ledger", target),
            ));
        }

        let removed = if self.runtime.is_symlink(target) {
            self.runtime.remove_symlink(target)
        } else if self.runtime.is_dir(target) {
            self.runtime.remove_dir_all(target)
        } else if self.runtime.exists(target) {
            self.runtime.remove_file(target)
        } else {
            return Ok(());
        };

        removed.map_err(|e| InstallError::filesystem("remove stale content", target, e))?;
        info!("Removed stale content at {:?}", target);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::runtime::{MockRuntime, RealRuntime};
    use anyhow::anyhow;
    use mockall::predicate::{always, eq};
    use std::fs::{self, File};
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::tempdir;
    use ::zip::ZipWriter;
    use ::zip::write::FileOptions;

    fn create_test_zip_archive(path: &Path, files: &[(&str, &str)]) {
        let file = File::create(path).unwrap();
        let mut zip = ZipWriter::new(file);
        let options: FileOptions<()> = FileOptions::default();
        for (name, content) in files {
            zip.start_file(*name, options).unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }

    fn files_under(root: &Path) -> Vec<PathBuf> {
        let mut found = Vec::new();
        let mut pending = vec![root.to_path_buf()];
        while let Some(dir) = pending.pop() {
            for entry in fs::read_dir(&dir).unwrap() {
                let path = entry.unwrap().path();
                if path.is_dir() {
                    pending.push(path);
                } else {
                    found.push(path.strip_prefix(root).unwrap().to_path_buf());
                }
            }
        }
        found.sort();
        found
    }

    #[test]
    fn test_extract_twice_writes_nothing_the_second_time() {
        let dir = tempdir().unwrap();
        let lib = dir.path().join("lib");
        let root = dir.path().join("rt");
        fs::create_dir_all(&lib).unwrap();
        fs::create_dir_all(&root).unwrap();
        let archive = lib.join("libzipoctave_1.so");
        create_test_zip_archive(
            &archive,
            &[("octave/bin/octave", "bin"), ("octave/lib/liboctave.so", "lib")],
        );

        let naming = NamingScheme::default();
        let policy = PermissionPolicy::default();
        let extractor = ArchiveExtractor::new(
            &RealRuntime,
            ZipExtractor,
            &naming,
            UnzipLedger::new(&RealRuntime, root.join("alreadyUnzipped")),
            &policy,
        );

        let first = extractor.extract(&archive, &root).unwrap();
        assert!(matches!(first, ExtractOutcome::Extracted(s) if s.files_written == 2));
        let after_first = files_under(&root);

        let second = extractor.extract(&archive, &root).unwrap();
        assert_eq!(second, ExtractOutcome::AlreadyExtracted);
        assert_eq!(files_under(&root), after_first);
    }

    #[test]
    fn test_stale_identity_subtree_is_purged() {
        let dir = tempdir().unwrap();
        let lib = dir.path().join("lib");
        let root = dir.path().join("rt");
        fs::create_dir_all(&lib).unwrap();
        fs::create_dir_all(&root).unwrap();

        let naming = NamingScheme::default();
        let policy = PermissionPolicy::default();
        let extractor = ArchiveExtractor::new(
            &RealRuntime,
            ZipExtractor,
            &naming,
            UnzipLedger::new(&RealRuntime, root.join("alreadyUnzipped")),
            &policy,
        );

        let old = lib.join("libzipoctave_1.so");
        create_test_zip_archive(
            &old,
            &[("octave/m/old_only.m", "old"), ("octave/m/shared.m", "v1")],
        );
        extractor.extract(&old, &root).unwrap();
        assert!(root.join("octave/m/old_only.m").exists());

        let new = lib.join("libzipoctave_2.so");
        create_test_zip_archive(&new, &[("octave/m/shared.m", "v2")]);
        extractor.extract(&new, &root).unwrap();

        assert_eq!(
            files_under(&root.join("octave")),
            vec![PathBuf::from("m/shared.m")]
        );
        assert_eq!(fs::read_to_string(root.join("octave/m/shared.m")).unwrap(), "v2");
    }

    #[test]
    fn test_interrupted_extraction_resumes_without_purge() {
        let dir = tempdir().unwrap();
        let lib = dir.path().join("lib");
        let root = dir.path().join("rt");
        fs::create_dir_all(&lib).unwrap();
        fs::create_dir_all(root.join("octave")).unwrap();
        fs::write(root.join("octave/done.txt"), "written before interruption").unwrap();

        let archive = lib.join("libzipoctave_1.so");
        create_test_zip_archive(
            &archive,
            &[("octave/done.txt", "from archive"), ("octave/todo.txt", "todo")],
        );

        let ledger_dir = root.join("alreadyUnzipped");
        fs::create_dir_all(&ledger_dir).unwrap();
        fs::write(ledger_dir.join("libzipoctave_1.so.partial"), "").unwrap();

        let naming = NamingScheme::default();
        let policy = PermissionPolicy::default();
        let extractor = ArchiveExtractor::new(
            &RealRuntime,
            ZipExtractor,
            &naming,
            UnzipLedger::new(&RealRuntime, &ledger_dir),
            &policy,
        );

        let outcome = extractor.extract(&archive, &root).unwrap();
        assert!(matches!(
            outcome,
            ExtractOutcome::Extracted(s) if s.files_written == 1 && s.files_skipped == 1
        ));
        assert_eq!(
            fs::read_to_string(root.join("octave/done.txt")).unwrap(),
            "written before interruption"
        );
        assert!(ledger_dir.join("libzipoctave_1.so").exists());
        assert!(!ledger_dir.join("libzipoctave_1.so.partial").exists());
    }

    #[test]
    fn test_undecodable_name_is_archive_error() {
        let mut runtime = MockRuntime::new();
        runtime.expect_exists().returning(|_| false);

        let naming = NamingScheme::default();
        let policy = PermissionPolicy::default();
        let extractor = ArchiveExtractor::new(
            &runtime,
            MockExtractor::new(),
            &naming,
            UnzipLedger::new(&runtime, "/rt/alreadyUnzipped"),
            &policy,
        );

        let err = extractor
            .extract(Path::new("/lib/libzip_1.so"), Path::new("/rt"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Archive);
    }

    #[test]
    fn test_identity_may_not_swallow_ledger() {
        let mut runtime = MockRuntime::new();
        runtime.expect_exists().returning(|_| false);

        let naming = NamingScheme::default();
        let policy = PermissionPolicy::default();
        let extractor = ArchiveExtractor::new(
            &runtime,
            MockExtractor::new(),
            &naming,
            UnzipLedger::new(&runtime, "/rt/state/alreadyUnzipped"),
            &policy,
        );

        let err = extractor
            .extract(Path::new("/lib/libzipstate_1.so"), Path::new("/rt"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Archive);
    }

    #[test]
    fn test_unpack_failure_leaves_ledger_in_progress() {
        let mut runtime = MockRuntime::new();
        let ledger_dir = PathBuf::from("/rt/alreadyUnzipped");

        runtime.expect_exists().returning(|_| false);
        runtime.expect_is_symlink().returning(|_| false);
        runtime
            .expect_is_dir()
            .with(eq(PathBuf::from("/rt/octave")))
            .returning(|_| false);
        runtime
            .expect_is_dir()
            .with(eq(ledger_dir.clone()))
            .returning(|_| true);
        runtime
            .expect_write()
            .with(eq(ledger_dir.join("libzipoctave_1.so.partial")), always())
            .times(1)
            .returning(|_, _| Ok(()));

        let mut unpacker = MockExtractor::new();
        unpacker
            .expect_unpack::<MockRuntime>()
            .times(1)
            .returning(|_, archive, _, _| {
                Err(InstallError::ArchiveIo {
                    archive: archive.to_path_buf(),
                    source: anyhow!("truncated"),
                })
            });

        let naming = NamingScheme::default();
        let policy = PermissionPolicy::default();
        let extractor = ArchiveExtractor::new(
            &runtime,
            unpacker,
            &naming,
            UnzipLedger::new(&runtime, &ledger_dir),
            &policy,
        );

        let err = extractor
            .extract(Path::new("/lib/libzipoctave_1.so"), Path::new("/rt"))
            .unwrap_err();
        assert!(matches!(err, InstallError::ArchiveIo { .. }));
    }
}
