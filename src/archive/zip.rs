use anyhow::Context;
use log::{debug, info, warn};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use zip::ZipArchive;

use super::{Extractor, UnpackStats};
use crate::error::{InstallError, StepResult};
use crate::materialize::ensure_dir;
use crate::permissions::PermissionPolicy;
use crate::runtime::Runtime;

/// Size of the copy buffer between an archive entry and its destination file
pub const BUFFER_SIZE: usize = 8 * 1024;

/// Suffix of the temporary file an entry is streamed into before being renamed into place
pub const PART_SUFFIX: &str = "rtunpack-part";

/// Extractor for zip archives, whatever their file extension.
pub struct ZipExtractor;

impl Extractor for ZipExtractor {
    fn unpack<R: Runtime + 'static>(
        &self,
        runtime: &R,
        archive_path: &Path,
        extract_to: &Path,
        policy: &PermissionPolicy,
    ) -> StepResult<UnpackStats> {
        debug!("Extracting zip archive {:?} to {:?}", archive_path, extract_to);
        let io_error = |source: anyhow::Error| InstallError::ArchiveIo {
            archive: archive_path.to_path_buf(),
            source,
        };

        let file = runtime
            .open(archive_path)
            .with_context(|| format!("Failed to open archive at {:?}", archive_path))
            .map_err(io_error)?;
        let mut archive = ZipArchive::new(file)
            .context("Failed to parse ZIP archive")
            .map_err(io_error)?;

        let mut stats = UnpackStats::default();
        for i in 0..archive.len() {
            let mut entry = archive
                .by_index(i)
                .with_context(|| format!("Failed to read ZIP entry {}", i))
                .map_err(io_error)?;

            let Some(entry_path) = entry.enclosed_name().map(|p| p.to_path_buf()) else {
                warn!(
                    "Skipping entry {:?} in {:?}: path escapes the extraction root",
                    entry.name(),
                    archive_path
                );
                continue;
            };
            let full_path = extract_to.join(&entry_path);

            if entry.is_dir() {
                stats.dirs_created += ensure_dir(runtime, &full_path, policy.dir_mode)?;
                continue;
            }

            if runtime.exists(&full_path) || runtime.is_symlink(&full_path) {
                stats.files_skipped += 1;
                continue;
            }
            if let Some(parent) = full_path.parent() {
                stats.dirs_created += ensure_dir(runtime, parent, policy.dir_mode)?;
            }

            let part_path = part_path_for(&full_path);
            {
                let dest = runtime
                    .create_file(&part_path)
                    .map_err(|e| InstallError::filesystem("create file", &part_path, e))?;
                let mut writer = BufWriter::with_capacity(BUFFER_SIZE, dest);
                std::io::copy(&mut entry, &mut writer)
                    .and_then(|_| writer.flush())
                    .with_context(|| format!("Failed to extract {:?}", entry_path))
                    .map_err(io_error)?;
            }
            runtime
                .set_permissions(&part_path, policy.file_mode)
                .map_err(|e| InstallError::filesystem("set file permissions", &part_path, e))?;
            runtime
                .rename(&part_path, &full_path)
                .map_err(|e| InstallError::filesystem("move extracted file", &full_path, e))?;
            stats.files_written += 1;
        }

        info!(
            "Extracted {:?}: {} written, {} already present",
            archive_path, stats.files_written, stats.files_skipped
        );
        Ok(stats)
    }
}

fn part_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".");
    name.push(PART_SUFFIX);
    path.with_file_name(name)
}
