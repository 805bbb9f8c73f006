use std::path::{Path, PathBuf};

use crate::error::{InstallError, StepResult};
use crate::gate::touch;
use crate::materialize::ensure_dir;
use crate::runtime::Runtime;

const PARTIAL_SUFFIX: &str = ".partial";

/// Records which archives have been extracted.
///
/// `<dir>/<archive name>` marks a completed extraction.
/// `<dir>/<archive name>.partial` marks one that started but has not finished.
pub struct UnzipLedger<'a, R: Runtime> {
    runtime: &'a R,
    dir: PathBuf,
}

impl<'a, R: Runtime> UnzipLedger<'a, R> {
    pub fn new(runtime: &'a R, dir: impl Into<PathBuf>) -> Self {
        Self {
            runtime,
            dir: dir.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn done_marker(&self, archive_name: &str) -> PathBuf {
        self.dir.join(archive_name)
    }

    fn partial_marker(&self, archive_name: &str) -> PathBuf {
        self.dir.join(format!("{}{}", archive_name, PARTIAL_SUFFIX))
    }

    pub fn is_extracted(&self, archive_name: &str) -> bool {
        self.runtime.exists(&self.done_marker(archive_name))
    }

    pub fn is_in_progress(&self, archive_name: &str) -> bool {
        self.runtime.exists(&self.partial_marker(archive_name))
    }

    pub fn begin(&self, archive_name: &str, dir_mode: u32) -> StepResult<()> {
        ensure_dir(self.runtime, &self.dir, dir_mode)?;
        touch(self.runtime, &self.partial_marker(archive_name))
    }

    pub fn finish(&self, archive_name: &str) -> StepResult<()> {
        touch(self.runtime, &self.done_marker(archive_name))?;
        let partial = self.partial_marker(archive_name);
        if self.runtime.exists(&partial) {
            self.runtime
                .remove_file(&partial)
                .map_err(|e| InstallError::filesystem("remove marker", &partial, e))?;
        }
        Ok(())
    }
}
