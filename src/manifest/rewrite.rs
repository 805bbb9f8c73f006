use std::path::{Path, PathBuf};

use crate::runtime::resolve_under;

/// Maps manifest paths written against a canonical install prefix onto the
/// real install root. Only a leading prefix is rewritten, compared by path
/// component; the same text appearing later in a path is left alone.
#[derive(Debug, Clone)]
pub struct PathRewriter {
    canonical: PathBuf,
    install_root: PathBuf,
}

impl PathRewriter {
    pub fn new(canonical: impl Into<PathBuf>, install_root: impl Into<PathBuf>) -> Self {
        Self {
            canonical: canonical.into(),
            install_root: install_root.into(),
        }
    }

    pub fn install_root(&self) -> &Path {
        &self.install_root
    }

    /// Swap the canonical prefix for the install root. Paths without the prefix
    /// are returned unchanged.
    pub fn rewrite(&self, raw: &str) -> PathBuf {
        let path = Path::new(raw.trim());
        match path.strip_prefix(&self.canonical) {
            Ok(rest) if rest.as_os_str().is_empty() => self.install_root.clone(),
            Ok(rest) => self.install_root.join(rest),
            Err(_) => path.to_path_buf(),
        }
    }

    /// Rewrite, then anchor relative results at the install root.
    pub fn resolve(&self, raw: &str) -> PathBuf {
        resolve_under(&self.install_root, &self.rewrite(raw))
    }
}
