//! Path utility functions for normalization and containment checks.

use std::path::{Component, Path, PathBuf};

/// Normalize a path by processing `.` and `..` components lexically.
/// This does not access the filesystem and does not follow symlinks.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match result.components().next_back() {
                Some(Component::Normal(_)) => {
                    result.pop();
                }
                // `..` at the root stays at the root
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => result.push(component),
            },
            _ => result.push(component),
        }
    }
    result
}

/// Check if `path` is `dir` or lies beneath it, comparing normalized components.
///
/// `/data/rt/lib/../../etc` is NOT under `/data/rt`, and `/data/rt-old` is not
/// under `/data/rt` either.
pub fn is_path_under(path: &Path, dir: &Path) -> bool {
    let path = normalize_path(path);
    let dir = normalize_path(dir);
    path.starts_with(&dir)
}

/// Resolve `path` against `root` if it is relative, then normalize it.
pub fn resolve_under(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        normalize_path(path)
    } else {
        normalize_path(&root.join(path))
    }
}
