//! Manifest files shipped in a package's library directory.
//!
//! - Directory list: one path per line, spaces included.
//! - Link list: one `<target> <link>` pair per line.
//!
//! Every path is passed through a [`PathRewriter`] before use. Blank lines are
//! ignored. Each line yields its own result so one bad line does not hide the
//! rest of the manifest.

mod rewrite;

pub use rewrite::PathRewriter;

use log::debug;
use std::path::{Path, PathBuf};

use crate::error::{InstallError, StepResult};
use crate::runtime::Runtime;

/// One symlink to materialize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkEntry {
    pub target: PathBuf,
    pub link: PathBuf,
}

/// Read a manifest's lines. A missing manifest yields `Ok(None)`.
fn read_lines<R: Runtime>(
    runtime: &R,
    manifest: &Path,
) -> StepResult<Option<Vec<(usize, String)>>> {
    if !runtime.exists(manifest) {
        debug!("No manifest at {:?}, skipping", manifest);
        return Ok(None);
    }
    let content = runtime
        .read_to_string(manifest)
        .map_err(|e| InstallError::filesystem("read manifest", manifest, e))?;

    Ok(Some(
        content
            .lines()
            .enumerate()
            .map(|(i, line)| (i + 1, line.trim().to_string()))
            .filter(|(_, line)| !line.is_empty())
            .collect(),
    ))
}

/// Parse a directory list into rewritten, root-anchored directory paths.
#[tracing::instrument(skip(runtime, rewriter))]
pub fn read_dir_manifest<R: Runtime>(
    runtime: &R,
    manifest: &Path,
    rewriter: &PathRewriter,
) -> StepResult<Vec<StepResult<PathBuf>>> {
    let Some(lines) = read_lines(runtime, manifest)? else {
        return Ok(Vec::new());
    };

    Ok(lines
        .into_iter()
        .map(|(_, line)| Ok(rewriter.resolve(&line)))
        .collect())
}

/// Parse a link list. Both the target and the link path are rewritten independently.
#[tracing::instrument(skip(runtime, rewriter))]
pub fn read_link_manifest<R: Runtime>(
    runtime: &R,
    manifest: &Path,
    rewriter: &PathRewriter,
) -> StepResult<Vec<StepResult<LinkEntry>>> {
    let Some(lines) = read_lines(runtime, manifest)? else {
        return Ok(Vec::new());
    };

    Ok(lines
        .into_iter()
        .map(|(number, line)| match parse_link_line(&line) {
            Some((target, link)) => Ok(LinkEntry {
                target: rewriter.resolve(target),
                link: rewriter.resolve(link),
            }),
            None => Err(InstallError::Manifest {
                manifest: manifest.to_path_buf(),
                line: number,
                reason: format!("expected '<target> <link>', got '{}'", line),
            }),
        })
        .collect())
}

fn parse_link_line(line: &str) -> Option<(&str, &str)> {
    let mut fields = line.split_whitespace();
    match (fields.next(), fields.next(), fields.next()) {
        (Some(target), Some(link), None) => Some((target, link)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::runtime::MockRuntime;
    use mockall::predicate::eq;

    fn manifest_runtime(path: &'static str, content: &'static str) -> MockRuntime {
        let mut runtime = MockRuntime::new();
        runtime
            .expect_exists()
            .with(eq(PathBuf::from(path)))
            .returning(|_| true);
        runtime
            .expect_read_to_string()
            .with(eq(PathBuf::from(path)))
            .returning(move |_| Ok(content.to_string()));
        runtime
    }

    #[test]
    fn test_dir_manifest_rewrites_and_skips_blank_lines() {
        let runtime = manifest_runtime(
            "/pkg/lib/lib__install_dir.so",
            "/data/data/com.octave/share\n\n  a/b  \n/data/data/com.octave/share/octave\n",
        );
        let rewriter = PathRewriter::new("/data/data/com.octave", "/rt");

        let entries = read_dir_manifest(
            &runtime,
            Path::new("/pkg/lib/lib__install_dir.so"),
            &rewriter,
        )
        .unwrap();

        let dirs: Vec<PathBuf> = entries.into_iter().map(|e| e.unwrap()).collect();
        assert_eq!(
            dirs,
            vec![
                PathBuf::from("/rt/share"),
                PathBuf::from("/rt/a/b"),
                PathBuf::from("/rt/share/octave"),
            ]
        );
    }

    #[test]
    fn test_dir_manifest_keeps_spaces_in_paths() {
        let runtime = manifest_runtime("/pkg/dirs", "/c/share/My Docs\n  /c/a b/c  \n");
        let rewriter = PathRewriter::new("/c", "/rt");

        let entries = read_dir_manifest(&runtime, Path::new("/pkg/dirs"), &rewriter).unwrap();

        let dirs: Vec<PathBuf> = entries.into_iter().map(|e| e.unwrap()).collect();
        assert_eq!(
            dirs,
            vec![PathBuf::from("/rt/share/My Docs"), PathBuf::from("/rt/a b/c")]
        );
    }

    #[test]
    fn test_missing_manifest_is_empty() {
        let mut runtime = MockRuntime::new();
        runtime.expect_exists().returning(|_| false);
        let rewriter = PathRewriter::new("/c", "/rt");

        let entries =
            read_link_manifest(&runtime, Path::new("/pkg/lib/none.so"), &rewriter).unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn test_link_manifest_rewrites_both_sides() {
        let runtime = manifest_runtime(
            "/pkg/lib/lib__install_link.so",
            "/data/data/com.octave/lib/libfoo.so.1 /data/data/com.octave/lib/libfoo.so\n",
        );
        let rewriter = PathRewriter::new("/data/data/com.octave", "/rt");

        let entries = read_link_manifest(
            &runtime,
            Path::new("/pkg/lib/lib__install_link.so"),
            &rewriter,
        )
        .unwrap();

        assert_eq!(entries.len(), 1);
        let entry = entries.into_iter().next().unwrap().unwrap();
        assert_eq!(entry.target, PathBuf::from("/rt/lib/libfoo.so.1"));
        assert_eq!(entry.link, PathBuf::from("/rt/lib/libfoo.so"));
    }

    #[test]
    fn test_link_manifest_reports_bad_lines_individually() {
        let runtime = manifest_runtime(
            "/pkg/links",
            "only-one-field\na/b/real.so a/c/alias.so\nx y z\n",
        );
        let rewriter = PathRewriter::new("/c", "/rt");

        let entries = read_link_manifest(&runtime, Path::new("/pkg/links"), &rewriter).unwrap();
        assert_eq!(entries.len(), 3);

        match &entries[0] {
            Err(err @ InstallError::Manifest { line, .. }) => {
                assert_eq!(*line, 1);
                assert_eq!(err.kind(), ErrorKind::Manifest);
            }
            other => panic!("expected manifest error, got {:?}", other),
        }
        assert!(entries[1].is_ok());
        assert!(matches!(entries[2], Err(InstallError::Manifest { line: 3, .. })));
    }

    #[test]
    fn test_unreadable_manifest_is_filesystem_error() {
        let mut runtime = MockRuntime::new();
        runtime.expect_exists().returning(|_| true);
        runtime
            .expect_read_to_string()
            .returning(|_| Err(anyhow::anyhow!("permission denied")));
        let rewriter = PathRewriter::new("/c", "/rt");

        let result = read_dir_manifest(&runtime, Path::new("/pkg/dirs"), &rewriter);
        assert!(matches!(result, Err(InstallError::Filesystem { .. })));
    }
}
