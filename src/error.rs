//! Error taxonomy for install steps.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// An error raised by one install step. Errors are collected per package and
/// never abort sibling packages.
#[derive(Error, Debug)]
pub enum InstallError {
    /// Directory/file creation, deletion or permission change failed
    #[error("{op} failed on '{}'", .path.display())]
    Filesystem {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    /// Archive name could not be decoded or an entry is unusable
    #[error("archive '{}': {reason}", .archive.display())]
    Archive { archive: PathBuf, reason: String },

    /// Archive could not be opened or read
    #[error("archive '{}' could not be read", .archive.display())]
    ArchiveIo {
        archive: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    /// A manifest line could not be parsed
    #[error("manifest '{}' line {line}: {reason}", .manifest.display())]
    Manifest {
        manifest: PathBuf,
        line: usize,
        reason: String,
    },

    /// A helper program exited non-zero or wrote to stderr
    #[error("{tool} exited with {} ({stderr})", exit_label(.status))]
    ExternalTool {
        tool: String,
        status: Option<i32>,
        stderr: String,
    },
}

fn exit_label(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!("status {}", code),
        None => "signal".to_string(),
    }
}

impl InstallError {
    pub fn filesystem(op: &'static str, path: impl Into<PathBuf>, source: anyhow::Error) -> Self {
        Self::Filesystem {
            op,
            path: path.into(),
            source,
        }
    }

    pub fn archive(archive: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Archive {
            archive: archive.into(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Filesystem { .. } => ErrorKind::Filesystem,
            Self::Archive { .. } | Self::ArchiveIo { .. } => ErrorKind::Archive,
            Self::Manifest { .. } => ErrorKind::Manifest,
            Self::ExternalTool { .. } => ErrorKind::ExternalTool,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Filesystem,
    Archive,
    Manifest,
    ExternalTool,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Filesystem => "filesystem",
            Self::Archive => "archive",
            Self::Manifest => "manifest",
            Self::ExternalTool => "external-tool",
        };
        f.write_str(name)
    }
}

pub type StepResult<T> = std::result::Result<T, InstallError>;
