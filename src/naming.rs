//! Filename conventions used by packages to describe their payload.
//!
//! A package's library directory carries three kinds of encoded files:
//! manifests (`lib__install_dir.so` and friends), auto-link sources
//! (`lib__<subdir>__<name>__<ext...>.so`) and archives
//! (`libzip<identity>_<tag>.so`).

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Separator between segments of an auto-link name
pub const SEGMENT_DELIMITER: &str = "__";

/// Separator between the identity token and the rest of an archive name
pub const IDENTITY_DELIMITER: char = '_';

/// Naming convention in force for a set of packages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingScheme {
    pub dir_manifest: String,
    pub file_manifest: String,
    pub link_manifest: String,
    pub auto_link_prefix: String,
    pub archive_prefix: String,
    pub suffix: String,
}

impl Default for NamingScheme {
    fn default() -> Self {
        Self {
            dir_manifest: "lib__install_dir.so".to_string(),
            file_manifest: "lib__install_file.so".to_string(),
            link_manifest: "lib__install_link.so".to_string(),
            auto_link_prefix: "lib__".to_string(),
            archive_prefix: "libzip".to_string(),
            suffix: ".so".to_string(),
        }
    }
}

/// Where an auto-link source file must be linked from, relative to the install root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoLinkName {
    pub dest_subdir: String,
    pub dest_name: String,
}

impl AutoLinkName {
    pub fn relative_path(&self) -> PathBuf {
        PathBuf::from(&self.dest_subdir).join(&self.dest_name)
    }
}

/// How a file in a package's library directory should be treated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileRole {
    Manifest,
    AutoLink,
    Archive,
    Other,
}

impl NamingScheme {
    pub fn is_manifest(&self, filename: &str) -> bool {
        filename == self.dir_manifest
            || filename == self.file_manifest
            || filename == self.link_manifest
    }

    pub fn classify(&self, filename: &str) -> FileRole {
        if self.is_manifest(filename) {
            FileRole::Manifest
        } else if filename.starts_with(&self.archive_prefix) {
            FileRole::Archive
        } else if filename.starts_with(&self.auto_link_prefix) {
            FileRole::AutoLink
        } else {
            FileRole::Other
        }
    }

    /// Decode `lib__signal__libfoo__so__1` into subdir `signal` and name `libfoo.so.1`.
    /// A trailing suffix (`.so`) is stripped before splitting.
    pub fn decode_auto_link_name(&self, filename: &str) -> Result<AutoLinkName> {
        let Some(body) = filename.strip_prefix(&self.auto_link_prefix) else {
            bail!(
                "'{}' does not start with '{}'",
                filename,
                self.auto_link_prefix
            );
        };
        let body = body.strip_suffix(&self.suffix).unwrap_or(body);

        let segments: Vec<&str> = body.split(SEGMENT_DELIMITER).collect();
        if segments.len() < 2 {
            bail!(
                "'{}' needs at least a destination directory and a name",
                filename
            );
        }
        if let Some(bad) = segments.iter().find(|s| !is_plain_segment(s)) {
            bail!("'{}' has an unusable segment '{}'", filename, bad);
        }

        Ok(AutoLinkName {
            dest_subdir: segments[0].to_string(),
            dest_name: segments[1..].join("."),
        })
    }

    /// Recover the identity token of `libzip<identity>_<tag>.so`.
    pub fn decode_archive_identity(&self, filename: &str) -> Result<String> {
        let Some(body) = filename.strip_prefix(&self.archive_prefix) else {
            bail!("'{}' does not start with '{}'", filename, self.archive_prefix);
        };
        let body = body.strip_suffix(&self.suffix).unwrap_or(body);

        let identity = body.split(IDENTITY_DELIMITER).next().unwrap_or_default();
        if !is_plain_segment(identity) {
            bail!("'{}' has no usable identity token", filename);
        }
        Ok(identity.to_string())
    }
}

/// A segment must name exactly one path component.
fn is_plain_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment != "."
        && segment != ".."
        && !segment.contains('/')
        && !segment.contains('\\')
}
