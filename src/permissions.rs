//! Permission modes applied to everything the installer creates.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Modes applied at creation time only; pre-existing entries are never re-chmodded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PermissionPolicy {
    /// Mode for every directory the installer creates
    #[serde(with = "octal_mode")]
    pub dir_mode: u32,
    /// Mode for every regular file extracted from an archive
    #[serde(with = "octal_mode")]
    pub file_mode: u32,
    /// Mode for rc/config files created in the install root
    #[serde(with = "octal_mode")]
    pub config_mode: u32,
    /// Optional owner (`user` or `user:group`) applied recursively after install
    pub owner: Option<String>,
}

impl Default for PermissionPolicy {
    fn default() -> Self {
        Self {
            dir_mode: 0o777,
            file_mode: 0o755,
            config_mode: 0o666,
            owner: None,
        }
    }
}

/// Parse a mode written as `0755`, `0o755` or `755` (always octal).
pub fn parse_mode(text: &str) -> Option<u32> {
    let digits = text.trim();
    let digits = digits.strip_prefix("0o").unwrap_or(digits);
    if digits.is_empty() {
        return None;
    }
    let mode = u32::from_str_radix(digits, 8).ok()?;
    (mode <= 0o7777).then_some(mode)
}

/// Modes serialize as octal strings and deserialize from strings or plain integers.
mod octal_mode {
    use super::*;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(u32),
        Text(String),
    }

    pub fn serialize<S: Serializer>(mode: &u32, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("{:04o}", mode))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
        match Raw::deserialize(deserializer)? {
            Raw::Int(mode) if mode <= 0o7777 => Ok(mode),
            Raw::Int(mode) => Err(serde::de::Error::custom(format!(
                "permission mode {} out of range",
                mode
            ))),
            Raw::Text(text) => parse_mode(&text).ok_or_else(|| {
                serde::de::Error::custom(format!("invalid octal permission mode '{}'", text))
            }),
        }
    }
}
