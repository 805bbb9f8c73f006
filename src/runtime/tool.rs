//! External program invocation.

use anyhow::{Context, Result};
use std::process::{Command, Stdio};

use super::{RealRuntime, ToolOutput};

impl RealRuntime {
    #[tracing::instrument(skip(self))]
    pub(crate) fn run_tool_impl(&self, program: &str, args: &[String]) -> Result<ToolOutput> {
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .with_context(|| format!("Failed to spawn {}", program))?;

        Ok(ToolOutput {
            status: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}
