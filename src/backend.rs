//! The build pipeline collaborator.
//!
//! Commands such as `compile` or `deploy` are carried out by a separate
//! program; the engine hands it the command, its arguments and the effective
//! configuration.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::{json, Value};

use crate::core::config::ConfigDescriptor;
use crate::util::process::{resolve_tool, ProcessBuilder};

/// A dispatched command handed to the backend.
#[derive(Debug, Clone, Copy)]
pub struct CommandRequest<'a> {
    pub command: &'a str,
    pub args: &'a [String],
    pub config: &'a ConfigDescriptor,
    pub project_root: &'a Path,
}

/// Executes commands the engine does not implement itself.
pub trait CommandBackend {
    fn execute(&mut self, request: &CommandRequest<'_>) -> Result<Value>;
}

/// Backend that runs an external program.
///
/// Invoked as `<program> <command> [args...]` in the project root, with the
/// effective configuration as JSON on stdin.
#[derive(Debug, Clone)]
pub struct ProcessBackend {
    program: String,
}

impl ProcessBackend {
    pub fn new(program: impl Into<String>) -> Self {
        ProcessBackend {
            program: program.into(),
        }
    }
}

impl CommandBackend for ProcessBackend {
    fn execute(&mut self, request: &CommandRequest<'_>) -> Result<Value> {
        let program = resolve_tool(&self.program, "build backend")?;
        let config = serde_json::to_vec(request.config).context("failed to serialize configuration")?;

        let pb = ProcessBuilder::new(program)
            .arg(request.command)
            .args(request.args)
            .cwd(request.project_root)
            .env("QX_SASS_ENGINE", if request.config.sass_engine.is_latest() { "latest" } else { "legacy" })
            .stdin(config);
        tracing::debug!("running {}", pb.display_command());

        let output = pb.exec_checked()?;
        std::io::stdout()
            .write_all(&output.stdout)
            .context("failed to write backend output")?;

        Ok(json!({
            "command": request.command,
            "exitCode": output.status.code(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_backend_program() {
        let config = ConfigDescriptor::default();
        let request = CommandRequest {
            command: "compile",
            args: &[],
            config: &config,
            project_root: Path::new("."),
        };

        let err = ProcessBackend::new("qx-definitely-not-installed")
            .execute(&request)
            .unwrap_err();
        assert!(err.to_string().contains("build backend"));
    }
}
