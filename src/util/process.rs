//! Running the external tools (package installer, build backend).

use std::ffi::{OsStr, OsString};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use anyhow::{bail, Context, Result};

/// Builder for a tool invocation.
#[derive(Debug, Clone)]
pub struct ProcessBuilder {
    program: PathBuf,
    args: Vec<OsString>,
    env: Vec<(String, String)>,
    cwd: Option<PathBuf>,
    stdin: Option<Vec<u8>>,
}

impl ProcessBuilder {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        ProcessBuilder {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            cwd: None,
            stdin: None,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn cwd(mut self, cwd: impl AsRef<Path>) -> Self {
        self.cwd = Some(cwd.as_ref().to_path_buf());
        self
    }

    /// Data written to the child's stdin before waiting on it.
    pub fn stdin(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(data.into());
        self
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .envs(self.env.iter().map(|(k, v)| (k, v)));
        if let Some(cwd) = &self.cwd {
            cmd.current_dir(cwd);
        }
        cmd
    }

    /// Run to completion with stdout and stderr captured.
    ///
    /// A non-zero exit status is not an error here; see [`Self::exec_checked`].
    pub fn exec(&self) -> Result<Output> {
        let mut cmd = self.command();
        cmd.stdin(if self.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .with_context(|| format!("failed to spawn `{}`", self.program.display()))?;

        if let (Some(data), Some(mut pipe)) = (&self.stdin, child.stdin.take()) {
            pipe.write_all(data)
                .with_context(|| format!("failed to write to `{}`", self.program.display()))?;
        }

        child
            .wait_with_output()
            .with_context(|| format!("failed to wait for `{}`", self.program.display()))
    }

    /// Like [`Self::exec`], but a non-zero exit status becomes an error carrying stderr.
    pub fn exec_checked(&self) -> Result<Output> {
        let output = self.exec()?;
        if !output.status.success() {
            bail!(
                "`{}` exited with {}\n{}",
                self.display_command(),
                exit_label(output.status.code()),
                String::from_utf8_lossy(&output.stderr).trim_end()
            );
        }
        Ok(output)
    }

    /// Run with the terminal attached, so the tool's progress output reaches the user.
    pub fn status_and_check(&self) -> Result<()> {
        let status = self
            .command()
            .status()
            .with_context(|| format!("failed to execute `{}`", self.program.display()))?;
        if !status.success() {
            bail!(
                "`{}` exited with {}",
                self.display_command(),
                exit_label(status.code())
            );
        }
        Ok(())
    }

    pub fn display_command(&self) -> String {
        std::iter::once(self.program.as_os_str())
            .chain(self.args.iter().map(OsString::as_os_str))
            .map(|part| part.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn exit_label(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("status {}", code),
        None => "a signal".to_string(),
    }
}

/// Resolve a configured tool on `PATH`, or explain why it can't be found.
///
/// `purpose` names the role the tool plays, e.g. "package installer".
pub fn resolve_tool(name: &str, purpose: &str) -> Result<PathBuf> {
    which::which(name).with_context(|| {
        format!(
            "`{}` ({}) was not found; install it or point the configuration at it",
            name, purpose
        )
    })
}
