//! The package installer collaborator.
//!
//! Installation itself (registry lookups, downloads, unpacking) lives in a
//! separate program. The bootstrap engine only needs the operations in
//! [`Installer`]; [`ProcessInstaller`] provides them by running that program.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::core::lockfile::LockfileRecord;
use crate::util::fs::remove_file_if_exists;
use crate::util::process::{resolve_tool, ProcessBuilder};

/// Operations the engine needs from the package installer.
pub trait Installer {
    /// Install `uri` at release `tag`.
    fn install(&mut self, uri: &str, tag: &str) -> Result<()>;

    /// Install the library checked out at `path` under `uri`.
    fn install_from_local_path(&mut self, path: &Path, uri: &str) -> Result<()>;

    /// Whether `uri` (at `tag`, if given) is already installed.
    fn is_installed(&mut self, uri: &str, tag: Option<&str>) -> Result<bool>;

    /// Install everything the project declares, in one batch.
    fn install_all(&mut self) -> Result<()>;

    /// Remove the lockfile.
    fn delete_lockfile(&mut self) -> Result<()>;

    /// The installer's current view of the lockfile.
    fn lockfile_data(&mut self) -> Result<LockfileRecord>;

    /// Where the lockfile lives.
    fn lockfile_path(&self) -> PathBuf;
}

/// Installer backed by an external program.
///
/// The program is invoked as:
/// - `<program> install <uri> <tag>`
/// - `<program> install --from-path <path> <uri>`
/// - `<program> installed <uri> [<tag>]` (exit status 0 means installed)
/// - `<program> install` (everything in the manifest)
#[derive(Debug, Clone)]
pub struct ProcessInstaller {
    program: String,
    project_root: PathBuf,
    lockfile_path: PathBuf,
    quiet: bool,
    verbose: bool,
}

impl ProcessInstaller {
    pub fn new(program: impl Into<String>, project_root: PathBuf, lockfile_path: PathBuf) -> Self {
        ProcessInstaller {
            program: program.into(),
            project_root,
            lockfile_path,
            quiet: false,
            verbose: false,
        }
    }

    pub fn with_output(mut self, verbose: bool, quiet: bool) -> Self {
        self.verbose = verbose;
        self.quiet = quiet;
        self
    }

    fn command(&self) -> Result<ProcessBuilder> {
        let program = resolve_tool(&self.program, "package installer")?;
        let mut pb = ProcessBuilder::new(program).cwd(&self.project_root);
        if self.quiet {
            pb = pb.arg("--quiet");
        }
        if self.verbose {
            pb = pb.arg("--verbose");
        }
        Ok(pb)
    }

    fn run(&self, pb: ProcessBuilder) -> Result<()> {
        tracing::debug!("running {}", pb.display_command());
        pb.status_and_check()
    }
}

impl Installer for ProcessInstaller {
    fn install(&mut self, uri: &str, tag: &str) -> Result<()> {
        let pb = self.command()?.args(["install", uri, tag]);
        self.run(pb)
            .with_context(|| format!("failed to install {}@{}", uri, tag))
    }

    fn install_from_local_path(&mut self, path: &Path, uri: &str) -> Result<()> {
        let pb = self
            .command()?
            .args(["install", "--from-path"])
            .arg(path)
            .arg(uri);
        self.run(pb)
            .with_context(|| format!("failed to install {} from {}", uri, path.display()))
    }

    fn is_installed(&mut self, uri: &str, tag: Option<&str>) -> Result<bool> {
        let mut pb = self.command()?.args(["installed", uri]);
        if let Some(tag) = tag {
            pb = pb.arg(tag);
        }
        let output = pb.exec()?;
        Ok(output.status.success())
    }

    fn install_all(&mut self) -> Result<()> {
        let pb = self.command()?.arg("install");
        self.run(pb).context("failed to install libraries")
    }

    fn delete_lockfile(&mut self) -> Result<()> {
        remove_file_if_exists(&self.lockfile_path)?;
        Ok(())
    }

    fn lockfile_data(&mut self) -> Result<LockfileRecord> {
        Ok(LockfileRecord::load(&self.lockfile_path)?.unwrap_or_else(LockfileRecord::fresh))
    }

    fn lockfile_path(&self) -> PathBuf {
        self.lockfile_path.clone()
    }
}
