//! Test utilities and mocks for unit tests.
//!
//! Provides recording stand-ins for the installer and backend collaborators
//! so bootstrap steps can be exercised without external programs.
//!
//! # Example
//!
//! ```rust,ignore
//! use qx::test_support::{MockInstaller, ProjectFixture};
//!
//! #[test]
//! fn test_example() {
//!     let project = ProjectFixture::new().with_config(r#"{"libraries": ["lib"]}"#);
//!     let mut installer = MockInstaller::new(project.lockfile_path())
//!         .providing(project.path("lib"));
//!
//!     // Use the mock in a bootstrap step...
//!     assert_eq!(installer.calls(), ["install_all"]);
//! }
//! ```

pub mod fixtures;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use serde_json::{json, Value};

use crate::backend::{CommandBackend, CommandRequest};
use crate::core::library::MANIFEST_FILE_NAME;
use crate::core::lockfile::{LockedLibrary, LockfileRecord};
use crate::installer::Installer;

pub use fixtures::*;

/// Installer that records every call and simulates installs on disk.
#[derive(Debug, Clone, Default)]
pub struct MockInstaller {
    calls: Vec<String>,
    lockfile_path: PathBuf,
    installed: HashSet<String>,
    provides: Vec<PathBuf>,
    state: Vec<LockedLibrary>,
    failing: Option<String>,
}

impl MockInstaller {
    /// Create an installer managing the lockfile at `lockfile_path`.
    pub fn new(lockfile_path: impl Into<PathBuf>) -> Self {
        MockInstaller {
            lockfile_path: lockfile_path.into(),
            ..Default::default()
        }
    }

    /// Treat `uri` at `tag` as already installed.
    pub fn with_installed(mut self, uri: &str, tag: Option<&str>) -> Self {
        self.installed.insert(key(uri, tag));
        self
    }

    /// `install_all` creates a manifest in `dir`.
    pub fn providing(mut self, dir: impl Into<PathBuf>) -> Self {
        self.provides.push(dir.into());
        self
    }

    /// Installs of `uri` fail.
    pub fn failing_on(mut self, uri: &str) -> Self {
        self.failing = Some(uri.to_string());
        self
    }

    /// Calls made so far, in order.
    pub fn calls(&self) -> &[String] {
        &self.calls
    }

    /// Number of calls starting with `prefix`.
    pub fn count(&self, prefix: &str) -> usize {
        self.calls.iter().filter(|c| c.starts_with(prefix)).count()
    }

    fn check_failure(&self, uri: &str) -> Result<()> {
        if self.failing.as_deref() == Some(uri) {
            bail!("registry unavailable while installing {}", uri);
        }
        Ok(())
    }
}

fn key(uri: &str, tag: Option<&str>) -> String {
    match tag {
        Some(tag) => format!("{}@{}", uri, tag),
        None => uri.to_string(),
    }
}

impl Installer for MockInstaller {
    fn install(&mut self, uri: &str, tag: &str) -> Result<()> {
        self.calls.push(format!("install {} {}", uri, tag));
        self.check_failure(uri)?;
        self.installed.insert(key(uri, Some(tag)));
        self.state.push(
            LockedLibrary::new(uri)
                .with_tag(tag)
                .with_path(format!("qx_packages/{}_{}", uri.replace('/', "_"), tag)),
        );
        Ok(())
    }

    fn install_from_local_path(&mut self, path: &Path, uri: &str) -> Result<()> {
        self.calls
            .push(format!("install_from_local_path {} {}", path.display(), uri));
        self.check_failure(uri)?;
        self.installed.insert(key(uri, None));
        self.state
            .push(LockedLibrary::new(uri).with_path(path.display().to_string()));
        Ok(())
    }

    fn is_installed(&mut self, uri: &str, tag: Option<&str>) -> Result<bool> {
        self.calls.push(format!("is_installed {}", key(uri, tag)));
        let installed = self.installed.contains(&key(uri, tag));
        if installed && !self.state.iter().any(|l| l.uri == uri) {
            let mut library = LockedLibrary::new(uri);
            library.repo_tag = tag.map(str::to_string);
            self.state.push(library);
        }
        Ok(installed)
    }

    fn install_all(&mut self) -> Result<()> {
        self.calls.push("install_all".to_string());
        for dir in &self.provides {
            std::fs::create_dir_all(dir)?;
            std::fs::write(dir.join(MANIFEST_FILE_NAME), "{}")?;
        }
        Ok(())
    }

    fn delete_lockfile(&mut self) -> Result<()> {
        self.calls.push("delete_lockfile".to_string());
        crate::util::fs::remove_file_if_exists(&self.lockfile_path)?;
        Ok(())
    }

    fn lockfile_data(&mut self) -> Result<LockfileRecord> {
        self.calls.push("lockfile_data".to_string());
        let mut record = LockfileRecord::fresh();
        record.libraries = self.state.clone();
        Ok(record)
    }

    fn lockfile_path(&self) -> PathBuf {
        self.lockfile_path.clone()
    }
}

/// Backend that records requests instead of running a program.
#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    pub requests: Vec<(String, Vec<String>, Value)>,
    pub fail: bool,
}

impl CommandBackend for MockBackend {
    fn execute(&mut self, request: &CommandRequest<'_>) -> Result<Value> {
        let config = serde_json::to_value(request.config)?;
        self.requests
            .push((request.command.to_string(), request.args.to_vec(), config));
        if self.fail {
            bail!("backend exploded");
        }
        Ok(json!({ "command": request.command }))
    }
}
