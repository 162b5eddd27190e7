//! On-disk project fixtures.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::core::config::CONFIG_FILE_NAME;
use crate::core::library::MANIFEST_FILE_NAME;
use crate::core::lockfile::LOCKFILE_NAME;
use crate::plugin::PLUGIN_FILE_NAME;

/// A throwaway project directory.
#[derive(Debug)]
pub struct ProjectFixture {
    dir: TempDir,
}

impl ProjectFixture {
    /// Create an empty project.
    pub fn new() -> Self {
        ProjectFixture {
            dir: TempDir::new().expect("failed to create temp dir"),
        }
    }

    /// Project root.
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Path relative to the project root.
    pub fn path(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    /// Write an arbitrary file.
    pub fn write(&self, rel: &str, contents: &str) -> PathBuf {
        let path = self.path(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("failed to create fixture dir");
        }
        std::fs::write(&path, contents).expect("failed to write fixture file");
        path
    }

    /// Write `compile.json`.
    pub fn with_config(self, json: &str) -> Self {
        self.write(CONFIG_FILE_NAME, json);
        self
    }

    /// Write `qx-lock.json`.
    pub fn with_lockfile(self, json: &str) -> Self {
        self.write(LOCKFILE_NAME, json);
        self
    }

    /// Create a library directory with a manifest.
    pub fn with_library(self, rel: &str) -> Self {
        self.write(&format!("{}/{}", rel, MANIFEST_FILE_NAME), "{}");
        self
    }

    /// Write a plugin module into `dir` (relative, "." for the root).
    pub fn with_plugin(self, dir: &str, toml: &str) -> Self {
        self.write(&format!("{}/{}", dir, PLUGIN_FILE_NAME), toml);
        self
    }

    pub fn config_path(&self) -> PathBuf {
        self.path(CONFIG_FILE_NAME)
    }

    pub fn lockfile_path(&self) -> PathBuf {
        self.path(LOCKFILE_NAME)
    }

    /// Read a file as a string.
    pub fn read(&self, rel: &str) -> String {
        std::fs::read_to_string(self.path(rel)).expect("failed to read fixture file")
    }
}

impl Default for ProjectFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Build a raw argument vector with the program name prepended.
pub fn argv(args: &[&str]) -> Vec<String> {
    std::iter::once("qx")
        .chain(args.iter().copied())
        .map(str::to_string)
        .collect()
}
