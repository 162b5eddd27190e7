//! Tool settings for qx itself.
//!
//! These are separate from the project's `compile.json`. Two locations are
//! read:
//! - Global: `~/.qx/config.toml` - User-wide defaults
//! - Project: `.qx/config.toml` - Project-specific overrides
//!
//! Project settings take precedence over global ones, and the `QX_INSTALLER`
//! and `QX_BACKEND` environment variables take precedence over both.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Default package installer program.
pub const DEFAULT_INSTALLER: &str = "qx-pkg";

/// Default program that runs build commands.
pub const DEFAULT_BACKEND: &str = "qx-compiler";

/// Environment variable overriding the installer program.
pub const INSTALLER_ENV: &str = "QX_INSTALLER";

/// Environment variable overriding the backend program.
pub const BACKEND_ENV: &str = "QX_BACKEND";

/// qx tool settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    /// External programs
    pub tools: ToolsConfig,

    /// Project file conventions
    pub project: ProjectConfig,
}

/// External programs qx delegates to.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Package installer program (name on PATH or a path)
    pub installer: Option<String>,

    /// Build pipeline program (name on PATH or a path)
    pub backend: Option<String>,
}

/// Project file conventions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ProjectConfig {
    /// Descriptor to use when `--config-file` is not given
    pub config_file: Option<String>,
}

impl ToolConfig {
    /// Load settings from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Load settings with fallback to defaults if the file doesn't exist or is broken.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {}: {:#}", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(&mut self, other: ToolConfig) {
        if other.tools.installer.is_some() {
            self.tools.installer = other.tools.installer;
        }
        if other.tools.backend.is_some() {
            self.tools.backend = other.tools.backend;
        }
        if other.project.config_file.is_some() {
            self.project.config_file = other.project.config_file;
        }
    }

    /// Apply `QX_INSTALLER` / `QX_BACKEND` overrides from a variable lookup.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(installer) = lookup(INSTALLER_ENV).filter(|v| !v.is_empty()) {
            self.tools.installer = Some(installer);
        }
        if let Some(backend) = lookup(BACKEND_ENV).filter(|v| !v.is_empty()) {
            self.tools.backend = Some(backend);
        }
    }

    /// The installer program to run.
    pub fn installer(&self) -> &str {
        self.tools.installer.as_deref().unwrap_or(DEFAULT_INSTALLER)
    }

    /// The backend program to run.
    pub fn backend(&self) -> &str {
        self.tools.backend.as_deref().unwrap_or(DEFAULT_BACKEND)
    }
}

/// Load merged settings from global and project locations plus the process environment.
///
/// Order of precedence (highest to lowest):
/// 1. Environment (`QX_INSTALLER`, `QX_BACKEND`)
/// 2. Project config (.qx/config.toml)
/// 3. Global config (~/.qx/config.toml)
/// 4. Defaults
pub fn load_config(global_path: Option<&Path>, project_path: &Path) -> ToolConfig {
    let mut config = ToolConfig::default();

    if let Some(global_path) = global_path {
        config.merge(ToolConfig::load_or_default(global_path));
    }

    config.merge(ToolConfig::load_or_default(project_path));
    config.apply_env(|key| std::env::var(key).ok());

    config
}

/// Get the global qx config directory (~/.qx).
pub fn global_config_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".qx"))
}

/// Get the global config path (~/.qx/config.toml).
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("config.toml"))
}

/// Get the project config path (.qx/config.toml).
pub fn project_config_path(project_root: &Path) -> PathBuf {
    project_root.join(".qx").join("config.toml")
}
