//! Extension points for configuration providers and libraries.
//!
//! A project can replace how its configuration is produced (a
//! [`ConfigurationProvider`]) and each library can hook into the build
//! (a [`LibraryExtension`]). Implementations are registered by name with
//! the [`PluginLoader`]; plugin modules on disk select them by that name.

pub mod api;
pub mod builtin;
pub mod loader;

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::core::config::ConfigDescriptor;

pub use api::CompilerApi;
pub use loader::{PluginLoader, PluginSource, PLUGIN_FILE_NAME};

/// Produces the configuration descriptor for a project.
pub trait ConfigurationProvider {
    /// Name used in log output.
    fn name(&self) -> &str;

    /// Produce the descriptor; the default reads the JSON file at `config_path`.
    fn load_configuration(&mut self, config_path: &Path) -> Result<ConfigDescriptor> {
        ConfigDescriptor::load_or_default(config_path)
    }

    /// Called when the command to run has been selected.
    fn command_selected(&mut self, _command: &str) {}

    /// Called once, after every library's `load()` hook has run.
    fn after_libraries_loaded(&mut self, _config: &mut ConfigDescriptor) -> Result<()> {
        Ok(())
    }
}

/// Hooks a library contributes to the build.
pub trait LibraryExtension {
    /// Name used in log output.
    fn name(&self) -> &str;

    /// Called as soon as the library has been located.
    fn initialize(&mut self, _root: &Path, _config: &ConfigDescriptor) -> Result<()> {
        Ok(())
    }

    /// One-time activation hook, fired after the command is selected.
    fn load(&mut self, _config: &mut ConfigDescriptor) -> Result<()> {
        Ok(())
    }
}

/// A loaded plugin module.
pub struct PluginModule {
    /// File the module was loaded from.
    pub path: PathBuf,
    /// Replacement configuration provider, if the module declares one.
    pub provider: Option<Box<dyn ConfigurationProvider>>,
    /// Library extension, if the module declares one.
    pub extension: Option<Box<dyn LibraryExtension>>,
}

impl std::fmt::Debug for PluginModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginModule")
            .field("path", &self.path)
            .field("provider", &self.provider.as_ref().map(|p| p.name().to_string()))
            .field("extension", &self.extension.as_ref().map(|e| e.name().to_string()))
            .finish()
    }
}
