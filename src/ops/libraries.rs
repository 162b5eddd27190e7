//! Locating libraries and loading their plugins.

use std::path::{Path, PathBuf};

use crate::core::config::ConfigDescriptor;
use crate::core::library::{has_manifest, LibraryEntry};
use crate::error::{BootstrapError, Result};
use crate::installer::Installer;
use crate::plugin::builtin::DefaultExtension;
use crate::plugin::{LibraryExtension, PluginLoader, PLUGIN_FILE_NAME};

/// Which library roots have a manifest.
///
/// Only paths; the [`LibraryEntry`] values, with their extensions, are built
/// by [`load_libraries`] once resolution has succeeded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub resolved: Vec<PathBuf>,
    pub missing: Vec<PathBuf>,
}

impl Resolution {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Split `roots` by whether `<root>/Manifest.json` exists, keeping order.
pub fn check_manifests(roots: &[PathBuf]) -> Resolution {
    let (resolved, missing): (Vec<PathBuf>, Vec<PathBuf>) =
        roots.iter().cloned().partition(|root| has_manifest(root));
    Resolution { resolved, missing }
}

/// Check every library manifest, installing missing libraries in one batch.
///
/// When `needs_libraries` is false nothing is installed and the first check
/// is returned as is.
pub fn resolve_libraries(
    roots: &[PathBuf],
    needs_libraries: bool,
    installer: &mut dyn Installer,
) -> Result<Resolution> {
    let resolution = check_manifests(roots);
    if resolution.is_complete() || !needs_libraries {
        return Ok(resolution);
    }

    tracing::info!("One or more libraries not found - trying to install them from library repository...");
    for root in &resolution.missing {
        tracing::debug!("missing manifest in {}", root.display());
    }
    installer
        .install_all()
        .map_err(|e| BootstrapError::io("failed to install missing libraries", e))?;

    let resolution = check_manifests(roots);
    if !resolution.is_complete() {
        return Err(BootstrapError::UnresolvedLibrary {
            paths: resolution.missing,
        });
    }
    Ok(resolution)
}

/// Turn configured library paths into roots relative to the project.
pub fn library_roots(project_root: &Path, libraries: &[String]) -> Vec<PathBuf> {
    libraries.iter().map(|lib| project_root.join(lib)).collect()
}

/// Load each library's plugin (or the default extension) and run its `initialize` hook.
pub fn load_libraries(
    roots: &[PathBuf],
    loader: &mut PluginLoader,
    config: &ConfigDescriptor,
) -> Result<Vec<LibraryEntry>> {
    let mut entries = Vec::with_capacity(roots.len());

    for root in roots {
        let plugin_path = root.join(PLUGIN_FILE_NAME);
        let mut entry = if plugin_path.is_file() {
            let module = loader.load(&plugin_path)?;
            if module.provider.is_some() {
                tracing::debug!(
                    "ignoring configuration provider in library plugin {}",
                    plugin_path.display()
                );
            }
            let extension: Box<dyn LibraryExtension> = match module.extension {
                Some(extension) => extension,
                None => Box::new(DefaultExtension),
            };
            LibraryEntry::new(root.clone(), extension).with_plugin_path(plugin_path)
        } else {
            LibraryEntry::new(root.clone(), Box::new(DefaultExtension))
        };

        entry
            .extension
            .initialize(root, config)
            .map_err(|source| BootstrapError::ExtensionHook {
                hook: "initialize",
                subject: root.display().to_string(),
                source,
            })?;
        tracing::debug!(
            "loaded library {} ({})",
            root.display(),
            entry.extension.name()
        );
        entries.push(entry);
    }

    Ok(entries)
}
