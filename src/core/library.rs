//! A library taking part in the build.

use std::path::{Path, PathBuf};

use crate::plugin::LibraryExtension;

/// Per-library descriptor whose presence marks a correctly installed library.
pub const MANIFEST_FILE_NAME: &str = "Manifest.json";

/// Path of the manifest inside a library root.
pub fn manifest_path(root: &Path) -> PathBuf {
    root.join(MANIFEST_FILE_NAME)
}

/// Whether `root` contains a library manifest.
pub fn has_manifest(root: &Path) -> bool {
    manifest_path(root).is_file()
}

/// A located library and its extension hooks.
pub struct LibraryEntry {
    /// Library root directory.
    pub root_path: PathBuf,
    pub manifest_present: bool,
    /// Plugin module the extension came from, if the library ships one.
    pub plugin_path: Option<PathBuf>,
    pub extension: Box<dyn LibraryExtension>,
}

impl LibraryEntry {
    pub fn new(root_path: PathBuf, extension: Box<dyn LibraryExtension>) -> Self {
        let manifest_present = has_manifest(&root_path);
        LibraryEntry {
            root_path,
            manifest_present,
            plugin_path: None,
            extension,
        }
    }

    pub fn with_plugin_path(mut self, path: PathBuf) -> Self {
        self.plugin_path = Some(path);
        self
    }
}

impl std::fmt::Debug for LibraryEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LibraryEntry")
            .field("root_path", &self.root_path)
            .field("manifest_present", &self.manifest_present)
            .field("plugin_path", &self.plugin_path)
            .field("extension", &self.extension.name())
            .finish()
    }
}
