//! Loading plugin modules from disk.
//!
//! A plugin module is a TOML file that names a registered provider and/or
//! library extension and passes it settings:
//!
//! ```toml
//! [compiler]
//! provider = "overlay"
//! [compiler.settings]
//! defaultTarget = "build"
//!
//! [library]
//! extension = "environment"
//! [library.settings]
//! "mylib.theme" = "dark"
//! ```
//!
//! Load failures are reshaped into [`BootstrapError::PluginLoad`] so the
//! module author sees the position in *their* file, not the engine's
//! internals.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

use super::builtin::{DefaultExtension, DefaultProvider, EnvironmentExtension, OverlayProvider};
use super::{ConfigurationProvider, LibraryExtension, PluginModule};
use crate::error::BootstrapError;

/// Plugin module filename, next to `compile.json` and in each library root.
pub const PLUGIN_FILE_NAME: &str = "compile.toml";

/// Builds a provider from the module's settings.
pub type ProviderFactory = fn(&toml::Table) -> anyhow::Result<Box<dyn ConfigurationProvider>>;

/// Builds a library extension from the module's settings.
pub type ExtensionFactory = fn(&toml::Table) -> anyhow::Result<Box<dyn LibraryExtension>>;

static LINE_HINT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bat line (\d+)").expect("valid line hint pattern"));

static ENGINE_FRAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(Stack backtrace:|\s+at \S)").expect("valid frame pattern"));

/// Parsed contents of a plugin module.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PluginSource {
    #[serde(default)]
    pub compiler: Option<CompilerSection>,

    #[serde(default)]
    pub library: Option<LibrarySection>,
}

/// `[compiler]` section of a plugin module.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CompilerSection {
    #[serde(default = "default_name")]
    pub provider: String,

    #[serde(default)]
    pub settings: toml::Table,
}

/// `[library]` section of a plugin module.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LibrarySection {
    #[serde(default = "default_name")]
    pub extension: String,

    #[serde(default)]
    pub settings: toml::Table,
}

fn default_name() -> String {
    "default".to_string()
}

/// Loads plugin modules and resolves the names they reference.
///
/// Parsed modules are cached per canonical path, so a file is read at most
/// once per process; a failed load leaves nothing behind in the cache.
pub struct PluginLoader {
    providers: BTreeMap<String, ProviderFactory>,
    extensions: BTreeMap<String, ExtensionFactory>,
    cache: HashMap<PathBuf, PluginSource>,
}

impl PluginLoader {
    /// Create a loader with the built-in providers and extensions registered.
    pub fn new() -> Self {
        let mut loader = PluginLoader {
            providers: BTreeMap::new(),
            extensions: BTreeMap::new(),
            cache: HashMap::new(),
        };

        loader.register_provider("default", |_| Ok(Box::new(DefaultProvider)));
        loader.register_provider("overlay", |settings| {
            Ok(Box::new(OverlayProvider::new(settings)?))
        });
        loader.register_extension("default", |_| Ok(Box::new(DefaultExtension)));
        loader.register_extension("environment", |settings| {
            Ok(Box::new(EnvironmentExtension::new(settings)?))
        });

        loader
    }

    /// Register a configuration provider under `name`.
    pub fn register_provider(&mut self, name: impl Into<String>, factory: ProviderFactory) {
        self.providers.insert(name.into(), factory);
    }

    /// Register a library extension under `name`.
    pub fn register_extension(&mut self, name: impl Into<String>, factory: ExtensionFactory) {
        self.extensions.insert(name.into(), factory);
    }

    /// Whether the module at `path` has been loaded successfully before.
    pub fn is_loaded(&self, path: &Path) -> bool {
        self.cache.contains_key(&cache_key(path))
    }

    /// Load the plugin module at `path`.
    pub fn load(&mut self, path: &Path) -> Result<PluginModule, BootstrapError> {
        let key = cache_key(path);
        let source = match self.cache.get(&key) {
            Some(source) => source.clone(),
            None => read_source(path)?,
        };

        let module = self.instantiate(path, &source)?;
        tracing::debug!("loaded plugin module {}", path.display());
        self.cache.entry(key).or_insert(source);
        Ok(module)
    }

    fn instantiate(&self, path: &Path, source: &PluginSource) -> Result<PluginModule, BootstrapError> {
        let provider = match &source.compiler {
            Some(section) => {
                let factory = self.providers.get(&section.provider).ok_or_else(|| {
                    reshape(
                        path,
                        &format!(
                            "unresolved provider `{}` (registered: {})",
                            section.provider,
                            names(self.providers.keys())
                        ),
                    )
                })?;
                Some(factory(&section.settings).map_err(|e| reshape(path, &format!("{:?}", e)))?)
            }
            None => None,
        };

        let extension = match &source.library {
            Some(section) => {
                let factory = self.extensions.get(&section.extension).ok_or_else(|| {
                    reshape(
                        path,
                        &format!(
                            "unresolved library extension `{}` (registered: {})",
                            section.extension,
                            names(self.extensions.keys())
                        ),
                    )
                })?;
                Some(factory(&section.settings).map_err(|e| reshape(path, &format!("{:?}", e)))?)
            }
            None => None,
        };

        Ok(PluginModule {
            path: path.to_path_buf(),
            provider,
            extension,
        })
    }
}

impl Default for PluginLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn read_source(path: &Path) -> Result<PluginSource, BootstrapError> {
    let text = crate::util::fs::read_to_string(path).map_err(|e| reshape(path, &format!("{:#}", e)))?;
    toml::from_str(&text).map_err(|e| reshape(path, &e.to_string()))
}

/// Turn a raw failure diagnostic into a `PluginLoad` error.
///
/// Backtrace frames are dropped. If the first remaining line carries a
/// line-number hint, that line becomes the error's position and the rest is
/// the detail; otherwise all remaining lines are the detail.
pub fn reshape(path: &Path, diagnostic: &str) -> BootstrapError {
    let mut lines = strip_engine_frames(diagnostic);

    let line = lines
        .first()
        .and_then(|first| LINE_HINT.captures(first))
        .and_then(|caps| caps[1].parse::<usize>().ok());
    if line.is_some() {
        lines.remove(0);
    }

    BootstrapError::PluginLoad {
        path: path.to_path_buf(),
        line,
        detail: lines.join("\n"),
    }
}

fn strip_engine_frames(diagnostic: &str) -> Vec<&str> {
    let mut lines: Vec<&str> = diagnostic
        .lines()
        .take_while(|line| !ENGINE_FRAME.is_match(line))
        .collect();
    while lines.last().is_some_and(|line| line.trim().is_empty()) {
        lines.pop();
    }
    lines
}

fn cache_key(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

fn names<'a>(keys: impl Iterator<Item = &'a String>) -> String {
    keys.map(String::as_str).collect::<Vec<_>>().join(", ")
}
