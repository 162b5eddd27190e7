//! The build configuration descriptor (`compile.json`).
//!
//! Only the keys the bootstrap engine reads or writes are typed; everything
//! else is carried through untouched so downstream consumers see the file as
//! written.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Default descriptor filename.
pub const CONFIG_FILE_NAME: &str = "compile.json";

/// Target type used when neither the CLI nor the descriptor names one.
pub const DEFAULT_TARGET_TYPE: &str = "source";

/// The primary build configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigDescriptor {
    /// Library root directories, in load order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub libraries: Option<Vec<String>>,

    /// Library URI to installed path, rebuilt from the lockfile.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub packages: BTreeMap<String, String>,

    /// Build output profiles.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub targets: Option<Vec<TargetDefinition>>,

    /// The selected target type, set by the assembler.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_type: Option<String>,

    /// Target type to use when `--target` is not given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_target: Option<String>,

    /// Locale codes to compile.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locales: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write_all_translations: Option<bool>,

    /// Global environment settings for the compiler.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<Map<String, Value>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serve: Option<ServeConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sass: Option<SassConfig>,

    /// Style-sheet compiler variant derived by the assembler.
    #[serde(skip)]
    pub sass_engine: SassEngine,

    /// Keys the engine does not interpret.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A named build output profile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetDefinition {
    /// Target type, e.g. "source" or "build".
    #[serde(rename = "type")]
    pub target_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<Map<String, Value>>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TargetDefinition {
    /// Create a target definition of the given type.
    pub fn new(target_type: impl Into<String>) -> Self {
        TargetDefinition {
            target_type: target_type.into(),
            ..Default::default()
        }
    }

    /// Directory the target compiles into.
    pub fn output_dir(&self) -> String {
        self.output_path
            .clone()
            .unwrap_or_else(|| format!("compiled/{}", self.target_type))
    }
}

/// Settings for the development web server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServeConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listen_port: Option<u16>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Settings for the style-sheet compiler.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SassConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compiler: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Which style-sheet compiler implementation to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SassEngine {
    #[default]
    Legacy,
    Latest,
}

impl SassEngine {
    /// `"latest"` selects the new engine; anything else, or nothing, the legacy one.
    pub fn from_setting(setting: Option<&str>) -> Self {
        match setting {
            Some("latest") => SassEngine::Latest,
            _ => SassEngine::Legacy,
        }
    }

    pub fn is_latest(self) -> bool {
        self == SassEngine::Latest
    }
}

impl ConfigDescriptor {
    /// Parse a descriptor from JSON text.
    pub fn from_json(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json).context("invalid JSON")?;
        Self::from_value(value)
    }

    /// Build a descriptor from an already parsed JSON value.
    pub fn from_value(value: Value) -> Result<Self> {
        serde_json::from_value(value).context("invalid configuration descriptor")
    }

    /// Read the raw JSON value of a descriptor, or an empty object if the file is absent.
    pub fn read_value(path: &Path) -> Result<Value> {
        if !path.exists() {
            return Ok(Value::Object(Map::new()));
        }
        let contents = crate::util::fs::read_to_string(path)?;
        serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse {}", path.display()))
    }

    /// Load a descriptor, falling back to the defaults if the file is absent.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        let value = Self::read_value(path)?;
        Self::from_value(value).with_context(|| format!("failed to load {}", path.display()))
    }

    /// Serialize to pretty JSON.
    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("failed to serialize configuration")
    }

    /// Find the target definition with the given type.
    pub fn target(&self, target_type: &str) -> Option<&TargetDefinition> {
        self.targets
            .as_ref()?
            .iter()
            .find(|t| t.target_type == target_type)
    }

    /// Find the target definition with the given type, mutably.
    pub fn target_mut(&mut self, target_type: &str) -> Option<&mut TargetDefinition> {
        self.targets
            .as_mut()?
            .iter_mut()
            .find(|t| t.target_type == target_type)
    }

    /// The target selected by `target_type`, if any.
    pub fn active_target(&self) -> Option<&TargetDefinition> {
        self.target(self.target_type.as_deref()?)
    }

    /// The configured libraries, or an empty slice.
    pub fn library_paths(&self) -> &[String] {
        self.libraries.as_deref().unwrap_or_default()
    }

    /// The global environment map, created on first use.
    pub fn environment_mut(&mut self) -> &mut Map<String, Value> {
        self.environment.get_or_insert_with(Map::new)
    }

    /// The serve section, created on first use.
    pub fn serve_mut(&mut self) -> &mut ServeConfig {
        self.serve.get_or_insert_with(ServeConfig::default)
    }
}

/// Recursively merge `overlay` into `base`; objects merge key by key, anything else replaces.
pub fn merge_json(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_json(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}
