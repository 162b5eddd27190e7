//! Built-in providers and extensions.

use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;

use super::{ConfigurationProvider, LibraryExtension};
use crate::core::config::{merge_json, ConfigDescriptor};

/// Reads `compile.json` as-is.
#[derive(Debug, Default)]
pub struct DefaultProvider;

impl ConfigurationProvider for DefaultProvider {
    fn name(&self) -> &str {
        "default"
    }
}

/// Reads `compile.json`, then merges the module's settings table over it.
#[derive(Debug)]
pub struct OverlayProvider {
    settings: Value,
}

impl OverlayProvider {
    pub fn new(settings: &toml::Table) -> Result<Self> {
        let settings = serde_json::to_value(settings).context("settings are not representable as JSON")?;
        Ok(OverlayProvider { settings })
    }
}

impl ConfigurationProvider for OverlayProvider {
    fn name(&self) -> &str {
        "overlay"
    }

    fn load_configuration(&mut self, config_path: &Path) -> Result<ConfigDescriptor> {
        let mut value = ConfigDescriptor::read_value(config_path)?;
        merge_json(&mut value, self.settings.clone());
        ConfigDescriptor::from_value(value)
            .with_context(|| format!("overlay produced an invalid {}", config_path.display()))
    }
}

/// A library without hooks.
#[derive(Debug, Default)]
pub struct DefaultExtension;

impl LibraryExtension for DefaultExtension {
    fn name(&self) -> &str {
        "default"
    }
}

/// Adds its settings to the configuration's `environment` when loaded.
///
/// Keys the project already sets are left alone.
#[derive(Debug)]
pub struct EnvironmentExtension {
    settings: serde_json::Map<String, Value>,
}

impl EnvironmentExtension {
    pub fn new(settings: &toml::Table) -> Result<Self> {
        match serde_json::to_value(settings).context("settings are not representable as JSON")? {
            Value::Object(settings) => Ok(EnvironmentExtension { settings }),
            other => anyhow::bail!("expected a settings table, found {}", other),
        }
    }
}

impl LibraryExtension for EnvironmentExtension {
    fn name(&self) -> &str {
        "environment"
    }

    fn load(&mut self, config: &mut ConfigDescriptor) -> Result<()> {
        let environment = config.environment_mut();
        for (key, value) in &self.settings {
            if !environment.contains_key(key) {
                environment.insert(key.clone(), value.clone());
            }
        }
        Ok(())
    }
}
