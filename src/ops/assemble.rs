//! Building the effective configuration.
//!
//! Precedence, highest first: explicit command line flag, lockfile-derived
//! libraries, the descriptor's own value, built-in default. Every step can be
//! applied twice without changing the result.

use std::path::Path;

use serde_json::Value;

use crate::cli::{FullArgs, RawArguments};
use crate::commands::DEFAULT_LISTEN_PORT;
use crate::core::config::{ConfigDescriptor, SassEngine, DEFAULT_TARGET_TYPE};
use crate::core::library::has_manifest;
use crate::core::lockfile::LockfileRecord;
use crate::error::{BootstrapError, Result};

/// Values taken from the command line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overrides {
    pub target: Option<String>,
    pub output_path: Option<String>,
    pub locales: Vec<String>,
    /// `None` unless the flag was given.
    pub write_all_translations: Option<bool>,
    /// `--set-env` pairs for the target environment.
    pub environment: Vec<(String, String)>,
    /// `--set` pairs for the compiler environment.
    pub settings: Vec<(String, Value)>,
    /// Parsed `--listen-port`, including its default.
    pub listen_port: Option<u16>,
    /// Whether `--listen-port` literally appears on the command line.
    pub listen_port_explicit: bool,
}

impl Overrides {
    pub fn from_args(full: &FullArgs, raw: &RawArguments) -> Self {
        Overrides {
            target: full.string_option("target"),
            output_path: full.string_option("output-path"),
            locales: full.strings_option("locale"),
            write_all_translations: full.bool_option("write-all-translations"),
            environment: full.environment.clone(),
            settings: full.compiler_settings(),
            listen_port: full.port_option("listen-port"),
            listen_port_explicit: raw.is_explicit_arg("listen-port"),
        }
    }
}

/// Default the library list and append the libraries recorded in the lockfile.
///
/// With no `libraries` key and a `Manifest.json` in the project root, the
/// project itself is the only library. A lockfile that records libraries
/// replaces `packages`; otherwise the descriptor's own map is kept.
pub fn merge_libraries(config: &mut ConfigDescriptor, lockfile: &LockfileRecord, project_root: &Path) {
    if config.libraries.is_none() && has_manifest(project_root) {
        config.libraries = Some(vec![".".to_string()]);
    }

    if lockfile.libraries.is_empty() {
        return;
    }
    config.packages.clear();
    for library in &lockfile.libraries {
        let Some(path) = &library.path else {
            tracing::debug!("lockfile entry {} has no path", library.display_id());
            continue;
        };
        let libraries = config.libraries.get_or_insert_with(Vec::new);
        if !libraries.contains(path) {
            libraries.push(path.clone());
        }
        config.packages.insert(library.uri.clone(), path.clone());
    }
}

/// Apply command line overrides and derive the remaining settings.
pub fn assemble(config: &mut ConfigDescriptor, overrides: &Overrides) -> Result<()> {
    let target_type = overrides
        .target
        .clone()
        .or_else(|| config.default_target.clone())
        .unwrap_or_else(|| DEFAULT_TARGET_TYPE.to_string());
    config.target_type = Some(target_type.clone());

    if !overrides.locales.is_empty() {
        config.locales = Some(overrides.locales.clone());
    } else if config.locales.is_none() {
        config.locales = Some(Vec::new());
    }

    if let Some(write_all) = overrides.write_all_translations {
        config.write_all_translations = Some(write_all);
    }

    let environment = config.environment_mut();
    for (key, value) in &overrides.settings {
        environment.insert(key.clone(), value.clone());
    }

    merge_target_environment(config, &target_type, overrides)?;

    config.sass_engine = SassEngine::from_setting(
        config.sass.as_ref().and_then(|sass| sass.compiler.as_deref()),
    );

    let configured_port = config.serve.as_ref().and_then(|serve| serve.listen_port);
    let listen_port = if overrides.listen_port_explicit {
        overrides.listen_port.or(configured_port)
    } else {
        configured_port.or(overrides.listen_port)
    };
    config.serve_mut().listen_port = Some(listen_port.unwrap_or(DEFAULT_LISTEN_PORT));

    Ok(())
}

/// Merge `--set-env` pairs into the selected target's environment.
fn merge_target_environment(
    config: &mut ConfigDescriptor,
    target_type: &str,
    overrides: &Overrides,
) -> Result<()> {
    if config.targets.is_none() {
        // No targets to attach them to; keep the values on the global environment.
        let environment = config.environment_mut();
        for (key, value) in &overrides.environment {
            environment.insert(key.clone(), Value::String(value.clone()));
        }
        return Ok(());
    }

    let declared = config
        .targets
        .iter()
        .flatten()
        .map(|t| t.target_type.clone())
        .collect::<Vec<_>>()
        .join(", ");
    let target = config.target_mut(target_type).ok_or_else(|| {
        BootstrapError::config(format!(
            "no target of type `{}` is defined (declared targets: {})",
            target_type, declared
        ))
    })?;

    let environment = target.environment.get_or_insert_with(Default::default);
    for (key, value) in &overrides.environment {
        environment.insert(key.clone(), Value::String(value.clone()));
    }
    if let Some(output_path) = &overrides.output_path {
        target.output_path = Some(output_path.clone());
    }
    Ok(())
}
