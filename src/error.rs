//! Error taxonomy for the bootstrap engine.
//!
//! Every component returns one of these tagged variants; collaborators and
//! helpers use `anyhow` internally and get wrapped at the component boundary.
//! Only the binary turns a `BootstrapError` into a process exit status.

use std::path::{Path, PathBuf};

use clap::error::ErrorKind;
use miette::Diagnostic;
use thiserror::Error;

/// Errors that stop the bootstrap before (or while) a command runs.
#[derive(Debug, Error, Diagnostic)]
pub enum BootstrapError {
    /// Bad or missing command line input.
    #[error("{message}")]
    #[diagnostic(code(qx::usage), help("Run `qx --help` to see the available commands"))]
    Usage {
        message: String,
        kind: Option<ErrorKind>,
    },

    /// One or more `--set-env` entries are not `key=value` pairs.
    #[error("--set-env must be a key=value pair; offending entries: {}", .entries.join(", "))]
    #[diagnostic(
        code(qx::args::set_env),
        help("Keys may not contain `=` or whitespace and the value may not be empty, e.g. `--set-env qx.debug=false`")
    )]
    Validation { entries: Vec<String> },

    /// A plugin module could not be loaded.
    #[error("{}", plugin_load_message(.path, .line, .detail))]
    #[diagnostic(code(qx::plugin::load))]
    PluginLoad {
        path: PathBuf,
        line: Option<usize>,
        detail: String,
    },

    /// The lockfile was written by an older schema and `--force` was not given.
    #[error(
        "*** Warning ***\nThe schema of '{}' has changed (file version {file_version}, current schema {schema_version}). \
         Execute 'qx clean && qx compile --force' to delete and regenerate it.\n\
         You might have to re-apply manual modifications to '{}'.",
        .lockfile.display(),
        .lockfile.display()
    )]
    #[diagnostic(
        code(qx::lockfile::schema_drift),
        help("Re-run the command with --force to back up the lockfile and migrate it")
    )]
    SchemaDrift {
        lockfile: PathBuf,
        file_version: semver::Version,
        schema_version: semver::Version,
    },

    /// A lockfile migration step failed; on-disk state is left for manual recovery.
    #[error("lockfile migration of {} failed while {step}", .lockfile.display())]
    #[diagnostic(
        code(qx::lockfile::migration_failed),
        help("A backup may exist next to the lockfile with the `.old` extension")
    )]
    MigrationFailed {
        lockfile: PathBuf,
        step: &'static str,
        #[source]
        source: anyhow::Error,
    },

    /// Libraries whose manifest is still missing after the installer ran.
    #[error("library manifest not found for: {}", display_paths(.paths))]
    #[diagnostic(
        code(qx::library::unresolved),
        help("Check the library paths in compile.json and qx-lock.json, or run `qx package install`")
    )]
    UnresolvedLibrary { paths: Vec<PathBuf> },

    /// The configuration descriptor is inconsistent.
    #[error("{message}")]
    #[diagnostic(code(qx::config))]
    Config { message: String },

    /// A plugin hook (`initialize`, `load`, `afterLibrariesLoaded`) failed.
    #[error("{hook} hook failed for {subject}")]
    #[diagnostic(code(qx::plugin::hook))]
    ExtensionHook {
        hook: &'static str,
        subject: String,
        #[source]
        source: anyhow::Error,
    },

    /// Reading or parsing an on-disk artifact failed outside of migration.
    #[error("{context}")]
    #[diagnostic(code(qx::io))]
    Io {
        context: String,
        #[source]
        source: anyhow::Error,
    },

    /// A subcommand's `process()` failed.
    #[error("command `{command}` failed")]
    #[diagnostic(code(qx::command))]
    Command {
        command: String,
        #[source]
        source: anyhow::Error,
    },
}

impl BootstrapError {
    /// Create a usage error from a message.
    pub fn usage(message: impl Into<String>) -> Self {
        BootstrapError::Usage {
            message: message.into(),
            kind: None,
        }
    }

    /// Create a configuration error from a message.
    pub fn config(message: impl Into<String>) -> Self {
        BootstrapError::Config {
            message: message.into(),
        }
    }

    /// Wrap an I/O level failure with context.
    pub fn io(context: impl Into<String>, source: anyhow::Error) -> Self {
        BootstrapError::Io {
            context: context.into(),
            source,
        }
    }

    /// Whether this is help or version output rather than a failure.
    pub fn is_informational(&self) -> bool {
        matches!(
            self,
            BootstrapError::Usage {
                kind: Some(ErrorKind::DisplayHelp | ErrorKind::DisplayVersion),
                ..
            }
        )
    }

    /// Whether the diagnostic was already logged by the dispatcher.
    pub fn already_reported(&self) -> bool {
        matches!(self, BootstrapError::Command { .. })
    }
}

impl From<clap::Error> for BootstrapError {
    fn from(err: clap::Error) -> Self {
        BootstrapError::Usage {
            message: err.render().to_string().trim_end().to_string(),
            kind: Some(err.kind()),
        }
    }
}

fn plugin_load_message(path: &Path, line: &Option<usize>, detail: &str) -> String {
    let mut message = match line {
        Some(line) => format!("Error while reading {} at line {}", path.display(), line),
        None => format!("Error while reading {}", path.display()),
    };
    if !detail.is_empty() {
        message.push('\n');
        message.push_str(detail);
    }
    message
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Convenience alias for bootstrap results.
pub type Result<T, E = BootstrapError> = std::result::Result<T, E>;
