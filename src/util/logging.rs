//! Logging setup.
//!
//! The filter sits behind a reload layer so the verbosity chosen on the
//! command line can be re-applied when a command is dispatched.

use anyhow::{Context, Result};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, reload, EnvFilter, Registry};

/// Output verbosity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// --quiet: warnings and errors only
    Quiet,
    #[default]
    Normal,
    /// --verbose: debug output
    Verbose,
}

impl Verbosity {
    /// Verbose wins over quiet when both are given.
    pub fn from_flags(verbose: bool, quiet: bool) -> Self {
        if verbose {
            Verbosity::Verbose
        } else if quiet {
            Verbosity::Quiet
        } else {
            Verbosity::Normal
        }
    }

    fn directive(self) -> &'static str {
        match self {
            Verbosity::Quiet => "qx=warn",
            Verbosity::Normal => "qx=info",
            Verbosity::Verbose => "qx=debug",
        }
    }

    /// Build the filter, letting `RUST_LOG` take precedence when set.
    pub fn filter(self) -> EnvFilter {
        match std::env::var(EnvFilter::DEFAULT_ENV) {
            Ok(spec) if !spec.is_empty() => EnvFilter::new(spec),
            _ => EnvFilter::new(self.directive()),
        }
    }
}

/// Handle for changing the active log filter.
#[derive(Clone)]
pub struct LogHandle {
    handle: reload::Handle<EnvFilter, Registry>,
}

impl std::fmt::Debug for LogHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogHandle").finish_non_exhaustive()
    }
}

impl LogHandle {
    /// Replace the active filter.
    pub fn set_verbosity(&self, verbosity: Verbosity) -> Result<()> {
        self.handle
            .reload(verbosity.filter())
            .context("failed to update log filter")
    }
}

/// Install the global subscriber.
pub fn init(verbosity: Verbosity) -> Result<LogHandle> {
    let (filter, handle) = reload::Layer::new(verbosity.filter());

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .without_time()
                .with_writer(std::io::stderr),
        )
        .try_init()
        .context("failed to install logger")?;

    Ok(LogHandle { handle })
}
