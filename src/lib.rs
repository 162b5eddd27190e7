//! qx - bootstrap engine of the qooxdoo command line tool
//!
//! Turns a command line plus the project's configuration artifacts (the
//! `compile.json` descriptor, optional plugin modules, the `qx-lock.json`
//! lockfile) into an effective configuration and a dispatched command.

pub mod backend;
pub mod cli;
pub mod commands;
pub mod core;
pub mod error;
pub mod installer;
pub mod ops;
pub mod plugin;
pub mod util;

/// Test utilities and mocks for qx unit tests.
///
/// This module is only available when compiling with `--cfg test` or
/// running tests. It provides recording installer and backend mocks and
/// on-disk project fixtures.
#[cfg(test)]
pub mod test_support;

pub use crate::core::{ConfigDescriptor, LibraryEntry, LockfileRecord};
pub use error::{BootstrapError, Result};
pub use ops::Bootstrap;
