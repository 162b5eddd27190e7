//! Core data types: the configuration descriptor, the lockfile and libraries.

pub mod config;
pub mod library;
pub mod lockfile;

pub use config::{ConfigDescriptor, SassEngine, TargetDefinition};
pub use library::LibraryEntry;
pub use lockfile::{LockedLibrary, LockfileRecord};
