//! Bootstrap operations.

pub mod assemble;
pub mod bootstrap;
pub mod libraries;
pub mod lockfile;

pub use bootstrap::{Bootstrap, ProjectLayout, Session};
