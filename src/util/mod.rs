//! Shared utilities

pub mod config;
pub mod fs;
pub mod logging;
pub mod process;

pub use config::ToolConfig;
pub use logging::Verbosity;
