//! Command line surface.

pub mod args;

pub use args::{
    ensure_consistent, parse_bootstrap, parse_full, validate_set_env, BootstrapArgs, FullArgs,
    GlobalArgs, RawArguments,
};
