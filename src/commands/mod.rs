//! Command registry and dispatch.
//!
//! Commands are registered from a fixed, ordered list of names. Each name
//! resolves to an implementation ([`CommandDef`]) that describes its options
//! and how to build it from the parsed arguments. Two names may share one
//! implementation; the second becomes an alias of the first.

pub mod clean;
pub mod config;
pub mod delegate;

use std::path::Path;

use clap::{value_parser, Arg, ArgAction};
use serde_json::Value;

use crate::backend::CommandBackend;
use crate::cli::FullArgs;
use crate::core::config::ConfigDescriptor;
use crate::error::{BootstrapError, Result};
use crate::ops::bootstrap::Session;

/// Commands registered on every run, in order.
pub const COMMAND_NAMES: [&str; 12] = [
    "add", "clean", "compile", "config", "deploy", "package", "pkg", "create", "lint", "run",
    "test", "serve",
];

/// The command that runs without loading libraries.
pub const NO_LIBRARY_COMMAND: &str = "clean";

/// Commands whose trailing arguments go to the backend untouched.
pub const PASSTHROUGH_COMMANDS: [&str; 4] = ["add", "create", "package", "pkg"];

/// Port `serve` listens on unless configured otherwise.
pub const DEFAULT_LISTEN_PORT: u16 = 8080;

/// A command ready to run.
pub trait Command {
    fn name(&self) -> &str;

    /// Carry out the command; the returned value is the command's result.
    fn process(&mut self, ctx: &mut CommandContext<'_>) -> anyhow::Result<Value>;
}

/// What a running command gets to see.
pub struct CommandContext<'a> {
    /// The effective configuration.
    pub config: &'a ConfigDescriptor,
    pub project_root: &'a Path,
    pub backend: &'a mut dyn CommandBackend,
    pub quiet: bool,
}

/// Custom handler replacing the default build-and-dispatch behaviour.
pub type Handler = fn(&FullArgs, &mut Session<'_>) -> Result<Value>;

/// Builds a command from the parsed arguments.
pub type Factory = fn(&FullArgs) -> anyhow::Result<Box<dyn Command>>;

/// Declarative description of a command.
#[derive(Clone, Copy)]
pub struct CommandSpec {
    pub name: &'static str,
    pub about: &'static str,
    /// Adds the command's own options.
    pub options: fn(clap::Command) -> clap::Command,
    pub handler: Option<Handler>,
}

/// A command implementation.
#[derive(Clone, Copy)]
pub struct CommandDef {
    /// `None` when the implementation does not want to be registered.
    pub spec: fn() -> Option<CommandSpec>,
    pub factory: Factory,
}

/// Resolve a registered command name to its implementation.
pub fn implementation(name: &str) -> Option<CommandDef> {
    match name {
        "add" => Some(delegate::ADD),
        "clean" => Some(clean::CLEAN),
        "compile" => Some(delegate::COMPILE),
        "config" => Some(config::CONFIG),
        "deploy" => Some(delegate::DEPLOY),
        "package" | "pkg" => Some(delegate::PACKAGE),
        "create" => Some(delegate::CREATE),
        "lint" => Some(delegate::LINT),
        "run" => Some(delegate::RUN),
        "test" => Some(delegate::TEST),
        "serve" => Some(delegate::SERVE),
        _ => None,
    }
}

/// A command known to the registry.
pub struct RegisteredCommand {
    pub spec: CommandSpec,
    pub aliases: Vec<&'static str>,
    factory: Factory,
}

/// Registered commands, in registration order.
#[derive(Default)]
pub struct CommandRegistry {
    commands: Vec<RegisteredCommand>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every command in [`COMMAND_NAMES`].
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for name in COMMAND_NAMES {
            match implementation(name) {
                Some(def) => registry.register(name, def),
                None => tracing::debug!("no implementation for command `{}`", name),
            }
        }
        registry
    }

    /// Register `def` under `name`.
    ///
    /// If the implementation is already registered under its own name,
    /// `name` is added as an alias instead.
    pub fn register(&mut self, name: &'static str, def: CommandDef) {
        let Some(spec) = (def.spec)() else {
            tracing::debug!("command `{}` declined registration", name);
            return;
        };

        if let Some(existing) = self.commands.iter_mut().find(|c| c.spec.name == spec.name) {
            if name != spec.name && !existing.aliases.contains(&name) {
                existing.aliases.push(name);
            }
            return;
        }

        let aliases = if name == spec.name { Vec::new() } else { vec![name] };
        self.commands.push(RegisteredCommand {
            spec,
            aliases,
            factory: def.factory,
        });
    }

    /// Registered command names (aliases excluded).
    pub fn names(&self) -> Vec<&'static str> {
        self.commands.iter().map(|c| c.spec.name).collect()
    }

    /// Find a command by name or alias.
    pub fn find(&self, name: &str) -> Option<&RegisteredCommand> {
        self.commands
            .iter()
            .find(|c| c.spec.name == name || c.aliases.iter().any(|alias| *alias == name))
    }

    /// Subcommand definitions for the full parse.
    pub fn clap_commands(&self) -> Vec<clap::Command> {
        self.commands
            .iter()
            .map(|c| {
                let command = clap::Command::new(c.spec.name)
                    .about(c.spec.about)
                    .visible_aliases(c.aliases.iter().copied());
                (c.spec.options)(command)
            })
            .collect()
    }

    /// Run the selected command through its handler.
    pub fn dispatch(&self, full: &FullArgs, session: &mut Session<'_>) -> Result<Value> {
        let registered = self
            .find(&full.command)
            .ok_or_else(|| BootstrapError::usage(format!("unknown command `{}`", full.command)))?;

        match registered.spec.handler {
            Some(handler) => handler(full, session),
            None => {
                let command =
                    (registered.factory)(full).map_err(|source| BootstrapError::Command {
                        command: full.command.clone(),
                        source,
                    })?;
                session.process_command(command)
            }
        }
    }
}

/// Options shared by the commands that compile the application.
pub fn compile_options(command: clap::Command) -> clap::Command {
    command
        .arg(
            Arg::new("target")
                .short('t')
                .long("target")
                .value_name("TYPE")
                .help("Set the target type: source or build, or a type declared in compile.json"),
        )
        .arg(
            Arg::new("output-path")
                .short('o')
                .long("output-path")
                .value_name("DIR")
                .help("Base path for output"),
        )
        .arg(
            Arg::new("locale")
                .long("locale")
                .value_name("CODE")
                .action(ArgAction::Append)
                .help("Compile for a given locale"),
        )
        .arg(
            Arg::new("write-all-translations")
                .long("write-all-translations")
                .value_name("BOOL")
                .num_args(0..=1)
                .default_missing_value("true")
                .value_parser(value_parser!(bool))
                .help("Enables output of all translations, not just those that are explicitly referenced"),
        )
}

/// `compile_options` plus the web server port.
pub fn serve_options(command: clap::Command) -> clap::Command {
    compile_options(command).arg(
        Arg::new("listen-port")
            .long("listen-port")
            .value_name("PORT")
            .value_parser(value_parser!(u16))
            .default_value("8080")
            .help("The port for the web browser to listen on"),
    )
}

/// Arguments handed through to the backend untouched.
pub fn passthrough_options(command: clap::Command) -> clap::Command {
    command.arg(
        Arg::new("args")
            .value_name("ARGS")
            .num_args(0..)
            .trailing_var_arg(true)
            .allow_hyphen_values(true)
            .help("Arguments for the command"),
    )
}
