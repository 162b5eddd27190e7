//! Commands carried out by the build backend.

use anyhow::{Context, Result};
use serde_json::Value;

use super::{
    compile_options, passthrough_options, serve_options, Command, CommandContext, CommandDef,
    CommandSpec,
};
use crate::backend::CommandRequest;
use crate::cli::FullArgs;

pub const ADD: CommandDef = delegated(add_spec);
pub const COMPILE: CommandDef = delegated(compile_spec);
pub const DEPLOY: CommandDef = delegated(deploy_spec);
pub const PACKAGE: CommandDef = delegated(package_spec);
pub const CREATE: CommandDef = delegated(create_spec);
pub const LINT: CommandDef = delegated(lint_spec);
pub const RUN: CommandDef = delegated(run_spec);
pub const TEST: CommandDef = delegated(test_spec);
pub const SERVE: CommandDef = delegated(serve_spec);

const fn delegated(spec: fn() -> Option<CommandSpec>) -> CommandDef {
    CommandDef {
        spec,
        factory: DelegateCommand::from_args,
    }
}

fn spec(
    name: &'static str,
    about: &'static str,
    options: fn(clap::Command) -> clap::Command,
) -> Option<CommandSpec> {
    Some(CommandSpec {
        name,
        about,
        options,
        handler: None,
    })
}

fn add_spec() -> Option<CommandSpec> {
    spec(
        "add",
        "Adds new elements to an existing application or library",
        passthrough_options,
    )
}

fn compile_spec() -> Option<CommandSpec> {
    spec("compile", "Compiles the current application, using compile.json", compile_options)
}

fn deploy_spec() -> Option<CommandSpec> {
    spec("deploy", "Deploys the current application", compile_options)
}

fn package_spec() -> Option<CommandSpec> {
    spec("package", "Manages library packages", passthrough_options)
}

fn create_spec() -> Option<CommandSpec> {
    spec("create", "Creates a new project", passthrough_options)
}

fn lint_spec() -> Option<CommandSpec> {
    spec("lint", "Runs the linter on the current application", compile_options)
}

fn run_spec() -> Option<CommandSpec> {
    spec(
        "run",
        "Runs a server application with continuous compilation",
        compile_options,
    )
}

fn test_spec() -> Option<CommandSpec> {
    spec("test", "Executes unit tests", compile_options)
}

fn serve_spec() -> Option<CommandSpec> {
    spec(
        "serve",
        "Runs a web server for the current application with continuous compilation",
        serve_options,
    )
}

/// Hands the command, its arguments and the effective configuration to the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelegateCommand {
    name: String,
    args: Vec<String>,
}

impl DelegateCommand {
    pub fn new(name: impl Into<String>, args: Vec<String>) -> Self {
        DelegateCommand {
            name: name.into(),
            args,
        }
    }

    pub fn from_args(full: &FullArgs) -> Result<Box<dyn Command>> {
        Ok(Box::new(DelegateCommand::new(
            full.command.clone(),
            full.strings_option("args"),
        )))
    }
}

impl Command for DelegateCommand {
    fn name(&self) -> &str {
        &self.name
    }

    fn process(&mut self, ctx: &mut CommandContext<'_>) -> Result<Value> {
        let request = CommandRequest {
            command: &self.name,
            args: &self.args,
            config: ctx.config,
            project_root: ctx.project_root,
        };
        ctx.backend
            .execute(&request)
            .with_context(|| format!("backend failed to run `{}`", self.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::ConfigDescriptor;
    use crate::test_support::MockBackend;
    use std::path::Path;

    #[test]
    fn test_delegate_hands_over_config_and_args() {
        let mut backend = MockBackend::default();
        let config = ConfigDescriptor::from_json(r#"{"libraries": ["."]}"#).unwrap();
        let mut ctx = CommandContext {
            config: &config,
            project_root: Path::new("."),
            backend: &mut backend,
            quiet: false,
        };

        let mut command = DelegateCommand::new("package", vec!["install".to_string()]);
        let result = command.process(&mut ctx).unwrap();

        assert_eq!(result["command"], "package");
        assert_eq!(backend.requests.len(), 1);
        let (name, args, sent) = &backend.requests[0];
        assert_eq!(name, "package");
        assert_eq!(args, &["install"]);
        assert_eq!(sent["libraries"], serde_json::json!(["."]));
    }

    #[test]
    fn test_backend_failure_has_context() {
        let mut backend = MockBackend {
            fail: true,
            ..Default::default()
        };
        let config = ConfigDescriptor::default();
        let mut ctx = CommandContext {
            config: &config,
            project_root: Path::new("."),
            backend: &mut backend,
            quiet: false,
        };

        let err = DelegateCommand::new("compile", Vec::new())
            .process(&mut ctx)
            .unwrap_err();
        assert!(format!("{:#}", err).contains("backend failed to run `compile`"));
    }
}
