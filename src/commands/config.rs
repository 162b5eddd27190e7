//! `qx config` command

use anyhow::{Context, Result};
use clap::{Arg, ArgAction};
use serde_json::Value;

use super::{Command, CommandContext, CommandDef, CommandSpec};
use crate::cli::FullArgs;

pub const CONFIG: CommandDef = CommandDef {
    spec,
    factory: ConfigCommand::from_args,
};

fn spec() -> Option<CommandSpec> {
    Some(CommandSpec {
        name: "config",
        about: "Prints the effective configuration",
        options: |command| {
            command.arg(
                Arg::new("json")
                    .long("json")
                    .action(ArgAction::SetTrue)
                    .help("Print compact JSON on a single line"),
            )
        },
        handler: None,
    })
}

/// Prints the effective configuration to stdout.
#[derive(Debug, Clone, Default)]
pub struct ConfigCommand {
    compact: bool,
}

impl ConfigCommand {
    pub fn from_args(full: &FullArgs) -> Result<Box<dyn Command>> {
        Ok(Box::new(ConfigCommand {
            compact: full.bool_option("json").unwrap_or(false),
        }))
    }

    fn render(&self, value: &Value) -> Result<String> {
        let text = if self.compact {
            serde_json::to_string(value)
        } else {
            serde_json::to_string_pretty(value)
        };
        text.context("failed to serialize configuration")
    }
}

impl Command for ConfigCommand {
    fn name(&self) -> &str {
        "config"
    }

    fn process(&mut self, ctx: &mut CommandContext<'_>) -> Result<Value> {
        let value = serde_json::to_value(ctx.config).context("failed to serialize configuration")?;
        println!("{}", self.render(&value)?);
        Ok(value)
    }
}
