//! `qx clean` command

use anyhow::Result;
use clap::{Arg, ArgAction};
use serde_json::{json, Value};

use super::{Command, CommandContext, CommandDef, CommandSpec};
use crate::cli::FullArgs;
use crate::core::config::{ConfigDescriptor, TargetDefinition, DEFAULT_TARGET_TYPE};
use crate::util::fs::remove_dir_all_if_exists;

pub const CLEAN: CommandDef = CommandDef {
    spec,
    factory: CleanCommand::from_args,
};

fn spec() -> Option<CommandSpec> {
    Some(CommandSpec {
        name: "clean",
        about: "Cleans generated files",
        options: |command| {
            command.arg(
                Arg::new("all")
                    .long("all")
                    .action(ArgAction::SetTrue)
                    .help("Remove the output of every target, not only the selected one"),
            )
        },
        handler: None,
    })
}

/// Removes target output directories.
#[derive(Debug, Clone, Default)]
pub struct CleanCommand {
    all: bool,
}

impl CleanCommand {
    pub fn new(all: bool) -> Self {
        CleanCommand { all }
    }

    pub fn from_args(full: &FullArgs) -> Result<Box<dyn Command>> {
        Ok(Box::new(CleanCommand::new(
            full.bool_option("all").unwrap_or(false),
        )))
    }
}

/// Output directories to remove, relative to the project root.
fn output_dirs(config: &ConfigDescriptor, all: bool) -> Vec<String> {
    let selected = config.target_type.as_deref().unwrap_or(DEFAULT_TARGET_TYPE);
    let mut dirs: Vec<String> = match &config.targets {
        Some(targets) => targets
            .iter()
            .filter(|t| all || t.target_type == selected)
            .map(TargetDefinition::output_dir)
            .collect(),
        None if all => ["source", "build"]
            .into_iter()
            .map(|t| TargetDefinition::new(t).output_dir())
            .collect(),
        None => vec![TargetDefinition::new(selected).output_dir()],
    };
    dirs.dedup();
    dirs
}

impl Command for CleanCommand {
    fn name(&self) -> &str {
        "clean"
    }

    fn process(&mut self, ctx: &mut CommandContext<'_>) -> Result<Value> {
        let mut removed = Vec::new();

        for dir in output_dirs(ctx.config, self.all) {
            let path = ctx.project_root.join(&dir);
            if remove_dir_all_if_exists(&path)? {
                if !ctx.quiet {
                    eprintln!("     Removed {}", path.display());
                }
                removed.push(dir);
            }
        }

        Ok(json!({ "removed": removed }))
    }
}
