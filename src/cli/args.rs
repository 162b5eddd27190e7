//! Two-pass command line parsing.
//!
//! The bootstrap pass runs before any configuration or plugin is loaded and
//! only understands `--force`, `--config-file`, `--verbose` and `--quiet`;
//! everything else on the command line is ignored. The full pass runs once
//! every command has been registered and is strict.

use std::path::PathBuf;
use std::sync::LazyLock;

use clap::{ArgAction, ArgMatches, Args, Command, FromArgMatches, Parser};
use regex::Regex;

use crate::commands::PASSTHROUGH_COMMANDS;
use crate::error::{BootstrapError, Result};

/// `key=value` with a non-empty key free of `=` and whitespace, and a non-empty value.
static SET_ENV_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^=\s]+=.+$").expect("valid set-env pattern"));

const ABOUT: &str = "qooxdoo command line interface";

/// The process invocation, program name first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawArguments(Vec<String>);

impl RawArguments {
    pub fn new(args: Vec<String>) -> Self {
        RawArguments(args)
    }

    /// Arguments of the running process.
    pub fn from_env() -> Self {
        RawArguments(std::env::args().collect())
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// True iff a token is exactly `-name` or `--name`.
    ///
    /// Tells a value the user typed apart from a default. Aliases and the
    /// `--name=value` form are not recognized; pass the full option name.
    pub fn is_explicit_arg(&self, name: &str) -> bool {
        let short = format!("-{}", name);
        let long = format!("--{}", name);
        self.0.iter().any(|token| *token == short || *token == long)
    }
}

/// Options known before configuration is loaded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Args)]
pub struct BootstrapArgs {
    /// Override warnings
    #[arg(short = 'F', long, global = true)]
    pub force: bool,

    /// Specify the config file to use
    #[arg(short = 'c', long, global = true, env = "QX_CONFIG_FILE", value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Enables additional progress output to console
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppresses normal progress output to console
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// First positional token, i.e. the command the user asked for.
    #[arg(skip)]
    pub command: Option<String>,
}

impl BootstrapArgs {
    /// Whether the selected command works without libraries.
    pub fn needs_libraries(&self) -> bool {
        self.command.as_deref() != Some(crate::commands::NO_LIBRARY_COMMAND)
    }
}

#[derive(Debug, Parser)]
#[command(name = "qx", disable_help_flag = true, disable_version_flag = true)]
struct BootstrapCli {
    #[command(flatten)]
    args: BootstrapArgs,
}

/// Options known once every command is registered.
#[derive(Debug, Clone, Default, Args)]
pub struct GlobalArgs {
    #[command(flatten)]
    pub bootstrap: BootstrapArgs,

    /// Sets an environment value for the compiler
    #[arg(long, global = true, value_name = "KEY=VALUE", action = ArgAction::Append)]
    pub set: Vec<String>,

    /// Sets an environment value for the application
    #[arg(long, global = true, value_name = "KEY=VALUE", action = ArgAction::Append)]
    pub set_env: Vec<String>,
}

/// Result of the full parse.
#[derive(Debug, Clone)]
pub struct FullArgs {
    pub globals: GlobalArgs,
    /// Name of the selected command (aliases resolved).
    pub command: String,
    /// The selected command's own options.
    pub matches: ArgMatches,
    /// `--set-env` entries, validated and split.
    pub environment: Vec<(String, String)>,
}

impl FullArgs {
    pub fn bootstrap(&self) -> &BootstrapArgs {
        &self.globals.bootstrap
    }

    /// `--set` entries as key/value pairs; a bare key means `true`.
    pub fn compiler_settings(&self) -> Vec<(String, serde_json::Value)> {
        self.globals
            .set
            .iter()
            .map(|entry| match entry.split_once('=') {
                Some((key, value)) => (key.to_string(), serde_json::Value::String(value.to_string())),
                None => (entry.clone(), serde_json::Value::Bool(true)),
            })
            .collect()
    }

    /// A string option of the selected command, if it defines and received one.
    pub fn string_option(&self, id: &str) -> Option<String> {
        self.matches.try_get_one::<String>(id).ok().flatten().cloned()
    }

    /// A boolean option of the selected command; `None` when not given.
    pub fn bool_option(&self, id: &str) -> Option<bool> {
        self.matches.try_get_one::<bool>(id).ok().flatten().copied()
    }

    /// A port option of the selected command, including its default.
    pub fn port_option(&self, id: &str) -> Option<u16> {
        self.matches.try_get_one::<u16>(id).ok().flatten().copied()
    }

    /// A repeatable string option of the selected command.
    pub fn strings_option(&self, id: &str) -> Vec<String> {
        self.matches
            .try_get_many::<String>(id)
            .ok()
            .flatten()
            .map(|values| values.cloned().collect())
            .unwrap_or_default()
    }
}

/// First pass: pick out the bootstrap options and ignore everything else.
pub fn parse_bootstrap(raw: &RawArguments) -> Result<BootstrapArgs> {
    let (tokens, command) = select_bootstrap_tokens(raw.as_slice());
    let cli = BootstrapCli::try_parse_from(tokens)?;
    Ok(BootstrapArgs {
        command,
        ..cli.args
    })
}

/// Keep the tokens that belong to bootstrap options and note the first positional.
fn select_bootstrap_tokens(raw: &[String]) -> (Vec<String>, Option<String>) {
    let mut selected = vec![raw.first().cloned().unwrap_or_else(|| "qx".to_string())];
    let mut command: Option<String> = None;
    let mut tokens = raw.iter().skip(1);

    while let Some(token) = tokens.next() {
        // Past this point the full parse hands everything to the command.
        let passthrough = command
            .as_deref()
            .is_some_and(|name| PASSTHROUGH_COMMANDS.contains(&name));

        match token.as_str() {
            "--" => {
                if command.is_none() {
                    command = tokens.next().cloned();
                }
                break;
            }
            "--force" | "--verbose" | "--quiet" => selected.push(token.clone()),
            // Their values are not commands.
            "--set" | "--set-env" => {
                tokens.next();
            }
            "--config-file" | "-c" => {
                selected.push(token.clone());
                if let Some(value) = tokens.next() {
                    selected.push(value.clone());
                }
            }
            t if t.starts_with("--config-file=") => selected.push(token.clone()),
            t if t.starts_with("-c") && !t.starts_with("--") => selected.push(token.clone()),
            t if is_bootstrap_cluster(t) => selected.push(token.clone()),
            _ if passthrough => break,
            t if t.starts_with('-') && t.len() > 1 => {}
            _ => {
                if command.is_none() {
                    command = Some(token.clone());
                }
            }
        }
    }

    (selected, command)
}

/// `-v`, `-Fq`, `-vqF`, ...
fn is_bootstrap_cluster(token: &str) -> bool {
    match token.strip_prefix('-') {
        Some(flags) if !flags.is_empty() && !flags.starts_with('-') => {
            flags.chars().all(|c| matches!(c, 'F' | 'v' | 'q'))
        }
        _ => false,
    }
}

/// Second pass: every option, exactly one registered command.
pub fn parse_full(raw: &RawArguments, commands: Vec<Command>) -> Result<FullArgs> {
    let cli = GlobalArgs::augment_args(
        Command::new("qx")
            .version(env!("CARGO_PKG_VERSION"))
            .about(ABOUT),
    )
    .subcommands(commands)
    .subcommand_required(true);

    let matches = cli.try_get_matches_from(raw.as_slice())?;
    let globals = GlobalArgs::from_arg_matches(&matches)?;

    let (command, sub_matches) = matches
        .subcommand()
        .ok_or_else(|| BootstrapError::usage("a command is required"))?;

    let environment = validate_set_env(&globals.set_env)?;

    Ok(FullArgs {
        command: command.to_string(),
        matches: sub_matches.clone(),
        environment,
        globals,
    })
}

/// Check every `--set-env` entry; all offenders are reported together.
pub fn validate_set_env(entries: &[String]) -> Result<Vec<(String, String)>> {
    let offending: Vec<String> = entries
        .iter()
        .filter(|entry| !SET_ENV_PATTERN.is_match(entry))
        .cloned()
        .collect();
    if !offending.is_empty() {
        return Err(BootstrapError::Validation { entries: offending });
    }

    Ok(entries
        .iter()
        .filter_map(|entry| entry.split_once('='))
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect())
}

/// The full parse must agree with the bootstrap parse on the shared options.
pub fn ensure_consistent(bootstrap: &BootstrapArgs, full: &FullArgs) -> Result<()> {
    let full = full.bootstrap();
    if bootstrap.force != full.force
        || bootstrap.verbose != full.verbose
        || bootstrap.quiet != full.quiet
        || bootstrap.config_file != full.config_file
    {
        return Err(BootstrapError::usage(
            "global options were interpreted differently by the full parse; pass --force, \
             --config-file, --verbose and --quiet as separate arguments",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::argv;
    use clap::Arg;

    fn raw(args: &[&str]) -> RawArguments {
        RawArguments::new(argv(args))
    }

    fn commands() -> Vec<Command> {
        vec![
            Command::new("compile")
                .arg(Arg::new("target").long("target").short('t'))
                .arg(Arg::new("watch").long("watch").action(ArgAction::SetTrue)),
            Command::new("clean"),
        ]
    }

    #[test]
    fn test_bootstrap_defaults() {
        let args = parse_bootstrap(&raw(&[])).unwrap();
        assert!(!args.force);
        assert!(!args.verbose);
        assert!(!args.quiet);
        assert_eq!(args.config_file, None);
        assert_eq!(args.command, None);
    }

    #[test]
    fn test_bootstrap_ignores_unknown_flags() {
        let args = parse_bootstrap(&raw(&[
            "compile",
            "--target",
            "build",
            "--watch",
            "-F",
            "--config-file",
            "app/compile.json",
            "-vq",
        ]))
        .unwrap();

        assert!(args.force);
        assert!(args.verbose);
        assert!(args.quiet);
        assert_eq!(args.config_file, Some(PathBuf::from("app/compile.json")));
        assert_eq!(args.command.as_deref(), Some("compile"));
    }

    #[test]
    fn test_bootstrap_config_file_forms() {
        let args = parse_bootstrap(&raw(&["--config-file=qx.json", "clean"])).unwrap();
        assert_eq!(args.config_file, Some(PathBuf::from("qx.json")));
        assert!(!args.needs_libraries());

        let args = parse_bootstrap(&raw(&["-c", "qx.toml", "compile"])).unwrap();
        assert_eq!(args.config_file, Some(PathBuf::from("qx.toml")));
        assert!(args.needs_libraries());
    }

    #[test]
    fn test_bootstrap_stops_at_passthrough_args() {
        let args = parse_bootstrap(&raw(&["package", "-F", "install", "--save", "-v", "uri"])).unwrap();
        assert!(args.force);
        assert!(!args.verbose);
        assert_eq!(args.command.as_deref(), Some("package"));

        let args = parse_bootstrap(&raw(&["compile", "--watch", "-v"])).unwrap();
        assert!(args.verbose);
    }

    #[test]
    fn test_bootstrap_skips_global_option_values() {
        let args = parse_bootstrap(&raw(&["--set-env", "qx.debug=true", "--set", "x", "clean"])).unwrap();
        assert_eq!(args.command.as_deref(), Some("clean"));
    }

    #[test]
    fn test_bootstrap_does_not_require_command() {
        let args = parse_bootstrap(&raw(&["--verbose"])).unwrap();
        assert!(args.verbose);
        assert_eq!(args.command, None);
    }

    #[test]
    fn test_full_requires_command() {
        let err = parse_full(&raw(&["--verbose"]), commands()).unwrap_err();
        assert!(matches!(err, BootstrapError::Usage { .. }));
    }

    #[test]
    fn test_full_rejects_unknown_command() {
        let err = parse_full(&raw(&["frobnicate"]), commands()).unwrap_err();
        assert!(matches!(err, BootstrapError::Usage { .. }));
    }

    #[test]
    fn test_full_rejects_unknown_flag() {
        let err = parse_full(&raw(&["compile", "--bogus"]), commands()).unwrap_err();
        assert!(matches!(err, BootstrapError::Usage { .. }));
    }

    #[test]
    fn test_full_parses_command_options() {
        let full = parse_full(
            &raw(&["compile", "--target", "build", "--watch", "-v", "--set", "a=1", "--set", "flag"]),
            commands(),
        )
        .unwrap();

        assert_eq!(full.command, "compile");
        assert_eq!(full.string_option("target").as_deref(), Some("build"));
        assert!(full.bootstrap().verbose);
        assert_eq!(
            full.compiler_settings(),
            vec![
                ("a".to_string(), serde_json::json!("1")),
                ("flag".to_string(), serde_json::json!(true)),
            ]
        );
        // Options the command does not define are simply absent.
        assert_eq!(full.string_option("output-path"), None);
        assert_eq!(full.port_option("listen-port"), None);
    }

    #[test]
    fn test_set_env_accepts_values_with_equals() {
        let full = parse_full(
            &raw(&["compile", "--set-env", "FOO=bar", "--set-env", "BAZ=1=2"]),
            commands(),
        )
        .unwrap();
        assert_eq!(
            full.environment,
            vec![
                ("FOO".to_string(), "bar".to_string()),
                ("BAZ".to_string(), "1=2".to_string()),
            ]
        );
    }

    #[test]
    fn test_set_env_rejects_missing_key() {
        let err = parse_full(&raw(&["compile", "--set-env", "=bar"]), commands()).unwrap_err();
        match err {
            BootstrapError::Validation { entries } => assert_eq!(entries, ["=bar"]),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_set_env_rejects_missing_value() {
        let err = parse_full(&raw(&["compile", "--set-env", "FOO"]), commands()).unwrap_err();
        assert!(matches!(err, BootstrapError::Validation { .. }));
    }

    #[test]
    fn test_set_env_aggregates_offenders() {
        let err = validate_set_env(&[
            "OK=1".to_string(),
            "BAD".to_string(),
            "SP ACE=1".to_string(),
            "EMPTY=".to_string(),
        ])
        .unwrap_err();
        match err {
            BootstrapError::Validation { entries } => {
                assert_eq!(entries, ["BAD", "SP ACE=1", "EMPTY="]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_is_explicit_arg() {
        let args = raw(&["serve", "--listen-port", "9090"]);
        assert!(args.is_explicit_arg("listen-port"));
        assert!(!args.is_explicit_arg("listen"));

        let args = raw(&["serve", "--listen-port=9090"]);
        assert!(!args.is_explicit_arg("listen-port"));
    }

    #[test]
    fn test_bootstrap_and_full_agree() {
        let raw = raw(&["compile", "-F", "--verbose"]);
        let bootstrap = parse_bootstrap(&raw).unwrap();
        let full = parse_full(&raw, commands()).unwrap();
        ensure_consistent(&bootstrap, &full).unwrap();
    }
}
