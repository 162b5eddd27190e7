//! Bootstrap sequence.
//!
//! The steps run in this order: bootstrap parse, primary plugin and
//! configuration, lockfile check, libraries, full parse, effective
//! configuration, dispatch. Each step only
//! starts once the previous one has finished; later steps rely on the files
//! earlier ones left behind.

use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::backend::CommandBackend;
use crate::cli::{ensure_consistent, parse_bootstrap, parse_full, BootstrapArgs, FullArgs, RawArguments};
use crate::commands::{Command, CommandContext, CommandRegistry};
use crate::core::config::CONFIG_FILE_NAME;
use crate::core::lockfile::LOCKFILE_NAME;
use crate::error::{BootstrapError, Result};
use crate::installer::Installer;
use crate::ops::assemble::{assemble, merge_libraries, Overrides};
use crate::ops::libraries::{library_roots, load_libraries, resolve_libraries};
use crate::ops::lockfile::{check_lockfile, MigrationOptions};
use crate::plugin::builtin::DefaultProvider;
use crate::plugin::{CompilerApi, ConfigurationProvider, PluginLoader, PLUGIN_FILE_NAME};
use crate::util::config::ToolConfig;
use crate::util::logging::{LogHandle, Verbosity};

/// Where the project's files are.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectLayout {
    pub root: PathBuf,
    /// Configuration descriptor (`compile.json`).
    pub config_path: PathBuf,
    /// Primary plugin module (`compile.toml`).
    pub plugin_path: PathBuf,
    /// Lockfile, next to the descriptor.
    pub lockfile_path: PathBuf,
}

impl ProjectLayout {
    /// Locate the project files; a `.toml` config file names the plugin module.
    pub fn locate(root: &Path, config_file: Option<&Path>) -> Self {
        let mut config_path = root.join(CONFIG_FILE_NAME);
        let mut plugin_path = root.join(PLUGIN_FILE_NAME);

        if let Some(file) = config_file {
            if file.extension().is_some_and(|ext| ext == "toml") {
                plugin_path = root.join(file);
            } else {
                config_path = root.join(file);
            }
        }

        let lockfile_path = config_path.parent().unwrap_or(root).join(LOCKFILE_NAME);
        ProjectLayout {
            root: root.to_path_buf(),
            config_path,
            plugin_path,
            lockfile_path,
        }
    }
}

/// Everything a command needs once bootstrap is done.
pub struct Session<'a> {
    api: CompilerApi,
    project_root: PathBuf,
    verbosity: Verbosity,
    log: Option<LogHandle>,
    backend: &'a mut dyn CommandBackend,
}

impl<'a> Session<'a> {
    pub fn new(
        api: CompilerApi,
        project_root: PathBuf,
        verbosity: Verbosity,
        backend: &'a mut dyn CommandBackend,
    ) -> Self {
        Session {
            api,
            project_root,
            verbosity,
            log: None,
            backend,
        }
    }

    pub fn with_log_handle(mut self, log: Option<LogHandle>) -> Self {
        self.log = log;
        self
    }

    pub fn api(&self) -> &CompilerApi {
        &self.api
    }

    pub fn api_mut(&mut self) -> &mut CompilerApi {
        &mut self.api
    }

    /// Run a command with the uniform setup and error handling.
    pub fn process_command(&mut self, mut command: Box<dyn Command>) -> Result<Value> {
        if let Some(log) = &self.log {
            if let Err(e) = log.set_verbosity(self.verbosity) {
                tracing::debug!("{:#}", e);
            }
        }

        let name = command.name().to_string();
        self.api.set_command(&name);
        self.api.notify_libraries()?;

        let mut ctx = CommandContext {
            config: self.api.configuration(),
            project_root: &self.project_root,
            backend: &mut *self.backend,
            quiet: self.verbosity == Verbosity::Quiet,
        };
        command.process(&mut ctx).map_err(|source| {
            tracing::error!("Error: {:?}", source);
            BootstrapError::Command {
                command: name,
                source,
            }
        })
    }
}

/// One run of the tool, from raw arguments to a dispatched command.
pub struct Bootstrap {
    raw: RawArguments,
    args: BootstrapArgs,
    layout: ProjectLayout,
    loader: PluginLoader,
    registry: CommandRegistry,
    log: Option<LogHandle>,
}

impl Bootstrap {
    /// Run the bootstrap parse and locate the project files.
    pub fn new(raw: RawArguments, root: &Path, tools: &ToolConfig) -> Result<Self> {
        let args = parse_bootstrap(&raw)?;
        let config_file = args
            .config_file
            .clone()
            .or_else(|| tools.project.config_file.as_ref().map(PathBuf::from));
        let layout = ProjectLayout::locate(root, config_file.as_deref());
        tracing::debug!("project layout: {:?}", layout);

        Ok(Bootstrap {
            raw,
            args,
            layout,
            loader: PluginLoader::new(),
            registry: CommandRegistry::builtin(),
            log: None,
        })
    }

    pub fn with_log_handle(mut self, log: LogHandle) -> Self {
        self.log = Some(log);
        self
    }

    pub fn args(&self) -> &BootstrapArgs {
        &self.args
    }

    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.args.verbose, self.args.quiet)
    }

    pub fn layout(&self) -> &ProjectLayout {
        &self.layout
    }

    /// For registering additional providers and extensions.
    pub fn loader_mut(&mut self) -> &mut PluginLoader {
        &mut self.loader
    }

    /// For registering additional commands.
    pub fn registry_mut(&mut self) -> &mut CommandRegistry {
        &mut self.registry
    }

    /// Bootstrap and dispatch the selected command.
    pub fn run(
        mut self,
        installer: &mut dyn Installer,
        backend: &mut dyn CommandBackend,
    ) -> Result<Value> {
        let (full, mut session) = self.prepare(installer, backend)?;
        self.registry.dispatch(&full, &mut session)
    }

    /// Everything up to, but not including, dispatch.
    pub fn prepare<'a>(
        &mut self,
        installer: &mut dyn Installer,
        backend: &'a mut dyn CommandBackend,
    ) -> Result<(FullArgs, Session<'a>)> {
        let mut api = CompilerApi::new(self.load_provider()?);
        api.load(&self.layout.config_path)?;

        let check = check_lockfile(
            installer,
            MigrationOptions {
                force: self.args.force,
                verbose: self.args.verbose,
                quiet: self.args.quiet,
            },
        )?;
        merge_libraries(api.configuration_mut(), &check.record, &self.layout.root);

        let needs_libraries = self.args.needs_libraries();
        let roots = library_roots(&self.layout.root, api.configuration().library_paths());
        resolve_libraries(&roots, needs_libraries, installer)?;
        if needs_libraries {
            for entry in load_libraries(&roots, &mut self.loader, api.configuration())? {
                api.add_library(entry);
            }
        }

        let full = parse_full(&self.raw, self.registry.clap_commands())?;
        ensure_consistent(&self.args, &full)?;
        api.notify_libraries()?;

        assemble(api.configuration_mut(), &Overrides::from_args(&full, &self.raw))?;

        let session = Session::new(api, self.layout.root.clone(), self.verbosity(), backend)
            .with_log_handle(self.log.clone());
        Ok((full, session))
    }

    /// The primary plugin's provider, or the default one.
    fn load_provider(&mut self) -> Result<Box<dyn ConfigurationProvider>> {
        let path = &self.layout.plugin_path;
        if !path.is_file() {
            if self.args.config_file.is_some() && path.extension().is_some_and(|ext| ext == "toml") {
                return Err(BootstrapError::io(
                    format!("failed to read {}", path.display()),
                    anyhow::anyhow!("plugin module does not exist"),
                ));
            }
            return Ok(Box::new(DefaultProvider));
        }

        let module = self.loader.load(path)?;
        if module.extension.is_some() {
            tracing::debug!(
                "library extension in the primary plugin {} is not used",
                path.display()
            );
        }
        Ok(module.provider.unwrap_or_else(|| Box::new(DefaultProvider)))
    }
}
