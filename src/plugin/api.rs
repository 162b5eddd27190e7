//! The shared context plugins are driven through.

use std::path::Path;

use super::{ConfigurationProvider, LibraryExtension};
use crate::core::config::ConfigDescriptor;
use crate::core::library::LibraryEntry;
use crate::error::{BootstrapError, Result};

/// Owns the configuration provider, the configuration it produced and the
/// libraries taking part in the build.
pub struct CompilerApi {
    provider: Box<dyn ConfigurationProvider>,
    config: ConfigDescriptor,
    libraries: Vec<LibraryEntry>,
    command: Option<String>,
    libraries_notified: bool,
}

impl CompilerApi {
    pub fn new(provider: Box<dyn ConfigurationProvider>) -> Self {
        CompilerApi {
            provider,
            config: ConfigDescriptor::default(),
            libraries: Vec::new(),
            command: None,
            libraries_notified: false,
        }
    }

    /// Ask the provider for the configuration.
    pub fn load(&mut self, config_path: &Path) -> Result<()> {
        self.config = self
            .provider
            .load_configuration(config_path)
            .map_err(|e| {
                BootstrapError::io(
                    format!("failed to load configuration from {}", config_path.display()),
                    e,
                )
            })?;
        tracing::debug!(
            "configuration loaded from {} by the {} provider",
            config_path.display(),
            self.provider.name()
        );
        Ok(())
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn configuration(&self) -> &ConfigDescriptor {
        &self.config
    }

    pub fn configuration_mut(&mut self) -> &mut ConfigDescriptor {
        &mut self.config
    }

    pub fn add_library(&mut self, library: LibraryEntry) {
        self.libraries.push(library);
    }

    pub fn libraries(&self) -> &[LibraryEntry] {
        &self.libraries
    }

    /// Record the command about to run and tell the provider.
    pub fn set_command(&mut self, command: &str) {
        self.command = Some(command.to_string());
        self.provider.command_selected(command);
    }

    pub fn command(&self) -> Option<&str> {
        self.command.as_deref()
    }

    pub fn libraries_notified(&self) -> bool {
        self.libraries_notified
    }

    /// Fire every library's `load` hook, then the provider's `after_libraries_loaded`.
    ///
    /// Only the first call does anything.
    pub fn notify_libraries(&mut self) -> Result<()> {
        if self.libraries_notified {
            return Ok(());
        }
        self.libraries_notified = true;

        for library in &mut self.libraries {
            library
                .extension
                .load(&mut self.config)
                .map_err(|source| BootstrapError::ExtensionHook {
                    hook: "load",
                    subject: library.root_path.display().to_string(),
                    source,
                })?;
        }

        self.provider
            .after_libraries_loaded(&mut self.config)
            .map_err(|source| BootstrapError::ExtensionHook {
                hook: "afterLibrariesLoaded",
                subject: format!("the {} provider", self.provider.name()),
                source,
            })
    }
}

impl std::fmt::Debug for CompilerApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompilerApi")
            .field("provider", &self.provider.name())
            .field("libraries", &self.libraries)
            .field("command", &self.command)
            .field("libraries_notified", &self.libraries_notified)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::path::PathBuf;
    use std::rc::Rc;

    use crate::plugin::builtin::DefaultProvider;

    struct Counting {
        loads: Rc<Cell<usize>>,
    }

    impl LibraryExtension for Counting {
        fn name(&self) -> &str {
            "counting"
        }

        fn load(&mut self, config: &mut ConfigDescriptor) -> anyhow::Result<()> {
            self.loads.set(self.loads.get() + 1);
            config.environment_mut().insert(
                format!("loaded.{}", self.loads.get()),
                serde_json::Value::Bool(true),
            );
            Ok(())
        }
    }

    #[derive(Default)]
    struct Recording {
        commands: Rc<std::cell::RefCell<Vec<String>>>,
        after: Rc<Cell<usize>>,
    }

    impl ConfigurationProvider for Recording {
        fn name(&self) -> &str {
            "recording"
        }

        fn command_selected(&mut self, command: &str) {
            self.commands.borrow_mut().push(command.to_string());
        }

        fn after_libraries_loaded(&mut self, _config: &mut ConfigDescriptor) -> anyhow::Result<()> {
            self.after.set(self.after.get() + 1);
            Ok(())
        }
    }

    struct Failing;

    impl LibraryExtension for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn load(&mut self, _config: &mut ConfigDescriptor) -> anyhow::Result<()> {
            anyhow::bail!("theme files missing")
        }
    }

    #[test]
    fn test_notify_libraries_is_idempotent() {
        let provider = Recording::default();
        let after = provider.after.clone();
        let mut api = CompilerApi::new(Box::new(provider));

        let first = Rc::new(Cell::new(0));
        let second = Rc::new(Cell::new(0));
        api.add_library(LibraryEntry::new(
            PathBuf::from("a"),
            Box::new(Counting { loads: first.clone() }),
        ));
        api.add_library(LibraryEntry::new(
            PathBuf::from("b"),
            Box::new(Counting { loads: second.clone() }),
        ));

        api.notify_libraries().unwrap();
        api.notify_libraries().unwrap();

        assert_eq!(first.get(), 1);
        assert_eq!(second.get(), 1);
        assert_eq!(after.get(), 1);
        assert!(api.libraries_notified());
    }

    #[test]
    fn test_set_command_reaches_provider() {
        let provider = Recording::default();
        let commands = provider.commands.clone();
        let mut api = CompilerApi::new(Box::new(provider));

        api.set_command("compile");
        assert_eq!(api.command(), Some("compile"));
        assert_eq!(*commands.borrow(), ["compile"]);
    }

    #[test]
    fn test_failing_load_hook() {
        let mut api = CompilerApi::new(Box::new(DefaultProvider));
        api.add_library(LibraryEntry::new(PathBuf::from("lib/theme"), Box::new(Failing)));

        let err = api.notify_libraries().unwrap_err();
        match err {
            BootstrapError::ExtensionHook { hook, subject, .. } => {
                assert_eq!(hook, "load");
                assert_eq!(subject, "lib/theme");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_load_missing_descriptor_is_default() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut api = CompilerApi::new(Box::new(DefaultProvider));
        api.load(&tmp.path().join("compile.json")).unwrap();
        assert_eq!(api.configuration(), &ConfigDescriptor::default());
        assert_eq!(api.provider_name(), "default");
    }
}
