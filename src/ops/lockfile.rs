//! Lockfile schema check and migration.
//!
//! A lockfile written by an older major schema is either rejected, or with
//! `--force` backed up to `<lockfile>.old`, deleted and rebuilt by
//! reinstalling every library it recorded. A failed migration is not rolled
//! back: the backup stays on disk for manual recovery.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::core::lockfile::{is_behind_schema, schema_version, LockedLibrary, LockfileRecord};
use crate::error::BootstrapError;
use crate::installer::Installer;
use crate::util::fs::{copy_atomic, with_appended_extension};

/// Where the lockfile check ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationState {
    /// No lockfile on disk; treated as a fresh, compatible record.
    NoLockfile,
    Compatible,
    /// Incompatible and `--force` was not given.
    IncompatibleBlocked,
    /// Incompatible, backing up and reinstalling.
    IncompatibleMigrating,
    MigrationFailed,
    MigrationComplete,
}

impl MigrationState {
    /// Whether bootstrap may continue from this state.
    pub fn may_proceed(self) -> bool {
        matches!(
            self,
            MigrationState::NoLockfile
                | MigrationState::Compatible
                | MigrationState::MigrationComplete
        )
    }
}

/// Flags that steer a migration.
#[derive(Debug, Clone, Copy, Default)]
pub struct MigrationOptions {
    pub force: bool,
    pub verbose: bool,
    pub quiet: bool,
}

/// Result of a successful lockfile check.
#[derive(Debug, Clone, PartialEq)]
pub struct LockfileCheck {
    pub state: MigrationState,
    /// The record bootstrap continues with; after a migration this is the installer's state.
    pub record: LockfileRecord,
    /// Backup written during migration.
    pub backup: Option<PathBuf>,
}

impl LockfileCheck {
    fn settled(state: MigrationState, record: LockfileRecord) -> Self {
        LockfileCheck {
            state,
            record,
            backup: None,
        }
    }
}

/// Check the installer's lockfile against the current schema, migrating it if allowed.
pub fn check_lockfile(
    installer: &mut dyn Installer,
    opts: MigrationOptions,
) -> Result<LockfileCheck, BootstrapError> {
    let path = installer.lockfile_path();

    let Some(record) = read_lockfile(&path) else {
        tracing::debug!("no lockfile at {}", path.display());
        return Ok(LockfileCheck::settled(
            MigrationState::NoLockfile,
            LockfileRecord::fresh(),
        ));
    };

    let file_version = record.file_version();
    let schema_version = schema_version();
    if !is_behind_schema(&file_version, &schema_version) {
        tracing::debug!(
            "lockfile {} is compatible (version {})",
            path.display(),
            file_version
        );
        return Ok(LockfileCheck::settled(MigrationState::Compatible, record));
    }

    if !opts.force {
        tracing::debug!("lockfile check: {:?}", MigrationState::IncompatibleBlocked);
        return Err(BootstrapError::SchemaDrift {
            lockfile: path,
            file_version,
            schema_version,
        });
    }

    tracing::debug!(
        "lockfile check: {:?}, {} from {} to {}",
        MigrationState::IncompatibleMigrating,
        path.display(),
        file_version,
        schema_version
    );
    let mut migration = Migration {
        installer,
        path,
        opts,
    };
    match migration.run(&record) {
        Ok((record, backup)) => Ok(LockfileCheck {
            state: MigrationState::MigrationComplete,
            record,
            backup: Some(backup),
        }),
        Err(err) => {
            tracing::debug!("lockfile check: {:?}", MigrationState::MigrationFailed);
            Err(err)
        }
    }
}

/// Load the lockfile; an unparseable one counts as absent.
fn read_lockfile(path: &Path) -> Option<LockfileRecord> {
    match LockfileRecord::load(path) {
        Ok(record) => record,
        Err(e) => {
            tracing::warn!("ignoring unreadable lockfile: {:#}", e);
            None
        }
    }
}

struct Migration<'a> {
    installer: &'a mut dyn Installer,
    path: PathBuf,
    opts: MigrationOptions,
}

impl Migration<'_> {
    fn run(&mut self, old: &LockfileRecord) -> Result<(LockfileRecord, PathBuf), BootstrapError> {
        let backup = with_appended_extension(&self.path, "old");
        copy_atomic(&self.path, &backup).map_err(|e| self.failed("backing up the lockfile", e))?;
        if !self.opts.quiet {
            tracing::warn!(
                "*** A backup of {} has been saved to {}, in case you need to revert to it. ***",
                self.path.display(),
                backup.display()
            );
        }

        self.installer
            .delete_lockfile()
            .map_err(|e| self.failed("deleting the lockfile", e))?;

        for library in &old.libraries {
            self.reinstall(library)
                .map_err(|e| self.failed("reinstalling libraries", e))?;
        }

        let record = self
            .installer
            .lockfile_data()
            .map_err(|e| self.failed("reading the installer state", e))?;
        record
            .save(&self.path)
            .map_err(|e| self.failed("writing the new lockfile", e))?;

        Ok((record, backup))
    }

    fn reinstall(&mut self, library: &LockedLibrary) -> Result<()> {
        let tag = library.repo_tag.as_deref();
        if self.installer.is_installed(&library.uri, tag)? {
            if self.opts.verbose {
                tracing::info!(">>> {} is already installed.", library.display_id());
            }
            return Ok(());
        }

        match (tag, library.path.as_deref().map(Path::new)) {
            (Some(tag), _) => self
                .installer
                .install(&library.uri, tag)
                .with_context(|| format!("failed to install {}", library.display_id())),
            (None, Some(path)) if path.exists() => self
                .installer
                .install_from_local_path(path, &library.uri)
                .with_context(|| {
                    format!("failed to install {} from {}", library.uri, path.display())
                }),
            _ => {
                tracing::warn!(
                    "cannot reinstall {}: no release tag and no local path recorded",
                    library.uri
                );
                Ok(())
            }
        }
    }

    fn failed(&self, step: &'static str, source: anyhow::Error) -> BootstrapError {
        BootstrapError::MigrationFailed {
            lockfile: self.path.clone(),
            step,
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MockInstaller, ProjectFixture};

    const OLD_LOCKFILE: &str = r#"{
  "version": "1.0.0",
  "libraries": [
    {"uri": "qooxdoo/qxl.dialog", "repo_tag": "v3.0.0", "path": "qx_packages/dialog"},
    {"uri": "qooxdoo/qxl.widgets", "repo_tag": "v1.2.0", "path": "qx_packages/widgets"}
  ]
}"#;

    fn force() -> MigrationOptions {
        MigrationOptions {
            force: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_no_lockfile_is_fresh() {
        let project = ProjectFixture::new();
        let mut installer = MockInstaller::new(project.lockfile_path());

        let check = check_lockfile(&mut installer, MigrationOptions::default()).unwrap();
        assert_eq!(check.state, MigrationState::NoLockfile);
        assert_eq!(check.record, LockfileRecord::fresh());
        assert!(installer.calls().is_empty());
    }

    #[test]
    fn test_compatible_lockfile() {
        let project = ProjectFixture::new().with_lockfile(
            r#"{"version": "2.3.0", "libraries": [{"uri": "a/b", "path": "qx_packages/b"}]}"#,
        );
        let mut installer = MockInstaller::new(project.lockfile_path());

        let check = check_lockfile(&mut installer, MigrationOptions::default()).unwrap();
        assert_eq!(check.state, MigrationState::Compatible);
        assert_eq!(check.record.libraries.len(), 1);
        assert!(check.state.may_proceed());
    }

    #[test]
    fn test_malformed_lockfile_counts_as_absent() {
        let project = ProjectFixture::new().with_lockfile("{ nope");
        let mut installer = MockInstaller::new(project.lockfile_path());

        let check = check_lockfile(&mut installer, MigrationOptions::default()).unwrap();
        assert_eq!(check.state, MigrationState::NoLockfile);
    }

    #[test]
    fn test_missing_version_is_behind() {
        let project = ProjectFixture::new().with_lockfile(r#"{"libraries": []}"#);
        let mut installer = MockInstaller::new(project.lockfile_path());

        let err = check_lockfile(&mut installer, MigrationOptions::default()).unwrap_err();
        match err {
            BootstrapError::SchemaDrift { file_version, .. } => {
                assert_eq!(file_version, semver::Version::new(1, 0, 0));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_drift_without_force_touches_nothing() {
        let project = ProjectFixture::new().with_lockfile(OLD_LOCKFILE);
        let mut installer = MockInstaller::new(project.lockfile_path());

        let err = check_lockfile(&mut installer, MigrationOptions::default()).unwrap_err();
        match &err {
            BootstrapError::SchemaDrift { lockfile, .. } => {
                assert_eq!(lockfile, &project.lockfile_path());
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.to_string().contains("--force"));
        assert!(installer.calls().is_empty());
        assert_eq!(project.read("qx-lock.json"), OLD_LOCKFILE);
        assert!(!project.path("qx-lock.json.old").exists());
    }

    #[test]
    fn test_forced_migration() {
        let project = ProjectFixture::new().with_lockfile(OLD_LOCKFILE);
        let mut installer = MockInstaller::new(project.lockfile_path())
            .with_installed("qooxdoo/qxl.widgets", Some("v1.2.0"));

        let check = check_lockfile(&mut installer, force()).unwrap();
        assert_eq!(check.state, MigrationState::MigrationComplete);
        assert_eq!(check.backup, Some(project.path("qx-lock.json.old")));

        // The backup holds the original content and survives the migration.
        assert_eq!(project.read("qx-lock.json.old"), OLD_LOCKFILE);

        assert_eq!(
            installer.calls(),
            [
                "delete_lockfile",
                "is_installed qooxdoo/qxl.dialog@v3.0.0",
                "install qooxdoo/qxl.dialog v3.0.0",
                "is_installed qooxdoo/qxl.widgets@v1.2.0",
                "lockfile_data",
            ]
        );

        let written = LockfileRecord::load(&project.lockfile_path()).unwrap().unwrap();
        assert_eq!(written, check.record);
        assert_eq!(written.version.as_deref(), Some("2.0.0"));
        let uris: Vec<_> = written.libraries.iter().map(|l| l.uri.as_str()).collect();
        assert_eq!(uris, ["qooxdoo/qxl.dialog", "qooxdoo/qxl.widgets"]);
    }

    #[test]
    fn test_forced_migration_from_local_path() {
        let project = ProjectFixture::new().with_library("local/lib");
        let local = project.path("local/lib");
        project.write(
            "qx-lock.json",
            &format!(
                r#"{{"version": "1", "libraries": [{{"uri": "me/lib", "path": {}}}]}}"#,
                serde_json::to_string(&local.display().to_string()).unwrap()
            ),
        );
        let mut installer = MockInstaller::new(project.lockfile_path());

        check_lockfile(&mut installer, force()).unwrap();
        assert_eq!(
            installer.count(&format!("install_from_local_path {}", local.display())),
            1
        );
    }

    #[test]
    fn test_failed_reinstall_keeps_backup() {
        let project = ProjectFixture::new().with_lockfile(OLD_LOCKFILE);
        let mut installer =
            MockInstaller::new(project.lockfile_path()).failing_on("qooxdoo/qxl.dialog");

        let err = check_lockfile(&mut installer, force()).unwrap_err();
        match err {
            BootstrapError::MigrationFailed { step, .. } => {
                assert_eq!(step, "reinstalling libraries");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(project.read("qx-lock.json.old"), OLD_LOCKFILE);
        assert!(!project.lockfile_path().exists());
        assert_eq!(installer.count("lockfile_data"), 0);
    }

    #[test]
    fn test_may_proceed() {
        assert!(MigrationState::MigrationComplete.may_proceed());
        assert!(!MigrationState::IncompatibleBlocked.may_proceed());
        assert!(!MigrationState::MigrationFailed.may_proceed());
    }
}
