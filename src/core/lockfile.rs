//! The library lockfile (`qx-lock.json`).
//!
//! The lockfile records which libraries were installed from where, plus the
//! schema version that wrote it. Compatibility is judged on the major
//! component only.

use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;
use semver::Version;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Lockfile name, located next to the configuration descriptor.
pub const LOCKFILE_NAME: &str = "qx-lock.json";

/// Schema version written by this engine.
pub const LOCKFILE_SCHEMA_VERSION: &str = "2.0.0";

/// Baseline for lockfiles without a usable version.
const FALLBACK_VERSION: Version = Version::new(1, 0, 0);

static VERSION_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)(?:\.(\d+))?(?:\.(\d+))?").expect("valid version pattern"));

/// Persisted record of installed libraries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LockfileRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default)]
    pub libraries: Vec<LockedLibrary>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One installed library.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LockedLibrary {
    /// Repository URI, e.g. `qooxdoo/qxl.dialog`.
    pub uri: String,

    /// Local install path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Release tag the library was installed from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_tag: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl LockedLibrary {
    pub fn new(uri: impl Into<String>) -> Self {
        LockedLibrary {
            uri: uri.into(),
            ..Default::default()
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.repo_tag = Some(tag.into());
        self
    }

    /// `uri@tag` for log messages.
    pub fn display_id(&self) -> String {
        match &self.repo_tag {
            Some(tag) => format!("{}@{}", self.uri, tag),
            None => self.uri.clone(),
        }
    }
}

impl LockfileRecord {
    /// A record for a project that has no lockfile yet.
    pub fn fresh() -> Self {
        LockfileRecord {
            version: Some(LOCKFILE_SCHEMA_VERSION.to_string()),
            libraries: Vec::new(),
            extra: Map::new(),
        }
    }

    /// Parse a record from JSON text.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("invalid lockfile JSON")
    }

    /// Load the lockfile at `path`, or `None` if it does not exist.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let contents = crate::util::fs::read_to_string(path)?;
        let record = Self::from_json(&contents)
            .with_context(|| format!("failed to parse lockfile: {}", path.display()))?;
        Ok(Some(record))
    }

    /// Write the lockfile, replacing any existing file atomically.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut contents =
            serde_json::to_string_pretty(self).context("failed to serialize lockfile")?;
        contents.push('\n');
        crate::util::fs::write_atomic(path, contents.as_bytes())
    }

    /// The version the file declares, coerced; `1.0.0` when absent or unreadable.
    pub fn file_version(&self) -> Version {
        self.version
            .as_deref()
            .and_then(coerce_version)
            .unwrap_or(FALLBACK_VERSION)
    }
}

/// The schema version this engine writes.
pub fn schema_version() -> Version {
    coerce_version(LOCKFILE_SCHEMA_VERSION).unwrap_or(FALLBACK_VERSION)
}

/// Extract the first `N[.N[.N]]` run from a version-like string.
///
/// `"v2"` becomes `2.0.0`, `"1.4.3-beta"` becomes `1.4.3`; strings without
/// digits yield `None`.
pub fn coerce_version(raw: &str) -> Option<Version> {
    let caps = VERSION_RUN.captures(raw)?;
    let part = |i: usize| -> Option<u64> {
        match caps.get(i) {
            Some(m) => m.as_str().parse().ok(),
            None => Some(0),
        }
    };
    Some(Version::new(part(1)?, part(2)?, part(3)?))
}

/// True when the lockfile was written by an older, incompatible schema.
pub fn is_behind_schema(file_version: &Version, schema_version: &Version) -> bool {
    schema_version.major > file_version.major
}
