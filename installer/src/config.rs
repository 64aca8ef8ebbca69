//! Host configuration for acquisition and loading.
//!
//! Settings come from an optional TOML file, overridden by command-line
//! flags, and are resolved into an [`AcquireConfig`] that is passed
//! explicitly to the orchestrator. Nothing here is global.
//!
//! ```toml
//! install_dir = "/opt/app/native"
//! sources = ["remote", "compile"]
//! source_dir = "/opt/app/native/core"
//! search_paths = ["/usr/local/lib/app"]
//! fetch_timeout_secs = 120
//! build_timeout_secs = 1800
//!
//! [release]
//! owner = "emacs-tree-sitter"
//! repo = "elisp-tree-sitter"
//!
//! [artifact]
//! module_name = "tsc-dyn"
//! library_name = "tsc_dyn"
//! ```

use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::artefact::download::DEFAULT_DOWNLOAD_TIMEOUT;
use crate::artefact::release::ReleaseSource;
use crate::builder::{DEFAULT_BUILD_COMMAND, DEFAULT_BUILD_TIMEOUT};
use crate::dirs::BaseDirs;
use crate::loader::native::DEFAULT_VERSION_SYMBOL;
use crate::marker::DEFAULT_MARKER_FILE;

/// A way of obtaining the artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AcquisitionSource {
    /// Download a prebuilt release asset.
    Remote,
    /// Compile from the local source tree.
    Compile,
}

/// Errors arising while loading or resolving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read configuration {path}")]
    Read {
        /// The configuration file path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid.
    #[error("invalid configuration {path}: {reason}")]
    Parse {
        /// The configuration file path.
        path: PathBuf,
        /// Description of the parse error.
        reason: String,
    },

    /// A required setting is absent from both file and flags.
    #[error("missing required setting `{0}`")]
    Missing(&'static str),

    /// A path setting is not valid UTF-8.
    #[error("path is not valid UTF-8: {}", .0.display())]
    NonUtf8Path(PathBuf),
}

/// Artifact naming and build settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArtifactConfig {
    /// Canonical artifact stem, e.g. `tsc-dyn`.
    pub module_name: String,
    /// Build tool library name; defaults to `module_name` with `-` as `_`.
    #[serde(default)]
    pub library_name: Option<String>,
    /// Exported symbol returning the module's version string.
    #[serde(default = "default_version_symbol")]
    pub version_symbol: String,
    /// Build command and its arguments.
    #[serde(default = "default_build_command")]
    pub build_command: Vec<String>,
}

fn default_version_symbol() -> String {
    DEFAULT_VERSION_SYMBOL.to_owned()
}

fn default_build_command() -> Vec<String> {
    DEFAULT_BUILD_COMMAND
        .iter()
        .map(|&part| part.to_owned())
        .collect()
}

impl ArtifactConfig {
    /// Settings for `module_name` with every other field defaulted.
    #[must_use]
    pub fn new(module_name: impl Into<String>) -> Self {
        Self {
            module_name: module_name.into(),
            library_name: None,
            version_symbol: default_version_symbol(),
            build_command: default_build_command(),
        }
    }

    /// The build tool's library name.
    #[must_use]
    pub fn library_name(&self) -> String {
        self.library_name
            .clone()
            .unwrap_or_else(|| self.module_name.replace('-', "_"))
    }
}

/// The on-disk configuration file; every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    /// Install and search directory for the artifact.
    pub install_dir: Option<Utf8PathBuf>,
    /// Acquisition sources in preference order.
    pub sources: Option<Vec<AcquisitionSource>>,
    /// Source tree used for local compilation.
    pub source_dir: Option<Utf8PathBuf>,
    /// Extra library directories for the multi-path search.
    pub search_paths: Vec<PathBuf>,
    /// Network timeout in seconds.
    pub fetch_timeout_secs: Option<u64>,
    /// Build timeout in seconds.
    pub build_timeout_secs: Option<u64>,
    /// Marker filename inside the install directory.
    pub marker_file: Option<String>,
    /// Release host settings.
    pub release: Option<ReleaseSource>,
    /// Artifact settings.
    pub artifact: Option<ArtifactConfig>,
}

impl ConfigFile {
    /// Parse a configuration document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML or unknown keys.
    pub fn from_toml_str(contents: &str, origin: &Path) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::Parse {
            path: origin.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Read `path`, which must exist.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] when the file cannot be read, and
    /// [`ConfigError::Parse`] when it is malformed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents, path)
    }

    /// Read `path`, returning an empty configuration when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] when the file exists but cannot be read,
    /// and [`ConfigError::Parse`] when it is malformed.
    pub fn load_optional(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_toml_str(&contents, path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}

/// Command-line values that take precedence over the file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Install directory override.
    pub install_dir: Option<Utf8PathBuf>,
    /// Source preference override; empty keeps the file's value.
    pub sources: Vec<AcquisitionSource>,
    /// Source directory override.
    pub source_dir: Option<Utf8PathBuf>,
    /// Search paths appended after the file's.
    pub search_paths: Vec<PathBuf>,
    /// Release override.
    pub release: Option<ReleaseSource>,
    /// Artifact stem override.
    pub module_name: Option<String>,
}

/// Fully resolved configuration consumed by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquireConfig {
    /// Install and search directory for the artifact.
    pub install_dir: Utf8PathBuf,
    /// Acquisition sources in preference order.
    pub sources: Vec<AcquisitionSource>,
    /// Source tree used for local compilation.
    pub source_dir: Option<Utf8PathBuf>,
    /// Extra library directories for the multi-path search.
    pub search_paths: Vec<PathBuf>,
    /// Network timeout.
    pub fetch_timeout: Duration,
    /// Build timeout.
    pub build_timeout: Duration,
    /// Marker filename inside the install directory.
    pub marker_file: String,
    /// Release host settings.
    pub release: ReleaseSource,
    /// Artifact settings.
    pub artifact: ArtifactConfig,
}

impl AcquireConfig {
    /// A configuration with defaults for everything but the essentials.
    ///
    /// # Examples
    ///
    /// ```
    /// use camino::Utf8PathBuf;
    /// use dynmod_installer::artefact::release::ReleaseSource;
    /// use dynmod_installer::config::{AcquireConfig, AcquisitionSource, ArtifactConfig};
    ///
    /// let config = AcquireConfig::new(
    ///     Utf8PathBuf::from("/opt/app"),
    ///     ReleaseSource::github("owner", "repo"),
    ///     ArtifactConfig::new("tsc-dyn"),
    /// );
    /// assert_eq!(config.sources, vec![AcquisitionSource::Remote]);
    /// assert_eq!(config.artifact.library_name(), "tsc_dyn");
    /// ```
    #[must_use]
    pub fn new(install_dir: Utf8PathBuf, release: ReleaseSource, artifact: ArtifactConfig) -> Self {
        Self {
            install_dir,
            sources: vec![AcquisitionSource::Remote],
            source_dir: None,
            search_paths: Vec::new(),
            fetch_timeout: DEFAULT_DOWNLOAD_TIMEOUT,
            build_timeout: DEFAULT_BUILD_TIMEOUT,
            marker_file: DEFAULT_MARKER_FILE.to_owned(),
            release,
            artifact,
        }
    }

    /// Merge `file` and `overrides`, filling the install directory from
    /// `dirs` when neither sets it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] when the release or artifact settings
    /// are absent, or no install directory can be determined.
    pub fn resolve(
        file: ConfigFile,
        overrides: ConfigOverrides,
        dirs: &dyn BaseDirs,
    ) -> Result<Self, ConfigError> {
        let release = overrides
            .release
            .or(file.release)
            .ok_or(ConfigError::Missing("release"))?;
        let mut artifact = match (file.artifact, overrides.module_name) {
            (Some(mut artifact), Some(name)) => {
                artifact.module_name = name;
                artifact
            }
            (Some(artifact), None) => artifact,
            (None, Some(name)) => ArtifactConfig::new(name),
            (None, None) => return Err(ConfigError::Missing("artifact.module_name")),
        };
        if artifact.build_command.is_empty() {
            artifact.build_command = default_build_command();
        }

        let install_dir = match overrides.install_dir.or(file.install_dir) {
            Some(dir) => dir,
            None => {
                let dir = dirs
                    .executable_dir()
                    .ok_or(ConfigError::Missing("install_dir"))?;
                Utf8PathBuf::from_path_buf(dir).map_err(ConfigError::NonUtf8Path)?
            }
        };

        let mut config = Self::new(install_dir, release, artifact);
        if !overrides.sources.is_empty() {
            config.sources = overrides.sources;
        } else if let Some(sources) = file.sources {
            config.sources = sources;
        }
        config.source_dir = overrides.source_dir.or(file.source_dir);
        config.search_paths = file.search_paths;
        config.search_paths.extend(overrides.search_paths);
        if let Some(secs) = file.fetch_timeout_secs {
            config.fetch_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = file.build_timeout_secs {
            config.build_timeout = Duration::from_secs(secs);
        }
        if let Some(marker_file) = file.marker_file {
            config.marker_file = marker_file;
        }
        Ok(config)
    }

    /// The install directory.
    #[must_use]
    pub fn install_dir(&self) -> &Utf8Path {
        &self.install_dir
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
