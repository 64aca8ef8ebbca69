//! The "ensure version V is loaded" state machine.
//!
//! ```text
//! read marker ─┬─ LOCAL ──────────────────────────────┐
//!              ├─ absent ─ NO_ARTIFACT ─ acquire ─────┤
//!              ├─ older ── STALE ─────── acquire ─────┤
//!              └─ same/newer ─ CURRENT ───────────────┤
//!                                                     ▼
//!                               load ─┬─ ok ──────────────── LOADED
//!                                     └─ fail ─ acquire ─ load ─┬─ ok ─ LOADED
//!                                                               └─ LOAD_FAILED
//! ```
//!
//! Acquisition tries the configured sources in preference order and stops at
//! the first that succeeds. A pinned (`LOCAL`) marker disables acquisition
//! entirely, including the reload retry. After loading, the module's own
//! version is compared with the request; a difference is reported in the
//! outcome because a resident module cannot be replaced without a restart.

use log::{debug, info, warn};
use semver::Version;
use serde::Serialize;
use std::fmt;
use std::io::Write;
use std::path::PathBuf;

use crate::builder::ArtefactBuilder;
use crate::config::{AcquireConfig, AcquisitionSource, ConfigError};
use crate::error::{AcquireError, Result};
use crate::fetch::ArtefactFetcher;
use crate::loader::search::{SearchContext, search_dirs};
use crate::loader::{Loader, ModuleLatch, ModuleOpener, ResidentModule};
use crate::marker::{LOCAL_SENTINEL, VersionStore};
use crate::platform::ArtifactDescriptor;
use crate::version::parse_version;

/// Where the installed artifact stands relative to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AcquisitionState {
    /// No marker is recorded.
    NoArtifact,
    /// The recorded version is older than requested, or unreadable.
    Stale,
    /// The recorded version satisfies the request, or is pinned.
    Current,
    /// The module is resident.
    Loaded,
    /// Every load attempt failed.
    LoadFailed,
}

impl fmt::Display for AcquisitionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NoArtifact => "NO_ARTIFACT",
            Self::Stale => "STALE",
            Self::Current => "CURRENT",
            Self::Loaded => "LOADED",
            Self::LoadFailed => "LOAD_FAILED",
        };
        f.write_str(name)
    }
}

/// Classify a recorded marker against the requested version.
///
/// # Examples
///
/// ```
/// use dynmod_installer::orchestrator::{AcquisitionState, assess};
/// use semver::Version;
///
/// let requested = Version::new(0, 8, 0);
/// assert_eq!(assess(None, &requested), AcquisitionState::NoArtifact);
/// assert_eq!(assess(Some("0.7.2"), &requested), AcquisitionState::Stale);
/// assert_eq!(assess(Some("0.9.0"), &requested), AcquisitionState::Current);
/// assert_eq!(assess(Some("LOCAL"), &requested), AcquisitionState::Current);
/// ```
#[must_use]
pub fn assess(marker: Option<&str>, requested: &Version) -> AcquisitionState {
    let Some(marker) = marker else {
        return AcquisitionState::NoArtifact;
    };
    if marker == LOCAL_SENTINEL {
        return AcquisitionState::Current;
    }
    match parse_version(marker) {
        Ok(recorded) if recorded < *requested => AcquisitionState::Stale,
        Ok(_) => AcquisitionState::Current,
        Err(e) => {
            warn!("ignoring unreadable version marker: {e}");
            AcquisitionState::Stale
        }
    }
}

/// The resident module reports a different version than requested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionMismatch {
    /// The version the caller asked for.
    pub requested: String,
    /// The version the resident module reports.
    pub loaded: String,
}

impl fmt::Display for VersionMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "loaded native module version {} but {} was requested; restart the process to load {}",
            self.loaded, self.requested, self.requested
        )
    }
}

/// The result of a successful [`Acquisition::ensure`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnsureOutcome {
    /// The state derived from the marker before any acquisition.
    pub initial_state: AcquisitionState,
    /// Whether an acquisition source ran successfully.
    pub acquired: bool,
    /// The file the resident module was loaded from.
    pub module_path: PathBuf,
    /// The version the module reports, if it exports one.
    pub reported_version: Option<String>,
    /// Set when the resident module is not the requested version.
    pub mismatch: Option<VersionMismatch>,
}

/// The components an acquisition drives.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    /// Downloads release artifacts.
    pub fetcher: &'a dyn ArtefactFetcher,
    /// Compiles the artifact locally.
    pub builder: &'a dyn ArtefactBuilder,
    /// Maps artifacts into the process.
    pub opener: &'a dyn ModuleOpener,
    /// Records the resident module.
    pub latch: &'a ModuleLatch,
}

/// Ensures a requested module version is loaded.
pub struct Acquisition<'a> {
    config: &'a AcquireConfig,
    descriptor: ArtifactDescriptor,
    search: SearchContext,
    parts: Collaborators<'a>,
}

impl<'a> Acquisition<'a> {
    /// Create an acquisition for `descriptor`'s artifact.
    #[must_use]
    pub fn new(
        config: &'a AcquireConfig,
        descriptor: ArtifactDescriptor,
        search: SearchContext,
        parts: Collaborators<'a>,
    ) -> Self {
        Self {
            config,
            descriptor,
            search,
            parts,
        }
    }

    /// The version store for the configured install directory.
    #[must_use]
    pub fn store(&self) -> VersionStore {
        VersionStore::new(&self.config.install_dir, &self.config.marker_file)
    }

    /// Make sure `requested` is installed and a module is resident.
    ///
    /// Build output, if a compilation runs, is forwarded to `sink`.
    ///
    /// # Errors
    ///
    /// Returns [`AcquireError::InvalidVersion`] for an unparsable request,
    /// the failing source's error when acquisition fails, and
    /// [`AcquireError::Load`] when the module cannot be loaded even after one
    /// re-acquisition.
    pub fn ensure(&self, requested: &str, sink: &mut dyn Write) -> Result<EnsureOutcome> {
        let requested = requested.trim();
        let requested_version = parse_version(requested)?;
        let marker = self.store().read();
        let pinned = marker.as_deref() == Some(LOCAL_SENTINEL);
        let initial_state = assess(marker.as_deref(), &requested_version);
        debug!(
            "marker {:?}, requested {requested}: {initial_state}",
            marker.as_deref()
        );

        let mut acquired = false;
        if matches!(
            initial_state,
            AcquisitionState::NoArtifact | AcquisitionState::Stale
        ) {
            acquired = self.acquire(requested, sink)?;
        }

        let module = match self.load() {
            Ok(module) => module,
            Err(e) if pinned => {
                debug!("{}: marker is pinned, not re-acquiring", AcquisitionState::LoadFailed);
                return Err(e.into());
            }
            Err(e) => {
                warn!("{e}; re-acquiring {requested} and retrying once");
                acquired |= self.acquire(requested, sink)?;
                self.load().map_err(|retry_err| {
                    debug!("{}", AcquisitionState::LoadFailed);
                    AcquireError::from(retry_err)
                })?
            }
        };
        debug!("{} from {}", AcquisitionState::Loaded, module.path().display());

        let reported_version = module.version();
        let mismatch = match reported_version.as_deref() {
            Some(loaded) if !same_version(loaded, &requested_version) => {
                let mismatch = VersionMismatch {
                    requested: requested.to_owned(),
                    loaded: loaded.to_owned(),
                };
                warn!("{mismatch}");
                Some(mismatch)
            }
            Some(_) => None,
            None => {
                debug!("{} does not report a version", module.path().display());
                None
            }
        };

        Ok(EnsureOutcome {
            initial_state,
            acquired,
            module_path: module.path().to_path_buf(),
            reported_version,
            mismatch,
        })
    }

    /// Run the configured sources in order until one succeeds.
    ///
    /// Returns `false` when no sources are configured.
    fn acquire(&self, requested: &str, sink: &mut dyn Write) -> Result<bool> {
        let mut last_error = None;
        for source in &self.config.sources {
            let result = match source {
                AcquisitionSource::Remote => self
                    .parts
                    .fetcher
                    .download(requested, &self.config.install_dir)
                    .map_err(AcquireError::from),
                AcquisitionSource::Compile => self.compile(sink),
            };
            match result {
                Ok(()) => {
                    info!("acquired {requested} via {source:?}");
                    return Ok(true);
                }
                Err(e) => {
                    warn!("{source:?} acquisition of {requested} failed: {e}");
                    last_error = Some(e);
                }
            }
        }
        last_error.map_or(Ok(false), Err)
    }

    fn compile(&self, sink: &mut dyn Write) -> Result<()> {
        let source_dir = self
            .config
            .source_dir
            .as_deref()
            .ok_or(ConfigError::Missing("source_dir"))?;
        self.parts.builder.build(source_dir, sink)?;
        Ok(())
    }

    fn load(&self) -> std::result::Result<&'a dyn ResidentModule, crate::loader::LoadError> {
        let dirs = search_dirs(self.descriptor.platform().search_strategy(), &self.search);
        Loader::new(self.parts.latch, self.parts.opener, self.descriptor.filename())
            .ensure_loaded(&dirs)
    }
}

/// Compare a reported version with the request, semantically when the
/// reported string parses.
fn same_version(reported: &str, requested: &Version) -> bool {
    parse_version(reported).map_or_else(
        |_| reported.trim() == requested.to_string(),
        |parsed| parsed == *requested,
    )
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
