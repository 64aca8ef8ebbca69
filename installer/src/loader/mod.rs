//! Loading the artifact into the running process.
//!
//! The loader first consults the process [`ModuleLatch`]: once a module is
//! resident, every later request succeeds without touching the file system.
//! Otherwise each candidate directory is probed in order and the first
//! successful open wins. A probe that cannot open its candidate is recorded
//! and skipped; only exhausting every candidate is an error.
//!
//! # Sub-modules
//!
//! - [`latch`] - The one-shot resident-module latch.
//! - [`native`] - `libloading`-backed opener.
//! - [`search`] - Candidate directories per search strategy.

pub mod latch;
pub mod native;
pub mod search;

use log::debug;
use std::fmt;
use std::path::{Path, PathBuf};

pub use latch::{ModuleLatch, PROCESS_LATCH};

/// A native module resident in the process.
pub trait ResidentModule: fmt::Debug + Send + Sync {
    /// The file the module was loaded from.
    fn path(&self) -> &Path;

    /// The version string the module reports about itself, if it exports
    /// one.
    fn version(&self) -> Option<String>;
}

/// Why a single probe did not load a module.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OpenError {
    /// No file exists at the candidate path.
    #[error("file not found")]
    NotFound,
    /// The file exists but could not be loaded.
    #[error("{0}")]
    Failed(String),
}

/// Opens a native module from a path.
pub trait ModuleOpener {
    /// Load the module at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`OpenError`] when the file is missing or cannot be loaded.
    fn open(&self, path: &Path) -> Result<Box<dyn ResidentModule>, OpenError>;
}

/// A candidate that was probed without success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedProbe {
    /// The candidate file.
    pub path: PathBuf,
    /// Why it was not loaded.
    pub reason: OpenError,
}

/// Every candidate was probed and none loaded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("could not load {filename}: {}", describe_probes(.probes))]
pub struct LoadError {
    /// The artifact filename that was searched for.
    pub filename: String,
    /// Each probe in the order it was attempted.
    pub probes: Vec<FailedProbe>,
}

fn describe_probes(probes: &[FailedProbe]) -> String {
    if probes.is_empty() {
        return "no search paths".to_owned();
    }
    probes
        .iter()
        .map(|probe| format!("{} ({})", probe.path.display(), probe.reason))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Loads the artifact, at most once per latch.
pub struct Loader<'a> {
    latch: &'a ModuleLatch,
    opener: &'a dyn ModuleOpener,
    filename: String,
}

impl<'a> Loader<'a> {
    /// Create a loader for `filename` that records success in `latch`.
    #[must_use]
    pub fn new(latch: &'a ModuleLatch, opener: &'a dyn ModuleOpener, filename: &str) -> Self {
        Self {
            latch,
            opener,
            filename: filename.to_owned(),
        }
    }

    /// Make sure the module is resident, probing `search_dirs` in order if it
    /// is not.
    ///
    /// Returns the resident module as soon as one is available.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError`] when no module is resident and no candidate
    /// could be loaded.
    pub fn ensure_loaded(
        &self,
        search_dirs: &[PathBuf],
    ) -> Result<&'a dyn ResidentModule, LoadError> {
        if let Some(module) = self.latch.get() {
            debug!("module already resident from {}", module.path().display());
            return Ok(module);
        }

        let mut probes = Vec::with_capacity(search_dirs.len());
        for dir in search_dirs {
            let candidate = dir.join(&self.filename);
            match self.opener.open(&candidate) {
                Ok(module) => {
                    debug!("loaded module from {}", candidate.display());
                    return Ok(self.latch.set(module));
                }
                Err(reason) => {
                    debug!("probe {} failed: {reason}", candidate.display());
                    probes.push(FailedProbe {
                        path: candidate,
                        reason,
                    });
                }
            }
        }

        Err(LoadError {
            filename: self.filename.clone(),
            probes,
        })
    }
}

#[cfg(test)]
mod tests;
