//! Persisted version marker for the installed artifact.
//!
//! The marker is a single UTF-8 line next to the artifact. Absence means no
//! known installed version; the [`LOCAL_SENTINEL`] value pins whatever is on
//! disk and disables remote acquisition.

use camino::{Utf8Path, Utf8PathBuf};
use log::debug;
use std::io::Write;
use thiserror::Error;

/// Default marker filename inside the install directory.
pub const DEFAULT_MARKER_FILE: &str = "DYN-VERSION";

/// Marker value meaning "never attempt remote acquisition".
pub const LOCAL_SENTINEL: &str = "LOCAL";

/// Errors raised while writing the version marker.
#[derive(Debug, Error)]
pub enum MarkerError {
    /// An empty version cannot be recorded.
    #[error("refusing to record an empty version marker")]
    Empty,

    /// Writing or renaming the marker file failed.
    #[error("failed to write version marker {path}")]
    Io {
        /// The marker path being written.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Reads and writes the version marker file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionStore {
    path: Utf8PathBuf,
}

impl VersionStore {
    /// Create a store for the marker at `install_dir/marker_file`.
    #[must_use]
    pub fn new(install_dir: &Utf8Path, marker_file: &str) -> Self {
        Self {
            path: install_dir.join(marker_file),
        }
    }

    /// Path of the marker file.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Return the recorded version, or `None` when the marker is absent,
    /// unreadable, or blank.
    #[must_use]
    pub fn read(&self) -> Option<String> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => {
                let version = contents.lines().next().unwrap_or_default().trim();
                (!version.is_empty()).then(|| version.to_owned())
            }
            Err(e) => {
                debug!("no version marker at {}: {e}", self.path);
                None
            }
        }
    }

    /// Replace the recorded version.
    ///
    /// The value is written to a temporary file in the same directory and
    /// renamed over the marker, so a crash leaves either the old or the new
    /// value.
    ///
    /// # Errors
    ///
    /// Returns [`MarkerError::Empty`] for a blank version and
    /// [`MarkerError::Io`] when the file cannot be written.
    pub fn write(&self, version: &str) -> Result<(), MarkerError> {
        let version = version.trim();
        if version.is_empty() {
            return Err(MarkerError::Empty);
        }
        let dir = self
            .path
            .parent()
            .filter(|parent| !parent.as_str().is_empty())
            .unwrap_or_else(|| Utf8Path::new("."));
        self.replace(dir, version).map_err(|source| MarkerError::Io {
            path: self.path.clone(),
            source,
        })?;
        debug!("recorded version {version} in {}", self.path);
        Ok(())
    }

    fn replace(&self, dir: &Utf8Path, version: &str) -> std::io::Result<()> {
        std::fs::create_dir_all(dir)?;
        let mut temp = tempfile::NamedTempFile::new_in(dir)?;
        writeln!(temp, "{version}")?;
        temp.as_file().sync_all()?;
        temp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}
