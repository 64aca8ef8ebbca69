//! Release download of a specific artifact version.
//!
//! Downloads the platform artifact for a version, decompresses legacy
//! `.gz` assets, moves the result over the canonical artifact path, and
//! records the version marker. Failures are returned without retrying; the
//! orchestrator owns the retry policy.

use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, info};
use tempfile::NamedTempFile;

use crate::artefact::decompress::{DecompressError, gunzip};
use crate::artefact::download::{ArtefactDownloader, DownloadError};
use crate::artefact::release::{ReleaseAsset, ReleaseSource};
use crate::marker::{MarkerError, VersionStore};
use crate::platform::ArtifactDescriptor;
use crate::staging::{remove_best_effort, replace_file};
use crate::version::{InvalidVersion, parse_version};

/// Fetches a version's prebuilt artifact into a directory.
#[cfg_attr(test, mockall::automock)]
pub trait ArtefactFetcher {
    /// Download release `version` into `target_dir` and record it in the
    /// version marker.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] on network, HTTP, decompression, or file
    /// system failure.
    fn download(&self, version: &str, target_dir: &Utf8Path) -> Result<(), FetchError>;
}

/// Errors arising while fetching an artifact.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The requested version does not parse, so no asset can be chosen.
    #[error(transparent)]
    InvalidVersion(#[from] InvalidVersion),

    /// The asset could not be downloaded.
    #[error(transparent)]
    Download(#[from] DownloadError),

    /// A compressed asset could not be decompressed.
    #[error(transparent)]
    Decompress(#[from] DecompressError),

    /// The downloaded artifact could not be moved into place.
    #[error("failed to install artifact at {path}")]
    Install {
        /// The canonical artifact path.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The artifact was installed but the marker could not be written.
    #[error(transparent)]
    Marker(#[from] MarkerError),
}

/// Fetches artifacts from a release host.
pub struct ReleaseFetcher {
    release: ReleaseSource,
    descriptor: ArtifactDescriptor,
    marker_file: String,
    downloader: Box<dyn ArtefactDownloader>,
}

impl ReleaseFetcher {
    /// Create a fetcher for `descriptor`'s artifact on `release`.
    #[must_use]
    pub fn new(
        release: ReleaseSource,
        descriptor: ArtifactDescriptor,
        marker_file: impl Into<String>,
        downloader: Box<dyn ArtefactDownloader>,
    ) -> Self {
        Self {
            release,
            descriptor,
            marker_file: marker_file.into(),
            downloader,
        }
    }

    /// Describe the asset that [`ArtefactFetcher::download`] would request.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidVersion`] when `version` is not a semantic version.
    pub fn asset(&self, version: &str) -> Result<ReleaseAsset, InvalidVersion> {
        let tag = version.trim();
        let parsed = parse_version(tag)?;
        Ok(self
            .release
            .asset_for(tag, &parsed, self.descriptor.filename()))
    }

    fn fetch_into(
        &self,
        asset: &ReleaseAsset,
        target_dir: &Utf8Path,
    ) -> Result<NamedTempFile, FetchError> {
        let staged = NamedTempFile::new_in(target_dir).map_err(|source| FetchError::Install {
            path: target_dir.join(self.descriptor.filename()),
            source,
        })?;

        if !asset.compressed {
            self.downloader.download(&asset.url, staged.path())?;
            return Ok(staged);
        }

        let compressed = target_dir.join(&asset.remote_filename);
        let result = self
            .downloader
            .download(&asset.url, compressed.as_std_path())
            .map_err(FetchError::from)
            .and_then(|()| {
                gunzip(compressed.as_std_path(), &mut staged.as_file())
                    .map(drop)
                    .map_err(FetchError::from)
            });
        remove_best_effort(compressed.as_std_path());
        result.map(|()| staged)
    }
}

impl ArtefactFetcher for ReleaseFetcher {
    fn download(&self, version: &str, target_dir: &Utf8Path) -> Result<(), FetchError> {
        let asset = self.asset(version)?;
        let artifact_path = target_dir.join(self.descriptor.filename());
        std::fs::create_dir_all(target_dir).map_err(|source| FetchError::Install {
            path: artifact_path.clone(),
            source,
        })?;

        info!("downloading {}", asset.url);
        let staged = self.fetch_into(&asset, target_dir)?;
        install(staged, &artifact_path)?;

        VersionStore::new(target_dir, &self.marker_file).write(version)?;
        info!("installed version {} at {artifact_path}", version.trim());
        Ok(())
    }
}

/// Move `staged` over `dest`, moving a locked artifact aside if needed.
fn install(staged: NamedTempFile, dest: &Utf8Path) -> Result<(), FetchError> {
    let staged = staged.into_temp_path();
    replace_file(&staged, dest).map_err(|source| FetchError::Install {
        path: dest.to_owned(),
        source,
    })?;
    if let Err(e) = staged.keep() {
        debug!("staged file {} already released: {}", dest, e.error);
    }
    Ok(())
}

#[cfg(test)]
#[path = "fetch_tests.rs"]
mod tests;
