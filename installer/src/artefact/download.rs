//! HTTP retrieval of release assets.
//!
//! Provides a trait-based abstraction over the network so the fetcher can be
//! exercised without access to a release host.

use std::path::Path;
use std::time::Duration;

/// Default network timeout for asset downloads.
pub const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(120);

/// Trait for downloading a release asset to a local file.
///
/// # Examples
///
/// ```
/// use dynmod_installer::artefact::download::{DEFAULT_DOWNLOAD_TIMEOUT, HttpDownloader};
///
/// let downloader = HttpDownloader::new(DEFAULT_DOWNLOAD_TIMEOUT);
/// // Use downloader.download(url, dest) in production
/// ```
#[cfg_attr(test, mockall::automock)]
pub trait ArtefactDownloader {
    /// Download `url` and write the response body to `dest`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, the server answers with a
    /// non-success status, or the file cannot be written.
    fn download(&self, url: &str, dest: &Path) -> Result<(), DownloadError>;
}

/// Errors arising from asset download operations.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    /// HTTP request failed or returned a non-success status.
    #[error("download failed for {url}: {reason}")]
    HttpError {
        /// The URL that was requested.
        url: String,
        /// A human-readable description of the failure.
        reason: String,
    },

    /// The requested asset was not found (HTTP 404).
    #[error("release asset not found: {url}")]
    NotFound {
        /// The URL that returned 404.
        url: String,
    },

    /// The request did not complete within the configured timeout.
    #[error("download of {url} timed out after {} seconds", timeout.as_secs())]
    Timeout {
        /// The URL that was requested.
        url: String,
        /// The configured timeout.
        timeout: Duration,
    },

    /// I/O error writing the downloaded file.
    #[error("I/O error writing download: {0}")]
    Io(#[from] std::io::Error),
}

/// HTTP-based downloader using `ureq`.
pub struct HttpDownloader {
    agent: ureq::Agent,
    timeout: Duration,
}

impl HttpDownloader {
    /// Create a downloader whose requests give up after `timeout`.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build();
        Self {
            agent: ureq::Agent::new_with_config(config),
            timeout,
        }
    }
}

impl ArtefactDownloader for HttpDownloader {
    fn download(&self, url: &str, dest: &Path) -> Result<(), DownloadError> {
        let response = self
            .agent
            .get(url)
            .call()
            .map_err(|e| map_ureq_error(url, &e, self.timeout))?;
        let mut file = std::fs::File::create(dest)?;
        std::io::copy(&mut response.into_body().as_reader(), &mut file)
            .map_err(DownloadError::Io)?;
        Ok(())
    }
}

/// Map a ureq error to a [`DownloadError`].
fn map_ureq_error(url: &str, err: &ureq::Error, timeout: Duration) -> DownloadError {
    match err {
        ureq::Error::StatusCode(404) => DownloadError::NotFound {
            url: url.to_owned(),
        },
        ureq::Error::Timeout(_) => DownloadError::Timeout {
            url: url.to_owned(),
            timeout,
        },
        other => DownloadError::HttpError {
            url: url.to_owned(),
            reason: other.to_string(),
        },
    }
}
