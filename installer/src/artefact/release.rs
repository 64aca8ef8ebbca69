//! Release asset addressing.
//!
//! Assets live at
//! `<host>/<owner>/<repo>/releases/download/<version>/<filename>`. Releases at
//! or below [`COMPRESSION_CUTOFF`] publish the artifact gzip-compressed with a
//! `.gz` suffix; later releases publish it as-is. Old releases are never
//! republished, so the cutoff is fixed.

use semver::Version;
use serde::Deserialize;

/// The last release version that published gzip-compressed artifacts.
pub const COMPRESSION_CUTOFF: Version = Version::new(0, 7, 0);

/// Default release host.
pub const DEFAULT_HOST: &str = "https://github.com";

/// Suffix of compressed release assets.
pub const GZIP_SUFFIX: &str = ".gz";

/// Where releases are published.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReleaseSource {
    /// Scheme and host, e.g. `https://github.com`.
    #[serde(default = "default_host")]
    pub host: String,
    /// Repository owner.
    pub owner: String,
    /// Repository name.
    pub repo: String,
}

fn default_host() -> String {
    DEFAULT_HOST.to_owned()
}

impl ReleaseSource {
    /// Create a source on the default host.
    #[must_use]
    pub fn github(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            host: default_host(),
            owner: owner.into(),
            repo: repo.into(),
        }
    }

    /// Construct the download URL for `filename` in release `version`.
    ///
    /// # Examples
    ///
    /// ```
    /// use dynmod_installer::artefact::release::ReleaseSource;
    ///
    /// let source = ReleaseSource::github("emacs-tree-sitter", "elisp-tree-sitter");
    /// assert_eq!(
    ///     source.asset_url("0.8.0", "tsc-dyn.so"),
    ///     "https://github.com/emacs-tree-sitter/elisp-tree-sitter/releases/download/0.8.0/tsc-dyn.so"
    /// );
    /// ```
    #[must_use]
    pub fn asset_url(&self, version: &str, filename: &str) -> String {
        format!(
            "{}/{}/{}/releases/download/{version}/{filename}",
            self.host.trim_end_matches('/'),
            self.owner,
            self.repo
        )
    }

    /// Describe the asset to fetch for `version`, choosing the compressed
    /// form for releases at or below the cutoff.
    #[must_use]
    pub fn asset_for(&self, tag: &str, version: &Version, filename: &str) -> ReleaseAsset {
        let compressed = is_compressed(version);
        let remote_filename = if compressed {
            format!("{filename}{GZIP_SUFFIX}")
        } else {
            filename.to_owned()
        };
        ReleaseAsset {
            url: self.asset_url(tag, &remote_filename),
            remote_filename,
            compressed,
        }
    }
}

/// Whether release `version` publishes a compressed artifact.
#[must_use]
pub fn is_compressed(version: &Version) -> bool {
    *version <= COMPRESSION_CUTOFF
}

/// A concrete asset to download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseAsset {
    /// Full download URL.
    pub url: String,
    /// The asset's filename on the release.
    pub remote_filename: String,
    /// Whether the payload must be gunzipped after download.
    pub compressed: bool,
}
