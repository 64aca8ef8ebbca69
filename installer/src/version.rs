//! Semantic version parsing for markers and requested versions.

use semver::Version;
use thiserror::Error;

/// A version string could not be parsed as a semantic version.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid version \"{value}\": {reason}")]
pub struct InvalidVersion {
    /// The rejected version string.
    pub value: String,
    /// Why parsing failed.
    pub reason: String,
}

/// Parse a version string, tolerating a leading `v` as used by release tags.
///
/// # Examples
///
/// ```
/// use dynmod_installer::version::parse_version;
///
/// assert_eq!(parse_version("v0.8.0").expect("valid").to_string(), "0.8.0");
/// assert!(parse_version("LOCAL").is_err());
/// ```
///
/// # Errors
///
/// Returns [`InvalidVersion`] when the string is not a semantic version.
pub fn parse_version(raw: &str) -> Result<Version, InvalidVersion> {
    let trimmed = raw.trim();
    let bare = trimmed.strip_prefix('v').unwrap_or(trimmed);
    Version::parse(bare).map_err(|e| InvalidVersion {
        value: raw.to_owned(),
        reason: e.to_string(),
    })
}
