//! Error types for acquisition and loading.
//!
//! Each component reports its own error type; [`AcquireError`] gathers them
//! for callers of the orchestrator. A version mismatch after a successful
//! load is deliberately absent: it is reported as a warning in the outcome.

use thiserror::Error;

use crate::builder::BuildError;
use crate::config::ConfigError;
use crate::fetch::FetchError;
use crate::loader::LoadError;
use crate::platform::UnsupportedPlatformError;
use crate::version::InvalidVersion;

/// Errors that can occur while ensuring a module version is loaded.
#[derive(Debug, Error)]
pub enum AcquireError {
    /// The platform has no artifact convention; nothing can be fetched,
    /// built, or loaded.
    #[error(transparent)]
    UnsupportedPlatform(#[from] UnsupportedPlatformError),

    /// The requested version is not a semantic version.
    #[error(transparent)]
    InvalidVersion(#[from] InvalidVersion),

    /// Downloading the artifact failed.
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    /// Compiling the artifact failed.
    #[error("build failed: {0}")]
    Build(#[from] BuildError),

    /// The artifact could not be loaded from any candidate path.
    #[error(transparent)]
    Load(#[from] LoadError),

    /// The configuration is incomplete or invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result type alias using [`AcquireError`].
pub type Result<T> = std::result::Result<T, AcquireError>;
