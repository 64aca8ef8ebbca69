//! Platform detection and artifact naming conventions.
//!
//! The running platform is resolved once into a small [`Platform`] variant.
//! Everything platform-specific downstream (file extension, the build tool's
//! `lib` prefix, and which load search strategy applies) is derived from that
//! variant rather than from scattered `cfg` checks.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Operating-system names with no known shared-library convention.
const UNSUPPORTED_OS_NAMES: &[&str] = &["ms-dos", "msdos", "dos"];

/// Operating-system names that follow the ELF `.so` convention.
const LINUX_LIKE_OS_NAMES: &[&str] = &[
    "linux",
    "android",
    "freebsd",
    "netbsd",
    "openbsd",
    "dragonfly",
    "solaris",
    "illumos",
];

/// The platform has no known artifact naming convention.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported platform \"{platform}\": no known native module convention")]
pub struct UnsupportedPlatformError {
    /// The rejected operating-system name.
    pub platform: String,
}

/// The platform families the installer distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Platform {
    /// Windows; its loader cannot resolve a module by extension-less name.
    Windows,
    /// macOS and other Darwin systems.
    MacOs,
    /// Linux and the BSD/Solaris family.
    LinuxLike,
    /// An unrecognised system assumed to be Unix-like.
    Other,
}

/// How the loader locates the artifact on a given platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStrategy {
    /// Probe the install directory only; the host resolves the name itself.
    ByName,
    /// Probe the origin directory, the working directory, then every
    /// library search path in order.
    MultiPath,
}

impl Platform {
    /// Resolve the platform this process is running on.
    ///
    /// # Errors
    ///
    /// Returns [`UnsupportedPlatformError`] when the operating system has no
    /// shared-library convention.
    pub fn current() -> Result<Self, UnsupportedPlatformError> {
        Self::from_os_name(std::env::consts::OS)
    }

    /// Map an operating-system name (as reported by
    /// [`std::env::consts::OS`]) to a platform family.
    ///
    /// Unknown names fall back to [`Platform::Other`] instead of failing, so a
    /// new Unix flavour still gets the generic `.so` convention.
    ///
    /// # Examples
    ///
    /// ```
    /// use dynmod_installer::platform::Platform;
    ///
    /// assert_eq!(Platform::from_os_name("macos").expect("known"), Platform::MacOs);
    /// assert_eq!(Platform::from_os_name("plan9").expect("fallback"), Platform::Other);
    /// assert!(Platform::from_os_name("ms-dos").is_err());
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`UnsupportedPlatformError`] for DOS-like systems.
    pub fn from_os_name(name: &str) -> Result<Self, UnsupportedPlatformError> {
        let lowered = name.to_ascii_lowercase();
        if UNSUPPORTED_OS_NAMES.contains(&lowered.as_str()) {
            return Err(UnsupportedPlatformError {
                platform: name.to_owned(),
            });
        }
        let platform = match lowered.as_str() {
            "windows" => Self::Windows,
            "macos" | "ios" | "darwin" => Self::MacOs,
            other if LINUX_LIKE_OS_NAMES.contains(&other) => Self::LinuxLike,
            _ => Self::Other,
        };
        Ok(platform)
    }

    /// Shared-library file extension, without the leading dot.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Windows => "dll",
            Self::MacOs => "dylib",
            Self::LinuxLike | Self::Other => "so",
        }
    }

    /// Filename prefix the build tool puts on shared libraries.
    #[must_use]
    pub const fn build_prefix(self) -> &'static str {
        match self {
            Self::Windows => "",
            Self::MacOs | Self::LinuxLike | Self::Other => "lib",
        }
    }

    /// The load search strategy for this platform.
    #[must_use]
    pub const fn search_strategy(self) -> SearchStrategy {
        match self {
            Self::Windows => SearchStrategy::MultiPath,
            Self::MacOs | Self::LinuxLike | Self::Other => SearchStrategy::ByName,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Windows => "windows",
            Self::MacOs => "macos",
            Self::LinuxLike => "linux-like",
            Self::Other => "other",
        };
        f.write_str(name)
    }
}

/// Return the shared-library extension for an operating-system name.
///
/// # Errors
///
/// Returns [`UnsupportedPlatformError`] for DOS-like systems.
pub fn extension_for(os_name: &str) -> Result<&'static str, UnsupportedPlatformError> {
    Platform::from_os_name(os_name).map(Platform::extension)
}

/// Everything derived from the platform about the artifact's file names.
///
/// Computed at call time and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactDescriptor {
    platform: Platform,
    extension: &'static str,
    filename: String,
    build_output_filename: String,
}

impl ArtifactDescriptor {
    /// Derive the descriptor for `module_name` (the canonical artifact stem,
    /// e.g. `tsc-dyn`) and `library_name` (the build tool's library name,
    /// e.g. `tsc_dyn`).
    ///
    /// # Examples
    ///
    /// ```
    /// use dynmod_installer::platform::{ArtifactDescriptor, Platform};
    ///
    /// let descriptor = ArtifactDescriptor::new(Platform::LinuxLike, "tsc-dyn", "tsc_dyn");
    /// assert_eq!(descriptor.filename(), "tsc-dyn.so");
    /// assert_eq!(descriptor.build_output_filename(), "libtsc_dyn.so");
    /// ```
    #[must_use]
    pub fn new(platform: Platform, module_name: &str, library_name: &str) -> Self {
        let extension = platform.extension();
        Self {
            platform,
            extension,
            filename: format!("{module_name}.{extension}"),
            build_output_filename: format!(
                "{}{}.{extension}",
                platform.build_prefix(),
                library_name.replace('-', "_")
            ),
        }
    }

    /// The platform this descriptor was derived for.
    #[must_use]
    pub const fn platform(&self) -> Platform {
        self.platform
    }

    /// Shared-library extension, without the leading dot.
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        self.extension
    }

    /// Canonical artifact filename, as published and installed.
    #[must_use]
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Filename the external build tool produces.
    #[must_use]
    pub fn build_output_filename(&self) -> &str {
        &self.build_output_filename
    }
}
