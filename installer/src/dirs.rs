//! Directory resolution abstraction for platform-specific paths.
//!
//! Wraps `directories-next` and the running executable's location behind a
//! trait so configuration defaults can be tested without touching the host.

use directories_next::ProjectDirs;
use std::path::{Path, PathBuf};

/// Application name used for platform directories.
const APP_NAME: &str = "dynmod";

/// Default configuration filename.
pub const CONFIG_FILE_NAME: &str = "dynmod.toml";

/// Source of platform directories.
#[cfg_attr(test, mockall::automock)]
pub trait BaseDirs {
    /// Per-user configuration directory for this application.
    fn config_dir(&self) -> Option<PathBuf>;

    /// Directory containing the running executable.
    fn executable_dir(&self) -> Option<PathBuf>;
}

/// Resolves directories from the host system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemBaseDirs;

impl BaseDirs for SystemBaseDirs {
    fn config_dir(&self) -> Option<PathBuf> {
        ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.config_dir().to_path_buf())
    }

    fn executable_dir(&self) -> Option<PathBuf> {
        std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
    }
}

/// The default configuration file path, when a configuration directory
/// exists on this platform.
#[must_use]
pub fn default_config_path(dirs: &dyn BaseDirs) -> Option<PathBuf> {
    dirs.config_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
}
