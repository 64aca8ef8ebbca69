//! CLI argument definitions for the native module installer.
//!
//! Kept apart from the entrypoint so parsing can be tested without running
//! any acquisition.

use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::{AcquisitionSource, ConfigOverrides};

/// Acquire and load versioned native modules.
#[derive(Parser, Debug)]
#[command(name = "dynmod-installer")]
#[command(version, about)]
#[command(long_about = concat!(
    "Acquire and load versioned native modules.\n\n",
    "The installer keeps a single platform-specific shared library next to a ",
    "version marker. When a newer version is requested it downloads the ",
    "release asset or compiles the module from source, then loads it into ",
    "the process.\n\n",
    "Writing LOCAL into the marker file pins a locally managed artifact: it ",
    "is never replaced by a download.",
))]
#[command(after_help = concat!(
    "EXAMPLES:\n",
    "  Make sure version 0.8.0 is installed and loadable:\n",
    "    $ dynmod-installer ensure 0.8.0\n\n",
    "  Compile from source, falling back to a download:\n",
    "    $ dynmod-installer --source compile --source remote ensure 0.8.0\n\n",
    "  Show what is installed:\n",
    "    $ dynmod-installer status --json",
))]
pub struct Cli {
    /// Configuration file [default: platform config directory].
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Install directory for the artifact and its version marker.
    #[arg(short, long, value_name = "DIR")]
    pub install_dir: Option<Utf8PathBuf>,

    /// Acquisition source, in preference order (can be repeated).
    #[arg(short, long = "source", value_enum, value_name = "SOURCE")]
    pub sources: Vec<AcquisitionSource>,

    /// Source tree used when compiling.
    #[arg(long, value_name = "DIR")]
    pub source_dir: Option<Utf8PathBuf>,

    /// Extra library directory for the multi-path search (can be repeated).
    #[arg(long = "search-path", value_name = "DIR")]
    pub search_paths: Vec<PathBuf>,

    /// Artifact stem, e.g. `tsc-dyn`.
    #[arg(long, value_name = "NAME")]
    pub module_name: Option<String>,

    /// Suppress progress output (errors still shown).
    #[arg(short, long)]
    pub quiet: bool,

    /// Operation to perform.
    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Install the version if needed and load it.
    Ensure {
        /// Requested version, e.g. `0.8.0`.
        version: String,
    },

    /// Download a release without loading it.
    Fetch {
        /// Release version to download.
        version: String,
    },

    /// Compile the module from the source tree.
    Build,

    /// Show the installed version and artifact.
    Status {
        /// Output in JSON format for scripting.
        #[arg(long)]
        json: bool,
    },
}

impl Cli {
    /// Configuration values set on the command line.
    #[must_use]
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            install_dir: self.install_dir.clone(),
            sources: self.sources.clone(),
            source_dir: self.source_dir.clone(),
            search_paths: self.search_paths.clone(),
            release: None,
            module_name: self.module_name.clone(),
        }
    }
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
