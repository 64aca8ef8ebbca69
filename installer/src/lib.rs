//! Native module installer library.
//!
//! This crate keeps a versioned, platform-specific native module available to
//! a host process: it records which version is installed, downloads or
//! compiles newer versions on demand, and loads the artifact exactly once per
//! process. It is used by the `dynmod-installer` CLI binary and can be
//! embedded by hosts that load the module themselves.
//!
//! # Modules
//!
//! - [`artefact`] - Release URLs, HTTP download, and gzip decompression
//! - [`builder`] - Local compilation with an external build tool
//! - [`cli`] - Command-line argument definitions
//! - [`config`] - Host configuration and its TOML file
//! - [`dirs`] - Directory resolution abstraction for platform-specific paths
//! - [`error`] - Top-level error type
//! - [`fetch`] - Downloading release artifacts into the install directory
//! - [`loader`] - One-time loading of the artifact into the process
//! - [`marker`] - The installed-version marker file
//! - [`orchestrator`] - The "ensure version V is loaded" state machine
//! - [`output`] - Output formatting for the CLI
//! - [`platform`] - Platform detection and artifact naming
//! - [`staging`] - Replacing the installed artifact, including locked files
//! - [`version`] - Version string parsing

pub mod artefact;
pub mod builder;
pub mod cli;
pub mod config;
pub mod dirs;
pub mod error;
pub mod fetch;
pub mod loader;
pub mod marker;
pub mod orchestrator;
pub mod output;
pub mod platform;
pub mod staging;
pub mod version;

#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;
