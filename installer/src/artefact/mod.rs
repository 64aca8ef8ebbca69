//! Release assets: addressing, download, and decompression.
//!
//! # Sub-modules
//!
//! - [`release`] - Release source, asset URL template, and the compression
//!   cutoff.
//! - [`download`] - Download trait and HTTP implementation.
//! - [`decompress`] - Gzip decompression for legacy assets.

pub mod decompress;
pub mod download;
pub mod release;
