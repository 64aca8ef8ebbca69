//! Gzip decompression for legacy compressed release assets.

use flate2::read::GzDecoder;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Decompression failed.
#[derive(Debug, thiserror::Error)]
#[error("failed to decompress {path}")]
pub struct DecompressError {
    /// The compressed input.
    pub path: PathBuf,
    /// The underlying decoder or I/O error.
    #[source]
    pub source: std::io::Error,
}

/// Gunzip `source` into `dest`, replacing any content `dest` already has.
///
/// # Errors
///
/// Returns [`DecompressError`] when `source` cannot be read, is not valid
/// gzip data, or `dest` cannot be written.
pub fn gunzip(source: &Path, dest: &mut impl Write) -> Result<u64, DecompressError> {
    let wrap = |source_err| DecompressError {
        path: source.to_path_buf(),
        source: source_err,
    };
    let file = std::fs::File::open(source).map_err(wrap)?;
    let mut decoder = GzDecoder::new(file);
    let written = std::io::copy(&mut decoder, dest).map_err(wrap)?;
    dest.flush().map_err(wrap)?;
    Ok(written)
}
