//! Moving a new artifact over the canonical path.
//!
//! Both the fetcher and the builder finish by renaming a freshly produced
//! file over the installed artifact. A library that is mapped into a running
//! process cannot be replaced on some platforms, so a refused rename moves
//! the existing file aside to `<name>.old` and retries once.

use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, warn};
use std::io;
use std::path::Path;

/// Suffix given to a locked artifact moved out of the way.
pub const DISPLACED_SUFFIX: &str = ".old";

/// The path an artifact at `dest` is moved to when it cannot be replaced.
#[must_use]
pub fn displaced_path(dest: &Utf8Path) -> Utf8PathBuf {
    Utf8PathBuf::from(format!("{dest}{DISPLACED_SUFFIX}"))
}

/// Rename `source` over `dest`.
///
/// When the rename is refused and `dest` exists, `dest` is moved to
/// [`displaced_path`] and the rename retried once. Removing the displaced
/// file afterwards is best-effort.
///
/// # Errors
///
/// Returns the I/O error of the final failed rename. When the retry fails
/// the displaced file is moved back where possible.
pub fn replace_file(source: &Path, dest: &Utf8Path) -> io::Result<()> {
    match std::fs::rename(source, dest) {
        Ok(()) => return Ok(()),
        Err(e) if dest.as_std_path().symlink_metadata().is_ok() => {
            debug!("could not replace {dest} ({e}); moving it aside");
        }
        Err(e) => return Err(e),
    }

    let displaced = displaced_path(dest);
    remove_best_effort(displaced.as_std_path());
    std::fs::rename(dest, &displaced)?;
    if let Err(e) = std::fs::rename(source, dest) {
        if let Err(restore) = std::fs::rename(&displaced, dest) {
            warn!("could not restore {dest} from {displaced}: {restore}");
        }
        return Err(e);
    }
    remove_best_effort(displaced.as_std_path());
    Ok(())
}

/// Remove `path`, logging anything other than its absence.
pub fn remove_best_effort(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!("removed {}", path.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!("could not remove {}: {e}", path.display()),
    }
}
