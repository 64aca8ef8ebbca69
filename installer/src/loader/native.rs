//! Dynamic library loading via `libloading`.

use libloading::{Library, Symbol};
use log::debug;
use std::ffi::{CStr, c_char};
use std::path::{Path, PathBuf};

use super::{ModuleOpener, OpenError, ResidentModule};

/// Default exported symbol reporting the module version.
pub const DEFAULT_VERSION_SYMBOL: &str = "dynmod_version";

/// Signature of the version symbol: returns a static NUL-terminated string.
type VersionFn = unsafe extern "C" fn() -> *const c_char;

/// A shared library mapped into the process.
#[derive(Debug)]
pub struct NativeModule {
    path: PathBuf,
    library: Library,
    version_symbol: String,
}

impl ResidentModule for NativeModule {
    fn path(&self) -> &Path {
        &self.path
    }

    fn version(&self) -> Option<String> {
        // SAFETY: the symbol is documented to have the `VersionFn` signature
        // and to return a pointer to a static NUL-terminated string.
        let raw = unsafe {
            let symbol: Symbol<'_, VersionFn> = match self
                .library
                .get(self.version_symbol.as_bytes())
            {
                Ok(symbol) => symbol,
                Err(e) => {
                    debug!(
                        "{} does not export {}: {e}",
                        self.path.display(),
                        self.version_symbol
                    );
                    return None;
                }
            };
            symbol()
        };
        if raw.is_null() {
            return None;
        }
        // SAFETY: checked non-null above; the string outlives the library,
        // which is never unloaded.
        let version = unsafe { CStr::from_ptr(raw) };
        version.to_str().ok().map(str::to_owned)
    }
}

/// Opens shared libraries from disk.
#[derive(Debug, Clone)]
pub struct NativeOpener {
    version_symbol: String,
}

impl NativeOpener {
    /// Create an opener whose modules report their version through
    /// `version_symbol`.
    #[must_use]
    pub fn new(version_symbol: impl Into<String>) -> Self {
        Self {
            version_symbol: version_symbol.into(),
        }
    }
}

impl Default for NativeOpener {
    fn default() -> Self {
        Self::new(DEFAULT_VERSION_SYMBOL)
    }
}

impl ModuleOpener for NativeOpener {
    fn open(&self, path: &Path) -> Result<Box<dyn ResidentModule>, OpenError> {
        if !path.is_file() {
            return Err(OpenError::NotFound);
        }
        // SAFETY: loading runs the library's initialisers. The artifact is
        // either a release published for this module or built locally from
        // its sources.
        let library =
            unsafe { Library::new(path) }.map_err(|e| OpenError::Failed(e.to_string()))?;
        Ok(Box::new(NativeModule {
            path: path.to_path_buf(),
            library,
            version_symbol: self.version_symbol.clone(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_not_found() {
        let temp = tempfile::tempdir().expect("temp dir");
        let result = NativeOpener::default().open(&temp.path().join("absent.so"));
        assert!(matches!(result, Err(OpenError::NotFound)));
    }

    #[test]
    fn invalid_library_fails_to_open() {
        let temp = tempfile::tempdir().expect("temp dir");
        let bogus = temp.path().join("bogus.so");
        std::fs::write(&bogus, b"definitely not a shared library").expect("write");

        let result = NativeOpener::default().open(&bogus);
        assert!(matches!(result, Err(OpenError::Failed(_))));
    }
}
