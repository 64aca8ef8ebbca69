//! Process-wide record of the resident native module.
//!
//! A native module can be loaded into a process at most once and is never
//! unloaded. The latch is set by the first successful load and never reset;
//! the loader consults it before touching the file system.

use std::sync::OnceLock;

use super::ResidentModule;

/// The latch shared by every loader in this process.
pub static PROCESS_LATCH: ModuleLatch = ModuleLatch::new();

/// One-shot holder for the resident module.
#[derive(Debug, Default)]
pub struct ModuleLatch {
    module: OnceLock<Box<dyn ResidentModule>>,
}

impl ModuleLatch {
    /// Create an unset latch.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            module: OnceLock::new(),
        }
    }

    /// Whether a module is already resident.
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.module.get().is_some()
    }

    /// The resident module, if any.
    #[must_use]
    pub fn get(&self) -> Option<&dyn ResidentModule> {
        self.module.get().map(AsRef::as_ref)
    }

    /// Record `module` as resident.
    ///
    /// When another module won the race, `module` is dropped and the
    /// existing one is returned.
    pub fn set(&self, module: Box<dyn ResidentModule>) -> &dyn ResidentModule {
        self.module.get_or_init(|| module).as_ref()
    }
}
