//! Candidate directories for each search strategy.

use std::path::PathBuf;

use crate::platform::SearchStrategy;

/// Environment variable listing extra library directories.
pub const LIBRARY_PATH_ENV: &str = "DYNMOD_LIBRARY_PATH";

/// Inputs to the directory search.
#[derive(Debug, Clone, Default)]
pub struct SearchContext {
    /// Directory of the component initiating the load (the install directory).
    pub origin_dir: PathBuf,
    /// The process working directory, when it can be determined.
    pub current_dir: Option<PathBuf>,
    /// Library search paths, in priority order.
    pub library_paths: Vec<PathBuf>,
}

impl SearchContext {
    /// Build a context for `origin_dir`, taking the working directory from
    /// the process and appending [`LIBRARY_PATH_ENV`] entries to
    /// `configured` paths.
    #[must_use]
    pub fn from_environment(origin_dir: PathBuf, configured: &[PathBuf]) -> Self {
        let mut library_paths = configured.to_vec();
        library_paths.extend(env_library_paths());
        Self {
            origin_dir,
            current_dir: std::env::current_dir().ok(),
            library_paths,
        }
    }
}

/// Entries of [`LIBRARY_PATH_ENV`], split with the platform separator.
#[must_use]
pub fn env_library_paths() -> Vec<PathBuf> {
    std::env::var_os(LIBRARY_PATH_ENV)
        .map(|value| {
            std::env::split_paths(&value)
                .filter(|path| !path.as_os_str().is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// Ordered directories the loader probes.
///
/// [`SearchStrategy::ByName`] yields the origin directory alone.
/// [`SearchStrategy::MultiPath`] yields the origin directory, the working
/// directory, then each library path.
///
/// # Examples
///
/// ```
/// use dynmod_installer::loader::search::{SearchContext, search_dirs};
/// use dynmod_installer::platform::SearchStrategy;
/// use std::path::PathBuf;
///
/// let context = SearchContext {
///     origin_dir: PathBuf::from("/opt/app"),
///     current_dir: Some(PathBuf::from("/work")),
///     library_paths: vec![PathBuf::from("/usr/lib/app")],
/// };
/// assert_eq!(search_dirs(SearchStrategy::ByName, &context).len(), 1);
/// assert_eq!(search_dirs(SearchStrategy::MultiPath, &context).len(), 3);
/// ```
#[must_use]
pub fn search_dirs(strategy: SearchStrategy, context: &SearchContext) -> Vec<PathBuf> {
    match strategy {
        SearchStrategy::ByName => vec![context.origin_dir.clone()],
        SearchStrategy::MultiPath => std::iter::once(context.origin_dir.clone())
            .chain(context.current_dir.clone())
            .chain(context.library_paths.iter().cloned())
            .collect(),
    }
}
