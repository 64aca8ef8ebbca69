//! Shared test doubles for the installer crate.
//!
//! Each stub stands in for one external effect (spawning the build tool,
//! talking to the release host, or mapping a shared library) and records how
//! it was used.

use crate::artefact::download::{ArtefactDownloader, DownloadError};
use crate::builder::{BuildError, BuildInvocation, BuildRunner};
use crate::loader::{ModuleOpener, OpenError, ResidentModule};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::sync::Mutex;

/// File contents that make [`StubOpener`] report a load failure.
pub const UNLOADABLE: &str = "!unloadable";

/// Creates an `ExitStatus` from an exit code (Unix implementation).
#[cfg(unix)]
#[must_use]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;

    ExitStatus::from_raw(code << 8)
}

/// Creates an `ExitStatus` from an exit code (Windows implementation).
#[cfg(windows)]
#[must_use]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::windows::process::ExitStatusExt;

    ExitStatus::from_raw(code.unsigned_abs())
}

/// A module "loaded" by [`StubOpener`].
#[derive(Debug)]
pub struct StubModule {
    path: PathBuf,
    version: Option<String>,
}

impl ResidentModule for StubModule {
    fn path(&self) -> &Path {
        &self.path
    }

    fn version(&self) -> Option<String> {
        self.version.clone()
    }
}

/// A [`ModuleOpener`] that treats any existing file as a loadable module.
///
/// The file's trimmed contents become the module's reported version (none
/// when blank). A file containing [`UNLOADABLE`] fails to open.
#[derive(Debug, Default)]
pub struct StubOpener {
    probes: Mutex<Vec<PathBuf>>,
}

impl StubOpener {
    /// Create an opener with no recorded probes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every path passed to [`ModuleOpener::open`], in order.
    ///
    /// # Panics
    ///
    /// Panics if the probe log mutex is poisoned.
    #[must_use]
    pub fn probes(&self) -> Vec<PathBuf> {
        self.probes.lock().expect("probe log").clone()
    }
}

impl ModuleOpener for StubOpener {
    fn open(&self, path: &Path) -> Result<Box<dyn ResidentModule>, OpenError> {
        self.probes
            .lock()
            .expect("probe log")
            .push(path.to_path_buf());
        let contents = std::fs::read_to_string(path).map_err(|_| OpenError::NotFound)?;
        let contents = contents.trim();
        if contents == UNLOADABLE {
            return Err(OpenError::Failed("stub refused to load".to_owned()));
        }
        Ok(Box::new(StubModule {
            path: path.to_path_buf(),
            version: (!contents.is_empty()).then(|| contents.to_owned()),
        }))
    }
}

/// A [`BuildRunner`] that records invocations instead of spawning processes.
#[derive(Debug)]
pub struct StubRunner {
    exit_code: i32,
    output: Option<(String, Vec<u8>)>,
    lines: Vec<String>,
    invocations: Mutex<Vec<BuildInvocation>>,
}

impl StubRunner {
    /// A build that exits successfully after writing `contents` to
    /// `target/release/<output_name>`.
    #[must_use]
    pub fn succeeding(output_name: &str, contents: &[u8]) -> Self {
        Self {
            exit_code: 0,
            output: Some((output_name.to_owned(), contents.to_vec())),
            lines: Vec::new(),
            invocations: Mutex::new(Vec::new()),
        }
    }

    /// A build that exits with `code` and produces nothing.
    #[must_use]
    pub fn failing(code: i32) -> Self {
        Self {
            exit_code: code,
            output: None,
            lines: Vec::new(),
            invocations: Mutex::new(Vec::new()),
        }
    }

    /// Lines the build prints to its output sink.
    #[must_use]
    pub fn with_output_lines(mut self, lines: &[&str]) -> Self {
        self.lines = lines.iter().map(|&line| line.to_owned()).collect();
        self
    }

    /// Every invocation received, in order.
    ///
    /// # Panics
    ///
    /// Panics if the invocation log mutex is poisoned.
    #[must_use]
    pub fn invocations(&self) -> Vec<BuildInvocation> {
        self.invocations.lock().expect("invocation log").clone()
    }
}

impl BuildRunner for StubRunner {
    fn run(
        &self,
        invocation: &BuildInvocation,
        sink: &mut dyn Write,
    ) -> Result<ExitStatus, BuildError> {
        self.invocations
            .lock()
            .expect("invocation log")
            .push(invocation.clone());
        for line in &self.lines {
            writeln!(sink, "{line}").expect("write build output");
        }
        if self.exit_code != 0 {
            return Ok(exit_status(self.exit_code));
        }
        if let Some((name, contents)) = &self.output {
            let release = invocation.target_dir.join("release");
            std::fs::create_dir_all(&release).expect("create release dir");
            std::fs::write(release.join(name), contents).expect("write build output");
        }
        Ok(exit_status(0))
    }
}

/// An [`ArtefactDownloader`] that serves each release's tag as the artifact
/// body and records every requested URL.
///
/// Bodies for `.gz` assets are gzip-compressed. Loading a served artifact
/// with [`StubOpener`] therefore reports the downloaded release tag.
#[derive(Debug, Default)]
pub struct RecordingDownloader {
    urls: Mutex<Vec<String>>,
    fail: bool,
}

impl RecordingDownloader {
    /// A downloader that serves every request.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A downloader that answers every request with 404.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            urls: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    /// Every requested URL, in order.
    ///
    /// # Panics
    ///
    /// Panics if the URL log mutex is poisoned.
    #[must_use]
    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().expect("URL log").clone()
    }
}

impl ArtefactDownloader for RecordingDownloader {
    fn download(&self, url: &str, dest: &Path) -> Result<(), DownloadError> {
        self.urls.lock().expect("URL log").push(url.to_owned());
        if self.fail {
            return Err(DownloadError::NotFound {
                url: url.to_owned(),
            });
        }
        let tag = url.rsplit('/').nth(1).unwrap_or_default();
        let body = if url.ends_with(".gz") {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(tag.as_bytes())?;
            encoder.finish()?
        } else {
            tag.as_bytes().to_vec()
        };
        std::fs::write(dest, body)?;
        Ok(())
    }
}

/// Boxes a shared downloader so tests can keep inspecting it after handing
/// it to a fetcher.
impl ArtefactDownloader for std::sync::Arc<RecordingDownloader> {
    fn download(&self, url: &str, dest: &Path) -> Result<(), DownloadError> {
        self.as_ref().download(url, dest)
    }
}
