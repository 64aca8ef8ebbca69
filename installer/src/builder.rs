//! Local compilation of the artifact with the external build tool.
//!
//! The build command runs in the source directory with its output directory
//! pinned to `<source_dir>/target`. On success the produced library is
//! renamed to the canonical artifact filename in the install directory and
//! the build tool's output directory is removed.

use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, info, warn};
use std::io::{BufRead, BufReader, Read, Write};
use std::process::{Command, ExitStatus, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};
use wait_timeout::ChildExt;

use crate::platform::ArtifactDescriptor;
use crate::staging::replace_file;

/// Default build command.
pub const DEFAULT_BUILD_COMMAND: &[&str] = &["cargo", "build", "--release"];

/// Default upper bound on a build's duration (30 minutes).
pub const DEFAULT_BUILD_TIMEOUT: Duration = Duration::from_secs(1800);

/// Build tool output directory, relative to the source directory.
const BUILD_DIR: &str = "target";

/// Profile subdirectory holding release output.
const RELEASE_DIR: &str = "release";

/// Errors arising from local compilation.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// The build command is empty.
    #[error("no build command configured")]
    EmptyCommand,

    /// The build command could not be started.
    #[error("failed to start {program}")]
    Spawn {
        /// The program that failed to start.
        program: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The build command exited unsuccessfully.
    #[error("build failed with {status}")]
    Failed {
        /// The exit status of the build command.
        status: ExitStatus,
    },

    /// The build command did not finish in time and was killed.
    #[error("build timed out after {} seconds", timeout.as_secs())]
    TimedOut {
        /// The configured timeout.
        timeout: Duration,
    },

    /// The build succeeded but the expected output file is missing.
    #[error("build output not found at {path}")]
    MissingOutput {
        /// Where the output was expected.
        path: Utf8PathBuf,
    },

    /// Moving the build output into place failed.
    #[error("failed to install build output at {path}")]
    Install {
        /// The canonical artifact path.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// A fully-specified build command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildInvocation {
    /// Program to run.
    pub program: String,
    /// Arguments passed to the program.
    pub args: Vec<String>,
    /// Working directory.
    pub current_dir: Utf8PathBuf,
    /// Value for `CARGO_TARGET_DIR`.
    pub target_dir: Utf8PathBuf,
    /// Upper bound on the run time.
    pub timeout: Duration,
}

/// Runs a build command to completion.
pub trait BuildRunner {
    /// Run `invocation`, forwarding its output lines to `sink`, and return
    /// its exit status.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Spawn`] when the process cannot be started and
    /// [`BuildError::TimedOut`] when it outlives the invocation's timeout.
    fn run(
        &self,
        invocation: &BuildInvocation,
        sink: &mut dyn Write,
    ) -> Result<ExitStatus, BuildError>;
}

/// Runs build commands as child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemBuildRunner;

impl BuildRunner for SystemBuildRunner {
    fn run(
        &self,
        invocation: &BuildInvocation,
        sink: &mut dyn Write,
    ) -> Result<ExitStatus, BuildError> {
        let mut child = Command::new(&invocation.program)
            .args(&invocation.args)
            .current_dir(invocation.current_dir.as_std_path())
            .env("CARGO_TARGET_DIR", invocation.target_dir.as_str())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| BuildError::Spawn {
                program: invocation.program.clone(),
                source,
            })?;

        let (tx, rx) = mpsc::channel();
        let readers: Vec<_> = [
            child.stdout.take().map(|out| Box::new(out) as Box<dyn Read + Send>),
            child.stderr.take().map(|err| Box::new(err) as Box<dyn Read + Send>),
        ]
        .into_iter()
        .flatten()
        .map(|stream| forward_lines(stream, tx.clone()))
        .collect();
        drop(tx);

        let deadline = Instant::now() + invocation.timeout;
        let mut timed_out = false;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match rx.recv_timeout(remaining) {
                Ok(line) => {
                    if let Err(e) = writeln!(sink, "{line}") {
                        debug!("build output sink rejected a line: {e}");
                    }
                }
                Err(mpsc::RecvTimeoutError::Disconnected) => break,
                Err(mpsc::RecvTimeoutError::Timeout) => {
                    timed_out = true;
                    break;
                }
            }
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        let status = if timed_out {
            None
        } else {
            child
                .wait_timeout(remaining)
                .map_err(|source| BuildError::Spawn {
                    program: invocation.program.clone(),
                    source,
                })?
        };

        let Some(status) = status else {
            if let Err(e) = child.kill() {
                warn!("failed to kill timed-out build: {e}");
            }
            if let Err(e) = child.wait() {
                warn!("failed to reap timed-out build: {e}");
            }
            return Err(BuildError::TimedOut {
                timeout: invocation.timeout,
            });
        };

        for reader in readers {
            if reader.join().is_err() {
                debug!("build output reader panicked");
            }
        }
        Ok(status)
    }
}

/// Read `stream` line by line on a helper thread, sending each line to `tx`.
///
/// Invalid UTF-8 is replaced lossily. The pipe is drained to end of file
/// even after the receiver hangs up.
fn forward_lines(
    stream: Box<dyn Read + Send>,
    tx: mpsc::Sender<String>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut reader = BufReader::new(stream);
        let mut buf = Vec::new();
        let mut listening = true;
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    debug!("stopped reading build output: {e}");
                    break;
                }
            }
            if !listening {
                continue;
            }
            let line = String::from_utf8_lossy(&buf);
            let line = line.trim_end_matches(['\n', '\r']).to_owned();
            listening = tx.send(line).is_ok();
        }
    })
}

/// Compiles the artifact from source.
pub trait ArtefactBuilder {
    /// Build the artifact from `source_dir` and install it under its
    /// canonical filename, forwarding build output to `sink`.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError`] when the build fails or its output cannot be
    /// installed.
    fn build(&self, source_dir: &Utf8Path, sink: &mut dyn Write) -> Result<(), BuildError>;
}

/// Configuration for [`Builder`].
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Command and arguments, e.g. `cargo build --release`.
    pub command: Vec<String>,
    /// Directory receiving the canonical artifact.
    pub install_dir: Utf8PathBuf,
    /// Upper bound on the build's duration.
    pub timeout: Duration,
}

/// Builds the artifact with an external build tool.
pub struct Builder<R = SystemBuildRunner> {
    config: BuildConfig,
    descriptor: ArtifactDescriptor,
    runner: R,
}

impl Builder<SystemBuildRunner> {
    /// Create a builder that spawns real processes.
    #[must_use]
    pub fn new(config: BuildConfig, descriptor: ArtifactDescriptor) -> Self {
        Self::with_runner(config, descriptor, SystemBuildRunner)
    }
}

impl<R: BuildRunner> Builder<R> {
    /// Create a builder with an injected runner.
    #[must_use]
    pub fn with_runner(config: BuildConfig, descriptor: ArtifactDescriptor, runner: R) -> Self {
        Self {
            config,
            descriptor,
            runner,
        }
    }

    /// The invocation used for `source_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::EmptyCommand`] when no command is configured.
    pub fn invocation(&self, source_dir: &Utf8Path) -> Result<BuildInvocation, BuildError> {
        let (program, args) = self
            .config
            .command
            .split_first()
            .ok_or(BuildError::EmptyCommand)?;
        Ok(BuildInvocation {
            program: program.clone(),
            args: args.to_vec(),
            current_dir: source_dir.to_owned(),
            target_dir: source_dir.join(BUILD_DIR),
            timeout: self.config.timeout,
        })
    }

    /// Path the build tool writes the library to.
    #[must_use]
    pub fn build_output_path(&self, source_dir: &Utf8Path) -> Utf8PathBuf {
        source_dir
            .join(BUILD_DIR)
            .join(RELEASE_DIR)
            .join(self.descriptor.build_output_filename())
    }

    fn install_output(&self, output: &Utf8Path) -> Result<Utf8PathBuf, BuildError> {
        let dest = self.config.install_dir.join(self.descriptor.filename());
        let install_err = |source| BuildError::Install {
            path: dest.clone(),
            source,
        };
        std::fs::create_dir_all(&self.config.install_dir).map_err(install_err)?;
        replace_file(output.as_std_path(), &dest).map_err(install_err)?;
        Ok(dest)
    }
}

impl<R: BuildRunner> ArtefactBuilder for Builder<R> {
    fn build(&self, source_dir: &Utf8Path, sink: &mut dyn Write) -> Result<(), BuildError> {
        let invocation = self.invocation(source_dir)?;
        info!(
            "building in {source_dir}: {} {}",
            invocation.program,
            invocation.args.join(" ")
        );
        let status = self.runner.run(&invocation, sink)?;
        if !status.success() {
            return Err(BuildError::Failed { status });
        }

        let output = self.build_output_path(source_dir);
        if !output.exists() {
            return Err(BuildError::MissingOutput { path: output });
        }
        let dest = self.install_output(&output)?;
        info!("installed build output at {dest}");

        if let Err(e) = std::fs::remove_dir_all(&invocation.target_dir) {
            warn!(
                "could not remove build directory {}: {e}",
                invocation.target_dir
            );
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "builder_tests.rs"]
mod tests;
