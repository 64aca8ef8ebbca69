//! Native module installer CLI entrypoint.
//!
//! This binary makes a requested native module version available: it reads
//! the host configuration, then fetches, builds, loads, or reports on the
//! artifact depending on the subcommand.

use clap::Parser;
use dynmod_installer::artefact::download::HttpDownloader;
use dynmod_installer::builder::{ArtefactBuilder, BuildConfig, Builder};
use dynmod_installer::cli::{Cli, Command};
use dynmod_installer::config::{AcquireConfig, ConfigError, ConfigFile};
use dynmod_installer::dirs::{BaseDirs, SystemBaseDirs, default_config_path};
use dynmod_installer::error::Result;
use dynmod_installer::fetch::{ArtefactFetcher, ReleaseFetcher};
use dynmod_installer::loader::PROCESS_LATCH;
use dynmod_installer::loader::native::NativeOpener;
use dynmod_installer::loader::search::SearchContext;
use dynmod_installer::marker::{LOCAL_SENTINEL, VersionStore};
use dynmod_installer::orchestrator::{Acquisition, Collaborators};
use dynmod_installer::output::{
    StatusReport, ensure_message, installed_message, write_stderr_line,
};
use dynmod_installer::platform::{ArtifactDescriptor, Platform};
use std::io::Write;

fn main() {
    let cli = Cli::parse();
    let mut stderr = std::io::stderr();
    let run_result = run(&cli, &mut stderr);
    let exit_code = exit_code_for_run_result(run_result, &mut stderr);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

fn run(cli: &Cli, stderr: &mut dyn Write) -> Result<()> {
    let dirs = SystemBaseDirs;
    let config = load_config(cli, &dirs)?;
    let platform = Platform::current()?;
    let descriptor = ArtifactDescriptor::new(
        platform,
        &config.artifact.module_name,
        &config.artifact.library_name(),
    );

    match &cli.command {
        Command::Ensure { version } => run_ensure(cli, &config, descriptor, version, stderr),
        Command::Fetch { version } => run_fetch(cli, &config, &descriptor, version, stderr),
        Command::Build => run_build(cli, &config, &descriptor, stderr),
        Command::Status { json } => {
            run_status(&config, &descriptor, *json, stderr);
            Ok(())
        }
    }
}

/// Reads the configuration file and applies command-line overrides.
///
/// An explicit `--config` file must exist; the default one is optional.
fn load_config(cli: &Cli, dirs: &dyn BaseDirs) -> Result<AcquireConfig> {
    let file = match (&cli.config, default_config_path(dirs)) {
        (Some(path), _) => ConfigFile::load(path)?,
        (None, Some(path)) => ConfigFile::load_optional(&path)?,
        (None, None) => ConfigFile::default(),
    };
    Ok(AcquireConfig::resolve(file, cli.overrides(), dirs)?)
}

fn build_config(config: &AcquireConfig) -> BuildConfig {
    BuildConfig {
        command: config.artifact.build_command.clone(),
        install_dir: config.install_dir.clone(),
        timeout: config.build_timeout,
    }
}

fn release_fetcher(config: &AcquireConfig, descriptor: &ArtifactDescriptor) -> ReleaseFetcher {
    ReleaseFetcher::new(
        config.release.clone(),
        descriptor.clone(),
        config.marker_file.clone(),
        Box::new(HttpDownloader::new(config.fetch_timeout)),
    )
}

fn run_ensure(
    cli: &Cli,
    config: &AcquireConfig,
    descriptor: ArtifactDescriptor,
    version: &str,
    stderr: &mut dyn Write,
) -> Result<()> {
    let fetcher = release_fetcher(config, &descriptor);
    let builder = Builder::new(build_config(config), descriptor.clone());
    let opener = NativeOpener::new(config.artifact.version_symbol.clone());
    let search = SearchContext::from_environment(
        config.install_dir().as_std_path().to_path_buf(),
        &config.search_paths,
    );
    let parts = Collaborators {
        fetcher: &fetcher,
        builder: &builder,
        opener: &opener,
        latch: &PROCESS_LATCH,
    };
    let acquisition = Acquisition::new(config, descriptor, search, parts);

    let mut discard = std::io::sink();
    let build_output: &mut dyn Write = if cli.quiet { &mut discard } else { &mut *stderr };
    let outcome = acquisition.ensure(version, build_output)?;

    if !cli.quiet {
        write_stderr_line(stderr, ensure_message(version, &outcome));
    } else if let Some(mismatch) = &outcome.mismatch {
        write_stderr_line(stderr, format!("warning: {mismatch}"));
    }
    Ok(())
}

fn run_fetch(
    cli: &Cli,
    config: &AcquireConfig,
    descriptor: &ArtifactDescriptor,
    version: &str,
    stderr: &mut dyn Write,
) -> Result<()> {
    let store = VersionStore::new(config.install_dir(), &config.marker_file);
    if store.read().as_deref() == Some(LOCAL_SENTINEL) {
        write_stderr_line(
            stderr,
            format!("{} is pinned to {LOCAL_SENTINEL}; not fetching.", store.path()),
        );
        return Ok(());
    }

    if !cli.quiet {
        write_stderr_line(stderr, format!("Fetching native module {version}..."));
    }
    release_fetcher(config, descriptor).download(version, config.install_dir())?;

    if !cli.quiet {
        let artifact = config.install_dir().join(descriptor.filename());
        write_stderr_line(stderr, installed_message("fetched", &artifact));
    }
    Ok(())
}

fn run_build(
    cli: &Cli,
    config: &AcquireConfig,
    descriptor: &ArtifactDescriptor,
    stderr: &mut dyn Write,
) -> Result<()> {
    let source_dir = config
        .source_dir
        .as_deref()
        .ok_or(ConfigError::Missing("source_dir"))?;
    let builder = Builder::new(build_config(config), descriptor.clone());

    if !cli.quiet {
        write_stderr_line(stderr, format!("Building native module in {source_dir}..."));
    }
    let mut discard = std::io::sink();
    let build_output: &mut dyn Write = if cli.quiet { &mut discard } else { &mut *stderr };
    builder.build(source_dir, build_output)?;

    if !cli.quiet {
        let artifact = config.install_dir().join(descriptor.filename());
        write_stderr_line(stderr, installed_message("built", &artifact));
    }
    Ok(())
}

fn run_status(
    config: &AcquireConfig,
    descriptor: &ArtifactDescriptor,
    json: bool,
    stderr: &mut dyn Write,
) {
    let report = StatusReport::collect(config.install_dir(), &config.marker_file, descriptor);
    if json {
        match report.to_json() {
            Ok(text) => write_stdout(&text),
            Err(e) => write_stderr_line(stderr, format!("failed to serialize status: {e}")),
        }
    } else {
        write_stdout(&report.display_text());
    }
}

/// Writes machine-readable or report output to stdout.
fn write_stdout(text: &str) {
    let mut stdout = std::io::stdout().lock();
    if writeln!(stdout, "{text}").is_err() {
        // Best-effort output; a closed pipe is not an error.
    }
}

fn exit_code_for_run_result(result: Result<()>, stderr: &mut dyn Write) -> i32 {
    match result {
        Ok(()) => 0,
        Err(err) => {
            write_stderr_line(stderr, err);
            1
        }
    }
}
