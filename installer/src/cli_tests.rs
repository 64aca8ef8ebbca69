//! Tests for installer CLI parsing.

use super::*;
use clap::CommandFactory;
use rstest::rstest;

#[test]
fn cli_definition_is_consistent() {
    Cli::command().debug_assert();
}

#[test]
fn cli_parses_ensure_with_defaults() {
    let cli = Cli::try_parse_from(["dynmod-installer", "ensure", "0.8.0"]).expect("valid args");
    assert_eq!(
        cli.command,
        Command::Ensure {
            version: "0.8.0".to_owned()
        }
    );
    assert!(cli.config.is_none());
    assert!(cli.install_dir.is_none());
    assert!(cli.sources.is_empty());
    assert!(cli.search_paths.is_empty());
    assert!(!cli.quiet);
}

#[test]
fn cli_parses_sources_in_order() {
    let cli = Cli::try_parse_from([
        "dynmod-installer",
        "--source",
        "compile",
        "-s",
        "remote",
        "ensure",
        "0.8.0",
    ])
    .expect("valid args");
    assert_eq!(
        cli.sources,
        vec![AcquisitionSource::Compile, AcquisitionSource::Remote]
    );
}

#[test]
fn cli_rejects_unknown_source() {
    let result = Cli::try_parse_from(["dynmod-installer", "--source", "ftp", "build"]);
    assert!(result.is_err());
}

#[rstest]
#[case::fetch(&["fetch", "0.7.0"], Command::Fetch { version: "0.7.0".to_owned() })]
#[case::build(&["build"], Command::Build)]
#[case::status(&["status"], Command::Status { json: false })]
#[case::status_json(&["status", "--json"], Command::Status { json: true })]
fn cli_parses_subcommands(#[case] args: &[&str], #[case] expected: Command) {
    let cli = Cli::try_parse_from(std::iter::once("dynmod-installer").chain(args.iter().copied()))
        .expect("valid args");
    assert_eq!(cli.command, expected);
}

#[test]
fn cli_requires_a_subcommand() {
    assert!(Cli::try_parse_from(["dynmod-installer"]).is_err());
}

#[test]
fn overrides_carry_flag_values() {
    let cli = Cli::try_parse_from([
        "dynmod-installer",
        "-i",
        "/opt/app",
        "--source-dir",
        "/src/core",
        "--search-path",
        "/a",
        "--search-path",
        "/b",
        "--module-name",
        "tsc-dyn",
        "-q",
        "build",
    ])
    .expect("valid args");

    let overrides = cli.overrides();

    assert!(cli.quiet);
    assert_eq!(overrides.install_dir, Some(Utf8PathBuf::from("/opt/app")));
    assert_eq!(overrides.source_dir, Some(Utf8PathBuf::from("/src/core")));
    assert_eq!(
        overrides.search_paths,
        vec![PathBuf::from("/a"), PathBuf::from("/b")]
    );
    assert_eq!(overrides.module_name.as_deref(), Some("tsc-dyn"));
    assert!(overrides.release.is_none());
}
