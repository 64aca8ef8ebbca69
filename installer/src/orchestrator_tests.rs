//! Unit tests for the acquisition state machine.

use super::*;
use crate::artefact::release::ReleaseSource;
use crate::builder::{BuildConfig, Builder};
use crate::config::ArtifactConfig;
use crate::fetch::{FetchError, MockArtefactFetcher, ReleaseFetcher};
use crate::platform::Platform;
use crate::test_utils::{RecordingDownloader, StubOpener, StubRunner, UNLOADABLE};
use camino::{Utf8Path, Utf8PathBuf};
use mockall::predicate::{always, eq};
use rstest::{fixture, rstest};
use std::sync::Arc;
use std::time::Duration;

const ARTIFACT: &str = "tsc-dyn.so";

struct Harness {
    _temp: tempfile::TempDir,
    config: AcquireConfig,
    opener: StubOpener,
    latch: ModuleLatch,
}

impl Harness {
    fn install_dir(&self) -> &Utf8Path {
        &self.config.install_dir
    }

    fn seed(&self, marker: &str, artifact: &str) {
        std::fs::create_dir_all(self.install_dir()).expect("create install dir");
        std::fs::write(self.install_dir().join(&self.config.marker_file), marker)
            .expect("write marker");
        std::fs::write(self.install_dir().join(ARTIFACT), artifact).expect("write artifact");
    }

    fn marker(&self) -> Option<String> {
        VersionStore::new(self.install_dir(), &self.config.marker_file).read()
    }

    fn descriptor() -> ArtifactDescriptor {
        ArtifactDescriptor::new(Platform::LinuxLike, "tsc-dyn", "tsc_dyn")
    }

    fn builder(&self, runner: StubRunner) -> Builder<StubRunner> {
        Builder::with_runner(
            BuildConfig {
                command: self.config.artifact.build_command.clone(),
                install_dir: self.config.install_dir.clone(),
                timeout: Duration::from_secs(60),
            },
            Self::descriptor(),
            runner,
        )
    }

    fn ensure(
        &self,
        fetcher: &dyn ArtefactFetcher,
        builder: &dyn ArtefactBuilder,
        requested: &str,
    ) -> Result<EnsureOutcome> {
        let search = SearchContext {
            origin_dir: self.install_dir().as_std_path().to_path_buf(),
            current_dir: None,
            library_paths: Vec::new(),
        };
        let parts = Collaborators {
            fetcher,
            builder,
            opener: &self.opener,
            latch: &self.latch,
        };
        Acquisition::new(&self.config, Self::descriptor(), search, parts)
            .ensure(requested, &mut Vec::new())
    }
}

#[fixture]
fn harness() -> Harness {
    let temp = tempfile::tempdir().expect("temp dir");
    let root = Utf8PathBuf::try_from(temp.path().to_path_buf()).expect("UTF-8 path");
    let mut config = AcquireConfig::new(
        root.join("install"),
        ReleaseSource::github("owner", "repo"),
        ArtifactConfig::new("tsc-dyn"),
    );
    config.source_dir = Some(root.join("core"));
    Harness {
        _temp: temp,
        config,
        opener: StubOpener::new(),
        latch: ModuleLatch::new(),
    }
}

/// Installs an artifact reporting `version` and records the marker, the way
/// a successful release download would.
fn fake_install(version: &str, dir: &Utf8Path) -> std::result::Result<(), FetchError> {
    std::fs::create_dir_all(dir).expect("create install dir");
    std::fs::write(dir.join(ARTIFACT), version).expect("write artifact");
    VersionStore::new(dir, crate::marker::DEFAULT_MARKER_FILE).write(version)?;
    Ok(())
}

fn unused_builder(harness: &Harness) -> Builder<StubRunner> {
    harness.builder(StubRunner::failing(1))
}

#[rstest]
#[case::absent(None, AcquisitionState::NoArtifact)]
#[case::older(Some("0.7.2"), AcquisitionState::Stale)]
#[case::prerelease(Some("0.8.0-rc.1"), AcquisitionState::Stale)]
#[case::equal(Some("0.8.0"), AcquisitionState::Current)]
#[case::tag_spelling(Some("v0.8.0"), AcquisitionState::Current)]
#[case::newer(Some("0.9.0"), AcquisitionState::Current)]
#[case::pinned(Some("LOCAL"), AcquisitionState::Current)]
#[case::garbage(Some("not a version"), AcquisitionState::Stale)]
fn assess_classifies_markers(#[case] marker: Option<&str>, #[case] expected: AcquisitionState) {
    assert_eq!(assess(marker, &Version::new(0, 8, 0)), expected);
}

#[rstest]
fn fresh_install_downloads_and_loads(harness: Harness) {
    let downloader = Arc::new(RecordingDownloader::new());
    let fetcher = ReleaseFetcher::new(
        harness.config.release.clone(),
        Harness::descriptor(),
        harness.config.marker_file.clone(),
        Box::new(Arc::clone(&downloader)),
    );
    let builder = unused_builder(&harness);

    let outcome = harness
        .ensure(&fetcher, &builder, "0.8.0")
        .expect("ensure succeeds");

    assert_eq!(
        downloader.urls(),
        vec!["https://github.com/owner/repo/releases/download/0.8.0/tsc-dyn.so"]
    );
    assert_eq!(harness.marker().as_deref(), Some("0.8.0"));
    assert_eq!(outcome.initial_state, AcquisitionState::NoArtifact);
    assert!(outcome.acquired);
    assert_eq!(outcome.reported_version.as_deref(), Some("0.8.0"));
    assert_eq!(outcome.mismatch, None);
    assert_eq!(
        outcome.module_path,
        harness.install_dir().join(ARTIFACT).as_std_path()
    );
}

#[rstest]
fn fresh_install_of_compressed_release(harness: Harness) {
    let downloader = Arc::new(RecordingDownloader::new());
    let fetcher = ReleaseFetcher::new(
        harness.config.release.clone(),
        Harness::descriptor(),
        harness.config.marker_file.clone(),
        Box::new(Arc::clone(&downloader)),
    );
    let builder = unused_builder(&harness);

    let outcome = harness
        .ensure(&fetcher, &builder, "0.7.0")
        .expect("ensure succeeds");

    assert!(downloader.urls()[0].ends_with("/0.7.0/tsc-dyn.so.gz"));
    assert_eq!(outcome.reported_version.as_deref(), Some("0.7.0"));
    assert!(!harness.install_dir().join("tsc-dyn.so.gz").exists());
}

#[rstest]
fn stale_marker_fetches_exactly_once(harness: Harness) {
    harness.seed("0.7.2", "0.7.2");
    let mut fetcher = MockArtefactFetcher::new();
    fetcher
        .expect_download()
        .with(eq("0.8.0"), always())
        .times(1)
        .returning(fake_install);
    let builder = unused_builder(&harness);

    let outcome = harness
        .ensure(&fetcher, &builder, "0.8.0")
        .expect("ensure succeeds");

    assert_eq!(outcome.initial_state, AcquisitionState::Stale);
    assert_eq!(harness.marker().as_deref(), Some("0.8.0"));
    assert_eq!(outcome.mismatch, None);
}

#[rstest]
#[case::equal("0.8.0", "0.8.0", None)]
#[case::downgrade("0.9.0", "0.8.0", Some("0.9.0"))]
#[case::pinned("LOCAL", "0.8.0", Some("0.5.1"))]
fn current_marker_never_fetches(
    harness: Harness,
    #[case] marker: &str,
    #[case] requested: &str,
    #[case] mismatched: Option<&str>,
) {
    let artifact = if marker == LOCAL_SENTINEL { "0.5.1" } else { marker };
    harness.seed(marker, artifact);
    let mut fetcher = MockArtefactFetcher::new();
    fetcher.expect_download().never();
    let builder = unused_builder(&harness);

    let outcome = harness
        .ensure(&fetcher, &builder, requested)
        .expect("a mismatch is not an error");

    assert_eq!(outcome.initial_state, AcquisitionState::Current);
    assert!(!outcome.acquired);
    assert_eq!(
        outcome.mismatch.as_ref().map(|m| m.loaded.as_str()),
        mismatched
    );
    assert_eq!(harness.marker().as_deref(), Some(marker));
}

#[test]
fn mismatch_message_names_both_versions() {
    let mismatch = VersionMismatch {
        requested: "0.8.0".to_owned(),
        loaded: "0.9.0".to_owned(),
    };
    let msg = mismatch.to_string();
    assert!(msg.contains("0.9.0"));
    assert!(msg.contains("0.8.0"));
    assert!(msg.contains("restart"));
}

#[rstest]
fn load_failure_reacquires_and_retries_once(harness: Harness) {
    harness.seed("0.8.0", UNLOADABLE);
    let mut fetcher = MockArtefactFetcher::new();
    fetcher
        .expect_download()
        .with(eq("0.8.0"), always())
        .times(1)
        .returning(fake_install);
    let builder = unused_builder(&harness);

    let outcome = harness
        .ensure(&fetcher, &builder, "0.8.0")
        .expect("retry succeeds");

    assert_eq!(outcome.initial_state, AcquisitionState::Current);
    assert!(outcome.acquired);
    assert_eq!(harness.opener.probes().len(), 2);
}

#[rstest]
fn second_load_failure_is_reported(harness: Harness) {
    harness.seed("0.8.0", UNLOADABLE);
    let mut fetcher = MockArtefactFetcher::new();
    fetcher.expect_download().times(1).returning(|_, _| Ok(()));
    let builder = unused_builder(&harness);

    let err = harness
        .ensure(&fetcher, &builder, "0.8.0")
        .expect_err("artifact stays unloadable");

    assert!(matches!(err, AcquireError::Load(_)));
    assert_eq!(harness.opener.probes().len(), 2);
    assert!(!harness.latch.is_set());
}

#[rstest]
fn pinned_marker_is_not_reacquired_after_load_failure(harness: Harness) {
    std::fs::create_dir_all(harness.install_dir()).expect("create install dir");
    std::fs::write(
        harness.install_dir().join(&harness.config.marker_file),
        LOCAL_SENTINEL,
    )
    .expect("write marker");
    let mut fetcher = MockArtefactFetcher::new();
    fetcher.expect_download().never();
    let builder = unused_builder(&harness);

    let err = harness
        .ensure(&fetcher, &builder, "0.8.0")
        .expect_err("nothing to load");

    assert!(matches!(err, AcquireError::Load(_)));
    assert_eq!(harness.marker().as_deref(), Some(LOCAL_SENTINEL));
}

#[rstest]
fn resident_module_is_reused_across_requests(harness: Harness) {
    let mut fetcher = MockArtefactFetcher::new();
    fetcher
        .expect_download()
        .times(2)
        .returning(fake_install);
    let builder = unused_builder(&harness);

    let first = harness
        .ensure(&fetcher, &builder, "0.8.0")
        .expect("first load");
    let second = harness
        .ensure(&fetcher, &builder, "0.9.0")
        .expect("upgrade installs but cannot reload");

    assert_eq!(first.mismatch, None);
    assert_eq!(harness.marker().as_deref(), Some("0.9.0"));
    assert_eq!(
        second.mismatch,
        Some(VersionMismatch {
            requested: "0.9.0".to_owned(),
            loaded: "0.8.0".to_owned(),
        })
    );
    assert_eq!(harness.opener.probes().len(), 1);
}

#[rstest]
fn compile_source_builds_without_writing_marker(mut harness: Harness) {
    harness.config.sources = vec![AcquisitionSource::Compile, AcquisitionSource::Remote];
    let source_dir = harness.config.source_dir.clone().expect("source dir");
    std::fs::create_dir_all(&source_dir).expect("create source dir");
    let mut fetcher = MockArtefactFetcher::new();
    fetcher.expect_download().never();
    let builder = harness.builder(StubRunner::succeeding("libtsc_dyn.so", b"0.8.0"));

    let outcome = harness
        .ensure(&fetcher, &builder, "0.8.0")
        .expect("compiled module loads");

    assert!(outcome.acquired);
    assert_eq!(outcome.reported_version.as_deref(), Some("0.8.0"));
    assert_eq!(harness.marker(), None);
}

#[rstest]
fn failed_compile_falls_back_to_remote(mut harness: Harness) {
    harness.config.sources = vec![AcquisitionSource::Compile, AcquisitionSource::Remote];
    let mut fetcher = MockArtefactFetcher::new();
    fetcher
        .expect_download()
        .with(eq("0.8.0"), always())
        .times(1)
        .returning(fake_install);
    let builder = harness.builder(StubRunner::failing(101));

    let outcome = harness
        .ensure(&fetcher, &builder, "0.8.0")
        .expect("remote source succeeds");

    assert_eq!(outcome.reported_version.as_deref(), Some("0.8.0"));
}

#[rstest]
fn last_source_error_is_propagated(harness: Harness) {
    let fetcher = ReleaseFetcher::new(
        harness.config.release.clone(),
        Harness::descriptor(),
        harness.config.marker_file.clone(),
        Box::new(RecordingDownloader::failing()),
    );
    let builder = unused_builder(&harness);

    let err = harness
        .ensure(&fetcher, &builder, "0.8.0")
        .expect_err("release is missing");

    assert!(matches!(err, AcquireError::Fetch(_)));
    assert_eq!(harness.marker(), None);
    assert!(harness.opener.probes().is_empty());
}

#[rstest]
fn compile_without_source_dir_is_a_config_error(mut harness: Harness) {
    harness.config.sources = vec![AcquisitionSource::Compile];
    harness.config.source_dir = None;
    let fetcher = MockArtefactFetcher::new();
    let builder = unused_builder(&harness);

    let err = harness
        .ensure(&fetcher, &builder, "0.8.0")
        .expect_err("no source tree");

    assert!(matches!(
        err,
        AcquireError::Config(ConfigError::Missing("source_dir"))
    ));
}

#[rstest]
fn no_sources_only_loads(mut harness: Harness) {
    harness.config.sources.clear();
    let fetcher = MockArtefactFetcher::new();
    let builder = unused_builder(&harness);

    let err = harness
        .ensure(&fetcher, &builder, "0.8.0")
        .expect_err("nothing installed");

    match err {
        AcquireError::Load(load) => assert_eq!(load.filename, ARTIFACT),
        other => panic!("expected Load, got {other:?}"),
    }
}

#[rstest]
#[case::sentinel("LOCAL")]
#[case::empty("")]
#[case::garbage("latest")]
fn unparsable_request_is_rejected(harness: Harness, #[case] requested: &str) {
    let mut fetcher = MockArtefactFetcher::new();
    fetcher.expect_download().never();
    let builder = unused_builder(&harness);

    let err = harness
        .ensure(&fetcher, &builder, requested)
        .expect_err("invalid request");

    assert!(matches!(err, AcquireError::InvalidVersion(_)));
}

#[rstest]
fn multi_path_search_finds_artifact_on_library_path(harness: Harness) {
    std::fs::create_dir_all(harness.install_dir()).expect("create install dir");
    std::fs::write(
        harness.install_dir().join(&harness.config.marker_file),
        "0.8.0",
    )
    .expect("write marker");
    let library_dir = harness.install_dir().join("lib");
    std::fs::create_dir_all(&library_dir).expect("create library dir");
    std::fs::write(library_dir.join("tsc-dyn.dll"), "0.8.0").expect("write artifact");
    let mut fetcher = MockArtefactFetcher::new();
    fetcher.expect_download().never();
    let builder = unused_builder(&harness);
    let search = SearchContext {
        origin_dir: harness.install_dir().as_std_path().to_path_buf(),
        current_dir: None,
        library_paths: vec![library_dir.as_std_path().to_path_buf()],
    };
    let parts = Collaborators {
        fetcher: &fetcher,
        builder: &builder,
        opener: &harness.opener,
        latch: &harness.latch,
    };
    let descriptor = ArtifactDescriptor::new(Platform::Windows, "tsc-dyn", "tsc_dyn");

    let outcome = Acquisition::new(&harness.config, descriptor, search, parts)
        .ensure("0.8.0", &mut Vec::new())
        .expect("found on library path");

    assert_eq!(
        outcome.module_path,
        library_dir.join("tsc-dyn.dll").as_std_path()
    );
    assert_eq!(harness.opener.probes().len(), 2);
}
