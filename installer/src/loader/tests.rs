//! Unit tests for the probing loader.

use super::*;
use crate::test_utils::{StubOpener, UNLOADABLE};
use rstest::{fixture, rstest};

const FILENAME: &str = "tsc-dyn.dll";

struct Dirs {
    _temp: tempfile::TempDir,
    a: PathBuf,
    b: PathBuf,
    c: PathBuf,
}

impl Dirs {
    fn all(&self) -> Vec<PathBuf> {
        vec![self.a.clone(), self.b.clone(), self.c.clone()]
    }
}

#[fixture]
fn dirs() -> Dirs {
    let temp = tempfile::tempdir().expect("temp dir");
    let make = |name: &str| {
        let dir = temp.path().join(name);
        std::fs::create_dir_all(&dir).expect("create dir");
        dir
    };
    let (a, b, c) = (make("a"), make("b"), make("c"));
    Dirs {
        _temp: temp,
        a,
        b,
        c,
    }
}

#[rstest]
fn probes_in_order_until_first_success(dirs: Dirs) {
    std::fs::write(dirs.c.join(FILENAME), "0.8.0").expect("seed artifact");
    let latch = ModuleLatch::new();
    let opener = StubOpener::new();
    let loader = Loader::new(&latch, &opener, FILENAME);

    let module = loader.ensure_loaded(&dirs.all()).expect("loads from C");

    assert_eq!(module.path(), dirs.c.join(FILENAME));
    assert_eq!(
        opener.probes(),
        vec![
            dirs.a.join(FILENAME),
            dirs.b.join(FILENAME),
            dirs.c.join(FILENAME)
        ]
    );
    assert!(latch.is_set());
}

#[rstest]
fn stops_at_first_loadable_candidate(dirs: Dirs) {
    std::fs::write(dirs.a.join(FILENAME), "0.8.0").expect("seed artifact");
    std::fs::write(dirs.c.join(FILENAME), "0.9.0").expect("seed artifact");
    let latch = ModuleLatch::new();
    let opener = StubOpener::new();

    let module = Loader::new(&latch, &opener, FILENAME)
        .ensure_loaded(&dirs.all())
        .expect("loads from A");

    assert_eq!(module.version().as_deref(), Some("0.8.0"));
    assert_eq!(opener.probes().len(), 1);
}

#[rstest]
fn resident_module_short_circuits_without_probing(dirs: Dirs) {
    std::fs::write(dirs.a.join(FILENAME), "0.8.0").expect("seed artifact");
    let latch = ModuleLatch::new();
    let first = StubOpener::new();
    Loader::new(&latch, &first, FILENAME)
        .ensure_loaded(&dirs.all())
        .expect("initial load");

    let second = StubOpener::new();
    let loader = Loader::new(&latch, &second, FILENAME);
    let empty = loader.ensure_loaded(&[]).expect("already resident");
    let bogus = loader
        .ensure_loaded(&[PathBuf::from("/nonexistent/dir")])
        .expect("already resident");

    assert_eq!(empty.path(), dirs.a.join(FILENAME));
    assert_eq!(bogus.path(), dirs.a.join(FILENAME));
    assert!(second.probes().is_empty(), "no probes once resident");
}

#[rstest]
fn open_failures_are_skipped(dirs: Dirs) {
    std::fs::write(dirs.a.join(FILENAME), UNLOADABLE).expect("seed broken artifact");
    std::fs::write(dirs.b.join(FILENAME), "1.0.0").expect("seed artifact");
    let latch = ModuleLatch::new();
    let opener = StubOpener::new();

    let module = Loader::new(&latch, &opener, FILENAME)
        .ensure_loaded(&dirs.all())
        .expect("loads from B");

    assert_eq!(module.path(), dirs.b.join(FILENAME));
}

#[rstest]
fn exhausted_search_lists_every_probe(dirs: Dirs) {
    std::fs::write(dirs.b.join(FILENAME), UNLOADABLE).expect("seed broken artifact");
    let latch = ModuleLatch::new();
    let opener = StubOpener::new();

    let err = Loader::new(&latch, &opener, FILENAME)
        .ensure_loaded(&dirs.all())
        .expect_err("nothing loads");

    assert_eq!(err.filename, FILENAME);
    let reasons: Vec<_> = err.probes.iter().map(|probe| &probe.reason).collect();
    assert_eq!(reasons.len(), 3);
    assert_eq!(reasons.first(), Some(&&OpenError::NotFound));
    assert!(matches!(reasons.get(1), Some(OpenError::Failed(_))));
    assert!(err.to_string().contains(FILENAME));
    assert!(!latch.is_set());
}

#[test]
fn empty_search_list_is_exhausted_immediately() {
    let latch = ModuleLatch::new();
    let opener = StubOpener::new();

    let err = Loader::new(&latch, &opener, FILENAME)
        .ensure_loaded(&[])
        .expect_err("nothing to probe");

    assert!(err.probes.is_empty());
    assert!(err.to_string().contains("no search paths"));
}
