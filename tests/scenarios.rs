//! Integration tests for the six literal scenarios of the scan loop,
//! each built against a `tempfile::TempDir` project tree the way the
//! teacher's `server/tests/` fixtures exercise a project end to end.

use std::fs;
use std::path::Path;

use depgen::config::Config;
use depgen::pathutil::normalize;
use depgen::scan::{CycleReport, ScanController, SourceOutcome};

fn write(dir: &Path, rel: &str, content: &str) {
    let p = dir.join(rel);
    if let Some(parent) = p.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(p, content).unwrap();
}

fn run_one_cycle(root: &str, config: &Config) -> CycleReport {
    let mut controller = ScanController::new(root, config);
    controller.run_cycle(root, config)
}

#[test]
fn scenario_1_single_self_contained_source() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a.cpp", "#include \"b.h\"\n");
    write(dir.path(), "b.h", "");
    write(dir.path(), "dependency_template.txt", "|!src_file_name!|.o: |!dependents!|");

    let root = dir.path().to_string_lossy().to_string();
    let mut config = Config::default();
    config.dependency_paths = false;
    config.include_source = false;

    run_one_cycle(&root, &config);

    let frag = fs::read_to_string(dir.path().join("a.d")).unwrap();
    assert_eq!(frag.trim(), "a.o: b.h");
}

#[test]
fn scenario_2_transitive_include_orders_by_discovery() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a.cpp", "#include \"b.h\"\n");
    write(dir.path(), "b.h", "#include \"c.h\"\n");
    write(dir.path(), "c.h", "");
    write(dir.path(), "dependency_template.txt", "|!src_file_name!|.o: |!dependents!|");

    let root = dir.path().to_string_lossy().to_string();
    let config = Config::default();

    run_one_cycle(&root, &config);

    let frag = fs::read_to_string(dir.path().join("a.d")).unwrap();
    assert_eq!(frag.trim(), "a.o: b.h c.h");
}

#[test]
fn scenario_3_full_paths_in_configured_dependency_dir() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "src/a.cpp", "#include \"b.h\"\n");
    write(dir.path(), "inc/b.h", "");
    write(dir.path(), "dependency_template.txt", "|!src_file_name!|.o: |!dependents!|");
    fs::create_dir_all(dir.path().join("dep")).unwrap();

    let root = dir.path().to_string_lossy().to_string();
    let mut config = Config::default();
    config.dependency_paths = true;
    config.dependency_dir = normalize(&dir.path().join("dep").to_string_lossy());

    run_one_cycle(&root, &config);

    let frag_path = dir.path().join("dep").join("a.d");
    assert!(frag_path.exists());
    let frag = fs::read_to_string(&frag_path).unwrap();
    assert!(frag.contains("inc/b.h"));
    assert!(!frag.contains('\\'));
}

#[test]
fn scenario_4_missing_include_strict_skips_emit() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a.cpp", "#include \"missing.h\"\n");
    write(dir.path(), "dependency_template.txt", "|!src_file_name!|.o: |!dependents!|");

    let root = dir.path().to_string_lossy().to_string();
    let mut config = Config::default();
    config.use_incomplete_list = false;

    let report = run_one_cycle(&root, &config);

    match report {
        CycleReport::Ran { outcomes, .. } => match &outcomes[0] {
            SourceOutcome::SkippedIncomplete { missing, .. } => {
                assert!(missing.iter().any(|m| m == "missing.h"));
            }
            other => panic!("expected SkippedIncomplete, got {other:?}"),
        },
        other => panic!("expected Ran, got {other:?}"),
    }
    assert!(!dir.path().join("a.d").exists());
}

#[test]
fn scenario_5_missing_include_tolerant_emits_empty_list() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a.cpp", "#include \"missing.h\"\n");
    write(dir.path(), "dependency_template.txt", "|!src_file_name!|.o: |!dependents!|");

    let root = dir.path().to_string_lossy().to_string();
    let mut config = Config::default();
    config.use_incomplete_list = true;

    run_one_cycle(&root, &config);

    let frag = fs::read_to_string(dir.path().join("a.d")).unwrap();
    assert_eq!(frag.trim(), "a.o:");
}

#[test]
fn scenario_6_template_bump_reemits_byte_identical_fragment() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a.cpp", "#include \"b.h\"\n");
    write(dir.path(), "b.h", "#include \"c.h\"\n");
    write(dir.path(), "c.h", "");
    write(dir.path(), "dependency_template.txt", "|!src_file_name!|.o: |!dependents!|");

    let root = dir.path().to_string_lossy().to_string();
    let config = Config::default();

    let mut controller = ScanController::new(&root, &config);
    controller.run_cycle(&root, &config);
    let before = fs::read_to_string(dir.path().join("a.d")).unwrap();

    std::thread::sleep(std::time::Duration::from_millis(20));
    write(dir.path(), "dependency_template.txt", "|!src_file_name!|.o: |!dependents!|");

    let report = controller.run_cycle(&root, &config);
    let after = fs::read_to_string(dir.path().join("a.d")).unwrap();

    assert_eq!(before, after);
    match report {
        CycleReport::Ran { outcomes, .. } => assert!(matches!(outcomes[0], SourceOutcome::Emitted { .. })),
        other => panic!("expected Ran, got {other:?}"),
    }
}

#[test]
fn idempotence_second_cycle_over_unchanged_tree_emits_nothing() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a.cpp", "#include \"b.h\"\n");
    write(dir.path(), "b.h", "");
    write(dir.path(), "dependency_template.txt", "|!src_file_name!|.o: |!dependents!|");

    let root = dir.path().to_string_lossy().to_string();
    let config = Config::default();

    let mut controller = ScanController::new(&root, &config);
    controller.run_cycle(&root, &config);
    let report = controller.run_cycle(&root, &config);

    match report {
        CycleReport::Ran { outcomes, .. } => {
            assert!(outcomes.iter().all(|o| matches!(o, SourceOutcome::Unchanged { .. })));
        }
        other => panic!("expected Ran, got {other:?}"),
    }
}

#[test]
fn relative_dependency_dir_resolves_against_project_root_not_cwd() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a.cpp", "#include \"b.h\"\n");
    write(dir.path(), "b.h", "");
    write(dir.path(), "dependency_template.txt", "|!src_file_name!|.o: |!dependents!|");
    fs::create_dir_all(dir.path().join("dep")).unwrap();

    let root = dir.path().to_string_lossy().to_string();
    let mut config = Config::default();
    config.set("dependency_dir", "dep", &root).unwrap();
    assert_eq!(config.dependency_dir, normalize(&dir.path().join("dep").to_string_lossy()));

    run_one_cycle(&root, &config);

    assert!(dir.path().join("dep").join("a.d").exists());
}

#[test]
fn reconcile_removes_fragment_whose_source_was_deleted() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a.cpp", "");
    write(dir.path(), "dependency_template.txt", "|!src_file_name!|.o: |!dependents!|");

    let root = dir.path().to_string_lossy().to_string();
    let config = Config::default();
    let mut controller = ScanController::new(&root, &config);
    controller.run_cycle(&root, &config);
    assert!(dir.path().join("a.d").exists());

    fs::remove_file(dir.path().join("a.cpp")).unwrap();
    let report = controller.run_cycle(&root, &config);

    assert!(matches!(report, CycleReport::Ran { removed_fragments: 1, .. }));
    assert!(!dir.path().join("a.d").exists());
}
