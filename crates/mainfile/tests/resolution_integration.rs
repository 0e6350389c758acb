//! Resolution integration tests.
//!
//! End-to-end assignment of directory trees to parsers: priority
//! ordering, insertion-order tie-breaks, alternative-matching
//! exclusivity, catch-all fallback, and deterministic output.

use mainfile::{RegistrySnapshot, ResolutionEngine, RuleSetDefinition};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn write_file(dir: &Path, name: &str, contents: &[u8]) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

/// A realistic registry: two code-specific parsers, a binary format,
/// an aggregate alternative, and a low-priority catch-all.
fn scientific_snapshot() -> RegistrySnapshot {
    RegistrySnapshot::from_definitions(vec![
        RuleSetDefinition::new("vasp")
            .level(1)
            .name_pattern(r"OUTCAR(\.[^\.]+)?$")
            .content_pattern(r"vasp\.\d+")
            .supported_compression("gzip"),
        RuleSetDefinition::new("exciting")
            .level(1)
            .name_pattern(r"INFO\.OUT$")
            .content_pattern("EXCITING"),
        RuleSetDefinition::new("hdf5")
            .level(2)
            .binary_header(b"\x89HDF\r\n\x1a\n"),
        RuleSetDefinition::new("trajectory")
            .level(3)
            .name_pattern(r"\.(dat|traj)$")
            .alternative(true),
        RuleSetDefinition::new("fallback").level(100),
    ])
    .unwrap()
}

/// Both clauses of a rule-set must hold; a name hit alone is not enough.
#[test]
fn test_name_and_content_are_conjoined() {
    let dir = TempDir::new().unwrap();
    let genuine = write_file(dir.path(), "OUTCAR", b" vasp.6.3.2 (build Jan 2024)");
    let impostor = write_file(dir.path(), "OUTCAR.bak", b"hand-edited notes");

    let result = ResolutionEngine::default().resolve_directory(
        &scientific_snapshot(),
        &[genuine.clone(), impostor.clone()],
    );

    assert_eq!(result.parser_for(&genuine), Some("vasp"));
    // Name matched but content did not; the catch-all picks it up.
    assert_eq!(result.parser_for(&impostor), Some("fallback"));
}

/// Lower level always beats higher level, whatever the registration order.
#[test]
fn test_level_ordering_beats_registration_order() {
    let dir = TempDir::new().unwrap();
    let file = write_file(dir.path(), "INFO.OUT", b"EXCITING oxygen run");

    let snapshot = RegistrySnapshot::from_definitions(vec![
        RuleSetDefinition::new("late-but-low")
            .level(5)
            .content_pattern("EXCITING"),
        RuleSetDefinition::new("early-but-high")
            .level(1)
            .content_pattern("EXCITING"),
    ])
    .unwrap();

    let result = ResolutionEngine::default().resolve_directory(&snapshot, &[file.clone()]);
    assert_eq!(result.parser_for(&file), Some("early-but-high"));
}

/// At equal level, the earlier-registered rule-set wins.
#[test]
fn test_equal_level_tie_breaks_by_insertion() {
    let dir = TempDir::new().unwrap();
    let file = write_file(dir.path(), "run.log", b"both rule-sets want this");

    let snapshot = RegistrySnapshot::from_definitions(vec![
        RuleSetDefinition::new("registered-first").level(2).content_pattern("want"),
        RuleSetDefinition::new("registered-second").level(2).content_pattern("want"),
    ])
    .unwrap();

    let result = ResolutionEngine::default().resolve_directory(&snapshot, &[file.clone()]);
    assert_eq!(result.parser_for(&file), Some("registered-first"));
}

/// Binary magic is found by scanning the window, not only at offset 0.
#[test]
fn test_binary_header_matches_past_prefix() {
    let dir = TempDir::new().unwrap();
    let mut contents = vec![0u8; 512];
    contents.extend_from_slice(b"\x89HDF\r\n\x1a\n");
    contents.extend_from_slice(&[0u8; 128]);
    let file = write_file(dir.path(), "results.h5", &contents);

    let result =
        ResolutionEngine::default().resolve_directory(&scientific_snapshot(), &[file.clone()]);
    assert_eq!(result.parser_for(&file), Some("hdf5"));
}

/// An alternative only claims directories no ordinary parser recognized.
#[test]
fn test_alternative_exclusivity_within_directory() {
    let dir = TempDir::new().unwrap();
    let outcar = write_file(dir.path(), "OUTCAR", b"vasp.6 output");
    let traj = write_file(dir.path(), "positions.traj", b"0.0 0.0 0.0");

    let snapshot = RegistrySnapshot::from_definitions(vec![
        RuleSetDefinition::new("vasp")
            .name_pattern("OUTCAR")
            .content_pattern(r"vasp\.\d+"),
        RuleSetDefinition::new("trajectory")
            .name_pattern(r"\.traj$")
            .alternative(true),
    ])
    .unwrap();

    let result =
        ResolutionEngine::default().resolve_directory(&snapshot, &[outcar.clone(), traj.clone()]);
    assert_eq!(result.parser_for(&outcar), Some("vasp"));
    assert_eq!(result.parser_for(&traj), None);
    assert_eq!(result.unmatched().collect::<Vec<_>>(), vec![traj.as_path()]);
}

/// The same alternative claims its files in a directory nothing else wants.
#[test]
fn test_alternative_claims_unclaimed_directory() {
    let dir = TempDir::new().unwrap();
    let traj = write_file(dir.path(), "positions.traj", b"0.0 0.0 0.0");
    let dat = write_file(dir.path(), "energies.dat", b"1.0 2.0");

    let result = ResolutionEngine::default()
        .resolve_directory(&scientific_snapshot(), &[traj.clone(), dat.clone()]);
    assert_eq!(result.parser_for(&traj), Some("trajectory"));
    assert_eq!(result.parser_for(&dat), Some("trajectory"));
}

/// A catch-all claim is weaker than an alternative: the alternative
/// overrides it, while unrelated files keep the catch-all.
#[test]
fn test_catch_all_yields_to_alternative() {
    let dir = TempDir::new().unwrap();
    let traj = write_file(dir.path(), "positions.traj", b"0.0");
    let readme = write_file(dir.path(), "README", b"notes");

    let result = ResolutionEngine::default()
        .resolve_directory(&scientific_snapshot(), &[traj.clone(), readme.clone()]);
    assert_eq!(result.parser_for(&traj), Some("trajectory"));
    assert_eq!(result.parser_for(&readme), Some("fallback"));
}

/// Exclusivity never crosses directory boundaries.
#[test]
fn test_directories_resolved_independently() {
    let root = TempDir::new().unwrap();
    let claimed = root.path().join("claimed");
    let quiet = root.path().join("quiet");
    fs::create_dir(&claimed).unwrap();
    fs::create_dir(&quiet).unwrap();

    let outcar = write_file(&claimed, "OUTCAR", b"vasp.6 output");
    let blocked = write_file(&claimed, "a.traj", b"frames");
    let free = write_file(&quiet, "b.traj", b"frames");

    let snapshot = RegistrySnapshot::from_definitions(vec![
        RuleSetDefinition::new("vasp")
            .name_pattern("OUTCAR")
            .content_pattern(r"vasp\.\d+"),
        RuleSetDefinition::new("trajectory")
            .name_pattern(r"\.traj$")
            .alternative(true),
    ])
    .unwrap();

    let result = ResolutionEngine::default()
        .resolve_tree(&snapshot, root.path())
        .unwrap();
    assert_eq!(result.parser_for(&outcar), Some("vasp"));
    assert_eq!(result.parser_for(&blocked), None);
    assert_eq!(result.parser_for(&free), Some("trajectory"));
}

/// Repeated passes over the same tree produce byte-identical output.
#[test]
fn test_resolution_output_is_deterministic() {
    let root = TempDir::new().unwrap();
    for d in 0..4 {
        let sub = root.path().join(format!("run_{d}"));
        fs::create_dir(&sub).unwrap();
        write_file(&sub, "OUTCAR", b"vasp.6 output");
        write_file(&sub, "INFO.OUT", b"EXCITING run");
        write_file(&sub, "leftover.traj", b"frames");
        write_file(&sub, "misc.bin", &[0u8, 159, 146, 150]);
    }

    let snapshot = scientific_snapshot();
    let engine = ResolutionEngine::default();
    let first = engine.resolve_tree(&snapshot, root.path()).unwrap();
    let second = engine.resolve_tree(&snapshot, root.path()).unwrap();

    assert_eq!(first.assignments(), second.assignments());
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

/// An empty registry leaves every file unmatched without erroring.
#[test]
fn test_empty_registry_matches_nothing() {
    let dir = TempDir::new().unwrap();
    let file = write_file(dir.path(), "anything.txt", b"text");

    let snapshot = RegistrySnapshot::from_definitions(vec![]).unwrap();
    let result = ResolutionEngine::default().resolve_directory(&snapshot, &[file.clone()]);
    assert_eq!(result.parser_for(&file), None);
    assert_eq!(result.len(), 1);
}

/// MIME clauses route by detected type without any content clause.
#[test]
fn test_mime_pattern_routing() {
    let dir = TempDir::new().unwrap();
    let json = write_file(dir.path(), "meta.json", br#"{"a": 1}"#);
    let text = write_file(dir.path(), "meta.txt", b"plain");

    let snapshot = RegistrySnapshot::from_definitions(vec![
        RuleSetDefinition::new("json-router").mime_pattern("application/json"),
        RuleSetDefinition::new("text-router").mime_pattern("^text/plain"),
    ])
    .unwrap();

    let result =
        ResolutionEngine::default().resolve_directory(&snapshot, &[json.clone(), text.clone()]);
    assert_eq!(result.parser_for(&json), Some("json-router"));
    assert_eq!(result.parser_for(&text), Some("text-router"));
}

/// A file deleted between listing and matching folds into no-match.
#[test]
fn test_vanished_file_is_unmatched_not_error() {
    let dir = TempDir::new().unwrap();
    let ghost = dir.path().join("ghost.txt");

    let snapshot = RegistrySnapshot::from_definitions(vec![
        RuleSetDefinition::new("text").content_pattern("anything"),
    ])
    .unwrap();

    let result = ResolutionEngine::default().resolve_directory(&snapshot, &[ghost.clone()]);
    assert_eq!(result.parser_for(&ghost), None);
}
