//! End-to-end tests of the `nstate` binary.

use std::process::{Command, Output};

use tempfile::{NamedTempFile, TempDir};

use narrative_state::format::SnapshotReader;

// ==================== CLI Helpers ====================

/// Run the `nstate` CLI with the given arguments and return the output.
fn run_nstate(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_nstate"))
        .args(args)
        .env_remove("NSTATE_DIMENSION")
        .env_remove("NSTATE_INDEX_KIND")
        .output()
        .expect("Failed to run nstate")
}

/// Helper: assert that the CLI ran successfully (exit code 0).
fn assert_success(output: &Output) {
    assert!(
        output.status.success(),
        "nstate failed with status {:?}\nstdout: {}\nstderr: {}",
        output.status,
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr),
    );
}

/// Helper: get stdout as a string from an Output.
fn stdout_str(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

/// Helper: parse stdout as JSON.
fn stdout_json(output: &Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).unwrap_or_else(|e| {
        panic!("stdout is not JSON ({e}): {}", stdout_str(output))
    })
}

/// Create a snapshot with two moments, a root take and one character.
fn seeded(path: &str) {
    assert_success(&run_nstate(&["create", path, "--dimension", "16"]));
    assert_success(&run_nstate(&["moment", path, "m1", "1"]));
    assert_success(&run_nstate(&["moment", path, "m2", "2", "--label", "dusk"]));
    assert_success(&run_nstate(&["take", path]));
    assert_success(&run_nstate(&["character", path, "ann", "Ann"]));
}

// ==================== CLI Tests ====================

#[test]
fn test_cli_create_and_info() {
    let tmp = NamedTempFile::new().unwrap();
    let path = tmp.path().to_str().unwrap();

    assert_success(&run_nstate(&["create", path, "--dimension", "16"]));
    let header = SnapshotReader::read_header(tmp.path()).unwrap();
    assert_eq!(header.dimension, 16);
    assert_eq!(header.moment_count, 0);

    let output = run_nstate(&["--format", "json", "info", path]);
    assert_success(&output);
    let info = stdout_json(&output);
    assert_eq!(info["dimension"], 16);
    assert_eq!(info["takes"], 0);
}

#[test]
fn test_cli_knowledge_flow() {
    let tmp = NamedTempFile::new().unwrap();
    let path = tmp.path().to_str().unwrap();
    seeded(path);

    let output = run_nstate(&[
        "--format", "json", "fact", path, "the vault is empty", "--moment", "m1", "--category",
        "plot",
    ]);
    assert_success(&output);
    assert_eq!(stdout_json(&output)["fact_id"], 1);

    let output = run_nstate(&[
        "know", path, "ann", "1", "--moment", "m2", "--take", "1", "--source", "told",
    ]);
    assert_success(&output);

    // Before the learning moment nothing is known.
    let output = run_nstate(&[
        "--format", "json", "query", path, "ann", "--moment", "m1", "--take", "1",
    ]);
    assert_success(&output);
    assert_eq!(stdout_json(&output)["facts"].as_array().unwrap().len(), 0);

    let output = run_nstate(&[
        "--format", "json", "query", path, "ann", "--moment", "m2", "--take", "1",
    ]);
    assert_success(&output);
    let state = stdout_json(&output);
    let facts = state["facts"].as_array().unwrap();
    assert_eq!(facts.len(), 1);
    assert_eq!(facts[0]["content"], "the vault is empty");
    assert_eq!(facts[0]["moment_id"], "m2");
}

#[test]
fn test_cli_branching() {
    let tmp = NamedTempFile::new().unwrap();
    let path = tmp.path().to_str().unwrap();
    seeded(path);

    let output = run_nstate(&[
        "--format", "json", "take", path, "--parent", "1", "--branch-point", "m2",
    ]);
    assert_success(&output);
    assert_eq!(stdout_json(&output)["take_id"], 2);

    let output = run_nstate(&["--format", "json", "ancestry", path, "2"]);
    assert_success(&output);
    assert_eq!(stdout_json(&output)["ancestry"], serde_json::json!([2, 1]));

    assert_success(&run_nstate(&["take-status", path, "1", "trunk"]));
    let output = run_nstate(&["--format", "json", "takes", path, "--status", "trunk"]);
    assert_success(&output);
    let takes = stdout_json(&output);
    assert_eq!(takes.as_array().unwrap().len(), 1);
    assert_eq!(takes[0]["id"], 1);

    let output = run_nstate(&["ancestry", path, "2"]);
    assert_success(&output);
    assert_eq!(stdout_str(&output).trim(), "2 -> 1");
}

#[test]
fn test_cli_memories_and_dialogue() {
    let tmp = NamedTempFile::new().unwrap();
    let path = tmp.path().to_str().unwrap();
    seeded(path);
    assert_success(&run_nstate(&["character", path, "ben", "Ben"]));

    assert_success(&run_nstate(&[
        "remember", path, "ann", "the lamp flickered", "--moment", "m1", "--take", "1", "--type",
        "perceived",
    ]));
    let output = run_nstate(&[
        "--format", "json", "dialogue", path, "ann", "we leave at dusk", "--moment", "m2",
        "--take", "1", "--listeners", "ben",
    ]);
    assert_success(&output);
    let receipt = stdout_json(&output);
    assert_eq!(receipt["speaker_memory_id"], 2);
    assert_eq!(receipt["listener_memory_ids"], serde_json::json!([3]));

    let output = run_nstate(&[
        "--format", "json", "query", path, "ben", "--moment", "m2", "--take", "1",
    ]);
    assert_success(&output);
    let memories = stdout_json(&output)["memories"].clone();
    assert_eq!(memories.as_array().unwrap().len(), 1);
    assert_eq!(memories[0]["chunk"], "we leave at dusk");

    assert_success(&run_nstate(&["archive", path, "1"]));
    let output = run_nstate(&[
        "--format", "json", "query", path, "ann", "--moment", "m2", "--take", "1",
    ]);
    assert_success(&output);
    assert_eq!(stdout_json(&output)["memories"].as_array().unwrap().len(), 1);

    let output = run_nstate(&["--format", "json", "stats", path]);
    assert_success(&output);
    let stats = stdout_json(&output);
    assert_eq!(stats["stats"]["memories"], 3);
    assert_eq!(stats["stats"]["archived_memories"], 1);
}

#[test]
fn test_cli_corpus() {
    let dir = TempDir::new().unwrap();
    let snapshot = dir.path().join("story.nstate");
    let document = dir.path().join("lore.txt");
    std::fs::write(&document, "The harbour freezes in winter.\n\nFerries stop running.\n").unwrap();
    let path = snapshot.to_str().unwrap();
    let doc = document.to_str().unwrap();

    assert_success(&run_nstate(&["create", path, "--dimension", "16"]));
    let output = run_nstate(&[
        "--format", "json", "corpus-load", path, doc, "--source", "lore", "--version", "v1",
    ]);
    assert_success(&output);
    assert_eq!(stdout_json(&output)["chunk_ids"], serde_json::json!([1, 2]));

    let output = run_nstate(&[
        "--format", "json", "corpus-search", path, "--source", "lore", "--limit", "1",
    ]);
    assert_success(&output);
    let chunks = stdout_json(&output);
    assert_eq!(chunks.as_array().unwrap().len(), 1);
    assert_eq!(chunks[0]["content"], "Ferries stop running.");

    let output = run_nstate(&["--format", "json", "corpus-drop", path, "lore"]);
    assert_success(&output);
    assert_eq!(stdout_json(&output)["removed"], 2);
}

// ==================== Exit codes ====================

#[test]
fn test_cli_unknown_take_is_not_found() {
    let tmp = NamedTempFile::new().unwrap();
    let path = tmp.path().to_str().unwrap();
    seeded(path);

    let output = run_nstate(&["query", path, "ann", "--moment", "m1", "--take", "9"]);
    assert_eq!(output.status.code(), Some(4));
    assert!(String::from_utf8_lossy(&output.stderr).contains("9"));
}

#[test]
fn test_cli_invalid_status_is_rejected() {
    let tmp = NamedTempFile::new().unwrap();
    let path = tmp.path().to_str().unwrap();
    seeded(path);

    let output = run_nstate(&["take-status", path, "1", "deleted"]);
    assert_eq!(output.status.code(), Some(3));
}

#[test]
fn test_cli_duplicate_character_is_conflict() {
    let tmp = NamedTempFile::new().unwrap();
    let path = tmp.path().to_str().unwrap();
    seeded(path);

    let output = run_nstate(&["character", path, "ann", "Another Ann"]);
    assert_eq!(output.status.code(), Some(5));
}

#[test]
fn test_cli_missing_file() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("absent.nstate");
    let output = run_nstate(&["stats", missing.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_cli_garbage_file_is_format_error() {
    let tmp = NamedTempFile::new().unwrap();
    std::fs::write(tmp.path(), vec![7u8; 128]).unwrap();
    let output = run_nstate(&["info", tmp.path().to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(2));
}
