//! Exit-code integration tests.
//!
//! The contract the shell relies on:
//!
//! | Exit Code | Meaning |
//! |-----------|---------|
//! | 0 | Success (warnings allowed) |
//! | non-zero | Validation failure: unknown id, cycle, bad date, ... |
//!
//! Each test runs the real binary in a fresh temp directory, since the
//! working directory determines where `dagr.json` lives.

use std::path::Path;
use std::process::{Command, Output};

fn dagr(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_dagr"))
        .current_dir(dir)
        .args(args)
        .output()
        .expect("failed to execute dagr")
}

fn code(output: &Output) -> i32 {
    output.status.code().unwrap_or(-1)
}

fn init(dir: &Path) {
    let out = dagr(dir, &["init", "--start", "2026-02-23"]);
    assert_eq!(code(&out), 0, "init failed: {}", String::from_utf8_lossy(&out.stderr));
}

#[test]
fn init_then_add_then_schedule_succeeds() {
    let dir = tempfile::tempdir().unwrap();
    init(dir.path());

    let out = dagr(dir.path(), &["add", "Write intro", "--hours", "4"]);
    assert_eq!(code(&out), 0);
    assert!(String::from_utf8_lossy(&out.stdout).contains("T-1"));

    let out = dagr(dir.path(), &["schedule"]);
    assert_eq!(code(&out), 0);
    assert!(String::from_utf8_lossy(&out.stdout).contains("Write intro"));

    let out = dagr(dir.path(), &["schedule", "--csv"]);
    assert!(String::from_utf8_lossy(&out.stdout).starts_with("date,start,end"));
}

#[test]
fn commands_without_state_fail() {
    let dir = tempfile::tempdir().unwrap();
    for args in [&["list"][..], &["schedule"], &["next"], &["status"]] {
        let out = dagr(dir.path(), args);
        assert_ne!(code(&out), 0, "{args:?} should fail without init");
        assert!(
            String::from_utf8_lossy(&out.stderr).contains("dagr init"),
            "error should point at init"
        );
    }
}

#[test]
fn double_init_fails() {
    let dir = tempfile::tempdir().unwrap();
    init(dir.path());
    let out = dagr(dir.path(), &["init"]);
    assert_ne!(code(&out), 0);
}

#[test]
fn unknown_id_fails_and_leaves_state_alone() {
    let dir = tempfile::tempdir().unwrap();
    init(dir.path());
    dagr(dir.path(), &["add", "Only task", "--hours", "1"]);

    let before = std::fs::read_to_string(dir.path().join("dagr.json")).unwrap();
    let out = dagr(dir.path(), &["done", "T-99"]);
    assert_ne!(code(&out), 0);
    assert!(String::from_utf8_lossy(&out.stderr).contains("T-99"));

    let after = std::fs::read_to_string(dir.path().join("dagr.json")).unwrap();
    assert_eq!(before, after, "failed command must not touch the file");
}

#[test]
fn cycle_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    init(dir.path());
    dagr(dir.path(), &["add", "a", "--hours", "1"]);
    dagr(dir.path(), &["add", "b", "--hours", "1", "--dep", "T-1"]);

    let out = dagr(dir.path(), &["update", "T-1", "--add-dep", "T-2"]);
    assert_ne!(code(&out), 0);
    assert!(String::from_utf8_lossy(&out.stderr).contains("cycle"));
}

#[test]
fn invalid_date_and_negative_duration_fail() {
    let dir = tempfile::tempdir().unwrap();
    init(dir.path());

    let out = dagr(
        dir.path(),
        &["add", "bad date", "--hours", "1", "--deadline", "tomorrow"],
    );
    assert_ne!(code(&out), 0);

    let out = dagr(dir.path(), &["add", "bad hours", "--hours", "-3"]);
    assert_ne!(code(&out), 0);
}

#[test]
fn done_with_open_deps_warns_but_exits_zero() {
    let dir = tempfile::tempdir().unwrap();
    init(dir.path());
    dagr(dir.path(), &["add", "first", "--hours", "1"]);
    dagr(dir.path(), &["add", "second", "--hours", "1", "--dep", "T-1"]);

    let out = dagr(dir.path(), &["done", "T-2"]);
    assert_eq!(code(&out), 0, "open deps are a warning, not an error");
    assert!(String::from_utf8_lossy(&out.stderr).contains("warning"));
}

#[test]
fn import_resolves_names_and_bad_refs_fail() {
    let dir = tempfile::tempdir().unwrap();
    init(dir.path());

    let payload = r#"{"tasks": [
        {"name": "Gather", "duration_hrs": 2.0},
        {"name": "Crunch", "duration_hrs": 1.0, "depends_on": ["Gather"]}
    ]}"#;
    std::fs::write(dir.path().join("batch.json"), payload).unwrap();
    let out = dagr(dir.path(), &["import", "batch.json"]);
    assert_eq!(code(&out), 0, "{}", String::from_utf8_lossy(&out.stderr));
    assert!(String::from_utf8_lossy(&out.stdout).contains("Imported 2 task(s)"));

    let bad = r#"{"tasks": [
        {"name": "Orphan", "duration_hrs": 1.0, "depends_on": ["Nobody"]}
    ]}"#;
    std::fs::write(dir.path().join("bad.json"), bad).unwrap();
    let out = dagr(dir.path(), &["import", "bad.json"]);
    assert_ne!(code(&out), 0);
    assert!(String::from_utf8_lossy(&out.stderr).contains("Nobody"));
}

#[test]
fn viz_emits_mermaid() {
    let dir = tempfile::tempdir().unwrap();
    init(dir.path());
    dagr(dir.path(), &["add", "node", "--hours", "1"]);

    let out = dagr(dir.path(), &["viz"]);
    assert_eq!(code(&out), 0);
    assert!(String::from_utf8_lossy(&out.stdout).starts_with("flowchart"));

    let out = dagr(dir.path(), &["viz-html"]);
    assert_eq!(code(&out), 0);
    let html = std::fs::read_to_string(dir.path().join("dagr.html")).unwrap();
    assert!(html.contains("<!DOCTYPE html>"));
}

#[test]
fn capacity_override_round_trips_through_the_cli() {
    let dir = tempfile::tempdir().unwrap();
    init(dir.path());

    let out = dagr(dir.path(), &["capacity", "2026-02-28", "4"]);
    assert_eq!(code(&out), 0);
    let state = std::fs::read_to_string(dir.path().join("dagr.json")).unwrap();
    assert!(state.contains("2026-02-28"));

    let out = dagr(dir.path(), &["capacity", "2026-02-28", "--clear"]);
    assert_eq!(code(&out), 0);
    let state = std::fs::read_to_string(dir.path().join("dagr.json")).unwrap();
    assert!(!state.contains("2026-02-28"));

    let out = dagr(dir.path(), &["capacity", "2026-02-28", "-4"]);
    assert_ne!(code(&out), 0, "negative capacity is invalid");
}
