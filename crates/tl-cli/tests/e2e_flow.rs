//! End-to-end tests driving the `tl` binary against a scratch database.

use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

fn tl_binary() -> String {
    env!("CARGO_BIN_EXE_tl").to_string()
}

/// Runs `tl` with an isolated home, config dir, and database.
fn tl(temp: &Path, args: &[&str]) -> Output {
    Command::new(tl_binary())
        .env("HOME", temp)
        .env("XDG_CONFIG_HOME", temp.join("config"))
        .env("TL_DATABASE_PATH", temp.join("data/tl.db"))
        .env_remove("RUST_LOG")
        .args(args)
        .output()
        .expect("failed to run tl")
}

fn tl_ok(temp: &Path, args: &[&str]) -> String {
    let output = tl(temp, args);
    assert!(
        output.status.success(),
        "tl {args:?} should succeed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout).unwrap()
}

fn tl_err(temp: &Path, args: &[&str]) -> String {
    let output = tl(temp, args);
    assert!(!output.status.success(), "tl {args:?} should fail");
    String::from_utf8(output.stderr).unwrap()
}

#[test]
fn test_day_of_work_reports_totals() {
    let temp = TempDir::new().unwrap();
    let home = temp.path();

    tl_ok(home, &["task", "add", "design"]);
    tl_ok(home, &["task", "add", "review"]);
    tl_ok(home, &["tag", "add", "client-a"]);
    tl_ok(home, &["task", "tag", "design", "client-a"]);

    tl_ok(home, &["start", "design", "--at", "2025-01-06T09:00:00Z"]);
    tl_ok(home, &["start", "review", "--at", "2025-01-06T10:00:00Z"]);
    tl_ok(home, &["stop", "--at", "2025-01-06T10:30:00Z"]);

    let report = tl_ok(
        home,
        &[
            "report",
            "--from",
            "2025-01-06T00:00:00Z",
            "--to",
            "2025-01-07T00:00:00Z",
            "--json",
        ],
    );
    let json: serde_json::Value = serde_json::from_str(&report).unwrap();
    assert_eq!(json["tracked_seconds"], 5400);
    assert_eq!(json["rows"][0]["name"], "design");
    assert_eq!(json["rows"][0]["seconds"], 3600);
    assert_eq!(json["rows"][1]["name"], "review");

    let by_tag = tl_ok(home, &["report", "--by-tag", "--json"]);
    let json: serde_json::Value = serde_json::from_str(&by_tag).unwrap();
    assert_eq!(json["grouping"], "tag");
    assert_eq!(json["rows"][0]["name"], "client-a");
    assert_eq!(json["rows"][0]["seconds"], 3600);
}

#[test]
fn test_start_in_the_past_of_timeline_is_rejected() {
    let temp = TempDir::new().unwrap();
    let home = temp.path();

    tl_ok(home, &["task", "add", "design"]);
    tl_ok(home, &["start", "design", "--at", "2025-01-06T09:00:00Z"]);
    tl_ok(home, &["stop", "--at", "2025-01-06T10:00:00Z"]);

    let stderr = tl_err(home, &["start", "design", "--at", "2025-01-06T09:30:00Z"]);
    assert!(stderr.contains("ordering violation"), "stderr: {stderr}");

    let entries = tl_ok(home, &["entries"]);
    assert_eq!(entries.lines().count(), 1);
}

#[test]
fn test_resume_diary_and_todos() {
    let temp = TempDir::new().unwrap();
    let home = temp.path();

    tl_ok(home, &["task", "add", "design"]);
    tl_ok(home, &["task", "add", "review"]);
    tl_ok(home, &["start", "design", "--at", "2025-01-06T09:00:00Z"]);
    tl_ok(home, &["start", "review", "--at", "2025-01-06T09:30:00Z"]);

    let resumed = tl_ok(home, &["resume", "--at", "2025-01-06T10:00:00Z"]);
    assert!(resumed.starts_with("Resumed design"));

    tl_ok(home, &["diary", "add", "settled on a grid"]);
    let diary = tl_ok(home, &["diary", "show", "--merge"]);
    assert!(diary.contains("[design] settled on a grid"));

    tl_ok(home, &["todo", "add", "review", "reply to Sam"]);
    assert_eq!(
        tl_ok(home, &["todo", "list"]),
        "[review] reply to Sam\n"
    );
    tl_ok(home, &["todo", "done", "reply to Sam"]);
    assert_eq!(tl_ok(home, &["todo", "list"]), "Nothing pending.\n");
}

#[test]
fn test_bookmarks_resolve_as_times() {
    let temp = TempDir::new().unwrap();
    let home = temp.path();

    tl_ok(home, &["task", "add", "design"]);
    tl_ok(
        home,
        &["bookmark", "set", "kickoff", "--at", "2025-01-06T09:00:00Z"],
    );
    tl_ok(home, &["start", "--at", "kickoff"]);

    let status = tl_ok(home, &["status"]);
    assert!(status.starts_with("Current: design since "));

    let listing = tl_ok(home, &["bookmark", "list"]);
    assert!(listing.starts_with("kickoff  "));
}

#[test]
fn test_removing_task_removes_its_entries() {
    let temp = TempDir::new().unwrap();
    let home = temp.path();

    tl_ok(home, &["task", "add", "design"]);
    tl_ok(home, &["start", "design", "--at", "2025-01-06T09:00:00Z"]);
    tl_ok(home, &["task", "rm", "design"]);

    assert_eq!(tl_ok(home, &["entries"]), "No entries.\n");
    assert_eq!(
        tl_ok(home, &["status"]),
        "Current: none\nPrevious: none\n"
    );
}
