//! E2E tests for `td`, run offline against JSON snapshots.
//!
//! Each test runs the binary in an isolated temp directory with the user
//! config directory pointed inside it, so no real config or backend is used.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{Value, json};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Test Harness
// ---------------------------------------------------------------------------

fn td_cmd(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("td"));
    cmd.current_dir(dir);
    cmd.env("HOME", dir);
    cmd.env("XDG_CONFIG_HOME", dir.join(".config"));
    cmd.env("TICKETDESK_LOG", "error");
    cmd.env("TICKETDESK_USER", "sam");
    cmd.env_remove("TICKETDESK_URL");
    cmd.env_remove("TICKETDESK_API_KEY");
    cmd.env_remove("FORMAT");
    cmd
}

fn write_snapshot(dir: &Path) -> PathBuf {
    let path = dir.join("snapshot.json");
    let snapshot = json!({
        "tickets": [
            {"id": 1, "title": "Printer jam", "status": "Open", "project_id": 1, "assignee": "sam", "priority": "high"},
            {"id": 2, "title": "VPN drops", "status": "Blocked", "project_id": 2,
             "log": [{"user": "alex", "timestamp": "2024-06-01T12:00:00Z", "field": "status",
                      "oldValue": "Open", "newValue": "Blocked"}]},
            {"id": 3, "title": "Badge reader", "status": "Completed", "project_id": 1,
             "started_at": "2024-05-01T09:00:00Z", "completed_at": "2024-05-02T09:00:00Z"},
        ],
        "projects": [{"id": 1, "name": "Facilities"}, {"id": 2, "name": "Network"}],
    });
    fs::write(&path, snapshot.to_string()).unwrap();
    path
}

fn stdout_json(output: &std::process::Output) -> Value {
    assert!(
        output.status.success(),
        "command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("stdout should be valid JSON")
}

fn ids(list: &Value) -> Vec<i64> {
    list.as_array()
        .expect("array")
        .iter()
        .map(|t| t["id"].as_i64().expect("id"))
        .collect()
}

// ---------------------------------------------------------------------------
// list / show
// ---------------------------------------------------------------------------

#[test]
fn list_json_is_newest_first_with_project_names() {
    let dir = TempDir::new().unwrap();
    let snapshot = write_snapshot(dir.path());

    let output = td_cmd(dir.path())
        .args(["list", "--json", "--snapshot"])
        .arg(&snapshot)
        .output()
        .unwrap();
    let list = stdout_json(&output);
    assert_eq!(ids(&list), vec![3, 2, 1]);
    assert_eq!(list[2]["project_name"], "Facilities");
}

#[test]
fn list_filters_combine() {
    let dir = TempDir::new().unwrap();
    let snapshot = write_snapshot(dir.path());

    let active = td_cmd(dir.path())
        .args(["list", "--json", "--active", "--snapshot"])
        .arg(&snapshot)
        .output()
        .unwrap();
    assert_eq!(ids(&stdout_json(&active)), vec![2, 1]);

    let mine = td_cmd(dir.path())
        .args(["list", "--json", "--mine", "--snapshot"])
        .arg(&snapshot)
        .output()
        .unwrap();
    assert_eq!(ids(&stdout_json(&mine)), vec![1]);

    let search = td_cmd(dir.path())
        .args(["list", "--json", "--search", "vpn", "--sort", "title", "--asc", "--snapshot"])
        .arg(&snapshot)
        .output()
        .unwrap();
    assert_eq!(ids(&stdout_json(&search)), vec![2]);
}

#[test]
fn list_text_has_header_and_rows() {
    let dir = TempDir::new().unwrap();
    let snapshot = write_snapshot(dir.path());

    td_cmd(dir.path())
        .args(["list", "--format", "text", "-s", "open", "--snapshot"])
        .arg(&snapshot)
        .assert()
        .success()
        .stdout("ID  STATUS  PRIORITY  ASSIGNEE  TITLE\n1  Open  high  sam  Printer jam\n");
}

#[test]
fn config_output_mode_is_honoured() {
    let dir = TempDir::new().unwrap();
    let snapshot = write_snapshot(dir.path());
    fs::create_dir_all(dir.path().join(".ticketdesk")).unwrap();
    fs::write(dir.path().join(".ticketdesk/config.toml"), "output = \"json\"\n").unwrap();

    let output = td_cmd(dir.path())
        .args(["list", "--snapshot"])
        .arg(&snapshot)
        .output()
        .unwrap();
    assert_eq!(ids(&stdout_json(&output)), vec![3, 2, 1]);
}

#[test]
fn show_renders_history() {
    let dir = TempDir::new().unwrap();
    let snapshot = write_snapshot(dir.path());

    td_cmd(dir.path())
        .args(["show", "#2", "--format", "pretty", "--snapshot"])
        .arg(&snapshot)
        .assert()
        .success()
        .stdout(predicate::str::contains("#2 VPN drops"))
        .stdout(predicate::str::contains("Network"))
        .stdout(predicate::str::contains("alex  status: Open -> Blocked"));
}

#[test]
fn show_unknown_ticket_reports_code() {
    let dir = TempDir::new().unwrap();
    let snapshot = write_snapshot(dir.path());

    td_cmd(dir.path())
        .args(["show", "99", "--json", "--snapshot"])
        .arg(&snapshot)
        .assert()
        .failure()
        .stderr(predicate::str::contains("\"error_code\": \"E2001\""));
}

// ---------------------------------------------------------------------------
// mutating commands fail fast offline
// ---------------------------------------------------------------------------

#[test]
fn status_without_backend_is_not_configured() {
    let dir = TempDir::new().unwrap();

    td_cmd(dir.path())
        .args(["status", "1", "completed"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("E1001"));
}

#[test]
fn create_validates_before_connecting() {
    let dir = TempDir::new().unwrap();

    td_cmd(dir.path())
        .args(["create", "--project", "1", "--json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("E2003"))
        .stderr(predicate::str::contains("missing required fields: title"));
}

#[test]
fn mutation_without_identity_is_rejected() {
    let dir = TempDir::new().unwrap();

    td_cmd(dir.path())
        .env_remove("TICKETDESK_USER")
        .env_remove("USER")
        .args(["assign", "1", "alex"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("TICKETDESK_USER"));
}

#[test]
fn broken_config_is_a_parse_error() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("broken.toml");
    fs::write(&config, "[backend\nurl = ").unwrap();

    td_cmd(dir.path())
        .args(["list", "--config"])
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("E1002"));
}

// ---------------------------------------------------------------------------
// watch
// ---------------------------------------------------------------------------

fn write_changes(dir: &Path) -> PathBuf {
    let path = dir.join("changes.jsonl");
    let lines = [
        json!({"status": "SUBSCRIBED"}).to_string(),
        json!({"eventType": "UPDATE", "new": {"id": 1, "status": "In Progress"}}).to_string(),
        json!({"type": "INSERT", "record": {"id": 9, "title": "Projector bulb", "projectId": 1}})
            .to_string(),
        json!({"eventType": "DELETE", "old": {"id": 2}}).to_string(),
        "not json".to_string(),
        json!({"eventType": "BOGUS", "new": {"id": 4}}).to_string(),
    ];
    fs::write(&path, lines.join("\n")).unwrap();
    path
}

#[test]
fn watch_replays_changes_and_ends_with_badges() {
    let dir = TempDir::new().unwrap();
    let snapshot = write_snapshot(dir.path());
    let changes = write_changes(dir.path());

    let output = td_cmd(dir.path())
        .args(["watch", "--json", "--snapshot"])
        .arg(&snapshot)
        .arg("--input")
        .arg(&changes)
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "watch failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let events: Vec<Value> = String::from_utf8(output.stdout)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).expect("one JSON object per line"))
        .collect();

    assert_eq!(events[0], json!({"event": "ready", "tickets": 3}));
    assert!(events.contains(&json!({"event": "updated", "id": 1})));
    assert!(events.contains(&json!({"event": "inserted", "id": 9, "title": "Projector bulb"})));
    assert!(events.contains(&json!({"event": "deleted", "id": 2})));

    let last = events.last().unwrap();
    assert_eq!(last["event"], "refresh");
    assert_eq!(last["visible"], 3);
    assert_eq!(last["badges"]["total"], 3);
    assert_eq!(last["badges"]["active"], 2);
    assert_eq!(last["badges"]["unassigned"], 1);
    assert_eq!(last["badges"]["mine"], 1);
    assert_eq!(last["badges"]["by_status"]["In Progress"], 1);
}

#[test]
fn watch_text_prints_toast_and_summary() {
    let dir = TempDir::new().unwrap();
    let snapshot = write_snapshot(dir.path());
    let changes = write_changes(dir.path());

    td_cmd(dir.path())
        .args(["watch", "-q", "--format", "text", "--snapshot"])
        .arg(&snapshot)
        .arg("--input")
        .arg(&changes)
        .assert()
        .success()
        .stdout(predicate::str::contains("[info] New ticket #9: Projector bulb"))
        .stdout(predicate::str::contains("updated #1").not())
        .stdout(predicate::str::ends_with(
            "3 tickets  2 active  1 unassigned  1 mine  (Completed 1, In Progress 1, Open 1)\n",
        ));
}

#[test]
fn completions_generate() {
    let dir = TempDir::new().unwrap();
    td_cmd(dir.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("td"));
}
