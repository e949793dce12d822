use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use predicates::str::contains;
use serde_json::{json, Value};
use tempfile::TempDir;

fn reconcile_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("reconcile"));
    cmd.env("HOME", home)
        .env("USERPROFILE", home)
        .env_remove("RUST_LOG");
    cmd
}

struct Setup {
    home: TempDir,
    data: TempDir,
}

impl Setup {
    fn new() -> Self {
        let setup = Self {
            home: TempDir::new().expect("home"),
            data: TempDir::new().expect("data"),
        };
        reconcile_cmd(setup.home.path())
            .args(["init", "notes", "--local"])
            .arg(setup.local())
            .arg("--cloud")
            .arg(setup.cloud())
            .assert()
            .success()
            .stdout(contains("Registered profile 'notes'"));
        setup
    }

    fn local(&self) -> PathBuf {
        self.data.path().join("local")
    }

    fn cloud(&self) -> PathBuf {
        self.data.path().join("cloud")
    }

    fn cmd(&self) -> Command {
        reconcile_cmd(self.home.path())
    }
}

fn put(dir: &Path, id: &str, record: Value) {
    fs::write(dir.join(format!("{id}.json")), record.to_string()).expect("write record");
}

#[test]
fn init_creates_directories_and_lists_profile() {
    let setup = Setup::new();
    assert!(setup.local().is_dir());
    assert!(setup.cloud().is_dir());
    assert!(setup
        .home
        .path()
        .join(".reconcile/profiles/notes.yaml")
        .exists());

    setup
        .cmd()
        .args(["profile", "list"])
        .assert()
        .success()
        .stdout(contains("notes"))
        .stdout(contains("id=id time=updateAt  lock=10000ms"));
}

#[test]
fn init_accepts_custom_selectors() {
    let home = TempDir::new().expect("home");
    let data = TempDir::new().expect("data");
    reconcile_cmd(home.path())
        .args(["init", "docs", "--local"])
        .arg(data.path().join("l"))
        .arg("--cloud")
        .arg(data.path().join("c"))
        .args(["--lock-ms", "500", "--time-key", "meta.modified"])
        .assert()
        .success();

    reconcile_cmd(home.path())
        .args(["profile", "list"])
        .assert()
        .success()
        .stdout(contains("id=id time=meta.modified  lock=500ms"));
}

#[test]
fn invalid_profile_name_is_rejected() {
    let home = TempDir::new().expect("home");
    let data = TempDir::new().expect("data");
    reconcile_cmd(home.path())
        .args(["init", "../escape", "--local"])
        .arg(data.path().join("l"))
        .arg("--cloud")
        .arg(data.path().join("c"))
        .assert()
        .failure()
        .stderr(contains("failed to init profile"));
}

#[test]
fn plan_reports_tasks_and_writes_nothing() {
    let setup = Setup::new();
    put(&setup.local(), "n1", json!({"id": "n1", "updateAt": 1}));
    put(&setup.cloud(), "n2", json!({"id": "n2", "updateAt": 2}));

    setup
        .cmd()
        .args(["plan", "notes"])
        .assert()
        .success()
        .stdout(contains("[plan] 'notes' — 2 task(s)"))
        .stdout(contains("n1  client-upload"))
        .stdout(contains("n2  client-download"));

    assert!(!setup.cloud().join("n1.json").exists());
    assert!(!setup.local().join("n2.json").exists());
    assert!(!setup.home.path().join(".reconcile/snapshots").exists());
}

#[test]
fn sync_converges_both_directories() {
    let setup = Setup::new();
    put(&setup.local(), "n1", json!({"id": "n1", "updateAt": 1}));
    put(&setup.cloud(), "n2", json!({"id": "n2", "updateAt": 2}));

    setup
        .cmd()
        .args(["sync", "notes"])
        .assert()
        .success()
        .stdout(contains("'notes' synced (2 resolved, 0 failed)"));
    assert!(setup.cloud().join("n1.json").exists());
    assert!(setup.local().join("n2.json").exists());

    setup
        .cmd()
        .args(["sync", "notes"])
        .assert()
        .success()
        .stdout(contains("'notes' — nothing to do"));

    setup
        .cmd()
        .args(["plan", "notes"])
        .assert()
        .success()
        .stdout(contains("is in sync"));
}

#[test]
fn sync_json_lists_task_states() {
    let setup = Setup::new();
    put(&setup.local(), "n1", json!({"id": "n1", "updateAt": 1}));

    let assert = setup
        .cmd()
        .args(["sync", "notes", "--json"])
        .assert()
        .success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("stdout utf8");
    let payload: Value = serde_json::from_str(&stdout).expect("parse sync json");

    let results = payload.as_array().expect("results array");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["profile"], "notes");
    assert_eq!(results[0]["dry_run"], false);
    let task = &results[0]["tasks"]["n1"];
    assert_eq!(task["actionType"], "client-upload");
    assert_eq!(task["state"], "success");
    assert_eq!(task["localAbstract"]["updateAt"], 1);
}

#[test]
fn sync_unknown_profile_fails() {
    let home = TempDir::new().expect("home");
    reconcile_cmd(home.path())
        .args(["sync", "ghost"])
        .assert()
        .failure()
        .stderr(contains("sync failed"));
}

#[test]
fn sync_requires_a_profile_or_all() {
    let home = TempDir::new().expect("home");
    reconcile_cmd(home.path())
        .arg("sync")
        .assert()
        .failure()
        .stderr(contains("provide a profile name or use --all"));
}

#[test]
fn sync_all_without_profiles_is_a_no_op() {
    let home = TempDir::new().expect("home");
    reconcile_cmd(home.path())
        .args(["sync", "--all"])
        .assert()
        .success()
        .stdout(contains("No profiles registered"));
}

#[test]
fn failed_write_marks_the_task_and_the_exit_code() {
    let setup = Setup::new();
    put(&setup.local(), "n1", json!({"id": "n1", "updateAt": 1}));
    setup.cmd().args(["sync", "notes"]).assert().success();

    // A directory squatting on the temp path makes the cloud write fail.
    put(&setup.local(), "n1", json!({"id": "n1", "updateAt": 5}));
    fs::create_dir(setup.cloud().join("n1.json.tmp")).expect("block temp path");

    setup
        .cmd()
        .args(["sync", "notes"])
        .assert()
        .failure()
        .stdout(contains("n1").and(contains("network-error")))
        .stderr(contains("1 task(s) failed"));

    fs::remove_dir(setup.cloud().join("n1.json.tmp")).expect("unblock temp path");
    setup
        .cmd()
        .args(["sync", "notes"])
        .assert()
        .success()
        .stdout(contains("(1 resolved, 0 failed)"));
}

#[test]
fn status_json_reports_cached_snapshots() {
    let setup = Setup::new();
    put(&setup.local(), "n1", json!({"id": "n1", "updateAt": 1}));

    let before = status_json(&setup);
    assert_eq!(before[0]["last_sync_at"], Value::Null);
    assert_eq!(before[0]["last_sync_age"], "never");

    setup.cmd().args(["sync", "notes"]).assert().success();

    let after = status_json(&setup);
    let row = after[0].as_object().expect("status row");
    let keys: BTreeSet<&str> = row.keys().map(String::as_str).collect();
    assert_eq!(
        keys,
        BTreeSet::from([
            "cloud_dir",
            "cloud_entries",
            "last_sync_age",
            "last_sync_at",
            "local_dir",
            "local_entries",
            "profile",
        ])
    );
    assert_eq!(row["profile"], "notes");
    assert_eq!(row["local_entries"], 1);
    assert_eq!(row["cloud_entries"], 1);
    assert!(row["last_sync_at"].is_string());
}

#[test]
fn status_table_flags_unsynced_profiles() {
    let setup = Setup::new();
    setup
        .cmd()
        .arg("status")
        .assert()
        .success()
        .stdout(contains("1 profiles | 1 never synced"))
        .stdout(contains("reconcile sync --all"));
}

fn status_json(setup: &Setup) -> Vec<Value> {
    let assert = setup.cmd().args(["status", "--json"]).assert().success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("stdout utf8");
    serde_json::from_str(&stdout).expect("parse status json")
}

#[test]
fn sync_with_nothing_to_do_still_counts_as_synced() {
    let setup = Setup::new();
    setup
        .cmd()
        .args(["sync", "notes"])
        .assert()
        .success()
        .stdout(contains("'notes' — nothing to do"));

    let rows = status_json(&setup);
    assert!(rows[0]["last_sync_at"].is_string());
    assert_ne!(rows[0]["last_sync_age"], "never");

    setup
        .cmd()
        .arg("status")
        .assert()
        .success()
        .stdout(contains("0 never synced"))
        .stdout(contains("reconcile sync --all").not());
}

#[test]
fn plan_rejects_a_path_like_profile_name() {
    let setup = Setup::new();
    setup
        .cmd()
        .args(["plan", "../notes"])
        .assert()
        .failure()
        .stderr(contains("plan failed"))
        .stderr(contains("invalid profile name"));
}
