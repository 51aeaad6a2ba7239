use std::fs;
use std::path::Path;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

fn globsync_cmd(cwd: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("globsync"));
    cmd.current_dir(cwd).env_remove("RUST_LOG").env_remove("ROLLUP_WATCH");
    cmd
}

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
    fs::write(path, content).expect("write");
}

fn workspace() -> TempDir {
    let tmp = TempDir::new().expect("tempdir");
    write(tmp.path(), "src/file.txt", "hello\n");
    write(tmp.path(), "src/index.js", "js\n");
    write(tmp.path(), "dist/already-there.txt", "old\n");
    tmp
}

#[test]
fn sync_copies_and_cleans() {
    let tmp = workspace();

    globsync_cmd(tmp.path())
        .args(["sync", "*.txt", "--dir", "src", "--dest", "dist"])
        .assert()
        .success()
        .stdout(contains("copied 1 file(s)"))
        .stdout(contains("file.txt → file.txt"));

    assert_eq!(fs::read_to_string(tmp.path().join("dist/file.txt")).unwrap(), "hello\n");
    assert!(!tmp.path().join("dist/already-there.txt").exists());
    assert!(!tmp.path().join("dist/index.js").exists());
}

#[test]
fn no_clean_keeps_existing_files() {
    let tmp = workspace();

    globsync_cmd(tmp.path())
        .args(["sync", "*.txt", "--dir", "src", "--dest", "dist", "--no-clean"])
        .assert()
        .success();

    assert!(tmp.path().join("dist/already-there.txt").exists());
    assert!(tmp.path().join("dist/file.txt").exists());
}

#[test]
fn clean_glob_removes_only_matches() {
    let tmp = workspace();
    write(tmp.path(), "dist/file.old", "stale\n");

    globsync_cmd(tmp.path())
        .args(["sync", "*.js", "--dir", "src", "--dest", "dist", "--clean-glob", "file.*"])
        .assert()
        .success();

    assert!(!tmp.path().join("dist/file.old").exists());
    assert!(tmp.path().join("dist/already-there.txt").exists());
    assert!(tmp.path().join("dist/index.js").exists());
}

#[test]
fn dry_run_reports_plan_and_writes_nothing() {
    let tmp = workspace();

    globsync_cmd(tmp.path())
        .args(["sync", "*.txt", "--dir", "src", "--dest", "out", "--dry-run"])
        .assert()
        .success()
        .stdout(contains("[dry-run]"))
        .stdout(contains("file.txt"));

    assert!(!tmp.path().join("out").exists(), "dry-run must not create files");
    assert!(tmp.path().join("dist/already-there.txt").exists());
}

#[test]
fn manifest_file_is_written_into_destination() {
    let tmp = workspace();

    globsync_cmd(tmp.path())
        .args([
            "sync",
            "*.txt",
            "--dir",
            "src",
            "--dest",
            "dist",
            "--manifest-file",
            "manifest.json",
        ])
        .assert()
        .success();

    let manifest = fs::read_to_string(tmp.path().join("dist/manifest.json")).unwrap();
    assert_eq!(manifest, "{\n    \"file.txt\": \"file.txt\"\n}");
}

#[test]
fn json_report_lists_files() {
    let tmp = workspace();

    let assert = globsync_cmd(tmp.path())
        .args(["sync", "*.txt", "--dir", "src", "--dest", "dist", "--json"])
        .assert()
        .success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let report: serde_json::Value = serde_json::from_str(&stdout).expect("valid JSON");

    assert_eq!(report["summary"]["copied"], 1);
    assert_eq!(report["files"][0]["source"], "file.txt");
}

#[test]
fn config_file_supplies_options() {
    let tmp = workspace();
    write(
        tmp.path(),
        "globsync.yaml",
        "globs: ['*.txt']\ndir: src\ndest: dist\nclean: false\n",
    );

    globsync_cmd(tmp.path()).arg("sync").assert().success();

    assert!(tmp.path().join("dist/file.txt").exists());
    assert!(tmp.path().join("dist/already-there.txt").exists());
}

#[test]
fn missing_patterns_fail() {
    let tmp = workspace();

    globsync_cmd(tmp.path())
        .args(["sync", "--dir", "src"])
        .assert()
        .failure()
        .stderr(contains("pattern"));
}

#[test]
fn unknown_loglevel_is_rejected() {
    let tmp = workspace();

    globsync_cmd(tmp.path())
        .args(["sync", "*.txt", "--loglevel", "loud"])
        .assert()
        .failure()
        .stderr(contains("loud"));
}

#[test]
fn init_writes_config_once() {
    let tmp = TempDir::new().unwrap();

    globsync_cmd(tmp.path())
        .arg("init")
        .assert()
        .success()
        .stdout(contains("globsync.yaml"));
    assert!(tmp.path().join("globsync.yaml").exists());

    globsync_cmd(tmp.path())
        .arg("init")
        .assert()
        .failure()
        .stderr(contains("--force"));

    globsync_cmd(tmp.path())
        .args(["init", "--force"])
        .assert()
        .success()
        .stdout(contains("Wrote").and(contains("globsync.yaml")));
}
