//! CLI smoke tests for the binary surface.

#![allow(clippy::expect_used)]

use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn test_help_lists_subcommands() {
    let mut cmd = Command::cargo_bin("flavia-rs").expect("binary");
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("init"))
        .stdout(predicate::str::contains("index"))
        .stdout(predicate::str::contains("ask"));
}

#[test]
fn test_version_flag() {
    let mut cmd = Command::cargo_bin("flavia-rs").expect("binary");
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("flavia-rs"));
}

#[test]
fn test_stats_without_catalog_fails() {
    let temp = tempfile::tempdir().expect("temp");
    let mut cmd = Command::cargo_bin("flavia-rs").expect("binary");
    cmd.args(["--base-dir"])
        .arg(temp.path())
        .arg("stats")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error:"));
}

#[test]
fn test_init_then_catalog_query() {
    let temp = tempfile::tempdir().expect("temp");
    std::fs::write(temp.path().join("a.md"), "# A").expect("seed file");

    Command::cargo_bin("flavia-rs")
        .expect("binary")
        .args(["--base-dir"])
        .arg(temp.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Cataloged 1 files"));

    Command::cargo_bin("flavia-rs")
        .expect("binary")
        .args(["--base-dir"])
        .arg(temp.path())
        .args(["catalog", "--file-type", "text"])
        .assert()
        .success()
        .stdout(predicate::str::contains("a.md"));
}
