//! End-to-end tests for CLI exit codes.
//!
//! - Exit code 0: success
//! - Exit code 1: any error, including a run where some source failed
//! - Exit code 2: invalid command-line usage (handled by clap)

mod common;
use common::prelude::*;

#[test]
fn test_exit_code_help() {
    let mut cmd = cargo_bin_cmd!("devsync");
    cmd.arg("--help").assert().code(0);
}

#[test]
fn test_exit_code_version() {
    let mut cmd = cargo_bin_cmd!("devsync");
    cmd.arg("--version").assert().code(0);
}

#[test]
fn test_exit_code_missing_config() {
    let fixture = TestFixture::new();
    fixture
        .command()
        .arg("status")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Failed to load config from devsync.ini"));
}

#[test]
fn test_exit_code_config_from_env() {
    let fixture = TestFixture::new().with_file("other.ini", "[settings]\n");
    fixture
        .command()
        .env("DEVSYNC_CONFIG", "other.ini")
        .arg("status")
        .assert()
        .code(0);
}

#[test]
fn test_exit_code_invalid_config() {
    let fixture = TestFixture::new().with_config("[egg]\nurl = https://example.com/egg.git\nvcs = cvs\n");
    fixture
        .command()
        .arg("checkout")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("cvs"));
}

#[test]
fn test_exit_code_revision_and_branch() {
    let fixture = TestFixture::new().with_config(
        "[egg]\nurl = https://example.com/egg.git\nbranch = main\nrevision = abc123\n",
    );
    fixture
        .command()
        .arg("checkout")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("both revision"));
    fixture.child("sources").assert(predicate::path::missing());
}

#[test]
fn test_exit_code_unknown_source_name() {
    let fixture = TestFixture::new().with_config("[egg]\nurl = https://example.com/egg.git\n");
    fixture
        .command()
        .args(["update", "spam"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("unknown source(s): spam"));
}

#[test]
fn test_exit_code_invalid_usage() {
    let mut cmd = cargo_bin_cmd!("devsync");
    cmd.arg("--threads").arg("0").arg("status").assert().code(2);

    let mut cmd = cargo_bin_cmd!("devsync");
    cmd.arg("no-such-command").assert().code(2);
}

#[test]
fn test_exit_code_offline_missing_source() {
    let fixture = TestFixture::new().with_config("[egg]\nurl = https://example.com/egg.git\n");
    fixture
        .command()
        .args(["--offline", "update"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("failed egg"))
        .stderr(predicate::str::contains("offline"));
}
