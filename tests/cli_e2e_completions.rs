//! End-to-end tests for the `devsync completions` command.

mod common;
use common::prelude::*;

#[test]
fn test_completions_bash() {
    let mut cmd = cargo_bin_cmd!("devsync");
    cmd.args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("_devsync()"))
        .stdout(predicate::str::contains("checkout"))
        .stdout(predicate::str::contains("merge"));
}

#[test]
fn test_completions_zsh() {
    let mut cmd = cargo_bin_cmd!("devsync");
    cmd.args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef devsync"));
}

#[test]
fn test_completions_invalid_shell() {
    let mut cmd = cargo_bin_cmd!("devsync");
    cmd.args(["completions", "tcsh"]).assert().code(2);
}
