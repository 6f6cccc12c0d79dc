//! tests/api/cli.rs
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

use crate::helpers::{as_str, test_data_dir, write_input};

fn wordcount() -> Command {
    let mut cmd = Command::cargo_bin("wordcount").unwrap();
    cmd.env_remove("RUST_LOG").arg("--parallelism").arg("2");
    cmd
}

#[test]
fn test_cli_help() {
    Command::cargo_bin("wordcount")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("submit"))
        .stdout(predicate::str::contains("show"));
}

#[test]
fn test_submit_then_show() {
    let tmp = TempDir::new().unwrap();
    let out = tmp.path().join("out");
    let input = test_data_dir().join("sonnet.txt");

    wordcount()
        .args(["submit", "-i", as_str(&input), "-o", as_str(&out)])
        .assert()
        .success()
        .stdout(predicate::str::contains("wrote 53 distinct words (59 total)"));

    wordcount()
        .args(["show", "-o", as_str(&out), "-k", "1"])
        .assert()
        .success()
        .stdout("1\t3\tthy\n");
}

#[test]
fn test_existing_output_exits_with_sink_code() {
    let tmp = TempDir::new().unwrap();
    let input = write_input(tmp.path(), "in.txt", &["the cat sat", "the cat ran"]);
    let out = tmp.path().join("out");

    wordcount()
        .args(["submit", "-i", as_str(&input), "-o", as_str(&out)])
        .assert()
        .success();
    wordcount()
        .args(["submit", "-i", as_str(&input), "-o", as_str(&out)])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn test_missing_input_exits_with_source_code() {
    let tmp = TempDir::new().unwrap();
    wordcount()
        .args([
            "submit",
            "-i",
            as_str(&tmp.path().join("missing.txt")),
            "-o",
            as_str(&tmp.path().join("out")),
        ])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn test_zero_parallelism_exits_with_context_code() {
    Command::cargo_bin("wordcount")
        .unwrap()
        .env_remove("RUST_LOG")
        .args(["--parallelism", "0", "show", "-o", "anything"])
        .assert()
        .code(4);
}
