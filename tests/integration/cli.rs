use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

#[test]
fn help_exits_zero() {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("chaind"));
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--config-file"));
}

#[test]
fn version_exits_zero() {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("chaind"));
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("chaind"));
}

#[test]
fn missing_config_file_argument_exits_one() {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("chaind"));
    cmd.assert().failure().code(1);
}

#[test]
fn invalid_loglevel_exits_one() {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("chaind"));
    cmd.args(["--config-file", "chaind.yaml", "--loglevel", "chatty"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("invalid log level"));
}

#[test]
fn unreadable_config_file_exits_one() {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("chaind"));
    cmd.args(["--config-file", "/nonexistent/chaind.yaml"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Failed to read config file"));
}

#[test]
fn unknown_log_channel_exits_one() {
    let temp = tempdir().expect("failed to create tempdir");
    let config_path = temp.path().join("chaind.yaml");
    fs::write(
        &config_path,
        r#"processes:
  - name: demo
    statements:
      - name: greeting
        module: var
        args: ["hello"]
"#,
    )
    .expect("failed to write config");

    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("chaind"));
    cmd.arg("--config-file")
        .arg(&config_path)
        .args(["--channel-loglevel", "bogus", "debug"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("unknown log channel"));
}

#[test]
fn config_with_only_unknown_modules_exits_one() {
    let temp = tempdir().expect("failed to create tempdir");
    let config_path = temp.path().join("chaind.yaml");
    fs::write(
        &config_path,
        r#"processes:
  - name: demo
    statements:
      - module: no.such.module
"#,
    )
    .expect("failed to write config");

    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("chaind"));
    cmd.arg("--config-file")
        .arg(&config_path)
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains(
            "no process could be loaded",
        ));
}
