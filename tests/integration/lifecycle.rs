use std::{
    fs,
    path::Path,
    process::{Child, Command, Stdio},
    thread,
    time::Duration,
};

use nix::{
    sys::signal::{self, Signal},
    unistd::Pid,
};
use tempfile::tempdir;

fn spawn_daemon(config_path: &Path) -> Child {
    Command::new(assert_cmd::cargo::cargo_bin!("chaind"))
        .arg("--config-file")
        .arg(config_path)
        .args(["--loglevel", "debug"])
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to start daemon")
}

fn terminate(child: &Child) {
    signal::kill(Pid::from_raw(child.id() as i32), Signal::SIGTERM)
        .expect("failed to signal daemon");
}

#[test]
fn reaches_victory_and_exits_one_on_sigterm() {
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
      - module: log.msg
        args: ["greeting is ", { var: greeting }]
"#,
    )
    .expect("failed to write config");

    let child = spawn_daemon(&config_path);
    thread::sleep(Duration::from_millis(800));
    terminate(&child);

    let output = child.wait_with_output().expect("failed to wait for daemon");
    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("greeting is hello"), "stdout: {stdout}");
    assert!(stdout.contains("process demo: victory"), "stdout: {stdout}");
    assert!(
        stdout.contains("process demo: retreat complete"),
        "stdout: {stdout}"
    );
}

#[test]
fn async_up_module_reaches_victory() {
    let temp = tempdir().expect("failed to create tempdir");
    let config_path = temp.path().join("chaind.yaml");
    fs::write(
        &config_path,
        r#"processes:
  - name: slowpoke
    statements:
      - module: sleep
        args: ["50"]
      - module: log.msg
        args: ["awake"]
"#,
    )
    .expect("failed to write config");

    let child = spawn_daemon(&config_path);
    thread::sleep(Duration::from_millis(800));
    terminate(&child);

    let output = child.wait_with_output().expect("failed to wait for daemon");
    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("awake"), "stdout: {stdout}");
    assert!(
        stdout.contains("process slowpoke: victory"),
        "stdout: {stdout}"
    );
}

#[test]
fn managed_child_is_terminated_on_shutdown() {
    let temp = tempdir().expect("failed to create tempdir");
    let config_path = temp.path().join("chaind.yaml");
    fs::write(
        &config_path,
        r#"processes:
  - name: svc
    statements:
      - name: worker
        module: run.daemon
        args: ["sleep", "30"]
      - module: log.msg
        args: ["worker pid ", { var: worker.pid }]
"#,
    )
    .expect("failed to write config");

    let child = spawn_daemon(&config_path);
    thread::sleep(Duration::from_millis(800));
    terminate(&child);

    let output = child.wait_with_output().expect("failed to wait for daemon");
    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("worker pid "), "stdout: {stdout}");
    assert!(stdout.contains("process svc: victory"), "stdout: {stdout}");
}
