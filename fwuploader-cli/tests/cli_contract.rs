//! Integration tests for core CLI contract behavior.

use {predicates::prelude::*, std::fs, tempfile::tempdir};

fn cli_cmd() -> assert_cmd::Command {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("fwuploader");
    cmd.env_remove("FWUPLOADER_PORT")
        .env_remove("FWUPLOADER_BAUD")
        .env_remove("FWUPLOADER_CONFIG");
    cmd
}

#[test]
fn help_exits_zero_and_writes_stdout_only() {
    let mut cmd = cli_cmd();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("fwuploader"))
        .stderr(predicate::str::is_empty());
}

#[test]
fn version_exits_zero_and_writes_stdout_only() {
    let mut cmd = cli_cmd();
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("fwuploader"))
        .stderr(predicate::str::is_empty());
}

#[test]
fn help_lists_every_command() {
    let mut cmd = cli_cmd();
    let output = cmd.arg("--help").output().expect("command should execute");
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    for name in ["list-ports", "watch", "reboot", "version", "send", "receive", "completions"] {
        assert!(stdout.contains(name), "help should mention {name}");
    }
}

#[test]
fn list_ports_json_returns_valid_json() {
    let mut cmd = cli_cmd();
    let output = cmd
        .args(["list-ports", "--json"])
        .output()
        .expect("command should execute");

    // Enumeration may be unavailable in a sandbox; when it works stdout is a JSON array.
    if output.status.success() {
        let stdout = String::from_utf8_lossy(&output.stdout);
        let parsed: serde_json::Value =
            serde_json::from_str(&stdout).expect("stdout should be valid JSON");
        assert!(parsed.is_array());
    }
}

#[test]
fn completions_command_writes_to_stdout() {
    let mut cmd = cli_cmd();
    cmd.args(["completions", "bash"])
        .assert()
        .success()
        .code(0)
        .stdout(predicate::str::contains("fwuploader"));
}

// ============================================================================
// Exit Code Tests
// ============================================================================

#[test]
fn exit_code_two_for_unknown_command() {
    let mut cmd = cli_cmd();
    cmd.arg("unknown-command-xyz")
        .assert()
        .failure()
        .code(2);
}

#[test]
fn exit_code_two_for_missing_required_arg() {
    let mut cmd = cli_cmd();
    cmd.arg("send")
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("FILE"));
}

#[test]
fn exit_code_two_for_invalid_baud_env() {
    let mut cmd = cli_cmd();
    cmd.env("FWUPLOADER_BAUD", "fast")
        .arg("list-ports")
        .assert()
        .failure()
        .code(2);
}

#[test]
fn exit_code_two_for_receive_into_missing_directory() {
    let dir = tempdir().expect("tempdir should be created");
    let missing = dir.path().join("nope");

    let mut cmd = cli_cmd();
    cmd.args(["-p", "INVALID_PORT_NAME_XYZ", "receive", "--output"])
        .arg(&missing)
        .assert()
        .failure()
        .code(2)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("not a directory"));
}

#[test]
fn exit_code_one_for_missing_file() {
    let dir = tempdir().expect("tempdir should be created");
    let nonexistent = dir.path().join("does_not_exist.pem");

    let mut cmd = cli_cmd();
    cmd.args(["-p", "INVALID_PORT_NAME_XYZ", "send"])
        .arg(&nonexistent)
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn invalid_port_fails_without_stdout() {
    let dir = tempdir().expect("tempdir should be created");
    let cert = dir.path().join("roots.pem");
    fs::write(&cert, b"-----BEGIN CERTIFICATE-----\n").expect("write cert");

    let mut cmd = cli_cmd();
    cmd.args(["-p", "INVALID_PORT_NAME_XYZ", "send"])
        .arg(&cert)
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("INVALID_PORT_NAME_XYZ"));
}

#[test]
fn watch_with_empty_window_reports_no_port() {
    let dir = tempdir().expect("tempdir should be created");
    fs::write(dir.path().join("fwuploader.toml"), "[watch]\nwindow_ms = 0\n")
        .expect("write config");

    let mut cmd = cli_cmd();
    cmd.current_dir(dir.path())
        .arg("watch")
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::is_empty());
}

#[test]
fn config_flag_is_honoured() {
    let dir = tempdir().expect("tempdir should be created");
    let config = dir.path().join("custom.toml");
    fs::write(&config, "[watch]\nwindow_ms = 0\n").expect("write config");

    let mut cmd = cli_cmd();
    cmd.arg("--config")
        .arg(&config)
        .args(["-q", "watch"])
        .assert()
        .failure()
        .code(1);
}

#[test]
fn invalid_config_file_is_a_warning() {
    let dir = tempdir().expect("tempdir should be created");
    fs::write(dir.path().join("fwuploader.toml"), "invalid toml [[[").expect("write config");

    let mut cmd = cli_cmd();
    let output = cmd
        .current_dir(dir.path())
        .args(["completions", "bash"])
        .output()
        .expect("command should execute");

    assert!(output.status.success(), "command should succeed despite config warning");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("TOML"), "should warn about invalid TOML");
}

// ============================================================================
// Suggestion Tests
// ============================================================================

#[test]
fn unknown_command_suggests_similar() {
    let mut cmd = cli_cmd();
    cmd.arg("sned")
        .assert()
        .failure()
        .stderr(predicate::str::contains("send"));
}

#[test]
fn unknown_flag_suggests_similar() {
    let mut cmd = cli_cmd();
    cmd.arg("list-ports")
        .arg("--jason")
        .assert()
        .failure()
        .stderr(predicate::str::contains("json"));
}
