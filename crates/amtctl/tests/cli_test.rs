//! Integration tests for the `amtctl` binary.
//!
//! These run without an Intel AMT device: LMS is pointed at a closed local
//! port so every device query fails fast.
#![allow(clippy::unwrap_used)]

use std::net::TcpListener;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `amtctl` binary with env isolation.
///
/// Clears the password and `AMTCTL_*` variables and points config
/// directories at a nonexistent path.
fn amtctl_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("amtctl");
    cmd.env("HOME", "/tmp/amtctl-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/amtctl-cli-test-nonexistent")
        .env_remove("AMT_PASSWORD")
        .env_remove("AMTCTL_LMS__HOST")
        .env_remove("AMTCTL_LMS__PORT")
        .env_remove("AMTCTL_RPS__URL")
        .env_remove("AMTCTL_RPS__PROFILE")
        .env_remove("AMTCTL_MEI__DEVICE")
        .env_remove("RUST_LOG");
    cmd
}

/// A local port with nothing listening on it.
fn closed_port() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port.to_string()
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = amtctl_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_flag() {
    amtctl_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("Intel AMT")
            .and(predicate::str::contains("info"))
            .and(predicate::str::contains("activate"))
            .and(predicate::str::contains("configure")),
    );
}

#[test]
fn test_version_flag() {
    amtctl_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("amtctl"));
}

#[test]
fn test_version_command_json() {
    let output = amtctl_cmd().args(["version", "--json"]).output().unwrap();
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["version"], env!("CARGO_PKG_VERSION"));
    assert!(value["protocolVersion"].is_string());
}

// ── Shell completions ───────────────────────────────────────────────

#[test]
fn test_completions_bash() {
    amtctl_cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

// ── Usage errors ────────────────────────────────────────────────────

#[test]
fn test_lsa_requires_local() {
    let output = amtctl_cmd().args(["activate", "--lsa"]).output().unwrap();
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_ccm_and_acm_conflict() {
    let output = amtctl_cmd()
        .args(["activate", "--local", "--ccm", "--acm"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_activate_without_target_is_usage_error() {
    let output = amtctl_cmd().arg("activate").output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    let text = combined_output(&output);
    assert!(text.contains("--url"), "Expected a hint about --url:\n{text}");
}

#[test]
fn test_rps_url_must_be_websocket() {
    let output = amtctl_cmd()
        .args(["activate", "--url", "https://rps.example.com"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
}

// ── Device unreachable ──────────────────────────────────────────────

#[test]
fn test_info_reports_per_field_errors() {
    let output = amtctl_cmd()
        .args(["info", "--ver", "--uuid", "--json", "--password", "x", "--lms-port", &closed_port()])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!(value["errors"]["amt"].is_string());
    assert!(value["errors"]["uuid"].is_string());
    assert!(value.get("amt").is_none());
}

#[test]
fn test_local_ccm_without_lms_is_unavailable() {
    let output = amtctl_cmd()
        .args([
            "activate",
            "--local",
            "--ccm",
            "--password",
            "P@ssw0rd!",
            "--lms-port",
            &closed_port(),
        ])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(3), "{}", combined_output(&output));
    let text = combined_output(&output);
    assert!(!text.contains("P@ssw0rd!"), "password leaked:\n{text}");
}

#[test]
fn test_lsa_without_host_interface_is_a_credential_failure() {
    let output = amtctl_cmd()
        .env("AMTCTL_MEI__DEVICE", "/tmp/amtctl-cli-test-nonexistent/mei0")
        .args([
            "activate",
            "--local",
            "--ccm",
            "--lsa",
            "--password",
            "P@ssw0rd!",
            "--lms-port",
            &closed_port(),
        ])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(4), "{}", combined_output(&output));
    let text = combined_output(&output);
    assert!(text.contains("local system account"), "{text}");
}

// ── Logging ─────────────────────────────────────────────────────────

#[test]
fn test_unknown_log_level_warns_and_keeps_logging() {
    let output = amtctl_cmd()
        .args(["--log-level", "bogus", "info", "--ver", "--password", "x", "--lms-port", &closed_port()])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unknown log level"), "stderr:\n{stderr}");
    assert!(stderr.contains("WARN"), "stderr:\n{stderr}");
}
