//! Integration tests for quotabar-cli
//!
//! These tests run the binary end-to-end against a mock usage API and a
//! temporary state directory.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::json;
use serial_test::serial;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Get a Command for the quotabar binary, isolated to `state`
fn quotabar(state: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("quotabar").unwrap();
    cmd.env("NO_COLOR", "1")
        .env_remove("QUOTABAR_OAUTH_TOKEN")
        .env_remove("QUOTABAR_API_URL")
        .env_remove("RUST_LOG")
        .arg("--state-dir")
        .arg(state.path());
    cmd
}

/// Same, with a token and the mock server as API
fn quotabar_against(state: &TempDir, server: &MockServer) -> Command {
    let mut cmd = quotabar(state);
    cmd.env("QUOTABAR_API_URL", server.uri())
        .args(["--token", "test-token"]);
    cmd
}

async fn usage_server(status: u16, body: serde_json::Value) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/oauth/usage"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(status).set_body_json(body))
        .mount(&server)
        .await;
    server
}

fn usage_body(five_hour: f64) -> serde_json::Value {
    json!({
        "five_hour": { "utilization": five_hour, "resets_at": "2099-01-01T05:00:00Z" },
        "seven_day": { "utilization": 12.0, "resets_at": "2099-01-08T00:00:00Z" }
    })
}

// =============================================================================
// Help and Version Tests
// =============================================================================

#[test]
#[serial]
fn test_cli_help() {
    let state = TempDir::new().unwrap();
    quotabar(&state)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("quotabar"))
        .stdout(predicate::str::contains("watch"));
}

#[test]
#[serial]
fn test_cli_version() {
    let state = TempDir::new().unwrap();
    quotabar(&state)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("quotabar"));
}

// =============================================================================
// Config Command Tests
// =============================================================================

#[test]
#[serial]
fn test_config_show_defaults() {
    let state = TempDir::new().unwrap();
    quotabar(&state)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("interval"))
        .stdout(predicate::str::contains("300s"))
        .stdout(predicate::str::contains("80,90"));
}

#[test]
#[serial]
fn test_config_set_then_get() {
    let state = TempDir::new().unwrap();
    quotabar(&state)
        .args(["config", "set", "interval", "10m"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Set interval = 600s"));

    quotabar(&state)
        .args(["config", "get", "interval"])
        .assert()
        .success()
        .stdout(predicate::str::diff("600s\n"));
}

#[test]
#[serial]
fn test_config_set_clamps_interval() {
    let state = TempDir::new().unwrap();
    quotabar(&state)
        .args(["config", "set", "interval", "10"])
        .assert()
        .success();

    quotabar(&state)
        .args(["config", "get", "interval"])
        .assert()
        .success()
        .stdout(predicate::str::contains("60s"));
}

#[test]
#[serial]
fn test_config_set_interval_out_of_range() {
    let state = TempDir::new().unwrap();
    quotabar(&state)
        .args(["config", "set", "interval", "6000000000000000h"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid interval"));

    quotabar(&state)
        .args(["config", "set", "interval", "10000000000000"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Set interval = 86400s"));
}

#[test]
#[serial]
fn test_config_set_unknown_key_fails() {
    let state = TempDir::new().unwrap();
    quotabar(&state)
        .args(["config", "set", "colour", "blue"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown setting"));
}

#[test]
#[serial]
fn test_config_show_json() {
    let state = TempDir::new().unwrap();
    let output = quotabar(&state)
        .args(["--format", "json", "config", "show"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["base_interval_secs"], 300);
    assert_eq!(value["adaptive_polling"], false);
}

// =============================================================================
// Status / History / Reset Tests
// =============================================================================

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn test_status_shows_usage() {
    let server = usage_server(200, usage_body(42.5)).await;
    let state = TempDir::new().unwrap();

    quotabar_against(&state, &server)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("42%"))
        .stdout(predicate::str::contains("5-hour limit"))
        .stdout(predicate::str::contains("Next poll in 5m"));
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn test_status_json() {
    let server = usage_server(200, usage_body(42.5)).await;
    let state = TempDir::new().unwrap();

    let output = quotabar_against(&state, &server)
        .args(["--format", "json", "status"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["next_poll_secs"], 300);
    assert_eq!(value["categories"][0]["category"], "five_hour");
    assert_eq!(value["categories"][0]["percent"], 42);
    assert!(value["error"].is_null());
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn test_status_rate_limited() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/oauth/usage"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;
    let state = TempDir::new().unwrap();

    quotabar_against(&state, &server)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("rate limit?"))
        .stderr(predicate::str::contains("HTTP 429"));
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn test_history_and_reset() {
    let server = usage_server(200, usage_body(42.5)).await;
    let state = TempDir::new().unwrap();

    // The first fetch opens the cycle, the second records a snapshot
    for _ in 0..2 {
        quotabar_against(&state, &server)
            .args(["--quiet", "status"])
            .assert()
            .success();
    }

    quotabar(&state)
        .arg("history")
        .assert()
        .success()
        .stdout(predicate::str::contains("42.5%"))
        .stdout(predicate::str::contains("2099-01-01T05:00:00Z"));

    quotabar(&state)
        .arg("reset")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage state cleared"));

    quotabar(&state)
        .arg("history")
        .assert()
        .success()
        .stdout(predicate::str::contains("No items found."));
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn test_reset_keeps_settings() {
    let state = TempDir::new().unwrap();
    quotabar(&state)
        .args(["config", "set", "adaptive", "on"])
        .assert()
        .success();
    quotabar(&state).arg("reset").assert().success();

    quotabar(&state)
        .args(["config", "get", "adaptive"])
        .assert()
        .success()
        .stdout(predicate::str::contains("true"));
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn test_threshold_notification_printed() {
    let state = TempDir::new().unwrap();

    let opening = usage_server(200, usage_body(50.0)).await;
    quotabar_against(&state, &opening)
        .args(["--quiet", "status"])
        .assert()
        .success();

    let high = usage_server(200, usage_body(85.0)).await;
    quotabar_against(&state, &high)
        .arg("status")
        .assert()
        .success()
        .stderr(predicate::str::contains("Usage above 80%"));

    // Fired once per cycle
    quotabar_against(&state, &high)
        .arg("status")
        .assert()
        .success()
        .stderr(predicate::str::contains("Usage above 80%").not());
}

// =============================================================================
// Watch Command Tests
// =============================================================================

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn test_watch_single_poll() {
    let server = usage_server(200, usage_body(42.5)).await;
    let state = TempDir::new().unwrap();

    quotabar_against(&state, &server)
        .args(["watch", "--polls", "1"])
        .write_stdin("")
        .timeout(std::time::Duration::from_secs(30))
        .assert()
        .success()
        .stdout(predicate::str::contains("5-hour limit: 42%"))
        .stdout(predicate::str::contains("(next in 5m)"));
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn test_watch_json_lines() {
    let server = usage_server(200, usage_body(10.0)).await;
    let state = TempDir::new().unwrap();

    let output = quotabar_against(&state, &server)
        .args(["--format", "json", "--quiet", "watch", "--polls", "1"])
        .write_stdin("")
        .timeout(std::time::Duration::from_secs(30))
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    let line: serde_json::Value = serde_json::from_str(stdout.lines().last().unwrap()).unwrap();
    assert_eq!(line["next_poll_secs"], 300);
    assert_eq!(line["categories"][0]["percent"], 10);
}
