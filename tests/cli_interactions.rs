//! CLI options interaction tests
//!
//! Drive the `nst` binary end to end: argument validation, exit codes,
//! .env generation and a JSON run against a mock backend.

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;
use tempfile::TempDir;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

const CONFIG_VARS: &[&str] = &[
    "SPEEDTEST_SERVER",
    "DOWNLOAD_DURATION",
    "UPLOAD_DURATION",
    "DOWNLOAD_STREAMS",
    "UPLOAD_STREAMS",
    "UPLOAD_PAYLOAD_BYTES",
    "DOWNLOAD_CHUNK_MB",
    "PING_COUNT",
    "OVERHEAD_FACTOR",
    "TIMEOUT_SECONDS",
    "ENABLE_COLOR",
    "SHARE_RESULTS",
];

/// Command isolated from any configuration in the caller's environment
fn create_test_cmd(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("nst").unwrap();
    cmd.current_dir(dir.path()).env("NO_COLOR", "1");
    for var in CONFIG_VARS {
        cmd.env_remove(var);
    }
    cmd
}

#[test]
fn test_help_lists_options() {
    let dir = TempDir::new().unwrap();
    create_test_cmd(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--server"))
        .stdout(predicate::str::contains("--no-share"))
        .stdout(predicate::str::contains("--json"));
}

#[test]
fn test_version() {
    let dir = TempDir::new().unwrap();
    create_test_cmd(&dir)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_conflicting_color_flags() {
    let dir = TempDir::new().unwrap();
    create_test_cmd(&dir)
        .args(["--color", "--no-color"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Cannot specify both --color and --no-color"));
}

#[test]
fn test_json_with_color_rejected_as_json() {
    let dir = TempDir::new().unwrap();
    create_test_cmd(&dir)
        .args(["--json", "--color"])
        .assert()
        .code(1)
        .stdout(predicate::str::starts_with(r#"{"error":"#));
}

#[test]
fn test_invalid_server_scheme() {
    let dir = TempDir::new().unwrap();
    create_test_cmd(&dir)
        .args(["--server", "ftp://speed.example.com"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("http or https"));
}

#[test]
fn test_out_of_range_durations_are_usage_errors() {
    let dir = TempDir::new().unwrap();
    for args in [["--download-duration", "0"], ["--upload-duration", "500"], ["--timeout", "0x10"]] {
        create_test_cmd(&dir).args(args).assert().failure().code(2);
    }
}

#[test]
fn test_invalid_env_value() {
    let dir = TempDir::new().unwrap();
    create_test_cmd(&dir)
        .env("DOWNLOAD_STREAMS", "many")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("DOWNLOAD_STREAMS"));
}

#[test]
fn test_invalid_dotenv_value() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join(".env"), "PING_COUNT=0\n").unwrap();

    create_test_cmd(&dir)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Ping count"));
}

#[test]
fn test_malformed_dotenv_line() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join(".env"), "PING_COUNT 6\n").unwrap();

    create_test_cmd(&dir)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Environment file error"));
}

#[test]
fn test_init_env_writes_once() {
    let dir = TempDir::new().unwrap();

    create_test_cmd(&dir)
        .arg("--init-env")
        .assert()
        .success()
        .stdout(predicate::str::contains(".env"));

    let content = std::fs::read_to_string(dir.path().join(".env")).unwrap();
    assert!(content.contains("SPEEDTEST_SERVER="));

    create_test_cmd(&dir)
        .arg("--init-env")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Refusing to overwrite"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_json_run_against_mock_backend() {
    let server = MockServer::start().await;
    Mock::given(path("/backend/empty"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/backend/garbage"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 128 * 1024]))
        .mount(&server)
        .await;
    Mock::given(path("/backend/getIP"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"processedString":"Example ISP"}"#))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/backend/results/telemetry"))
        .respond_with(ResponseTemplate::new(200).set_body_string("id run42"))
        .mount(&server)
        .await;

    let uri = server.uri();
    let output = tokio::task::spawn_blocking(move || {
        let dir = TempDir::new().unwrap();
        create_test_cmd(&dir)
            .args([
                "--server", &uri,
                "--download-duration", "1",
                "--upload-duration", "1",
                "--payload-bytes", "65536",
                "--ping-count", "3",
                "--json",
            ])
            .output()
            .unwrap()
    })
    .await
    .unwrap();

    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();

    assert_eq!(report["share_url"], format!("{}/backend/results/?id=run42", server.uri()));
    assert_eq!(report["isp"]["processedString"], "Example ISP");
    assert!(report["session"]["download_mbps"].as_f64().unwrap() > 0.0);
    assert!(report["session"]["upload_mbps"].as_f64().unwrap() > 0.0);
}
