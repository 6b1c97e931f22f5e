//! End-to-end CLI tests for the urlfetch binary.

mod support;

use assert_cmd::Command;
use predicates::prelude::*;
use support::socket_guard::start_mock_server_or_skip;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, ResponseTemplate};

#[test]
fn test_binary_help_displays_usage() {
    let mut cmd = Command::cargo_bin("urlfetch").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("fetch"))
        .stdout(predicate::str::contains("download"));
}

#[test]
fn test_binary_version_displays_version() {
    let mut cmd = Command::cargo_bin("urlfetch").unwrap();
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("urlfetch"));
}

#[test]
fn test_binary_without_subcommand_fails() {
    let mut cmd = Command::cargo_bin("urlfetch").unwrap();
    cmd.assert().failure();
}

#[test]
fn test_binary_invalid_url_fails() {
    let mut cmd = Command::cargo_bin("urlfetch").unwrap();
    cmd.args(["-q", "fetch", "ftp://example.com/file"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid URL"));
}

#[tokio::test]
async fn test_fetch_prints_body_after_redirect() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };

    Mock::given(path("/a"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/b"))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/b"))
        .and(header("x-token", "abc"))
        .respond_with(ResponseTemplate::new(200).set_body_string("hello from b"))
        .mount(&mock_server)
        .await;

    let mut cmd = Command::cargo_bin("urlfetch").unwrap();
    cmd.args([
        "-q",
        "fetch",
        &format!("{}/a", mock_server.uri()),
        "-X",
        "POST",
        "-H",
        "X-Token: abc",
        "-d",
        "x=1",
    ])
    .assert()
    .success()
    .stdout(predicate::eq("hello from b"));
}

#[tokio::test]
async fn test_fetch_error_status_prints_nothing() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };

    Mock::given(path("/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("nope"))
        .mount(&mock_server)
        .await;

    let mut cmd = Command::cargo_bin("urlfetch").unwrap();
    cmd.args(["-q", "fetch", &format!("{}/missing", mock_server.uri())])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[tokio::test]
async fn test_fetch_redirect_without_location_exits_nonzero() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };

    Mock::given(path("/a"))
        .respond_with(ResponseTemplate::new(301))
        .mount(&mock_server)
        .await;

    let mut cmd = Command::cargo_bin("urlfetch").unwrap();
    cmd.args(["-q", "fetch", &format!("{}/a", mock_server.uri())])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no redirection to follow"));
}

#[tokio::test]
async fn test_download_writes_output_and_prints_path() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };

    Mock::given(path("/file.bin"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8, 2, 3, 4]))
        .mount(&mock_server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let outfile = temp_dir.path().join("file.bin");

    let mut cmd = Command::cargo_bin("urlfetch").unwrap();
    cmd.args(["-q", "download", &format!("{}/file.bin", mock_server.uri()), "-o"])
        .arg(&outfile)
        .assert()
        .success()
        .stdout(predicate::str::contains(outfile.display().to_string()));

    assert_eq!(std::fs::read(&outfile).unwrap(), vec![1u8, 2, 3, 4]);
}
