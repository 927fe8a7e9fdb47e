use assert_cmd::Command;
use httpmock::MockServer;
use predicates::str::contains;
use std::io::Write;
use tempfile::NamedTempFile;

fn token_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("tmp file");
    file.write_all(contents.as_bytes()).expect("write token");
    file
}

fn syndicate() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("syndicate"));
    cmd.env_remove("RUST_LOG")
        .env_remove("SYNDICATE_API_TOKEN")
        .env_remove("SYNDICATE_TOKEN_FILE")
        .env_remove("SYNDICATE_CONFIG_FILE");
    cmd
}

#[test]
fn dashboard_works_end_to_end() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method("GET")
            .path("/api/analytics/dashboard")
            .header("authorization", "Bearer env-token");
        then.status(200)
            .header("content-type", "application/json")
            .body(r#"{"total_newsletters":4,"total_subscribers":250,"avg_open_rate":0.42,"avg_click_rate":0.08,"recent_newsletters":[],"trending_content":[]}"#);
    });

    let assert = syndicate()
        .env("SYNDICATE_API_TOKEN", "env-token")
        .arg("--api-url")
        .arg(server.base_url())
        .arg("dashboard")
        .assert()
        .success();

    let output = String::from_utf8_lossy(&assert.get_output().stdout);
    assert!(output.contains("\"total_subscribers\": 250"));
    mock.assert();
}

#[test]
fn token_file_is_preferred_over_environment() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method("GET")
            .path("/api/content/sources")
            .header("authorization", "Bearer file-token");
        then.status(200)
            .header("content-type", "application/json")
            .body("[]");
    });

    let token = token_file("file-token\n");
    syndicate()
        .env("SYNDICATE_API_TOKEN", "env-token")
        .env("SYNDICATE_TOKEN_FILE", token.path())
        .args(["sources", "list", "--api-url"])
        .arg(server.base_url())
        .assert()
        .success()
        .stdout(contains("[]"));
    mock.assert();
}

#[test]
fn backend_error_exits_non_zero_with_detail() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method("GET").path("/api/newsletters/99");
        then.status(404)
            .header("content-type", "application/json")
            .body(r#"{"detail":"Newsletter not found"}"#);
    });

    syndicate()
        .args(["newsletters", "get", "99", "--api-url"])
        .arg(server.base_url())
        .assert()
        .code(1)
        .stderr(contains("Newsletter not found"));
}

#[test]
fn invalid_api_url_fails_fast() {
    syndicate()
        .args(["--api-url", "ftp://example.com", "dashboard"])
        .assert()
        .failure()
        .stderr(contains("api.base_url"));
}

#[test]
fn missing_subcommand_is_a_usage_error() {
    syndicate().assert().failure().stderr(contains("Usage"));
}
