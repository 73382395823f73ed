use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Runs `sandterm` against `server` in an isolated home, off the async runtime.
async fn sandterm(server: &MockServer, args: &[&str]) -> assert_cmd::assert::Assert {
    let uri = server.uri();
    let args: Vec<String> = args.iter().map(ToString::to_string).collect();
    tokio::task::spawn_blocking(move || {
        let home = TempDir::new().unwrap();
        cargo_bin_cmd!("sandterm")
            .env("SANDTERM_HOME", home.path())
            .env_remove("SANDTERM_URL")
            .args(["--url", &uri, "--session", "session-test123"])
            .args(&args)
            .assert()
    })
    .await
    .unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn test_exec_prints_stdout() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/exec"))
        .and(body_partial_json(json!({
            "command": "echo hi",
            "sessionId": "session-test123"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "stdout": "hi\n",
            "stderr": "",
            "exitCode": 0
        })))
        .mount(&server)
        .await;

    sandterm(&server, &["exec", "echo", "hi"])
        .await
        .success()
        .stdout("hi\n");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_exec_propagates_exit_code() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/exec"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "stdout": "",
            "stderr": "boom",
            "error": "boom",
            "exitCode": 3
        })))
        .mount(&server)
        .await;

    sandterm(&server, &["exec", "false"])
        .await
        .code(3)
        .stderr(predicate::str::contains("boom").count(1));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_exec_http_error_shows_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/exec"))
        .respond_with(ResponseTemplate::new(503).set_body_string("sandbox unavailable"))
        .mount(&server)
        .await;

    sandterm(&server, &["exec", "ls"])
        .await
        .failure()
        .stderr(predicate::str::contains("sandbox unavailable"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_exec_streams_events() {
    let server = MockServer::start().await;
    let body = concat!(
        "data: {\"type\":\"start\"}\n\n",
        "data: {\"type\":\"stdout\",\"data\":\"compiling\\n\"}\n\n",
        "data: {\"type\":\"stderr\",\"data\":\"warning\\n\"}\n\n",
        "data: {\"type\":\"complete\",\"exitCode\":0}\n\n",
    );
    Mock::given(method("POST"))
        .and(path("/api/exec"))
        .and(header("accept", "text/event-stream"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    sandterm(&server, &["exec", "anvil", "--version"])
        .await
        .success()
        .stdout("compiling\n")
        .stderr(predicate::str::contains("warning"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_exec_refuses_interactive_commands() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    sandterm(&server, &["exec", "node"])
        .await
        .failure()
        .stderr(predicate::str::contains("interactive session"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_reset_reports_server_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/reset"))
        .and(body_partial_json(json!({"sessionId": "session-test123"})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"success": true, "message": "Sandbox reset"})),
        )
        .mount(&server)
        .await;

    sandterm(&server, &["reset"])
        .await
        .success()
        .stdout(predicate::str::contains("Sandbox reset"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_reset_failure_exits_nonzero() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/reset"))
        .respond_with(
            ResponseTemplate::new(500)
                .set_body_json(json!({"success": false, "message": "container gone"})),
        )
        .mount(&server)
        .await;

    sandterm(&server, &["reset"])
        .await
        .failure()
        .stderr(predicate::str::contains("container gone"));
}
