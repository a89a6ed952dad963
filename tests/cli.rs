use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Binary under test, isolated from any developer `.env` or exported key.
fn groq_chat(workdir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("groq-chat").unwrap();
    cmd.current_dir(workdir.path())
        .env_remove("GROQ_API_KEY")
        .env_remove("GROQ_API_URL")
        .env_remove("GROQ_CHAT_MODEL");
    cmd
}

#[test]
fn test_cli_help() {
    let dir = TempDir::new().unwrap();
    groq_chat(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage: groq-chat"))
        .stdout(predicate::str::contains("Commands:"))
        .stdout(predicate::str::contains("start"))
        .stdout(predicate::str::contains("chat"))
        .stdout(predicate::str::contains("--api-key <API_KEY>"))
        .stdout(predicate::str::contains("GROQ_API_KEY"))
        .stdout(predicate::str::contains("--version"));
}

#[test]
fn test_cli_start_help() {
    let dir = TempDir::new().unwrap();
    groq_chat(&dir)
        .arg("start")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage: groq-chat start"))
        .stdout(predicate::str::contains("--port <PORT>"))
        .stdout(predicate::str::contains("--templates-dir <TEMPLATES_DIR>"))
        .stdout(predicate::str::contains("--session-ttl <SESSION_TTL>"));
}

#[test]
fn test_cli_no_command() {
    let dir = TempDir::new().unwrap();
    groq_chat(&dir)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage: groq-chat"));
}

#[test]
fn test_missing_api_key_is_fatal() {
    let dir = TempDir::new().unwrap();
    groq_chat(&dir)
        .args(["start", "--port", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing API key"))
        .stderr(predicate::str::contains("GROQ_API_KEY"));
}

#[test]
fn test_api_key_from_dotenv_file() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join(".env"), "GROQ_API_KEY=from-dotenv\n").unwrap();

    // Key is found, so the failure is the out-of-range temperature instead.
    groq_chat(&dir)
        .args(["--temperature", "9", "chat"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("temperature"))
        .stderr(predicate::str::contains("missing API key").not());
}

#[test]
fn test_terminal_chat_against_mock_provider() {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let server = runtime.block_on(async {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "<think>plan</think>\n\nHello there!"}}]
            })))
            .mount(&server)
            .await;
        server
    });

    let dir = TempDir::new().unwrap();
    groq_chat(&dir)
        .args(["--api-key", "test-key", "--api-url"])
        .arg(format!("{}/v1/chat/completions", server.uri()))
        .arg("chat")
        .write_stdin("  hi  \n/quit\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Hello there!"))
        .stdout(predicate::str::contains("plan").not());
}
